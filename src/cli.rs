use std::error::Error;
use std::path::PathBuf;

use atty::Stream;
use clap::{Parser, Subcommand};
use entryfront_rs::{
    DEFAULT_ANCHOR, DEFAULT_STATUS, DEFAULT_TERM_PATTERN, Entry, EntryStore, Filter, open_store,
    uri_format,
};
use serde_json::json;
use termimad::{FmtText, MadSkin, terminal_size};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "entryfront-rs", about = "Browse and serve site entries", version)]
pub struct Cli {
    /// Emit JSON instead of human-readable tables.
    #[arg(long, global = true)]
    json: bool,

    /// Load entries from a JSON file instead of the bundled set.
    #[arg(long, global = true, value_name = "PATH")]
    entries: Option<PathBuf>,

    /// Tag wrapped around highlighted terms.
    #[arg(long, global = true, default_value = DEFAULT_ANCHOR)]
    anchor: String,

    /// Attribute written onto each highlight tag.
    #[arg(long, global = true, default_value = DEFAULT_STATUS)]
    status: String,

    /// Regex locating terms inside entry bodies.
    #[arg(long, global = true, default_value = DEFAULT_TERM_PATTERN)]
    pattern: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Operations related to entries.
    #[command(subcommand)]
    Entry(EntryCommand),
    /// Print the route slug derived from each name.
    Slug {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Serve entries over HTTP.
    #[cfg(feature = "web")]
    Serve {
        /// Address to bind.
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: std::net::SocketAddr,
        /// Page styling.
        #[arg(long, value_enum, default_value_t = ThemeArg::Tailwind)]
        theme: ThemeArg,
        /// Public base URL used in canonical links and the sitemap.
        #[arg(long)]
        base_url: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum EntryCommand {
    /// List entries whose names contain every query.
    List {
        /// Substrings to match, case-insensitively.
        queries: Vec<String>,
    },
    /// Resolve a route and show the highlighted entry.
    Show {
        /// Route slug; omit for the landing entry.
        route: Option<String>,
    },
    /// Print the route table.
    Routes,
}

#[cfg(feature = "web")]
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
enum ThemeArg {
    Tailwind,
    Bootstrap,
}

#[cfg(feature = "web")]
impl From<ThemeArg> for entryfront_rs::web::WebTheme {
    fn from(value: ThemeArg) -> Self {
        match value {
            ThemeArg::Tailwind => entryfront_rs::web::WebTheme::Tailwind,
            ThemeArg::Bootstrap => entryfront_rs::web::WebTheme::Bootstrap,
        }
    }
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let Cli {
        json,
        entries,
        anchor,
        status,
        pattern,
        command,
    } = Cli::parse();
    let filter = Filter::new(anchor, status, &pattern)?;

    match command {
        Command::Slug { names } => {
            init_tracing("warn");
            handle_slug(names, json)
        }
        Command::Entry(command) => {
            init_tracing("warn");
            let mut store = open_store(entries.as_deref(), filter)?;
            match command {
                EntryCommand::List { queries } => handle_list(&store, queries, json),
                EntryCommand::Show { route } => {
                    handle_show(&mut store, route.unwrap_or_default(), json)
                }
                EntryCommand::Routes => handle_routes(&store, json),
            }
        }
        #[cfg(feature = "web")]
        Command::Serve {
            addr,
            theme,
            base_url,
        } => {
            init_tracing("info");
            let store = open_store(entries.as_deref(), filter)?;
            let config = entryfront_rs::web::WebConfig {
                addr,
                theme: theme.into(),
                base_url: base_url.unwrap_or_else(|| format!("http://{addr}")),
            };
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(entryfront_rs::web::serve(
                config,
                entryfront_rs::SharedStore::new(store),
            ))?;
            Ok(())
        }
    }
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_slug(names: Vec<String>, as_json: bool) -> Result<(), Box<dyn Error>> {
    let rows: Vec<(String, String)> = names
        .into_iter()
        .map(|name| {
            let slug = uri_format(&name);
            (name, slug)
        })
        .collect();

    if as_json {
        let payload: Vec<_> = rows
            .iter()
            .map(|(name, slug)| json!({ "name": name, "route": slug }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_pairs("NAME", "ROUTE", &rows);
    }
    Ok(())
}

fn handle_list(
    store: &EntryStore,
    queries: Vec<String>,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let matches = store.matches(&queries);

    if as_json {
        let payload = json!({
            "queries": queries,
            "results": matches.iter().map(|entry| {
                json!({
                    "index": entry.view().index,
                    "name": entry.name(),
                    "title": entry.title(),
                    "route": entry.route(),
                })
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_entry_table(&queries, &matches);
    }
    Ok(())
}

fn handle_show(store: &mut EntryStore, route: String, as_json: bool) -> Result<(), Box<dyn Error>> {
    let routes = store.compute_routes();
    let entry = store.get_entry(&route, &routes);

    if as_json {
        println!("{}", serde_json::to_string_pretty(entry)?);
    } else {
        print_entry(entry);
    }
    Ok(())
}

fn handle_routes(store: &EntryStore, as_json: bool) -> Result<(), Box<dyn Error>> {
    let routes = store.compute_routes();
    if as_json {
        println!("{}", serde_json::to_string_pretty(&routes)?);
    } else {
        let rows: Vec<(String, String)> = routes.into_iter().collect();
        print_pairs("ROUTE", "NAME", &rows);
    }
    Ok(())
}

fn print_pairs(left: &str, right: &str, rows: &[(String, String)]) {
    if rows.is_empty() {
        println!("Nothing to show.");
        return;
    }
    let width = rows
        .iter()
        .map(|(value, _)| value.len())
        .max()
        .unwrap_or(left.len())
        .max(left.len());
    println!("{:<width$}  {}", left, right, width = width);
    println!("{:-<width$}  {}", "", "-".repeat(right.len().max(10)), width = width);
    for (a, b) in rows {
        println!("{:<width$}  {}", a, b, width = width);
    }
}

fn print_entry_table(queries: &[String], rows: &[&Entry]) {
    if rows.is_empty() {
        println!("No entries contain {}.", describe_queries(queries));
        return;
    }
    let width = rows
        .iter()
        .map(|entry| entry.title().len())
        .max()
        .unwrap_or(4)
        .max("NAME".len());
    if !queries.is_empty() {
        println!("Entries containing {}:", describe_queries(queries));
    }
    println!("{:>5}  {:<width$}  {}", "INDEX", "NAME", "ROUTE", width = width);
    println!("{:->5}  {:-<width$}  {}", "", "", "----------", width = width);
    for entry in rows {
        println!(
            "{:>5}  {:<width$}  /{}",
            entry.view().index,
            entry.title(),
            entry.route(),
            width = width
        );
    }
}

fn describe_queries(queries: &[String]) -> String {
    if queries.is_empty() {
        return "anything".to_string();
    }
    queries
        .iter()
        .map(|query| format!("\"{query}\""))
        .collect::<Vec<_>>()
        .join(" and ")
}

fn print_entry(entry: &Entry) {
    println!("Entry: {} ({})", entry.title(), entry.name());
    println!("Route: /{}", entry.route());
    if let Some(date) = entry.date() {
        let edited = entry
            .edit()
            .map(|edit| format!(", edited {edit}"))
            .unwrap_or_default();
        println!("Published: {date}{edited}");
    }
    if let Some(team) = entry.team() {
        println!("Team: {team}");
    }
    render_markdown_block("Body", entry.body());
}

fn stdout_is_tty() -> bool {
    atty::is(Stream::Stdout)
}

fn markdown_width() -> usize {
    let (width, _) = terminal_size();
    width.max(60) as usize
}

fn render_markdown_block(title: &str, body: &str) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return;
    }
    println!("\n{title}:");
    if stdout_is_tty() {
        let skin = MadSkin::default();
        let formatted = FmtText::from(&skin, trimmed, Some(markdown_width()));
        println!("{formatted}");
    } else {
        println!("{trimmed}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_list_with_queries() {
        let cli = Cli::try_parse_from(["entryfront-rs", "entry", "list", "rust", "async"]).unwrap();
        match cli.command {
            Command::Entry(EntryCommand::List { queries }) => {
                assert_eq!(queries, vec!["rust", "async"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.pattern, DEFAULT_TERM_PATTERN);
    }

    #[test]
    fn describes_queries_for_empty_results() {
        assert_eq!(describe_queries(&[]), "anything");
        assert_eq!(
            describe_queries(&["a".to_string(), "b".to_string()]),
            "\"a\" and \"b\""
        );
    }
}

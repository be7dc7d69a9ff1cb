use crate::{ERROR, Entry, RouteTable, SharedStore};
use askama::Template;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use markdown::{Options as MarkdownOptions, to_html_with_options};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{error, info};

type SharedState = Arc<AppState>;

// Route slugs only carry word characters and hyphens.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_');

pub struct AppState {
    pub store: SharedStore,
    pub routes: RouteTable,
    pub theme: WebTheme,
    pub base_url: String,
}

impl AppState {
    pub fn new(store: SharedStore, theme: WebTheme, base_url: impl Into<String>) -> Self {
        let routes = store.compute_routes();
        Self {
            store,
            routes,
            theme,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum WebTheme {
    #[default]
    Tailwind,
    Bootstrap,
}

impl fmt::Display for WebTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebTheme::Tailwind => write!(f, "tailwind"),
            WebTheme::Bootstrap => write!(f, "bootstrap"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Chrome {
    use_tailwind: bool,
    use_bootstrap: bool,
    body_class: &'static str,
    main_class: &'static str,
    nav_class: &'static str,
    input_class: &'static str,
    link_class: &'static str,
    active_class: &'static str,
    muted_class: &'static str,
    card_class: &'static str,
    eyebrow_class: &'static str,
    headline_class: &'static str,
    prose_class: &'static str,
}

impl Chrome {
    fn new(theme: WebTheme) -> Self {
        match theme {
            WebTheme::Tailwind => Self {
                use_tailwind: true,
                use_bootstrap: false,
                body_class: "bg-slate-50 text-slate-900",
                main_class: "min-h-screen max-w-6xl mx-auto flex flex-col md:flex-row gap-10 py-10 px-4",
                nav_class: "md:w-64 shrink-0 space-y-4",
                input_class: "w-full rounded-md border border-slate-300 px-3 py-2",
                link_class: "block rounded px-2 py-1 hover:bg-slate-200",
                active_class: "bg-slate-900 text-white hover:bg-slate-800",
                muted_class: "text-sm text-slate-500",
                card_class: "flex-1 space-y-4",
                eyebrow_class: "uppercase tracking-wide text-sm text-slate-500",
                headline_class: "text-4xl font-extrabold tracking-tight",
                prose_class: "space-y-4 text-lg leading-relaxed text-slate-700",
            },
            WebTheme::Bootstrap => Self {
                use_tailwind: false,
                use_bootstrap: true,
                body_class: "bg-light text-dark",
                main_class: "container py-5 d-flex flex-column flex-md-row gap-5",
                nav_class: "col-md-3",
                input_class: "form-control mb-3",
                link_class: "list-group-item list-group-item-action",
                active_class: "active",
                muted_class: "text-muted small",
                card_class: "col-md-9",
                eyebrow_class: "text-uppercase text-muted mb-2",
                headline_class: "display-5 fw-bold",
                prose_class: "lead",
            },
        }
    }
}

#[derive(Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
    pub theme: WebTheme,
    pub base_url: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            theme: WebTheme::default(),
            base_url: "http://127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug)]
pub enum WebError {
    Io(std::io::Error),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for WebError {}

impl From<std::io::Error> for WebError {
    fn from(value: std::io::Error) -> Self {
        WebError::Io(value)
    }
}

pub async fn serve(config: WebConfig, store: SharedStore) -> Result<(), WebError> {
    let state = Arc::new(AppState::new(store, config.theme, config.base_url.clone()));
    info!(
        %config.addr,
        theme = %config.theme,
        base = %config.base_url,
        routes = state.routes.len(),
        "Binding HTTP listener"
    );
    let router = build_router(state);
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/healthz", get(health))
        .route("/sitemap.xml", get(sitemap_xml))
        .route("/api/routes", get(api_routes))
        .route("/api/entries", get(api_entries))
        .route("/api/entries/:route", get(api_entry))
        .route("/:route", get(entry_html))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CompressionLayer::new())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[derive(Debug, Default, Deserialize)]
struct ListParams {
    q: Option<String>,
}

impl ListParams {
    fn query(&self) -> &str {
        self.q.as_deref().map(str::trim).unwrap_or_default()
    }

    fn queries(&self) -> Vec<&str> {
        self.query().split_whitespace().collect()
    }
}

async fn home(State(state): State<SharedState>, Query(params): Query<ListParams>) -> Response {
    // Any route missing from the table resolves to the landing entry.
    let entry = state.store.get_entry("", &state.routes);
    entry_page(&state, &entry, &params)
}

async fn entry_html(
    State(state): State<SharedState>,
    Path(route): Path<String>,
    Query(params): Query<ListParams>,
) -> Response {
    let entry = state.store.get_entry(&route, &state.routes);
    entry_page(&state, &entry, &params)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "entryfront-web" }))
}

async fn api_routes(State(state): State<SharedState>) -> Json<RouteTable> {
    Json(state.routes.clone())
}

async fn api_entries(
    State(state): State<SharedState>,
    Query(params): Query<ListParams>,
) -> Json<EntryListPayload> {
    let queries = params.queries();
    let results = state
        .store
        .matches(&queries)
        .iter()
        .map(EntrySummary::from_entry)
        .collect();
    Json(EntryListPayload {
        queries: queries.into_iter().map(str::to_string).collect(),
        results,
    })
}

async fn api_entry(State(state): State<SharedState>, Path(route): Path<String>) -> Response {
    let entry = state.store.get_entry(&route, &state.routes);
    (status_for(&entry), Json(entry)).into_response()
}

async fn sitemap_xml(State(state): State<SharedState>) -> impl IntoResponse {
    let home = format!("{}/", state.base_url);
    let urls: String = std::iter::once(home)
        .chain(
            state
                .routes
                .keys()
                .map(|route| absolute_entry_url(&state.base_url, route)),
        )
        .map(|loc| format!("<url><loc>{}</loc></url>", xml_escape(&loc)))
        .collect();
    let body = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{urls}</urlset>"#
    );
    ([(header::CONTENT_TYPE, "application/xml")], body)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntrySummary {
    index: usize,
    name: String,
    title: String,
    route: String,
}

impl EntrySummary {
    fn from_entry(entry: &Entry) -> Self {
        Self {
            index: entry.view().index,
            name: entry.name().to_string(),
            title: entry.title().to_string(),
            route: entry.route().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryListPayload {
    queries: Vec<String>,
    results: Vec<EntrySummary>,
}

#[derive(Debug, Clone)]
struct EntryLink {
    title: String,
    href: String,
    active: bool,
}

fn status_for(entry: &Entry) -> StatusCode {
    if entry.name() == ERROR {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::OK
    }
}

fn entry_page(state: &AppState, entry: &Entry, params: &ListParams) -> Response {
    let chrome = Chrome::new(state.theme);
    let filter = state.store.filter();
    let links = state
        .store
        .matches(&params.queries())
        .iter()
        .map(|item| EntryLink {
            title: item.title().to_string(),
            href: entry_path(item.route()),
            active: item.name() == entry.name(),
        })
        .collect();
    let canonical_url = if state.routes.contains_key(entry.route()) {
        absolute_entry_url(&state.base_url, entry.route())
    } else {
        format!("{}/", state.base_url)
    };
    let template = EntryTemplate {
        chrome,
        title: entry.title(),
        published: published_line(entry),
        body_html: render_body(entry.body()),
        canonical_url,
        query: params.query(),
        links,
        tag: filter.tag(),
        status: filter.status(),
    };
    match template.render() {
        Ok(html) => (status_for(entry), Html(html)).into_response(),
        Err(err) => {
            error!(route = entry.route(), %err, "Entry template failed to render");
            (StatusCode::INTERNAL_SERVER_ERROR, "entry page failed to render").into_response()
        }
    }
}

fn published_line(entry: &Entry) -> String {
    let mut parts = Vec::new();
    if let Some(date) = entry.date() {
        parts.push(date.to_string());
    }
    if let Some(edit) = entry.edit() {
        parts.push(format!("edited {edit}"));
    }
    if let Some(team) = entry.team() {
        parts.push(team.to_string());
    }
    parts.join(" · ")
}

fn entry_path(route: &str) -> String {
    format!("/{}", utf8_percent_encode(route, SEGMENT))
}

fn absolute_entry_url(base_url: &str, route: &str) -> String {
    format!("{}{}", base_url, entry_path(route))
}

// Slugs are already percent-encoded; only the configured base URL can carry markup.
fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Renders an entry body as GFM. Highlight tags are raw inline HTML and are
/// passed through untouched.
fn render_body(body: &str) -> String {
    let mut options = MarkdownOptions::gfm();
    options.compile.allow_dangerous_html = true;
    options.compile.gfm_tagfilter = false;
    let body = body.trim();
    to_html_with_options(body, &options).unwrap_or_else(|_| body.to_string())
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>{{ title }}</title>
    {% if chrome.use_tailwind %}
    <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
    {% endif %}
    {% if chrome.use_bootstrap %}
    <link href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/css/bootstrap.min.css" rel="stylesheet" integrity="sha384-sRIl4kxILFvY47J16cr9ZwB07vP4J8+LH7qKQnuqkuIAvNWLzeN8tE5YBujZqJLB" crossorigin="anonymous">
    {% endif %}
    <link rel="canonical" href="{{ canonical_url }}">
    <style>
      {{ tag }}[{{ status }}] { background: #fde68a; padding: 0 0.15em; border-radius: 0.2em; }
    </style>
  </head>
  <body class="{{ chrome.body_class }}">
    <main class="{{ chrome.main_class }}">
      <nav id="entry-list" class="{{ chrome.nav_class }}">
        <form method="get" action="/">
          <input type="search" name="q" value="{{ query }}" placeholder="Filter entries" class="{{ chrome.input_class }}">
        </form>
        {% if links.is_empty() %}
        <p class="{{ chrome.muted_class }}">No entries match.</p>
        {% else %}
        <div>
          {% for link in links %}
          <a href="{{ link.href|safe }}" class="{{ chrome.link_class }}{% if link.active %} {{ chrome.active_class }}{% endif %}">{{ link.title }}</a>
          {% endfor %}
        </div>
        {% endif %}
      </nav>
      <article id="entry" class="{{ chrome.card_class }}">
        {% if !published.is_empty() %}
        <p class="{{ chrome.eyebrow_class }}">{{ published }}</p>
        {% endif %}
        <h1 class="{{ chrome.headline_class }}">{{ title }}</h1>
        <section id="entry-body" class="{{ chrome.prose_class }}">
          {{ body_html|safe }}
        </section>
      </article>
    </main>
  </body>
</html>"#,
    ext = "html"
)]
struct EntryTemplate<'a> {
    chrome: Chrome,
    title: &'a str,
    published: String,
    body_html: String,
    canonical_url: String,
    query: &'a str,
    links: Vec<EntryLink>,
    tag: String,
    status: &'a str,
}

//! Control inbox and status page
//!
//! - `GET /` status page: every read command with its latest value, plus a
//!   link per control action; refreshes itself
//! - `GET /{action}` queue a control action, always redirects back to `/`;
//!   any other path redirects too
//! - `GET /health` liveness
//! - `GET /api/values` JSON snapshot
//!
//! Handlers only touch [`BridgeState`]; they never wait on the serial link.

use std::fmt::Write;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue},
    response::{Html, IntoResponse, Redirect},
    routing::get,
    Json, Router,
};
use optolink::{CommandRegistry, Value};
use serde::Serialize;
use serde_json::json;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{debug, info};

use crate::scheduler::CycleReport;
use crate::state::BridgeState;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub state: Arc<BridgeState>,
    pub registry: Arc<CommandRegistry>,
    /// Status page auto-refresh interval
    pub refresh_secs: u64,
}

/// Create the inbox/status router
pub fn create_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(status_page))
        .route("/health", get(health))
        .route("/api/values", get(values))
        .route("/{action}", get(control_action))
        .fallback(back_to_status_page)
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(axum::middleware::from_fn(common::logging::http_request_logger))
        .with_state(app_state)
}

/// Queue a control action. Unknown names are ignored.
async fn control_action(
    State(app): State<AppState>,
    Path(action): Path<String>,
) -> Redirect {
    match app.registry.write(&action) {
        Some(command) => match app.state.enqueue_write(command) {
            Some(replaced) if replaced.id != action => {
                info!(action = %action, replaced = %replaced.id, "Control action queued");
            },
            _ => info!(action = %action, "Control action queued"),
        },
        None => debug!("Ignoring unknown control action '{}'", action),
    }
    Redirect::temporary("/")
}

async fn back_to_status_page() -> Redirect {
    Redirect::temporary("/")
}

async fn status_page(State(app): State<AppState>) -> impl IntoResponse {
    Html(render_status_page(&app))
}

async fn health(State(app): State<AppState>) -> impl IntoResponse {
    let last_cycle = app.state.last_cycle();
    Json(json!({
        "status": "ok",
        "service": "optosrv",
        "uptime_secs": (chrono::Utc::now() - app.state.started_at()).num_seconds(),
        "cycles": last_cycle.as_ref().map_or(0, |c| c.cycle),
        "last_window_opened": last_cycle.as_ref().map(|c| c.window_opened),
    }))
}

#[derive(Debug, Serialize)]
struct ValueEntry<'a> {
    name: &'a str,
    description: &'a str,
    unit: &'static str,
    value: Value,
}

#[derive(Debug, Serialize)]
struct ValuesResponse<'a> {
    values: Vec<ValueEntry<'a>>,
    pending_action: Option<String>,
    last_cycle: Option<CycleReport>,
}

async fn values(State(app): State<AppState>) -> impl IntoResponse {
    let snapshot = app.state.snapshot();
    let entries = app
        .registry
        .reads()
        .iter()
        .zip(snapshot.values)
        .map(|(spec, value)| ValueEntry {
            name: &spec.name,
            description: &spec.description,
            unit: spec.unit.as_str(),
            value,
        })
        .collect();

    Json(ValuesResponse {
        values: entries,
        pending_action: snapshot.pending_action,
        last_cycle: snapshot.last_cycle,
    })
    .into_response()
}

fn render_status_page(app: &AppState) -> String {
    let snapshot = app.state.snapshot();
    let mut html = String::with_capacity(4096);

    // Writing to String buffer is infallible
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html><head><meta charset='utf-8'>\
         <meta http-equiv='refresh' content='{}'>\
         <title>Optolink</title></head><body>\n<h1>Heating controller</h1>\n<table>\n",
        app.refresh_secs
    );

    for (spec, value) in app.registry.reads().iter().zip(snapshot.values.iter()) {
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{}</td></tr>",
            escape_html(&spec.description),
            escape_html(&value.to_string())
        );
    }
    html.push_str("</table>\n");

    if let Some(cycle) = &snapshot.last_cycle {
        let _ = writeln!(
            html,
            "<p>Cycle {} at {}: window {}, {} read(s) ok, {} failed</p>",
            cycle.cycle,
            cycle.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            if cycle.window_opened { "open" } else { "missed" },
            cycle.reads_ok,
            cycle.reads_failed
        );
    }

    if let Some(pending) = &snapshot.pending_action {
        let _ = writeln!(html, "<p>Pending: {}</p>", escape_html(pending));
    }

    html.push_str("<ul>\n");
    for command in app.registry.writes() {
        // Action ids are restricted to [A-Za-z0-9_-], safe in a path
        let _ = writeln!(
            html,
            "<li><a href='/{}'>{}</a></li>",
            command.id,
            escape_html(&command.spec.description)
        );
    }
    html.push_str("</ul>\n</body></html>\n");
    html
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

//! Dashboard HTTP server.
//!
//! Routes:
//!   GET /              - single-page dashboard
//!   GET /api/health    - health check
//!   GET /api/entities  - selectable entities and defaults
//!   GET /api/figure    - chart figure for `?entity=..&scale=..`
//!   GET /api/series    - delta rows for `?entity=..`

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::data::series::DeltaRecord;
use crate::logging::{log, log_unknown_entity, obj, v_str, Domain, Level};
use crate::state::Snapshot;
use crate::view::{render, select_entity, Selection, TOGGLE_OPTIONS};

#[derive(Clone)]
pub struct AppState {
    pub snapshot: Arc<Snapshot>,
    pub default_entity: String,
}

impl AppState {
    pub fn new(snapshot: Snapshot, default_entity: impl Into<String>) -> Self {
        Self {
            snapshot: Arc::new(snapshot),
            default_entity: default_entity.into(),
        }
    }

    /// Selected entity, or the configured default. Unknown names are logged
    /// and still returned; they render as an empty selection.
    fn entity_or_default(&self, selection: &Selection) -> String {
        let entity = selection
            .entity
            .clone()
            .unwrap_or_else(|| self.default_entity.clone());
        if !self.snapshot.contains_entity(&entity) {
            log_unknown_entity(&entity);
        }
        entity
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/health", get(health))
        .route("/api/entities", get(entities))
        .route("/api/figure", get(figure))
        .route("/api/series", get(series))
        .with_state(state)
}

pub async fn serve(bind_addr: &str, state: AppState) -> Result<()> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    serve_on(listener, state).await
}

/// Serve the dashboard on an already bound listener.
pub async fn serve_on(listener: TcpListener, state: AppState) -> Result<()> {
    let addr = listener.local_addr().context("listener has no local address")?;
    log(
        Level::Info,
        Domain::Http,
        "listening",
        obj(&[
            ("url", v_str(&format!("http://{addr}/"))),
            ("default_entity", v_str(&state.default_entity)),
        ]),
    );
    axum::serve(listener, router(state))
        .await
        .context("dashboard server failed")
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

#[derive(Debug, Serialize)]
pub struct EntitiesPayload {
    pub entities: Vec<String>,
    pub default: String,
    pub scales: [&'static str; 2],
    pub loaded_at: String,
    pub fingerprint: String,
}

pub async fn entities(State(state): State<AppState>) -> Json<EntitiesPayload> {
    let snap = &state.snapshot;
    Json(EntitiesPayload {
        entities: snap.entities().to_vec(),
        default: state.default_entity.clone(),
        scales: TOGGLE_OPTIONS,
        loaded_at: snap.loaded_at().to_rfc3339(),
        fingerprint: snap.fingerprint().to_string(),
    })
}

pub async fn figure(State(state): State<AppState>, Query(selection): Query<Selection>) -> Json<Value> {
    let entity = state.entity_or_default(&selection);
    let toggle = selection.scale.as_deref().unwrap_or(TOGGLE_OPTIONS[0]);
    Json(render(state.snapshot.series(), &entity, toggle).to_figure())
}

pub async fn series(State(state): State<AppState>, Query(selection): Query<Selection>) -> Json<Vec<DeltaRecord>> {
    let entity = state.entity_or_default(&selection);
    Json(
        select_entity(state.snapshot.series(), &entity)
            .into_iter()
            .cloned()
            .collect(),
    )
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>New cases by region</title>
<script src="https://cdn.plot.ly/plotly-2.27.0.min.js"></script>
<style>
  body { font-family: "Helvetica Neue", Helvetica, Arial, sans-serif; margin: 2rem; }
  .controls { width: 48%; display: inline-block; }
  .controls label { display: inline-block; margin-right: 1rem; }
  select { width: 100%; margin-bottom: 0.75rem; padding: 0.3rem; }
</style>
</head>
<body>
<div class="controls">
  <select id="country_selection"></select>
  <div id="yaxis-type"></div>
</div>
<div id="indicator-graphic"></div>
<script>
const select = document.getElementById("country_selection");
const toggle = document.getElementById("yaxis-type");

function currentScale() {
  const checked = toggle.querySelector("input:checked");
  return checked ? checked.value : "Linear";
}

async function update() {
  const params = new URLSearchParams({ entity: select.value, scale: currentScale() });
  const resp = await fetch("/api/figure?" + params.toString());
  const figure = await resp.json();
  Plotly.react("indicator-graphic", figure.data, figure.layout);
}

async function init() {
  const resp = await fetch("/api/entities");
  const info = await resp.json();
  for (const name of info.entities) {
    const opt = document.createElement("option");
    opt.value = name;
    opt.textContent = name;
    select.appendChild(opt);
  }
  select.value = info.default;
  info.scales.forEach((scale, i) => {
    const label = document.createElement("label");
    const input = document.createElement("input");
    input.type = "radio";
    input.name = "yaxis-type";
    input.value = scale;
    input.checked = i === 0;
    input.addEventListener("change", update);
    label.appendChild(input);
    label.appendChild(document.createTextNode(" " + scale));
    toggle.appendChild(label);
  });
  select.addEventListener("change", update);
  await update();
}

init();
</script>
</body>
</html>
"#;

//! Development server for the control panel.
//!
//! Serves the configuration document, renders the process trace as an SVG,
//! applies parameter writes, and hosts the built panel shell.
//!
//! ```text
//! simmerd [addr] [catalog.json]
//! ```
//!
//! `SIMMER_ADDR` overrides the default bind address when no argument is
//! given.
//!
//! Build the panel first (`trunk build` in crates/simmer_web), then run
//! simmerd from the workspace root.

mod artifact;
mod fixtures;

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tower_http::services::ServeDir;
use tracing::{info, warn};

use simmer::catalog::{Catalog, CatalogError, System};

// Run type 0 is a realtime rig; its measured channels may not be seeded
// from the panel.
const REALTIME: i32 = 0;
const READ_ONLY_REALTIME: &[&str] = &["temperature"];

/// Mutable server state: the live document plus a pristine copy for reset.
struct PanelServer {
    catalog: Catalog,
    pristine: Catalog,
}

type Shared = Arc<RwLock<PanelServer>>;

#[derive(Debug, Error)]
enum StartupError {
    #[error("cannot read catalog file {path}: {source}")]
    CatalogFile {
        path: String,
        source: std::io::Error,
    },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

fn load_catalog(args: &[String]) -> Result<Catalog, StartupError> {
    match args.get(2) {
        Some(path) => {
            let body =
                std::fs::read_to_string(path).map_err(|source| StartupError::CatalogFile {
                    path: path.clone(),
                    source,
                })?;
            Ok(Catalog::from_json(&body)?)
        }
        None => Ok(fixtures::default_catalog()?),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    let addr = args
        .get(1)
        .cloned()
        .or_else(|| std::env::var("SIMMER_ADDR").ok())
        .unwrap_or_else(|| "127.0.0.1:8080".to_string());
    let catalog = load_catalog(&args)?;
    info!(systems = catalog.systems.len(), "catalog loaded");

    let state: Shared = Arc::new(RwLock::new(PanelServer {
        pristine: catalog.clone(),
        catalog,
    }));

    let app = Router::new()
        .route("/config", get(config))
        .route("/graph", get(graph))
        .route("/set", get(set_value))
        .route("/reset", get(reset))
        .fallback_service(ServeDir::new("crates/simmer_web/dist"))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "panel server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// GET /config. The full document, components in declaration order.
async fn config(State(state): State<Shared>) -> Json<Catalog> {
    let server = state.read().await;
    Json(server.catalog.clone())
}

/// GET /graph?systemName=..&component_param=..&t=nonce
///
/// Stores the submitted values, advances the measured channels, and renders
/// the trace for the addressed system.
async fn graph(
    State(state): State<Shared>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let mut server = state.write().await;
    let Some(id) = resolve_system(&server.catalog, &pairs) else {
        return unknown_system(&pairs);
    };
    let Some(system) = server.catalog.systems.get_mut(&id) else {
        return unknown_system(&pairs);
    };
    store_values(system, &pairs);
    refresh_telemetry(system);
    let svg = artifact::render(&id, system);
    ([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response()
}

/// GET /set?systemName=..&component_param=value. Single-value apply channel;
/// answers JSON null like /reset.
async fn set_value(
    State(state): State<Shared>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let mut server = state.write().await;
    let Some(id) = resolve_system(&server.catalog, &pairs) else {
        return unknown_system(&pairs);
    };
    let Some(system) = server.catalog.systems.get_mut(&id) else {
        return unknown_system(&pairs);
    };
    store_values(system, &pairs);
    Json(()).into_response()
}

/// GET /reset. Restores the pristine document.
async fn reset(State(state): State<Shared>) -> Json<()> {
    let mut server = state.write().await;
    let pristine = server.pristine.clone();
    server.catalog = pristine;
    info!("catalog reset to defaults");
    Json(())
}

fn query_value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

/// Resolves the addressed system id. An empty or absent name selects the
/// first system; an unknown name selects nothing.
fn resolve_system(catalog: &Catalog, pairs: &[(String, String)]) -> Option<String> {
    let name = query_value(pairs, "systemName").unwrap_or("");
    catalog.resolve_active(name).map(|(id, _)| id.to_string())
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn unknown_system(pairs: &[(String, String)]) -> Response {
    let name = query_value(pairs, "systemName").unwrap_or("");
    warn!(system = %name, "request for unknown system");
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: format!("unknown system: {name}"),
        }),
    )
        .into_response()
}

/// Applies submitted query pairs to the document. Composite ids split at the
/// first underscore; unparseable values and unknown parameters are dropped.
/// Realtime rigs refuse writes to their measured channels.
fn store_values(system: &mut System, pairs: &[(String, String)]) {
    for (key, raw) in pairs {
        if key == "systemName" || key == "t" {
            continue;
        }
        let Some((component, name)) = key.split_once('_') else {
            continue;
        };
        let Ok(value) = raw.parse::<f64>() else {
            continue;
        };
        if system.run_type == REALTIME && READ_ONLY_REALTIME.contains(&name) {
            continue;
        }
        if let Some(spec) = system.param_mut(component, name) {
            spec.value = Some(spec.clamp(value));
        }
    }
}

/// Advances the measured temperature channels to the end of the rendered
/// trace, so the next /config mirrors what the artifact shows.
fn refresh_telemetry(system: &mut System) {
    let trace = artifact::trace(system);
    let Some(&(_, last)) = trace.last() else {
        return;
    };
    for rows in system.values.values_mut() {
        for row in rows.iter_mut() {
            if row.name == "temperature" {
                row.value = Some(last);
            }
        }
    }
}

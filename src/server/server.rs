use anyhow::{Context, Result};
use std::time::Duration;

use tower_http::services::ServeDir;
use tracing::info;

use axum::{extract::State, middleware, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;

use super::song_routes::song_routes;
use super::transcription_routes::transcription_routes;
use super::{log_requests, state::*};
use crate::music::{get_available_keys, Key, ALTO_SAX_HINTS, SAX_FRIENDLY_KEYS};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
}

#[derive(Serialize)]
struct KeysResponse {
    keys: Vec<Key>,
    saxophone_friendly: Vec<Key>,
    hints: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub(super) struct ErrorResponse {
    pub error: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

/// Runs decoding, DSP and SQLite work off the async runtime.
pub(super) async fn run_blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .context("Blocking task did not complete")?
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
    };
    Json(stats)
}

async fn get_keys() -> impl IntoResponse {
    Json(KeysResponse {
        keys: get_available_keys(),
        saxophone_friendly: SAX_FRIENDLY_KEYS.to_vec(),
        hints: ALTO_SAX_HINTS.to_vec(),
    })
}

pub fn make_app(state: ServerState) -> Result<Router> {
    let config = state.config.clone();

    let api_routes: Router = Router::new()
        .route("/keys", get(get_keys))
        .merge(transcription_routes(config.max_upload_bytes))
        .merge(song_routes())
        .with_state(state.clone());

    let home_router: Router = match config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", get(home))
            .with_state(state.clone()),
    };

    let app: Router = home_router
        .nest("/v1", api_routes)
        .layer(middleware::from_fn_with_state(state, log_requests));

    Ok(app)
}

pub async fn run_server(state: ServerState) -> Result<()> {
    let port = state.config.port;
    let app = make_app(state)?;

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Listening on port {}", port);

    Ok(axum::serve(listener, app).await?)
}

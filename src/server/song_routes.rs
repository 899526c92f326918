//! Stored songs: listing, lookup and deletion.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tracing::{info, warn};

use super::server::{run_blocking, ErrorResponse};
use super::state::{GuardedSongStore, ServerState};
use crate::song_store::SavedSong;

fn store_error(action: &str, err: anyhow::Error) -> Response {
    warn!("Failed to {}: {:#}", action, err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: format!("Failed to {}", action),
        }),
    )
        .into_response()
}

/// GET /songs - All songs, newest first
async fn list_songs(State(store): State<GuardedSongStore>) -> Response {
    match run_blocking(move || store.list_songs()).await {
        Ok(songs) => Json(songs).into_response(),
        Err(e) => store_error("list songs", e),
    }
}

/// GET /songs/{id} - A song with its transcriptions
async fn get_song(State(store): State<GuardedSongStore>, Path(id): Path<i64>) -> Response {
    let loaded = run_blocking(move || {
        let song = match store.get_song(id)? {
            Some(song) => song,
            None => return Ok(None),
        };
        let transcriptions = store.get_transcriptions(id)?;
        Ok(Some(SavedSong {
            song,
            transcriptions,
        }))
    })
    .await;

    match loaded {
        Ok(Some(saved)) => Json(saved).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => store_error("get song", e),
    }
}

/// DELETE /songs/{id} - Remove a song and its transcriptions
async fn delete_song(State(store): State<GuardedSongStore>, Path(id): Path<i64>) -> Response {
    match run_blocking(move || store.delete_song(id)).await {
        Ok(true) => {
            info!("Song {} deleted over HTTP", id);
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => store_error("delete song", e),
    }
}

pub fn song_routes() -> Router<ServerState> {
    Router::new()
        .route("/songs", get(list_songs))
        .route("/songs/{id}", get(get_song).delete(delete_song))
}

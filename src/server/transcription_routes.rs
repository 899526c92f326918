//! Upload a recording and get it back as a transposed score.

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::server::{run_blocking, ErrorResponse};
use super::state::ServerState;
use crate::audio::AudioError;
use crate::music::{Key, MusicError};
use crate::render::{render_pair, RenderError, RenderedPair, RenderedScore};
use crate::song_store::SavedSong;
use crate::transcription::{
    save_transcription, AudioUpload, PipelineError, TranscriptionRequest, TranscriptionResult,
};

/// Room for the multipart framing and the text fields around the file.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ScoreResponse {
    Rendered {
        media_type: &'static str,
        content: String,
    },
    Failed {
        error: String,
    },
}

impl From<Result<RenderedScore, RenderError>> for ScoreResponse {
    fn from(rendered: Result<RenderedScore, RenderError>) -> Self {
        match rendered {
            Ok(score) => ScoreResponse::Rendered {
                media_type: score.media_type,
                content: score.text(),
            },
            Err(e) => ScoreResponse::Failed {
                error: e.to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct TranscriptionResponse {
    title: String,
    note_count: usize,
    original_key: String,
    suggested_key: Key,
    target_key: Key,
    original_score: ScoreResponse,
    transposed_score: ScoreResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    saved_song_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    save_error: Option<String>,
}

#[derive(Debug, Default)]
struct TranscriptionForm {
    filename: Option<String>,
    file: Option<Vec<u8>>,
    title: String,
    notes: Option<String>,
    target_key: Option<String>,
    save: bool,
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

fn multipart_error(err: MultipartError) -> Response {
    warn!("Failed to read multipart upload: {}", err);
    error_response(err.status(), err.body_text())
}

async fn read_form(mut multipart: Multipart) -> Result<TranscriptionForm, Response> {
    let mut form = TranscriptionForm::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "file" => {
                form.filename = field.file_name().map(|s| s.to_string());
                form.file = Some(field.bytes().await.map_err(multipart_error)?.to_vec());
            }
            "title" => form.title = field.text().await.map_err(multipart_error)?,
            "notes" => form.notes = non_empty(field.text().await.map_err(multipart_error)?),
            "target_key" => {
                form.target_key = non_empty(field.text().await.map_err(multipart_error)?)
            }
            "save" => form.save = parse_flag(&field.text().await.map_err(multipart_error)?),
            other => debug!("Ignoring multipart field {:?}", other),
        }
    }
    Ok(form)
}

fn pipeline_error_status(err: &PipelineError) -> StatusCode {
    match err {
        PipelineError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        PipelineError::Music(MusicError::UnknownKey(_)) => StatusCode::BAD_REQUEST,
        PipelineError::Audio(
            AudioError::Empty | AudioError::UnsupportedFormat(_) | AudioError::Decode(_),
        ) => StatusCode::BAD_REQUEST,
        PipelineError::Audio(_) => StatusCode::INTERNAL_SERVER_ERROR,
        PipelineError::NoMelody | PipelineError::Music(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PipelineError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn respond(
    result: &TranscriptionResult,
    rendered: RenderedPair,
    saved: Option<Result<SavedSong, PipelineError>>,
) -> TranscriptionResponse {
    let (saved_song_id, save_error) = match saved {
        Some(Ok(saved)) => (Some(saved.song.id), None),
        Some(Err(e)) => (None, Some(e.to_string())),
        None => (None, None),
    };
    TranscriptionResponse {
        title: result.title.clone(),
        note_count: result.original_score().len(),
        original_key: result.analysis.original_key_label(),
        suggested_key: result.analysis.suggested_key,
        target_key: result.target_key,
        original_score: rendered.original.into(),
        transposed_score: rendered.transposed.into(),
        saved_song_id,
        save_error,
    }
}

/// POST /transcriptions - Transcribe an uploaded recording (multipart/form-data)
async fn post_transcription(State(state): State<ServerState>, multipart: Multipart) -> Response {
    let form = match read_form(multipart).await {
        Ok(form) => form,
        Err(response) => return response,
    };

    let bytes = match form.file {
        Some(bytes) if !bytes.is_empty() => bytes,
        _ => return error_response(StatusCode::BAD_REQUEST, "No audio file provided"),
    };
    if bytes.len() > state.config.max_upload_bytes {
        return error_response(
            StatusCode::PAYLOAD_TOO_LARGE,
            format!(
                "Audio file is {:#}, the limit is {:#}",
                byte_unit::Byte::from(bytes.len()),
                byte_unit::Byte::from(state.config.max_upload_bytes)
            ),
        );
    }

    debug!(
        "Transcribing upload {:?} ({} bytes)",
        form.filename,
        bytes.len()
    );
    let upload = AudioUpload {
        filename: form.filename,
        bytes,
    };
    let request = TranscriptionRequest {
        title: form.title,
        notes: form.notes,
        target_key: form.target_key,
    };
    let save = form.save;

    let outcome = run_blocking(move || {
        let result = match state.pipeline.transcribe(upload, &request, &mut |event| {
            debug!("{}", event)
        }) {
            Ok(result) => result,
            Err(e) => return Ok(Err(e)),
        };

        let rendered = render_pair(
            state.renderer.as_ref(),
            &state.render_cache,
            &result.title,
            (result.original_score(), result.analysis.original_signature()),
            (&result.transposed, result.target_key),
        );
        let saved = save.then(|| save_transcription(state.song_store.as_ref(), &result));
        if let Some(Err(e)) = &saved {
            warn!("Transcription of {:?} was not saved: {}", result.title, e);
        }
        Ok(Ok(respond(&result, rendered, saved)))
    })
    .await;

    match outcome {
        Ok(Ok(response)) => {
            info!(
                "Transcribed {:?} to {} ({} notes)",
                response.title, response.target_key, response.note_count
            );
            Json(response).into_response()
        }
        Ok(Err(e)) => {
            let status = pipeline_error_status(&e);
            warn!("Transcription failed with {}: {}", status, e);
            error_response(status, e.to_string())
        }
        Err(e) => {
            warn!("Transcription task failed: {:#}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Transcription failed")
        }
    }
}

pub fn transcription_routes(max_upload_bytes: usize) -> Router<ServerState> {
    Router::new()
        .route("/transcriptions", post(post_transcription))
        .layer(DefaultBodyLimit::max(
            max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES),
        ))
}

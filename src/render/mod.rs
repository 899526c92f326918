//! Score rendering to ABC notation and MusicXML.

mod abc;
mod cache;
mod musicxml;

pub use abc::AbcRenderer;
pub use cache::{CacheStats, RenderCache, RenderCacheKey, ScoreRole, DEFAULT_RENDER_CACHE_CAPACITY};
pub use musicxml::MusicXmlRenderer;

use crate::music::{Key, Score};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Note duration {0} does not fit the sixteenth-note grid")]
    UnsupportedDuration(f64),

    #[error("IO error while rendering: {0}")]
    Io(#[from] std::io::Error),

    #[error("Render cache is unavailable: {0}")]
    CacheUnavailable(String),
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum RenderFormat {
    #[default]
    Abc,
    #[value(name = "musicxml")]
    #[serde(rename = "musicxml")]
    MusicXml,
}

impl RenderFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderFormat::Abc => "abc",
            RenderFormat::MusicXml => "musicxml",
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self {
            RenderFormat::Abc => "abc",
            RenderFormat::MusicXml => "musicxml",
        }
    }
}

/// What a score is rendered as: its title and the key used for spelling.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub title: String,
    pub key: Key,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedScore {
    pub media_type: &'static str,
    pub bytes: Vec<u8>,
}

impl RenderedScore {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

pub trait ScoreRenderer: Send + Sync {
    fn format(&self) -> RenderFormat;

    fn render(&self, score: &Score, request: &RenderRequest) -> Result<RenderedScore, RenderError>;
}

pub fn make_renderer(format: RenderFormat, scratch_dir: &Path) -> Arc<dyn ScoreRenderer> {
    match format {
        RenderFormat::Abc => Arc::new(AbcRenderer),
        RenderFormat::MusicXml => Arc::new(MusicXmlRenderer::new(scratch_dir.to_path_buf())),
    }
}

/// Both renders of a transcription. Either side may have failed on its own.
#[derive(Debug)]
pub struct RenderedPair {
    pub original: Result<RenderedScore, RenderError>,
    pub transposed: Result<RenderedScore, RenderError>,
}

/// Renders `score` through `cache`, calling the renderer only on a miss.
///
/// The lock is not held while rendering.
pub fn render_cached(
    renderer: &dyn ScoreRenderer,
    cache: &Mutex<RenderCache>,
    role: ScoreRole,
    score: &Score,
    request: &RenderRequest,
) -> Result<RenderedScore, RenderError> {
    let key = RenderCacheKey::new(&request.title, role, request.key, renderer.format(), score);
    {
        let mut cache = cache
            .lock()
            .map_err(|e| RenderError::CacheUnavailable(e.to_string()))?;
        if let Some(hit) = cache.get(&key) {
            debug!("Render cache hit for {:?}", key);
            return Ok(hit);
        }
    }

    let rendered = renderer.render(score, request)?;
    let mut cache = cache
        .lock()
        .map_err(|e| RenderError::CacheUnavailable(e.to_string()))?;
    cache.insert(key, rendered.clone());
    Ok(rendered)
}

/// Renders the original and the transposed score independently.
pub fn render_pair(
    renderer: &dyn ScoreRenderer,
    cache: &Mutex<RenderCache>,
    title: &str,
    original: (&Score, Key),
    transposed: (&Score, Key),
) -> RenderedPair {
    let render_one = |role: ScoreRole, (score, key): (&Score, Key)| {
        let request = RenderRequest {
            title: title.to_string(),
            key,
        };
        let result = render_cached(renderer, cache, role, score, &request);
        if let Err(err) = &result {
            warn!("Failed to render {} score of {:?}: {}", role.as_str(), title, err);
        }
        result
    };
    RenderedPair {
        original: render_one(ScoreRole::Original, original),
        transposed: render_one(ScoreRole::Transposed, transposed),
    }
}

pub(crate) const UNITS_PER_QUARTER: f64 = 4.0;

/// A note or rest inside one measure, measured in sixteenths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Segment {
    pub pitch: Option<i32>,
    pub units: u32,
    pub tie_start: bool,
    pub tie_stop: bool,
}

/// Note values a segment is split into, longest first: (sixteenths, type, dotted).
const NOTE_VALUES: [(u32, &str, bool); 8] = [
    (16, "whole", false),
    (12, "half", true),
    (8, "half", false),
    (6, "quarter", true),
    (4, "quarter", false),
    (3, "eighth", true),
    (2, "eighth", false),
    (1, "16th", false),
];

/// Splits `units` into note values, longest first.
pub(crate) fn note_values(mut units: u32) -> Vec<(u32, &'static str, bool)> {
    let mut values = Vec::new();
    while units > 0 {
        if let Some(value) = NOTE_VALUES.iter().find(|(length, _, _)| *length <= units) {
            values.push(*value);
            units -= value.0;
        }
    }
    values
}

/// Splits the notes of `score` into measures, tying notes across barlines.
///
/// An empty score becomes a single measure of rest.
pub(crate) fn layout_measures(score: &Score) -> Result<Vec<Vec<Segment>>, RenderError> {
    let per_measure =
        (score.time_signature().measure_quarter_length() * UNITS_PER_QUARTER).round() as u32;
    let mut measures = Vec::new();
    let mut current: Vec<Segment> = Vec::new();
    let mut filled = 0u32;

    for note in score.notes() {
        let exact = note.duration() * UNITS_PER_QUARTER;
        let units = exact.round();
        if units < 1.0 || (exact - units).abs() > 1e-6 {
            return Err(RenderError::UnsupportedDuration(note.duration()));
        }

        let mut remaining = units as u32;
        let mut continues_tie = false;
        while remaining > 0 {
            let take = remaining.min(per_measure - filled);
            remaining -= take;
            current.push(Segment {
                pitch: Some(note.pitch()),
                units: take,
                tie_start: remaining > 0,
                tie_stop: continues_tie,
            });
            continues_tie = true;
            filled += take;
            if filled == per_measure {
                measures.push(std::mem::take(&mut current));
                filled = 0;
            }
        }
    }

    if !current.is_empty() {
        measures.push(current);
    }
    if measures.is_empty() {
        measures.push(vec![Segment {
            pitch: None,
            units: per_measure,
            tie_start: false,
            tie_stop: false,
        }]);
    }
    Ok(measures)
}

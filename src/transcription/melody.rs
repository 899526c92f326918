use crate::audio::{AudioError, MonoAudio, PitchTracker};
use crate::music::{NoteEvent, Quantizer};
use tracing::debug;

/// Tracks the dominant pitch of `audio` and folds the frames into notes.
///
/// An empty result means no voiced frame was found. Deciding whether that is
/// an error is up to the caller.
pub fn extract_melody(
    audio: &MonoAudio,
    tracker: &dyn PitchTracker,
    quantizer: &Quantizer,
) -> Result<Vec<NoteEvent>, AudioError> {
    let frames = tracker.track(audio)?;
    let notes = quantizer.quantize(&frames);
    debug!(
        "Extracted {} notes from {} voiced frames ({:.2}s of audio)",
        notes.len(),
        frames.len(),
        audio.duration_secs()
    );
    Ok(notes)
}

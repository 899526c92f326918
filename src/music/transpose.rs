use super::key_analysis::analyze_key;
use super::pitch::MIDI_RANGE;
use super::{Key, MusicError, Score, ALL_KEYS, SAX_FRIENDLY_KEYS};
use tracing::debug;

/// Every key a score can be transposed to, sharps first then flats.
pub fn get_available_keys() -> Vec<Key> {
    ALL_KEYS.to_vec()
}

/// Picks the saxophone friendly key with the fewest accidentals.
///
/// Candidates are visited in [`SAX_FRIENDLY_KEYS`] order and only a strictly
/// smaller accidental count replaces the current pick, so the result does not
/// depend on the melody.
pub fn suggest_best_key(score: &Score) -> Key {
    let mut best = SAX_FRIENDLY_KEYS[0];
    for key in SAX_FRIENDLY_KEYS.iter().skip(1) {
        if key.accidental_count() < best.accidental_count() {
            best = *key;
        }
    }
    debug!("Suggested key {} for a score of {} notes", best, score.len());
    best
}

/// Signed semitone shift from one tonic to another.
///
/// The shift always falls in `-5..=6`, so a melody moves by at most a tritone.
pub fn transposition_interval(from_pitch_class: u8, to_pitch_class: u8) -> i32 {
    let shift = (to_pitch_class as i32 - from_pitch_class as i32).rem_euclid(12);
    if shift > 6 {
        shift - 12
    } else {
        shift
    }
}

/// Moves every note of `score` by `semitones`.
pub fn transpose_by(score: &Score, semitones: i32) -> Result<Score, MusicError> {
    let notes = score
        .notes()
        .iter()
        .map(|note| {
            let moved = note.transposed(semitones);
            if MIDI_RANGE.contains(&moved.pitch()) {
                Ok(moved)
            } else {
                Err(MusicError::PitchOutOfRange(moved.pitch()))
            }
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(score.with_notes(notes))
}

/// Transposes `score` from its estimated tonic to the tonic of `target`.
pub fn transpose_to_key(score: &Score, target: Key) -> Result<Score, MusicError> {
    let estimate = analyze_key(score)?;
    let interval = transposition_interval(estimate.tonic_pitch_class, target.tonic_pitch_class());
    debug!(
        "Transposing from {} to {} by {} semitones",
        estimate.label(),
        target,
        interval
    );
    transpose_by(score, interval)
}

/// Transposes `score` to the key named `target_key_name`.
///
/// The name is checked before anything else, an unknown key is reported as
/// [`MusicError::UnknownKey`] and no score is produced.
pub fn transpose_score(score: &Score, target_key_name: &str) -> Result<Score, MusicError> {
    let target = Key::parse(target_key_name)?;
    transpose_to_key(score, target)
}

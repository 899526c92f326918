//! Pitch arithmetic shared by the quantizer, the key analysis and the renderers.

pub const A4_FREQUENCY_HZ: f64 = 440.0;
pub const A4_MIDI: i32 = 69;
pub const MIDI_RANGE: std::ops::RangeInclusive<i32> = 0..=127;

/// Snaps a frequency to the nearest equal-tempered MIDI note.
///
/// Ties are rounded half to even. Returns `None` for frequencies that do not
/// describe a pitch (zero, negative, NaN or infinite).
pub fn hz_to_midi(frequency_hz: f64) -> Option<i32> {
    if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
        return None;
    }
    let semitones = 12.0 * (frequency_hz / A4_FREQUENCY_HZ).log2() + A4_MIDI as f64;
    Some(nearest_semitone(semitones))
}

fn nearest_semitone(semitones: f64) -> i32 {
    semitones.round_ties_even() as i32
}

pub fn midi_to_hz(pitch: i32) -> f64 {
    A4_FREQUENCY_HZ * 2f64.powf((pitch - A4_MIDI) as f64 / 12.0)
}

pub fn pitch_class(pitch: i32) -> u8 {
    pitch.rem_euclid(12) as u8
}

/// Scientific octave number, MIDI 60 is C4.
pub fn octave(pitch: i32) -> i32 {
    pitch.div_euclid(12) - 1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accidental {
    Natural,
    Sharp,
    Flat,
}

impl Accidental {
    pub fn alter(&self) -> i8 {
        match self {
            Accidental::Natural => 0,
            Accidental::Sharp => 1,
            Accidental::Flat => -1,
        }
    }
}

/// Whether black keys are written as raised or lowered naturals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spelling {
    Sharps,
    Flats,
}

const SHARP_NAMES: [(char, Accidental); 12] = [
    ('C', Accidental::Natural),
    ('C', Accidental::Sharp),
    ('D', Accidental::Natural),
    ('D', Accidental::Sharp),
    ('E', Accidental::Natural),
    ('F', Accidental::Natural),
    ('F', Accidental::Sharp),
    ('G', Accidental::Natural),
    ('G', Accidental::Sharp),
    ('A', Accidental::Natural),
    ('A', Accidental::Sharp),
    ('B', Accidental::Natural),
];

const FLAT_NAMES: [(char, Accidental); 12] = [
    ('C', Accidental::Natural),
    ('D', Accidental::Flat),
    ('D', Accidental::Natural),
    ('E', Accidental::Flat),
    ('E', Accidental::Natural),
    ('F', Accidental::Natural),
    ('G', Accidental::Flat),
    ('G', Accidental::Natural),
    ('A', Accidental::Flat),
    ('A', Accidental::Natural),
    ('B', Accidental::Flat),
    ('B', Accidental::Natural),
];

impl Spelling {
    /// Letter name and accidental for a pitch class.
    pub fn spell(&self, pitch_class: u8) -> (char, Accidental) {
        let index = (pitch_class % 12) as usize;
        match self {
            Spelling::Sharps => SHARP_NAMES[index],
            Spelling::Flats => FLAT_NAMES[index],
        }
    }
}

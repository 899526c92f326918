use super::{MusicError, Spelling};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The fifteen major key signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    C,
    G,
    D,
    A,
    E,
    B,
    #[serde(rename = "F#")]
    FSharp,
    #[serde(rename = "C#")]
    CSharp,
    F,
    #[serde(rename = "Bb")]
    BFlat,
    #[serde(rename = "Eb")]
    EFlat,
    #[serde(rename = "Ab")]
    AFlat,
    #[serde(rename = "Db")]
    DFlat,
    #[serde(rename = "Gb")]
    GFlat,
    #[serde(rename = "Cb")]
    CFlat,
}

/// Sharp keys by number of sharps, then flat keys by number of flats.
pub const ALL_KEYS: [Key; 15] = [
    Key::C,
    Key::G,
    Key::D,
    Key::A,
    Key::E,
    Key::B,
    Key::FSharp,
    Key::CSharp,
    Key::F,
    Key::BFlat,
    Key::EFlat,
    Key::AFlat,
    Key::DFlat,
    Key::GFlat,
    Key::CFlat,
];

/// Candidates for `suggest_best_key`, in preference order.
pub const SAX_FRIENDLY_KEYS: [Key; 6] = [Key::C, Key::G, Key::F, Key::D, Key::BFlat, Key::A];

/// Reminders for reading concert pitch charts on an alto.
pub const ALTO_SAX_HINTS: [&str; 2] = ["Concert Eb → Alto Sax C", "Concert Bb → Alto Sax G"];

const SHARP_ORDER: [&str; 7] = ["F#", "C#", "G#", "D#", "A#", "E#", "B#"];
const FLAT_ORDER: [&str; 7] = ["Bb", "Eb", "Ab", "Db", "Gb", "Cb", "Fb"];

impl Key {
    pub fn name(&self) -> &'static str {
        match self {
            Key::C => "C",
            Key::G => "G",
            Key::D => "D",
            Key::A => "A",
            Key::E => "E",
            Key::B => "B",
            Key::FSharp => "F#",
            Key::CSharp => "C#",
            Key::F => "F",
            Key::BFlat => "Bb",
            Key::EFlat => "Eb",
            Key::AFlat => "Ab",
            Key::DFlat => "Db",
            Key::GFlat => "Gb",
            Key::CFlat => "Cb",
        }
    }

    /// Accepts the plain key name (`"Bb"`) or the same followed by `" major"`.
    pub fn parse(name: &str) -> Result<Key, MusicError> {
        let trimmed = name.trim();
        let tonic = match trimmed.rsplit_once(' ') {
            Some((tonic, mode)) if mode.eq_ignore_ascii_case("major") => tonic.trim_end(),
            _ => trimmed,
        };
        ALL_KEYS
            .iter()
            .copied()
            .find(|key| key.name() == tonic)
            .ok_or_else(|| MusicError::UnknownKey(name.to_string()))
    }

    /// Position on the circle of fifths: sharps positive, flats negative.
    pub fn fifths(&self) -> i8 {
        match self {
            Key::C => 0,
            Key::G => 1,
            Key::D => 2,
            Key::A => 3,
            Key::E => 4,
            Key::B => 5,
            Key::FSharp => 6,
            Key::CSharp => 7,
            Key::F => -1,
            Key::BFlat => -2,
            Key::EFlat => -3,
            Key::AFlat => -4,
            Key::DFlat => -5,
            Key::GFlat => -6,
            Key::CFlat => -7,
        }
    }

    pub fn accidental_count(&self) -> u8 {
        self.fifths().unsigned_abs()
    }

    pub fn tonic_pitch_class(&self) -> u8 {
        (self.fifths() as i32 * 7).rem_euclid(12) as u8
    }

    /// Pitches raised or lowered by the key signature, in signature order.
    pub fn altered_pitches(&self) -> &'static [&'static str] {
        let count = self.accidental_count() as usize;
        if self.fifths() >= 0 {
            &SHARP_ORDER[..count]
        } else {
            &FLAT_ORDER[..count]
        }
    }

    pub fn spelling(&self) -> Spelling {
        if self.fifths() >= 0 {
            Spelling::Sharps
        } else {
            Spelling::Flats
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Key {
    type Err = MusicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Key::parse(s)
    }
}

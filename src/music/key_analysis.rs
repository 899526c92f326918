//! Key estimation with the Krumhansl-Schmuckler algorithm.
//!
//! A duration-weighted pitch-class histogram is correlated against the
//! Krumhansl-Kessler major and minor profiles rotated to every tonic. The
//! highest correlation wins. Candidates are visited tonic by tonic from C to
//! B, major before minor, and only a strictly better score replaces the
//! current best.
//!
//! A histogram that maps onto itself under a transposition (an augmented
//! triad, a diminished seventh, an equal-weight tritone) correlates equally
//! with several tonics and is rejected as indeterminate.

use super::{pitch_class, Key, MusicError, Score};
use serde::Serialize;
use std::fmt;
use tracing::debug;

const KRUMHANSL_MAJOR: [f64; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];
const KRUMHANSL_MINOR: [f64; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

const MAJOR_TONIC_NAMES: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B",
];
const MINOR_TONIC_NAMES: [&str; 12] = [
    "c", "c#", "d", "eb", "e", "f", "f#", "g", "g#", "a", "bb", "b",
];

/// Signature of each major tonic, spelled like [`MAJOR_TONIC_NAMES`].
const MAJOR_SIGNATURES: [Key; 12] = [
    Key::C,
    Key::DFlat,
    Key::D,
    Key::EFlat,
    Key::E,
    Key::F,
    Key::FSharp,
    Key::G,
    Key::AFlat,
    Key::A,
    Key::BFlat,
    Key::B,
];

/// Relative major of each minor tonic, spelled like [`MINOR_TONIC_NAMES`].
const MINOR_SIGNATURES: [Key; 12] = [
    Key::EFlat,
    Key::E,
    Key::F,
    Key::GFlat,
    Key::G,
    Key::AFlat,
    Key::A,
    Key::BFlat,
    Key::B,
    Key::C,
    Key::DFlat,
    Key::D,
];

const SYMMETRY_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Major,
    Minor,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Major => "major",
            Mode::Minor => "minor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KeyEstimate {
    pub tonic_pitch_class: u8,
    pub mode: Mode,
    pub correlation: f64,
}

impl KeyEstimate {
    pub fn tonic_name(&self) -> &'static str {
        let index = (self.tonic_pitch_class % 12) as usize;
        match self.mode {
            Mode::Major => MAJOR_TONIC_NAMES[index],
            Mode::Minor => MINOR_TONIC_NAMES[index],
        }
    }

    /// Major key sharing this key's signature: the key itself, or the
    /// relative major of a minor key. Sharps or flats follow [`Self::label`].
    pub fn signature_key(&self) -> Key {
        let index = (self.tonic_pitch_class % 12) as usize;
        match self.mode {
            Mode::Major => MAJOR_SIGNATURES[index],
            Mode::Minor => MINOR_SIGNATURES[index],
        }
    }

    /// `"D major"` or `"f# minor"`.
    pub fn label(&self) -> String {
        format!("{} {}", self.tonic_name(), self.mode.as_str())
    }
}

impl fmt::Display for KeyEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

pub trait KeyFinder: Send + Sync {
    fn estimate(&self, score: &Score) -> Result<KeyEstimate, MusicError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KrumhanslSchmuckler;

impl KeyFinder for KrumhanslSchmuckler {
    fn estimate(&self, score: &Score) -> Result<KeyEstimate, MusicError> {
        if score.is_empty() {
            return Err(MusicError::IndeterminateKey(
                "the score has no notes".to_string(),
            ));
        }
        let histogram = pitch_class_histogram(score);
        let distinct = histogram.iter().filter(|weight| **weight > 0.0).count();
        if distinct < 2 {
            return Err(MusicError::IndeterminateKey(format!(
                "need at least 2 distinct pitch classes, found {}",
                distinct
            )));
        }
        if let Some(period) = symmetry_period(&histogram) {
            return Err(MusicError::IndeterminateKey(format!(
                "pitch classes repeat every {} semitones, no single tonic",
                period
            )));
        }

        let mut best: Option<KeyEstimate> = None;
        for tonic in 0..12u8 {
            for (mode, profile) in [
                (Mode::Major, &KRUMHANSL_MAJOR),
                (Mode::Minor, &KRUMHANSL_MINOR),
            ] {
                let correlation = pearson(&histogram, &rotate(profile, tonic));
                if best.map_or(true, |b| correlation > b.correlation) {
                    best = Some(KeyEstimate {
                        tonic_pitch_class: tonic,
                        mode,
                        correlation,
                    });
                }
            }
        }

        let estimate = best.ok_or_else(|| {
            MusicError::IndeterminateKey("no candidate key correlated".to_string())
        })?;
        debug!(
            "Estimated key {} (r = {:.3}) from {} notes",
            estimate.label(),
            estimate.correlation,
            score.len()
        );
        Ok(estimate)
    }
}

/// Estimates the key of `score` with [`KrumhanslSchmuckler`].
pub fn analyze_key(score: &Score) -> Result<KeyEstimate, MusicError> {
    KrumhanslSchmuckler.estimate(score)
}

fn pitch_class_histogram(score: &Score) -> [f64; 12] {
    let mut histogram = [0.0; 12];
    for note in score.notes() {
        histogram[pitch_class(note.pitch()) as usize] += note.duration();
    }
    histogram
}

/// Smallest non-trivial transposition that leaves `histogram` unchanged.
fn symmetry_period(histogram: &[f64; 12]) -> Option<usize> {
    (1..12).find(|shift| {
        (0..12).all(|pc| {
            (histogram[pc] - histogram[(pc + shift) % 12]).abs() < SYMMETRY_TOLERANCE
        })
    })
}

/// Profile indexed by pitch class for a key whose tonic is `tonic`.
fn rotate(profile: &[f64; 12], tonic: u8) -> [f64; 12] {
    let mut rotated = [0.0; 12];
    for (pc, slot) in rotated.iter_mut().enumerate() {
        *slot = profile[(pc + 12 - tonic as usize) % 12];
    }
    rotated
}

fn pearson(a: &[f64; 12], b: &[f64; 12]) -> f64 {
    let mean_a = a.iter().sum::<f64>() / 12.0;
    let mean_b = b.iter().sum::<f64>() / 12.0;
    let mut covariance = 0.0;
    let mut variance_a = 0.0;
    let mut variance_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        covariance += dx * dy;
        variance_a += dx * dx;
        variance_b += dy * dy;
    }
    let denominator = (variance_a * variance_b).sqrt();
    if denominator == 0.0 {
        0.0
    } else {
        covariance / denominator
    }
}

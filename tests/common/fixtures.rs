//! Generated WAV recordings.

use super::constants::*;
use std::io::Cursor;

fn write_wav(samples: &[f32]) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: FIXTURE_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut bytes = Vec::new();
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec)
            .expect("Failed to create WAV writer");
        for sample in samples {
            writer
                .write_sample((sample * i16::MAX as f32) as i16)
                .expect("Failed to write sample");
        }
        writer.finalize().expect("Failed to finalize WAV");
    }
    bytes
}

fn tone(frequency: f32, seconds: f32) -> Vec<f32> {
    let count = (FIXTURE_SAMPLE_RATE as f32 * seconds) as usize;
    (0..count)
        .map(|i| {
            let t = i as f32 / FIXTURE_SAMPLE_RATE as f32;
            0.5 * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// A single sine tone.
pub fn sine_wav(frequency: f32, seconds: f32) -> Vec<u8> {
    write_wav(&tone(frequency, seconds))
}

/// A4 followed by B4, [`TONE_SECONDS`] each.
pub fn two_tone_wav() -> Vec<u8> {
    let mut samples = tone(A4_HZ, TONE_SECONDS);
    samples.extend(tone(B4_HZ, TONE_SECONDS));
    write_wav(&samples)
}

pub fn silent_wav(seconds: f32) -> Vec<u8> {
    let count = (FIXTURE_SAMPLE_RATE as f32 * seconds) as usize;
    write_wav(&vec![0.0; count])
}

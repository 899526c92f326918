use super::{AudioError, MonoAudio};
use std::io::Cursor;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Mp3,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "wav" | "wave" => Some(AudioFormat::Wav),
            "mp3" => Some(AudioFormat::Mp3),
            _ => None,
        }
    }

    /// Guesses the format from the content itself.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if infer::audio::is_wav(bytes) {
            Some(AudioFormat::Wav)
        } else if infer::audio::is_mp3(bytes) {
            Some(AudioFormat::Mp3)
        } else {
            None
        }
    }

    /// Uses the file extension when it is a known one, the bytes otherwise.
    pub fn detect(filename: Option<&str>, bytes: &[u8]) -> Result<Self, AudioError> {
        let from_name = filename
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .and_then(AudioFormat::from_extension);
        from_name.or_else(|| AudioFormat::sniff(bytes)).ok_or_else(|| {
            AudioError::UnsupportedFormat(
                filename
                    .map(|name| name.to_string())
                    .unwrap_or_else(|| "unrecognized content".to_string()),
            )
        })
    }
}

/// Decodes a whole WAV or MP3 file held in memory, downmixing to mono.
///
/// Packets the codec rejects are skipped.
pub fn decode_audio(bytes: Vec<u8>, format: AudioFormat) -> Result<MonoAudio, AudioError> {
    if bytes.is_empty() {
        return Err(AudioError::Empty);
    }

    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
    let mut hint = Hint::new();
    hint.with_extension(format.extension());

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut reader = probed.format;

    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::UnsupportedFormat("no decodable audio track".to_string()))?;
    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.ok_or_else(|| {
        AudioError::UnsupportedFormat("audio track has no sample rate".to_string())
    })?;
    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples: Vec<f32> = Vec::new();
    let mut skipped_packets = 0usize;
    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let channels = decoded.spec().channels.count().max(1);
                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
                buffer.copy_interleaved_ref(decoded);
                samples.extend(
                    buffer
                        .samples()
                        .chunks(channels)
                        .map(|frame| frame.iter().sum::<f32>() / channels as f32),
                );
            }
            Err(SymphoniaError::DecodeError(reason)) => {
                skipped_packets += 1;
                warn!("Skipping corrupt audio packet: {}", reason);
            }
            Err(e) => return Err(e.into()),
        }
    }

    if samples.is_empty() {
        return Err(AudioError::Empty);
    }
    debug!(
        "Decoded {} samples at {} Hz ({} packets skipped)",
        samples.len(),
        sample_rate,
        skipped_packets
    );
    Ok(MonoAudio::new(samples, sample_rate))
}

use super::{
    extract_melody, AnalysisSettings, AudioUpload, MelodyAnalysis, PipelineError, PipelineEvent,
    TranscriptionRequest, TranscriptionResult,
};
use crate::audio::{decode_audio, resample, AudioError, AudioFormat, PitchTracker, SpectralPeakTracker};
use crate::music::{
    analyze_key, create_music_score, suggest_best_key, transpose_to_key, Quantizer,
};
use crate::song_store::{SavedSong, SongStore};
use std::sync::Arc;
use tracing::{debug, info};

pub struct TranscriptionPipeline {
    tracker: Arc<dyn PitchTracker>,
    quantizer: Quantizer,
    sample_rate: u32,
}

impl TranscriptionPipeline {
    pub fn new(settings: &AnalysisSettings) -> Result<Self, PipelineError> {
        let tracker = SpectralPeakTracker::new(settings.tracker.clone())?;
        Self::with_tracker(Arc::new(tracker), settings)
    }

    /// Same as [`TranscriptionPipeline::new`] with a caller-provided tracker.
    /// The tracker settings in `settings` are ignored.
    pub fn with_tracker(
        tracker: Arc<dyn PitchTracker>,
        settings: &AnalysisSettings,
    ) -> Result<Self, PipelineError> {
        if settings.sample_rate == 0 {
            return Err(AudioError::InvalidSettings(
                "sample_rate must be positive".to_string(),
            )
            .into());
        }
        Ok(Self {
            tracker,
            quantizer: Quantizer::new(settings.frame_quarter_length)?,
            sample_rate: settings.sample_rate,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Extracts the melody of `upload` and estimates its key.
    pub fn analyze(
        &self,
        upload: AudioUpload,
        on_event: &mut dyn FnMut(PipelineEvent),
    ) -> Result<MelodyAnalysis, PipelineError> {
        on_event(PipelineEvent::DecodingAudio);
        let format = AudioFormat::detect(upload.filename.as_deref(), &upload.bytes)?;
        let decoded = decode_audio(upload.bytes, format)?;
        debug!(
            "Decoded {} audio, {} samples at {} Hz",
            format.extension(),
            decoded.samples.len(),
            decoded.sample_rate
        );
        let audio = resample(decoded, self.sample_rate)?;
        let audio_duration_secs = audio.duration_secs();

        on_event(PipelineEvent::ExtractingMelody);
        let notes = extract_melody(&audio, self.tracker.as_ref(), &self.quantizer)?;
        if notes.is_empty() {
            return Err(PipelineError::NoMelody);
        }
        on_event(PipelineEvent::MelodyExtracted {
            note_count: notes.len(),
        });

        let score = create_music_score(notes);
        let key_estimate = analyze_key(&score)?;
        on_event(PipelineEvent::KeyEstimated {
            label: key_estimate.label(),
        });

        let suggested_key = suggest_best_key(&score);
        on_event(PipelineEvent::KeySuggested { key: suggested_key });

        Ok(MelodyAnalysis {
            score,
            key_estimate,
            suggested_key,
            audio_duration_secs,
        })
    }

    /// Validates `request`, analyzes `upload` and transposes the melody to the
    /// requested key, or to the suggested one when none was requested.
    pub fn transcribe(
        &self,
        upload: AudioUpload,
        request: &TranscriptionRequest,
        on_event: &mut dyn FnMut(PipelineEvent),
    ) -> Result<TranscriptionResult, PipelineError> {
        let requested_key = request.validate()?;
        let analysis = self.analyze(upload, on_event)?;
        let target_key = requested_key.unwrap_or(analysis.suggested_key);
        let transposed = transpose_to_key(&analysis.score, target_key)?;

        info!(
            "Transcribed {:?}: {} notes in {}, transposed to {}",
            request.title.trim(),
            analysis.score.len(),
            analysis.key_estimate,
            target_key
        );
        Ok(TranscriptionResult {
            title: request.title.trim().to_string(),
            notes: request.notes.clone(),
            analysis,
            target_key,
            transposed,
        })
    }
}

/// Stores `result` as one song with its original and transposed
/// transcriptions. Can be retried: `result` is left untouched.
pub fn save_transcription(
    store: &dyn SongStore,
    result: &TranscriptionResult,
) -> Result<SavedSong, PipelineError> {
    let (song, pair) = result.to_records()?;
    store
        .save_song(&song, &pair)
        .map_err(|e| PipelineError::Persistence(format!("{:#}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{FrequencyFrame, MonoAudio};
    use crate::music::{midi_to_hz, Key, MusicError, Score};
    use crate::song_store::SqliteSongStore;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const D_MAJOR_TUNE: [i32; 14] = [62, 66, 69, 74, 69, 66, 62, 64, 66, 67, 69, 71, 73, 74];

    /// Reports two frames per pitch regardless of the audio.
    struct ScriptedTracker {
        pitches: Vec<i32>,
        calls: AtomicUsize,
    }

    impl ScriptedTracker {
        fn new(pitches: &[i32]) -> Arc<Self> {
            Arc::new(Self {
                pitches: pitches.to_vec(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl PitchTracker for ScriptedTracker {
        fn track(&self, _audio: &MonoAudio) -> Result<Vec<FrequencyFrame>, AudioError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .pitches
                .iter()
                .flat_map(|&pitch| [pitch, pitch])
                .enumerate()
                .map(|(time_index, pitch)| FrequencyFrame {
                    time_index,
                    frequency_hz: midi_to_hz(pitch) as f32,
                    magnitude: 1.0,
                })
                .collect())
        }
    }

    fn silent_wav() -> AudioUpload {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 22_050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut bytes = Vec::new();
        {
            let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec).unwrap();
            for _ in 0..4096 {
                writer.write_sample(0i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        AudioUpload {
            filename: Some("take.wav".to_string()),
            bytes,
        }
    }

    fn request(target_key: Option<&str>) -> TranscriptionRequest {
        TranscriptionRequest {
            title: "Blue Bossa".to_string(),
            notes: Some("second chorus".to_string()),
            target_key: target_key.map(str::to_string),
        }
    }

    fn pipeline(tracker: Arc<ScriptedTracker>) -> TranscriptionPipeline {
        TranscriptionPipeline::with_tracker(tracker, &AnalysisSettings::default()).unwrap()
    }

    fn pitches(score: &Score) -> Vec<i32> {
        score.notes().iter().map(|n| n.pitch()).collect()
    }

    #[test]
    fn analysis_reports_progress_in_order() {
        let pipeline = pipeline(ScriptedTracker::new(&D_MAJOR_TUNE));
        let mut events = Vec::new();
        let analysis = pipeline
            .analyze(silent_wav(), &mut |event| events.push(event))
            .unwrap();

        assert_eq!(pitches(&analysis.score), D_MAJOR_TUNE.to_vec());
        assert!(analysis.score.notes().iter().all(|n| n.duration() == 0.5));
        assert_eq!(analysis.original_key_label(), "D major");
        assert_eq!(analysis.original_signature(), Key::D);
        assert_eq!(analysis.suggested_key, Key::C);
        assert_eq!(
            events,
            vec![
                PipelineEvent::DecodingAudio,
                PipelineEvent::ExtractingMelody,
                PipelineEvent::MelodyExtracted { note_count: 14 },
                PipelineEvent::KeyEstimated {
                    label: "D major".to_string()
                },
                PipelineEvent::KeySuggested { key: Key::C },
            ]
        );
    }

    #[test]
    fn transposes_to_the_suggested_key_by_default() {
        let pipeline = pipeline(ScriptedTracker::new(&D_MAJOR_TUNE));
        let result = pipeline
            .transcribe(silent_wav(), &request(None), &mut |_| {})
            .unwrap();

        assert_eq!(result.target_key, Key::C);
        let expected: Vec<i32> = D_MAJOR_TUNE.iter().map(|p| p - 2).collect();
        assert_eq!(pitches(&result.transposed), expected);
        assert_eq!(pitches(result.original_score()), D_MAJOR_TUNE.to_vec());
    }

    #[test]
    fn transposes_to_the_requested_key() {
        let pipeline = pipeline(ScriptedTracker::new(&D_MAJOR_TUNE));
        let result = pipeline
            .transcribe(silent_wav(), &request(Some("Bb")), &mut |_| {})
            .unwrap();

        assert_eq!(result.target_key, Key::BFlat);
        let expected: Vec<i32> = D_MAJOR_TUNE.iter().map(|p| p - 4).collect();
        assert_eq!(pitches(&result.transposed), expected);
    }

    #[test]
    fn bad_requests_fail_before_any_audio_work() {
        let tracker = ScriptedTracker::new(&D_MAJOR_TUNE);
        let pipeline = pipeline(tracker.clone());

        let unknown_key = pipeline.transcribe(silent_wav(), &request(Some("H")), &mut |_| {});
        assert!(matches!(
            unknown_key,
            Err(PipelineError::Music(MusicError::UnknownKey(_)))
        ));

        let mut untitled = request(None);
        untitled.title = " ".to_string();
        let mut events = Vec::new();
        let result = pipeline.transcribe(silent_wav(), &untitled, &mut |e| events.push(e));
        assert!(matches!(result, Err(PipelineError::InvalidRequest(_))));

        assert!(events.is_empty());
        assert_eq!(tracker.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn no_voiced_frames_is_no_melody() {
        let pipeline = pipeline(ScriptedTracker::new(&[]));
        let result = pipeline.transcribe(silent_wav(), &request(None), &mut |_| {});
        assert!(matches!(result, Err(PipelineError::NoMelody)));
    }

    #[test]
    fn garbage_upload_is_an_audio_error() {
        let pipeline = pipeline(ScriptedTracker::new(&D_MAJOR_TUNE));
        let upload = AudioUpload {
            filename: Some("notes.txt".to_string()),
            bytes: b"definitely not audio".to_vec(),
        };
        let result = pipeline.analyze(upload, &mut |_| {});
        assert!(matches!(result, Err(PipelineError::Audio(_))));
    }

    #[test]
    fn rejects_bad_settings() {
        let mut settings = AnalysisSettings::default();
        settings.frame_quarter_length = 0.0;
        assert!(matches!(
            TranscriptionPipeline::new(&settings),
            Err(PipelineError::Music(MusicError::InvalidDuration(_)))
        ));

        let mut settings = AnalysisSettings::default();
        settings.tracker.hop_length = 0;
        assert!(matches!(
            TranscriptionPipeline::new(&settings),
            Err(PipelineError::Audio(AudioError::InvalidSettings(_)))
        ));

        let mut settings = AnalysisSettings::default();
        settings.sample_rate = 0;
        assert!(TranscriptionPipeline::new(&settings).is_err());
    }

    #[test]
    fn saving_stores_both_transcriptions_and_can_be_retried() {
        let pipeline = pipeline(ScriptedTracker::new(&D_MAJOR_TUNE));
        let result = pipeline
            .transcribe(silent_wav(), &request(Some("G")), &mut |_| {})
            .unwrap();
        let store = SqliteSongStore::in_memory().unwrap();

        let saved = save_transcription(&store, &result).unwrap();
        assert_eq!(saved.song.title, "Blue Bossa");
        assert_eq!(saved.song.original_key.as_deref(), Some("D major"));
        assert_eq!(saved.song.notes.as_deref(), Some("second chorus"));
        let keys: Vec<&str> = saved
            .transcriptions
            .iter()
            .map(|t| t.target_key.as_str())
            .collect();
        assert_eq!(keys, vec!["D major", "G"]);
        let stored = Score::from_sheet_data(&saved.transcriptions[1].sheet_data).unwrap();
        assert_eq!(stored, result.transposed);

        let again = save_transcription(&store, &result).unwrap();
        assert_ne!(again.song.id, saved.song.id);
        assert_eq!(store.list_songs().unwrap().len(), 2);
    }
}

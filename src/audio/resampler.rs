use super::{AudioError, MonoAudio};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

/// Converts `audio` to `target_rate` with band-limited sinc interpolation.
pub fn resample(audio: MonoAudio, target_rate: u32) -> Result<MonoAudio, AudioError> {
    if target_rate == 0 || audio.sample_rate == 0 {
        return Err(AudioError::Resample(format!(
            "cannot resample from {} Hz to {} Hz",
            audio.sample_rate, target_rate
        )));
    }
    if audio.sample_rate == target_rate {
        return Ok(audio);
    }
    if audio.is_empty() {
        return Err(AudioError::Empty);
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let ratio = target_rate as f64 / audio.sample_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, audio.samples.len(), 1)
        .map_err(|e| AudioError::Resample(e.to_string()))?;

    let input = [audio.samples.as_slice()];
    let output = resampler
        .process(&input[..], None)
        .map_err(|e| AudioError::Resample(e.to_string()))?;
    let samples = output.into_iter().next().unwrap_or_default();

    debug!(
        "Resampled {} Hz -> {} Hz ({} -> {} samples)",
        audio.sample_rate,
        target_rate,
        audio.samples.len(),
        samples.len()
    );
    Ok(MonoAudio::new(samples, target_rate))
}

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub database_url: Option<String>,
    pub scratch_dir: Option<String>,
    pub port: Option<u16>,
    pub logging_level: Option<String>,
    pub frontend_dir_path: Option<String>,
    pub max_upload_bytes: Option<usize>,

    pub analysis: Option<AnalysisConfig>,
    pub render: Option<RenderConfig>,
}

/// `[analysis]`: pitch tracking and quantization.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct AnalysisConfig {
    pub sample_rate: Option<u32>,
    pub n_fft: Option<usize>,
    pub hop_length: Option<usize>,
    pub fmin: Option<f32>,
    pub fmax: Option<f32>,
    pub threshold: Option<f32>,
    pub frame_quarter_length: Option<f64>,
}

/// `[render]`: score output.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct RenderConfig {
    /// "abc" or "musicxml"
    pub format: Option<String>,
    pub cache_capacity: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

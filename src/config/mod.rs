mod file_config;

pub use file_config::{AnalysisConfig, FileConfig, RenderConfig};

use crate::audio::TrackerSettings;
use crate::render::{RenderFormat, DEFAULT_RENDER_CACHE_CAPACITY, UNITS_PER_QUARTER};
use crate::server::RequestsLoggingLevel;
use crate::sqlite_persistence::DatabaseLocation;
use crate::transcription::AnalysisSettings;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub database_url: Option<String>,
    pub scratch_dir: Option<PathBuf>,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseLocation,
    pub scratch_dir: PathBuf,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub max_upload_bytes: usize,

    pub analysis: AnalysisSettings,
    pub render_format: RenderFormat,
    pub render_cache_capacity: usize,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let database_url = file
            .database_url
            .or_else(|| cli.database_url.clone())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "database_url must be specified via --database-url, DATABASE_URL or in config file"
                )
            })?;
        let database = DatabaseLocation::parse(&database_url)?;

        let scratch_dir = file
            .scratch_dir
            .map(PathBuf::from)
            .or_else(|| cli.scratch_dir.clone())
            .unwrap_or_else(default_scratch_dir);
        if scratch_dir.exists() && !scratch_dir.is_dir() {
            bail!("scratch_dir is not a directory: {:?}", scratch_dir);
        }

        let port = file.port.unwrap_or(cli.port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let frontend_dir_path = file
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone());

        let max_upload_bytes = file.max_upload_bytes.unwrap_or(cli.max_upload_bytes);
        if max_upload_bytes == 0 {
            bail!("max_upload_bytes must be positive");
        }

        let analysis = resolve_analysis(file.analysis.unwrap_or_default())?;

        let render_file = file.render.unwrap_or_default();
        let render_format = match render_file.format {
            Some(name) => match RenderFormat::from_str(&name, true) {
                Ok(format) => format,
                Err(_) => bail!("Unknown render format {:?}, expected abc or musicxml", name),
            },
            None => RenderFormat::default(),
        };
        let render_cache_capacity = render_file
            .cache_capacity
            .unwrap_or(DEFAULT_RENDER_CACHE_CAPACITY);

        Ok(Self {
            database,
            scratch_dir,
            port,
            logging_level,
            frontend_dir_path,
            max_upload_bytes,
            analysis,
            render_format,
            render_cache_capacity,
        })
    }
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("sax-transcriber")
}

/// Merges `[analysis]` over the defaults and checks the result.
fn resolve_analysis(file: AnalysisConfig) -> Result<AnalysisSettings> {
    let defaults = AnalysisSettings::default();
    let tracker_defaults = defaults.tracker;
    let settings = AnalysisSettings {
        sample_rate: file.sample_rate.unwrap_or(defaults.sample_rate),
        frame_quarter_length: file
            .frame_quarter_length
            .unwrap_or(defaults.frame_quarter_length),
        tracker: TrackerSettings {
            n_fft: file.n_fft.unwrap_or(tracker_defaults.n_fft),
            hop_length: file.hop_length.unwrap_or(tracker_defaults.hop_length),
            fmin: file.fmin.unwrap_or(tracker_defaults.fmin),
            fmax: file.fmax.unwrap_or(tracker_defaults.fmax),
            threshold: file.threshold.unwrap_or(tracker_defaults.threshold),
        },
    };

    if settings.sample_rate == 0 {
        bail!("analysis.sample_rate must be positive");
    }
    settings.tracker.validate()?;
    let nyquist = settings.sample_rate as f32 / 2.0;
    if settings.tracker.fmax >= nyquist {
        bail!(
            "analysis.fmax ({} Hz) must be below half the sample rate ({} Hz)",
            settings.tracker.fmax,
            nyquist
        );
    }

    // Renderers work in sixteenths, so a frame has to be a whole number of them.
    let units = settings.frame_quarter_length * UNITS_PER_QUARTER;
    if !units.is_finite() || units < 1.0 || (units - units.round()).abs() > 1e-9 {
        bail!(
            "analysis.frame_quarter_length must be a positive multiple of 0.25, got {}",
            settings.frame_quarter_length
        );
    }
    Ok(settings)
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cli_with_db(database_url: &str) -> CliConfig {
        CliConfig {
            database_url: Some(database_url.to_string()),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_logging_level() {
        assert!(matches!(
            parse_logging_level("none"),
            Some(RequestsLoggingLevel::None)
        ));
        assert!(matches!(
            parse_logging_level("path"),
            Some(RequestsLoggingLevel::Path)
        ));
        assert!(matches!(
            parse_logging_level("headers"),
            Some(RequestsLoggingLevel::Headers)
        ));
        assert!(matches!(
            parse_logging_level("body"),
            Some(RequestsLoggingLevel::Body)
        ));
        // Case insensitive
        assert!(matches!(
            parse_logging_level("PATH"),
            Some(RequestsLoggingLevel::Path)
        ));
        assert!(parse_logging_level("invalid").is_none());
    }

    #[test]
    fn test_resolve_cli_only() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("songs.db");
        let cli = CliConfig {
            database_url: Some(format!("sqlite://{}", db_path.display())),
            scratch_dir: Some(temp_dir.path().join("scratch")),
            port: 3001,
            logging_level: RequestsLoggingLevel::Headers,
            frontend_dir_path: Some("/frontend".to_string()),
            max_upload_bytes: 1024,
        };

        let config = AppConfig::resolve(&cli, None).unwrap();

        assert_eq!(config.database, DatabaseLocation::File(db_path));
        assert_eq!(config.scratch_dir, temp_dir.path().join("scratch"));
        assert_eq!(config.port, 3001);
        assert_eq!(config.logging_level, RequestsLoggingLevel::Headers);
        assert_eq!(config.frontend_dir_path, Some("/frontend".to_string()));
        assert_eq!(config.max_upload_bytes, 1024);
        assert_eq!(config.analysis, AnalysisSettings::default());
        assert_eq!(config.render_format, RenderFormat::Abc);
        assert_eq!(config.render_cache_capacity, DEFAULT_RENDER_CACHE_CAPACITY);
    }

    #[test]
    fn test_resolve_toml_overrides_cli() {
        let cli = CliConfig {
            port: 3001,
            logging_level: RequestsLoggingLevel::Path,
            ..cli_with_db("sqlite://should/be/overridden.db")
        };

        let file_config = FileConfig {
            database_url: Some(":memory:".to_string()),
            port: Some(4000),
            logging_level: Some("body".to_string()),
            analysis: Some(AnalysisConfig {
                hop_length: Some(256),
                frame_quarter_length: Some(0.5),
                ..Default::default()
            }),
            render: Some(RenderConfig {
                format: Some("MusicXML".to_string()),
                cache_capacity: Some(8),
            }),
            ..Default::default()
        };

        let config = AppConfig::resolve(&cli, Some(file_config)).unwrap();

        assert_eq!(config.database, DatabaseLocation::InMemory);
        assert_eq!(config.port, 4000);
        assert_eq!(config.logging_level, RequestsLoggingLevel::Body);
        assert_eq!(config.analysis.tracker.hop_length, 256);
        assert_eq!(config.analysis.tracker.n_fft, 2048);
        assert_eq!(config.analysis.frame_quarter_length, 0.5);
        assert_eq!(config.render_format, RenderFormat::MusicXml);
        assert_eq!(config.render_cache_capacity, 8);
        // CLI value used when TOML doesn't specify
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[test]
    fn test_resolve_missing_database_url_error() {
        let result = AppConfig::resolve(&CliConfig::default(), None);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("database_url must be specified"));
    }

    #[test]
    fn test_resolve_unsupported_database_url_error() {
        let result = AppConfig::resolve(&cli_with_db("postgres://localhost/songs"), None);
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_scratch_dir_not_directory_error() {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        let cli = CliConfig {
            scratch_dir: Some(temp_file.path().to_path_buf()),
            ..cli_with_db(":memory:")
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not a directory"));
    }

    #[test]
    fn test_resolve_scratch_dir_default() {
        let config = AppConfig::resolve(&cli_with_db(":memory:"), None).unwrap();
        assert_eq!(
            config.scratch_dir,
            std::env::temp_dir().join("sax-transcriber")
        );
    }

    #[test]
    fn test_resolve_invalid_analysis_settings() {
        let invalid = [
            AnalysisConfig {
                hop_length: Some(0),
                ..Default::default()
            },
            AnalysisConfig {
                n_fft: Some(2),
                ..Default::default()
            },
            AnalysisConfig {
                fmin: Some(500.0),
                fmax: Some(400.0),
                ..Default::default()
            },
            AnalysisConfig {
                sample_rate: Some(0),
                ..Default::default()
            },
            AnalysisConfig {
                sample_rate: Some(8000),
                ..Default::default()
            },
            AnalysisConfig {
                frame_quarter_length: Some(0.3),
                ..Default::default()
            },
            AnalysisConfig {
                frame_quarter_length: Some(0.0),
                ..Default::default()
            },
        ];
        for analysis in invalid {
            let file_config = FileConfig {
                analysis: Some(analysis.clone()),
                ..Default::default()
            };
            let result = AppConfig::resolve(&cli_with_db(":memory:"), Some(file_config));
            assert!(result.is_err(), "{:?} should be rejected", analysis);
        }
    }

    #[test]
    fn test_resolve_unknown_render_format() {
        let file_config = FileConfig {
            render: Some(RenderConfig {
                format: Some("pdf".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli_with_db(":memory:"), Some(file_config));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("pdf"));
    }

    #[test]
    fn test_resolve_zero_upload_limit() {
        let cli = CliConfig {
            max_upload_bytes: 0,
            ..cli_with_db(":memory:")
        };
        assert!(AppConfig::resolve(&cli, None).is_err());
    }
}

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sax_transcriber::config::{AppConfig, CliConfig, FileConfig, DEFAULT_MAX_UPLOAD_BYTES};
use sax_transcriber::render::{make_renderer, RenderCache};
use sax_transcriber::server::{run_server, RequestsLoggingLevel, ServerConfig, ServerState};
use sax_transcriber::song_store::SqliteSongStore;
use sax_transcriber::transcription::TranscriptionPipeline;

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// SQLite database URL: sqlite://<path>, sqlite::memory: or a plain path.
    #[clap(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Directory for temporary render files.
    #[clap(long, value_parser = parse_path)]
    pub scratch_dir: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// Largest accepted audio upload, in bytes.
    #[clap(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,

    /// TOML config file. Its values override the command line.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let cli_config = CliConfig {
        database_url: cli_args.database_url,
        scratch_dir: cli_args.scratch_dir,
        port: cli_args.port,
        logging_level: cli_args.logging_level,
        frontend_dir_path: cli_args.frontend_dir_path,
        max_upload_bytes: cli_args.max_upload_bytes,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    info!("Opening song database at {}...", config.database);
    let song_store = Arc::new(SqliteSongStore::new(&config.database)?);

    let pipeline = TranscriptionPipeline::new(&config.analysis)?;
    info!(
        "Analyzing at {} Hz (n_fft {}, hop {}), rendering {}",
        config.analysis.sample_rate,
        config.analysis.tracker.n_fft,
        config.analysis.tracker.hop_length,
        config.render_format.as_str()
    );
    let renderer = make_renderer(config.render_format, &config.scratch_dir);

    let server_config = ServerConfig {
        requests_logging_level: config.logging_level,
        port: config.port,
        frontend_dir_path: config.frontend_dir_path,
        max_upload_bytes: config.max_upload_bytes,
    };
    let state = ServerState::new(
        server_config,
        song_store,
        pipeline,
        renderer,
        RenderCache::new(config.render_cache_capacity),
        env!("GIT_HASH").to_string(),
    );

    info!("Ready to serve at port {}!", config.port);
    run_server(state).await
}

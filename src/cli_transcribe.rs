use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli_style;

use cli_style::{
    get_styles, print_empty_list, print_error, print_key_value, print_section_footer,
    print_section_header, print_step, print_success, print_warning, TableBuilder,
};

use sax_transcriber::config::{AppConfig, CliConfig, FileConfig, DEFAULT_MAX_UPLOAD_BYTES};
use sax_transcriber::music::{get_available_keys, Score, ALTO_SAX_HINTS, SAX_FRIENDLY_KEYS};
use sax_transcriber::render::{make_renderer, render_pair, RenderCache, RenderFormat, RenderedScore};
use sax_transcriber::song_store::{SongStore, SqliteSongStore};
use sax_transcriber::transcription::{
    save_transcription, AudioUpload, TranscriptionPipeline, TranscriptionRequest,
};
use sax_transcriber::RequestsLoggingLevel;

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(styles=get_styles(), version = env!("APP_VERSION"))]
struct CliArgs {
    /// SQLite database URL: sqlite://<path>, sqlite::memory: or a plain path.
    #[clap(long, env = "DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    /// TOML config file, the same one the server reads.
    #[clap(long, value_parser = parse_path, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Transcribes a recording and writes the original and transposed scores.
    Transcribe {
        #[clap(value_parser = parse_path)]
        file: PathBuf,

        #[clap(long)]
        title: String,

        #[clap(long)]
        notes: Option<String>,

        /// Key to transpose to. The suggested key is used when missing.
        #[clap(long)]
        target_key: Option<String>,

        /// Also stores the song and both transcriptions in the database.
        #[clap(long)]
        save: bool,

        /// Overrides the render format from the config file.
        #[clap(long, value_enum)]
        format: Option<RenderFormat>,

        /// Where rendered scores are written, the current directory by default.
        #[clap(long, value_parser = parse_path)]
        out_dir: Option<PathBuf>,
    },

    /// Shows the keys a melody can be transposed to.
    Keys,

    /// Shows all saved songs.
    Songs,

    /// Shows a saved song and its transcriptions.
    Show { id: i64 },

    /// Deletes a saved song with its transcriptions.
    Delete { id: i64 },
}

impl Command {
    fn needs_database(&self) -> bool {
        match self {
            Command::Transcribe { save, .. } => *save,
            Command::Keys => false,
            Command::Songs | Command::Show { .. } | Command::Delete { .. } => true,
        }
    }
}

fn resolve_config(args: &CliArgs) -> Result<AppConfig> {
    let file_config = args.config.as_deref().map(FileConfig::load).transpose()?;
    let has_database_url = args.database_url.is_some()
        || file_config
            .as_ref()
            .is_some_and(|c| c.database_url.is_some());
    if args.command.needs_database() && !has_database_url {
        bail!("This command needs a database, pass --database-url or set DATABASE_URL");
    }

    let cli_config = CliConfig {
        // Commands that never touch the database still need a location to resolve.
        database_url: args
            .database_url
            .clone()
            .or_else(|| Some(":memory:".to_string())),
        scratch_dir: None,
        port: 0,
        logging_level: RequestsLoggingLevel::None,
        frontend_dir_path: None,
        max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
    };
    AppConfig::resolve(&cli_config, file_config)
}

fn file_stem(text: &str) -> String {
    let mut stem = String::new();
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            stem.push(c.to_ascii_lowercase());
        } else if c == '#' {
            stem.push_str("sharp");
        } else if !stem.is_empty() && !stem.ends_with('-') {
            stem.push('-');
        }
    }
    let stem = stem.trim_end_matches('-').to_string();
    if stem.is_empty() {
        "untitled".to_string()
    } else {
        stem
    }
}

fn format_timestamp(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| secs.to_string())
}

fn write_score(out_dir: &Path, name: &str, format: RenderFormat, rendered: &RenderedScore) -> Result<()> {
    let path = out_dir.join(format!("{}.{}", name, format.file_extension()));
    std::fs::write(&path, &rendered.bytes)
        .with_context(|| format!("Failed to write {:?}", path))?;
    print_success(&format!("Wrote {}", path.display()));
    Ok(())
}

fn transcribe(
    config: &AppConfig,
    file: &Path,
    request: TranscriptionRequest,
    save: bool,
    format: Option<RenderFormat>,
    out_dir: Option<PathBuf>,
) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {:?}", file))?;
    if bytes.len() > config.max_upload_bytes {
        bail!(
            "{:?} is {:#}, the limit is {:#}",
            file,
            byte_unit::Byte::from(bytes.len()),
            byte_unit::Byte::from(config.max_upload_bytes)
        );
    }
    let upload = AudioUpload {
        filename: file.file_name().map(|n| n.to_string_lossy().into_owned()),
        bytes,
    };

    print_section_header(&request.title);
    let pipeline = TranscriptionPipeline::new(&config.analysis)?;
    let result = pipeline.transcribe(upload, &request, &mut |event| {
        print_step(&event.to_string())
    })?;

    print_key_value("Notes", &result.original_score().len().to_string());
    print_key_value(
        "Length",
        &format!("{:.1}s", result.analysis.audio_duration_secs),
    );
    print_key_value("Original key", &result.analysis.original_key_label());
    print_key_value("Suggested key", result.analysis.suggested_key.name());
    print_key_value("Target key", result.target_key.name());

    let format = format.unwrap_or(config.render_format);
    let renderer = make_renderer(format, &config.scratch_dir);
    let cache = Mutex::new(RenderCache::new(2));
    let rendered = render_pair(
        renderer.as_ref(),
        &cache,
        &result.title,
        (result.original_score(), result.analysis.original_signature()),
        (&result.transposed, result.target_key),
    );

    let out_dir = match out_dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create {:?}", out_dir))?;
    let title_stem = file_stem(&result.title);
    let outputs = [
        (format!("{}-original", title_stem), rendered.original),
        (
            format!("{}-{}", title_stem, file_stem(result.target_key.name())),
            rendered.transposed,
        ),
    ];
    for (name, outcome) in outputs {
        match outcome {
            Ok(score) => write_score(&out_dir, &name, format, &score)?,
            Err(e) => print_warning(&format!("Could not render {}: {}", name, e)),
        }
    }

    if save {
        let store = SqliteSongStore::new(&config.database)?;
        let saved = save_transcription(&store, &result)?;
        print_success(&format!(
            "Saved as song {} in {}",
            saved.song.id, config.database
        ));
    }
    print_section_footer();
    Ok(())
}

fn show_keys() {
    print_section_header("Keys");
    let keys: Vec<&str> = get_available_keys().iter().map(|k| k.name()).collect();
    print_key_value("All keys", &keys.join(" "));
    let friendly: Vec<&str> = SAX_FRIENDLY_KEYS.iter().map(|k| k.name()).collect();
    print_key_value("Saxophone friendly", &friendly.join(" "));
    for hint in ALTO_SAX_HINTS {
        print_key_value("Hint", hint);
    }
    print_section_footer();
}

fn show_songs(store: &dyn SongStore) -> Result<()> {
    let songs = store.list_songs()?;
    print_section_header("Songs");
    if songs.is_empty() {
        print_empty_list("No songs saved yet");
    } else {
        let mut table = TableBuilder::new(vec!["ID", "Title", "Key", "Created"]);
        for song in songs {
            table.add_row(vec![
                song.id.to_string(),
                song.title,
                song.original_key.unwrap_or_else(|| "-".to_string()),
                format_timestamp(song.created_at),
            ]);
        }
        table.print();
    }
    print_section_footer();
    Ok(())
}

fn show_song(store: &dyn SongStore, id: i64) -> Result<()> {
    let song = match store.get_song(id)? {
        Some(song) => song,
        None => bail!("Song {} not found", id),
    };
    let transcriptions = store.get_transcriptions(id)?;

    print_section_header(&song.title);
    print_key_value("ID", &song.id.to_string());
    print_key_value(
        "Original key",
        song.original_key.as_deref().unwrap_or("-"),
    );
    print_key_value("Created", &format_timestamp(song.created_at));
    if let Some(notes) = &song.notes {
        print_key_value("Notes", notes);
    }

    let mut table = TableBuilder::new(vec!["ID", "Key", "Notes", "Created"]);
    for transcription in transcriptions {
        let note_count = match Score::from_sheet_data(&transcription.sheet_data) {
            Ok(score) => score.len().to_string(),
            Err(e) => {
                debug!("Unreadable sheet data in transcription {}: {}", transcription.id, e);
                "?".to_string()
            }
        };
        table.add_row(vec![
            transcription.id.to_string(),
            transcription.target_key,
            note_count,
            format_timestamp(transcription.created_at),
        ]);
    }
    table.print();
    print_section_footer();
    Ok(())
}

fn execute_command(args: CliArgs) -> Result<()> {
    if let Command::Keys = args.command {
        show_keys();
        return Ok(());
    }

    let config = resolve_config(&args)?;
    match args.command {
        Command::Transcribe {
            file,
            title,
            notes,
            target_key,
            save,
            format,
            out_dir,
        } => {
            let request = TranscriptionRequest {
                title,
                notes,
                target_key,
            };
            transcribe(&config, &file, request, save, format, out_dir)
        }
        Command::Keys => Ok(()),
        Command::Songs => show_songs(&SqliteSongStore::new(&config.database)?),
        Command::Show { id } => show_song(&SqliteSongStore::new(&config.database)?, id),
        Command::Delete { id } => {
            let store = SqliteSongStore::new(&config.database)?;
            if !store.delete_song(id)? {
                bail!("Song {} not found", id);
            }
            print_success(&format!("Deleted song {}", id));
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    let args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    if let Err(e) = execute_command(args) {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}

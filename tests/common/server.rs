//! Test server lifecycle management
//!
//! Each test gets an isolated server with its own database file.

use super::constants::*;
use sax_transcriber::render::{make_renderer, RenderCache, RenderFormat};
use sax_transcriber::server::{make_app, RequestsLoggingLevel, ServerConfig, ServerState};
use sax_transcriber::song_store::{SongStore, SqliteSongStore};
use sax_transcriber::sqlite_persistence::DatabaseLocation;
use sax_transcriber::transcription::{AnalysisSettings, TranscriptionPipeline};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance with an isolated database
///
/// When dropped, the server shuts down and the temp directory is removed.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// Song store for direct database access in tests
    pub song_store: Arc<dyn SongStore>,

    _temp_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server on a random port, analyzing with the real
    /// spectral pitch tracker and rendering ABC.
    pub async fn spawn() -> Self {
        Self::spawn_with_upload_limit(sax_transcriber::config::DEFAULT_MAX_UPLOAD_BYTES).await
    }

    pub async fn spawn_with_upload_limit(max_upload_bytes: usize) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let location = DatabaseLocation::File(temp_dir.path().join("songs.db"));
        let song_store: Arc<dyn SongStore> =
            Arc::new(SqliteSongStore::new(&location).expect("Failed to open song store"));

        let pipeline = TranscriptionPipeline::new(&AnalysisSettings::default())
            .expect("Failed to create pipeline");
        let renderer = make_renderer(RenderFormat::Abc, temp_dir.path());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            requests_logging_level: RequestsLoggingLevel::None,
            port,
            frontend_dir_path: None,
            max_upload_bytes,
        };
        let state = ServerState::new(
            config,
            song_store.clone(),
            pipeline,
            renderer,
            RenderCache::new(8),
            "e2e".to_string(),
        );
        let app = make_app(state).expect("Failed to build app");

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            song_store,
            _temp_dir: temp_dir,
            _shutdown_tx: Some(shutdown_tx),
        };
        server.wait_for_ready().await;
        server
    }

    /// Polls the home endpoint until the server answers
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);
        while start.elapsed() < timeout {
            if let Ok(response) = client.get(format!("{}/", self.base_url)).send().await {
                if response.status().is_success() {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("Server did not become ready within {:?}", timeout);
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

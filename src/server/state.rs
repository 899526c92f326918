use axum::extract::FromRef;

use crate::render::{RenderCache, ScoreRenderer};
use crate::song_store::SongStore;
use crate::transcription::TranscriptionPipeline;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use super::ServerConfig;

pub type GuardedSongStore = Arc<dyn SongStore>;
pub type GuardedPipeline = Arc<TranscriptionPipeline>;
pub type GuardedRenderer = Arc<dyn ScoreRenderer>;
pub type GuardedRenderCache = Arc<Mutex<RenderCache>>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub hash: String,
    pub song_store: GuardedSongStore,
    pub pipeline: GuardedPipeline,
    pub renderer: GuardedRenderer,
    pub render_cache: GuardedRenderCache,
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        song_store: GuardedSongStore,
        pipeline: TranscriptionPipeline,
        renderer: GuardedRenderer,
        render_cache: RenderCache,
        hash: String,
    ) -> ServerState {
        ServerState {
            config,
            start_time: Instant::now(),
            hash,
            song_store,
            pipeline: Arc::new(pipeline),
            renderer,
            render_cache: Arc::new(Mutex::new(render_cache)),
        }
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for GuardedSongStore {
    fn from_ref(input: &ServerState) -> Self {
        input.song_store.clone()
    }
}

impl FromRef<ServerState> for GuardedPipeline {
    fn from_ref(input: &ServerState) -> Self {
        input.pipeline.clone()
    }
}

impl FromRef<ServerState> for GuardedRenderer {
    fn from_ref(input: &ServerState) -> Self {
        input.renderer.clone()
    }
}

impl FromRef<ServerState> for GuardedRenderCache {
    fn from_ref(input: &ServerState) -> Self {
        input.render_cache.clone()
    }
}

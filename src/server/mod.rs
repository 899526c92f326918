pub mod config;
mod http_layers;
mod song_routes;
pub mod server;
pub mod state;
mod transcription_routes;

pub use config::ServerConfig;
pub use http_layers::*;
pub use server::{make_app, run_server};
pub use state::ServerState;

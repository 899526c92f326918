//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestServer, TestClient, two_tone_wav};
//! use reqwest::StatusCode;
//!
//! #[tokio::test]
//! async fn test_transcribe() {
//!     let server = TestServer::spawn().await;
//!     let client = TestClient::new(server.base_url.clone());
//!
//!     let response = client.transcribe("take.wav", two_tone_wav(), "Take", false).await;
//!     assert_eq!(response.status(), StatusCode::OK);
//! }
//! ```

mod client;
mod constants;
mod fixtures;
mod server;

pub use client::TestClient;
pub use constants::*;
#[allow(unused_imports)]
pub use fixtures::{silent_wav, sine_wav, two_tone_wav};
pub use server::TestServer;

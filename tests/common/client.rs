//! HTTP client for end-to-end tests
//!
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::multipart::{Form, Part};
use reqwest::Response;
use std::time::Duration;

pub struct TestClient {
    pub client: reqwest::Client,
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");
        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1{}", self.base_url, path)
    }

    pub async fn get_keys(&self) -> Response {
        self.client
            .get(self.url("/keys"))
            .send()
            .await
            .expect("GET /keys failed")
    }

    /// Uploads a recording with an optional target key.
    pub async fn transcribe_to(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        title: &str,
        target_key: Option<&str>,
        save: bool,
    ) -> Response {
        let mut form = Form::new()
            .part("file", Part::bytes(bytes).file_name(filename.to_string()))
            .text("title", title.to_string())
            .text("save", save.to_string());
        if let Some(key) = target_key {
            form = form.text("target_key", key.to_string());
        }
        self.client
            .post(self.url("/transcriptions"))
            .multipart(form)
            .send()
            .await
            .expect("POST /transcriptions failed")
    }

    pub async fn transcribe(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        title: &str,
        save: bool,
    ) -> Response {
        self.transcribe_to(filename, bytes, title, None, save).await
    }

    pub async fn list_songs(&self) -> Response {
        self.client
            .get(self.url("/songs"))
            .send()
            .await
            .expect("GET /songs failed")
    }

    pub async fn get_song(&self, id: i64) -> Response {
        self.client
            .get(self.url(&format!("/songs/{}", id)))
            .send()
            .await
            .expect("GET /songs/{id} failed")
    }

    pub async fn delete_song(&self, id: i64) -> Response {
        self.client
            .delete(self.url(&format!("/songs/{}", id)))
            .send()
            .await
            .expect("DELETE /songs/{id} failed")
    }
}

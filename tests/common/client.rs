//! HTTP client for end-to-end tests
//!
//! One method per API endpoint, returning the raw response so tests can
//! assert on status codes as well as bodies.

use super::constants::REQUEST_TIMEOUT_SECS;
use reqwest::{Client, Response};
use std::time::Duration;

pub struct TestClient {
    client: Client,
    base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");
        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed")
    }

    async fn post(&self, path: &str) -> Response {
        self.client
            .post(self.url(path))
            .send()
            .await
            .expect("POST request failed")
    }

    /// GET /
    pub async fn home(&self) -> Response {
        self.get("/").await
    }

    /// POST /api/refresh
    pub async fn refresh(&self, force: bool) -> Response {
        if force {
            self.post("/api/refresh?force=true").await
        } else {
            self.post("/api/refresh").await
        }
    }

    /// GET /api/stats
    pub async fn stats(&self) -> Response {
        self.get("/api/stats").await
    }

    /// GET /api/stories with a raw query string, e.g. `page=2&limit=1`
    pub async fn stories(&self, query: &str) -> Response {
        if query.is_empty() {
            self.get("/api/stories").await
        } else {
            self.get(&format!("/api/stories?{}", query)).await
        }
    }

    /// GET /api/story/{id}
    pub async fn story(&self, id: i64) -> Response {
        self.get(&format!("/api/story/{}", id)).await
    }

    /// GET /api/last-updated
    pub async fn last_updated(&self) -> Response {
        self.get("/api/last-updated").await
    }

    /// GET /api/health
    pub async fn health(&self) -> Response {
        self.get("/api/health").await
    }

    /// GET /api/jobs
    pub async fn jobs(&self) -> Response {
        self.get("/api/jobs").await
    }

    /// POST /api/jobs/{id}/trigger
    pub async fn trigger_job(&self, job_id: &str) -> Response {
        self.post(&format!("/api/jobs/{}/trigger", job_id)).await
    }
}

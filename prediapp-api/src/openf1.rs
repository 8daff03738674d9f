//! openf1.org timing API client
//!
//! Fetches position changes and lap times for a session. The API is
//! modelled as a trait so the ingestor can be exercised against recorded
//! data in tests.
//!
//! Endpoints used:
//! - `GET /position?session_key={k}` — one record per position change
//! - `GET /laps?session_key={k}&driver_number={n}` — all laps for a driver

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use prediapp_common::{Error, Result};

/// General request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for result fetches, which can return thousands of records
const RESULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// One position-change record from the `/position` endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct PositionUpdate {
    pub driver_number: i64,
    pub position: Option<i64>,
    #[serde(default)]
    pub date: Option<String>,
}

/// One lap record from the `/laps` endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct Lap {
    #[serde(default)]
    pub lap_number: Option<i64>,
    pub lap_duration: Option<f64>,
}

/// Read access to the external timing API
#[async_trait]
pub trait TimingApi: Send + Sync {
    /// All position-change records for a session, in stream order
    async fn positions(&self, session_key: i64) -> Result<Vec<PositionUpdate>>;

    /// All laps for one driver in a session
    async fn laps(&self, session_key: i64, driver_number: i64) -> Result<Vec<Lap>>;
}

/// HTTP client for api.openf1.org
pub struct OpenF1Client {
    http_client: Client,
    base_url: String,
}

impl OpenF1Client {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http_client: Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.into(),
        }
    }

    async fn fetch_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<T> {
        let response = self
            .http_client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::BadGateway(format!("timing API request timed out: {url}"))
                } else {
                    Error::BadGateway(format!("timing API request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::BadGateway(format!(
                "timing API returned {status} for {url}: {body}"
            )));
        }

        response.json::<T>().await.map_err(|e| {
            Error::BadGateway(format!("malformed timing API response from {url}: {e}"))
        })
    }
}

#[async_trait]
impl TimingApi for OpenF1Client {
    async fn positions(&self, session_key: i64) -> Result<Vec<PositionUpdate>> {
        let url = format!("{}/position?session_key={}", self.base_url, session_key);
        self.fetch_json(&url, RESULT_FETCH_TIMEOUT).await
    }

    async fn laps(&self, session_key: i64, driver_number: i64) -> Result<Vec<Lap>> {
        let url = format!(
            "{}/laps?session_key={}&driver_number={}",
            self.base_url, session_key, driver_number
        );
        self.fetch_json(&url, DEFAULT_TIMEOUT).await
    }
}

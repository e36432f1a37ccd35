use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

use super::{FetchError, ResourceSource};

/// Unauthenticated HTTP GET transport with a request timeout.
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ResourceSource for HttpSource {
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| network_error(url, &e))?;
        if let Some(err) = classify_status(url, resp.status().as_u16()) {
            return Err(err);
        }
        resp.text().await.map_err(|e| network_error(url, &e))
    }
}

/// Map a non-success HTTP status onto a fetch failure.
pub fn classify_status(url: &str, status: u16) -> Option<FetchError> {
    match status {
        200..=299 => None,
        404 | 410 => Some(FetchError::NotFound {
            url: url.to_string(),
        }),
        _ => Some(FetchError::Network {
            url: url.to_string(),
            reason: format!("HTTP {status}"),
        }),
    }
}

fn network_error(url: &str, err: &reqwest::Error) -> FetchError {
    let reason = if err.is_timeout() {
        format!("timed out: {err}")
    } else if err.is_connect() {
        format!("connect failed: {err}")
    } else {
        err.to_string()
    };
    FetchError::Network {
        url: url.to_string(),
        reason,
    }
}

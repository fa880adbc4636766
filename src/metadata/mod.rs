use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use reqwest::{Client, Url};
use tracing::{debug, error};

use crate::{config::Config, sensors::NOT_READY};

/// HTTP client for the device metadata endpoint (battery level and friends).
///
/// Independent of the stream and the cache: a slow or failing request never
/// touches either.
#[derive(Debug, Clone)]
pub struct MetadataClient {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    http: Client,
    endpoint: Url,
}

impl MetadataClient {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_endpoint(config.metadata_url.clone(), config.metadata_timeout)
    }

    pub fn with_endpoint(endpoint: Url, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build metadata HTTP client")?;
        Ok(Self {
            inner: Arc::new(Inner { http, endpoint }),
        })
    }

    /// Fetch metadata for `name` and return the response body as compact JSON
    /// text, or [`NOT_READY`] if anything goes wrong. Never fails.
    pub async fn fetch_device_info(&self, name: &str) -> String {
        match self.try_fetch(name).await {
            Ok(body) => body,
            Err(e) => {
                error!(device = %name, error = %format!("{e:#}"), "Device info fetch failed");
                NOT_READY.to_owned()
            }
        }
    }

    async fn try_fetch(&self, name: &str) -> Result<String> {
        let url = Url::parse_with_params(self.inner.endpoint.as_str(), &[("name", name)])
            .context("Failed to build device info URL")?;
        debug!(device = %name, url = %url, "Fetching device info");

        let bytes = self
            .inner
            .http
            .get(url)
            .send()
            .await
            .context("Device info request failed")?
            .error_for_status()
            .context("Device info endpoint returned error status")?
            .bytes()
            .await
            .context("Failed to read device info response body")?;

        let body = serde_json::from_slice::<serde_json::Value>(&bytes)
            .context("Device info response is not JSON")?;

        debug!(device = %name, bytes = bytes.len(), "Device info received");
        Ok(body.to_string())
    }
}

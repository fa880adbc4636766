use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Url;

pub const DEFAULT_STREAM_URL: &str = "ws://localhost:50500/rab";
pub const DEFAULT_METADATA_URL: &str = "http://localhost:50500/rab/battery";

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    /// WebSocket endpoint streaming readings.
    pub stream_url: Url,
    /// Device info endpoint; the device name is appended as `?name=`.
    pub metadata_url: Url,
    pub metadata_timeout: Duration,
    /// Delay before reopening a dropped stream. `None` disables reconnecting.
    pub reconnect_delay: Option<Duration>,
    pub server_host: String,
    pub server_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let optional = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_owned());

        Ok(Self {
            stream_url: parse_url(
                "RABBONI_STREAM_URL",
                &optional("RABBONI_STREAM_URL", DEFAULT_STREAM_URL),
                &["ws", "wss"],
            )?,
            metadata_url: parse_url(
                "RABBONI_METADATA_URL",
                &optional("RABBONI_METADATA_URL", DEFAULT_METADATA_URL),
                &["http", "https"],
            )?,
            metadata_timeout: Duration::from_secs(
                optional("METADATA_TIMEOUT_SECS", "10")
                    .parse()
                    .context("METADATA_TIMEOUT_SECS must be a positive integer")?,
            ),
            reconnect_delay: parse_reconnect_delay(&optional("RECONNECT_DELAY_SECS", "0"))?,
            server_host: optional("SERVER_HOST", "127.0.0.1"),
            server_port: optional("SERVER_PORT", "8080")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stream_url: Url::parse(DEFAULT_STREAM_URL).expect("default stream URL is valid"),
            metadata_url: Url::parse(DEFAULT_METADATA_URL).expect("default metadata URL is valid"),
            metadata_timeout: Duration::from_secs(10),
            reconnect_delay: None,
            server_host: "127.0.0.1".to_owned(),
            server_port: 8080,
        }
    }
}

fn parse_url(key: &str, raw: &str, schemes: &[&str]) -> Result<Url> {
    let url = Url::parse(raw).with_context(|| format!("{key} is not a valid URL: {raw:?}"))?;
    if !schemes.contains(&url.scheme()) {
        bail!("{key} must use one of {schemes:?}, got {:?}", url.scheme());
    }
    Ok(url)
}

/// `0` turns reconnecting off.
fn parse_reconnect_delay(raw: &str) -> Result<Option<Duration>> {
    let secs: u64 = raw
        .parse()
        .context("RECONNECT_DELAY_SECS must be a non-negative integer")?;
    Ok((secs > 0).then(|| Duration::from_secs(secs)))
}

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use super::{Connection, ConnectionState, TransportEvent};
use crate::reading_cache::ReadingCache;

/// One stream connection together with the cache it fills.
///
/// Each session starts with an empty cache; reconnecting means opening a new
/// session, never reusing the old cache.
#[derive(Debug)]
pub struct LiveSession {
    connection: Connection,
    cache: ReadingCache,
    drained: watch::Receiver<bool>,
}

impl LiveSession {
    pub fn open(url: &str) -> Self {
        let cache = ReadingCache::new();
        let (connection, events) = Connection::open(url);
        let (drained_tx, drained) = watch::channel(false);

        {
            let cache = cache.clone();
            let url = url.to_owned();
            tokio::spawn(async move {
                process_events(&url, events, &cache).await;
                drained_tx.send_replace(true);
            });
        }

        Self {
            connection,
            cache,
            drained,
        }
    }

    pub fn cache(&self) -> &ReadingCache {
        &self.cache
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn url(&self) -> &str {
        self.connection.url()
    }

    /// Idempotent; see [`Connection::close`].
    pub fn close(&self) {
        self.connection.close();
    }

    /// Resolves once the connection is closed and every message it delivered
    /// has been applied to the cache.
    pub async fn closed(&self) {
        self.connection.closed().await;
        let mut drained = self.drained.clone();
        let _ = drained.wait_for(|done| *done).await;
    }
}

/// Apply stream events to `cache` one at a time, in arrival order, until the
/// transport hangs up.
pub async fn process_events(
    url: &str,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    cache: &ReadingCache,
) {
    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::Opened => info!(url = %url, "Receiving readings"),
            TransportEvent::Message(payload) => match cache.apply(&payload) {
                Ok(name) => debug!(device = %name, "Reading applied"),
                Err(e) => warn!(error = %e, bytes = payload.len(), "Dropping malformed reading"),
            },
            TransportEvent::Error(e) => error!(url = %url, error = %e, "Stream error"),
            TransportEvent::Closed => {
                info!(url = %url, devices = cache.len(), "Stream ended; cached readings kept");
            }
        }
    }
}

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, PoisonError, RwLock,
    },
    time::Duration,
};

use anyhow::Result;
use reqwest::Url;
use tokio::time;
use tracing::{info, warn};

use crate::{
    config::Config,
    metadata::MetadataClient,
    reading_cache::ReadingCache,
    sensors::Queries,
    stream::{ConnectionState, LiveSession},
};

/// One running instance: a live stream session plus the metadata client.
///
/// Nothing is global; two bridges never share readings.
#[derive(Debug)]
pub struct Bridge {
    stream_url: Url,
    metadata: MetadataClient,
    session: RwLock<Arc<LiveSession>>,
    shut_down: AtomicBool,
}

impl Bridge {
    /// Build the metadata client and open the first stream session.
    /// Must be called from within a Tokio runtime.
    pub fn start(config: &Config) -> Result<Self> {
        let metadata = MetadataClient::new(config)?;
        let session = LiveSession::open(config.stream_url.as_str());
        Ok(Self {
            stream_url: config.stream_url.clone(),
            metadata,
            session: RwLock::new(Arc::new(session)),
            shut_down: AtomicBool::new(false),
        })
    }

    fn current(&self) -> Arc<LiveSession> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Cache of the current session. A reconnect swaps in a new one, so hold
    /// on to the result only as long as a single query needs it.
    pub fn cache(&self) -> ReadingCache {
        self.current().cache().clone()
    }

    pub fn queries(&self) -> Queries {
        Queries::new(self.cache())
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.current().state()
    }

    pub async fn device_info(&self, name: &str) -> String {
        self.metadata.fetch_device_info(name).await
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Replace the current session with a fresh one (and a fresh, empty
    /// cache). Returns `false` without doing anything after `shutdown`.
    pub fn reconnect(&self) -> bool {
        if self.is_shut_down() {
            return false;
        }

        let fresh = Arc::new(LiveSession::open(self.stream_url.as_str()));
        let old = std::mem::replace(
            &mut *self.session.write().unwrap_or_else(PoisonError::into_inner),
            fresh.clone(),
        );
        old.close();
        info!(url = %self.stream_url, "Stream session replaced");

        // Lost a race with `shutdown`.
        if self.is_shut_down() {
            fresh.close();
            return false;
        }
        true
    }

    /// Close the stream for good. Safe to call any number of times.
    pub fn shutdown(&self) {
        if !self.shut_down.swap(true, Ordering::SeqCst) {
            info!(url = %self.stream_url, "Shutting down bridge");
        }
        self.current().close();
    }

    /// Reopen the stream `delay` after each disconnect until `shutdown`.
    /// Spawn this via `tokio::spawn`.
    pub async fn supervise(self: Arc<Self>, delay: Duration) {
        info!(delay_secs = delay.as_secs_f64(), "Reconnect supervisor started");

        loop {
            let session = self.current();
            session.closed().await;

            if self.is_shut_down() {
                break;
            }
            // Someone already reconnected by hand; watch the new session.
            if !Arc::ptr_eq(&session, &self.current()) {
                continue;
            }

            warn!(
                url = %self.stream_url,
                delay_secs = delay.as_secs_f64(),
                "Stream closed; reconnecting"
            );
            time::sleep(delay).await;

            if !self.reconnect() {
                break;
            }
        }

        info!("Reconnect supervisor stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::future::pending;

    use axum::{routing::get, Router};
    use futures::{SinkExt, StreamExt};
    use tokio::{
        net::TcpListener,
        sync::{oneshot, Notify},
        time::timeout,
    };
    use tokio_tungstenite::{accept_async, tungstenite::Message};

    use super::*;
    use crate::{
        sensors::{QueryValue, NOT_READY},
        stream::tests::unreachable_url,
    };

    const WAIT: Duration = Duration::from_secs(5);

    fn reading(name: &str, stored: u64) -> Message {
        Message::text(
            serde_json::json!({
                "name": name, "acc": [1, 2, 3], "gyr": [4, 5, 6],
                "trigger": true, "count": [0, stored],
            })
            .to_string(),
        )
    }

    /// Serve one script per accepted connection. `true` closes the socket after
    /// sending, `false` keeps it open until the client leaves.
    async fn serve_sessions(scripts: Vec<(Vec<Message>, bool)>) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            for (frames, close_after) in scripts {
                let (stream, _) = listener.accept().await.unwrap();
                tokio::spawn(async move {
                    let mut ws = accept_async(stream).await.unwrap();
                    for frame in frames {
                        ws.send(frame).await.unwrap();
                    }
                    if close_after {
                        let _ = ws.close(None).await;
                    } else {
                        while let Some(Ok(_)) = ws.next().await {}
                    }
                });
            }
        });
        format!("ws://{addr}/rab").parse().unwrap()
    }

    fn config(stream_url: Url) -> Config {
        Config {
            stream_url,
            ..Config::default()
        }
    }

    async fn eventually(mut check: impl FnMut() -> bool) {
        timeout(WAIT, async {
            while !check() {
                time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn unreachable_stream_degrades_to_not_ready() {
        let url: Url = unreachable_url("ws").await.parse().unwrap();
        let bridge = Bridge::start(&config(url)).unwrap();

        eventually(|| bridge.connection_state() == ConnectionState::Closed).await;
        let q = bridge.queries();
        assert_eq!(q.status("RAB"), QueryValue::NotReady);
        assert_eq!(q.stored_count("RAB").to_string(), NOT_READY);

        bridge.shutdown();
        bridge.shutdown();
        assert!(bridge.is_shut_down());
        assert!(!bridge.reconnect());
    }

    #[tokio::test]
    async fn instances_do_not_share_readings() {
        let url: Url = unreachable_url("ws").await.parse().unwrap();
        let a = Bridge::start(&config(url.clone())).unwrap();
        let b = Bridge::start(&config(url)).unwrap();

        a.cache()
            .apply(r#"{"name":"RAB","acc":[1,2,3],"gyr":[4,5,6],"trigger":true,"count":[0,7]}"#)
            .unwrap();

        assert_eq!(a.queries().stored_count("RAB"), QueryValue::Number(7.0));
        assert_eq!(b.queries().stored_count("RAB"), QueryValue::NotReady);
    }

    #[tokio::test]
    async fn reconnect_starts_with_an_empty_cache() {
        let url = serve_sessions(vec![(vec![reading("RAB", 7)], false), (vec![], false)]).await;
        let bridge = Bridge::start(&config(url)).unwrap();

        eventually(|| bridge.cache().get("RAB").is_some()).await;
        let old_cache = bridge.cache();

        assert!(bridge.reconnect());
        assert!(bridge.cache().is_empty());
        assert_eq!(bridge.queries().trigger("RAB"), QueryValue::NotReady);
        // The replaced cache is detached, not cleared.
        assert_eq!(old_cache.len(), 1);

        eventually(|| bridge.connection_state() == ConnectionState::Open).await;
        bridge.shutdown();
        eventually(|| bridge.connection_state() == ConnectionState::Closed).await;
    }

    #[tokio::test]
    async fn pending_device_info_does_not_block_readings() {
        // Metadata endpoint that accepts the request and never answers.
        let arrived = Arc::new(Notify::new());
        let router = {
            let arrived = arrived.clone();
            Router::new().route(
                "/rab/battery",
                get(move || {
                    let arrived = arrived.clone();
                    async move {
                        arrived.notify_one();
                        pending::<()>().await;
                        "unreachable"
                    }
                }),
            )
        };
        let http = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let metadata_url: Url = format!("http://{}/rab/battery", http.local_addr().unwrap())
            .parse()
            .unwrap();
        tokio::spawn(async move { axum::serve(http, router).await.unwrap() });

        // Stream that sends one reading only when told to.
        let (go_tx, go_rx) = oneshot::channel::<()>();
        let ws_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let stream_url: Url = format!("ws://{}/rab", ws_listener.local_addr().unwrap())
            .parse()
            .unwrap();
        tokio::spawn(async move {
            let (stream, _) = ws_listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            go_rx.await.unwrap();
            ws.send(reading("RAB2", 3)).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let bridge = Arc::new(
            Bridge::start(&Config {
                stream_url,
                metadata_url,
                metadata_timeout: Duration::from_secs(60),
                ..Config::default()
            })
            .unwrap(),
        );
        eventually(|| bridge.connection_state() == ConnectionState::Open).await;

        let fetch = {
            let bridge = bridge.clone();
            tokio::spawn(async move { bridge.device_info("RAB").await })
        };
        timeout(WAIT, arrived.notified()).await.unwrap();

        bridge
            .cache()
            .apply(r#"{"name":"RAB","acc":[1,2,3],"gyr":[4,5,6],"trigger":true,"count":[0,7]}"#)
            .unwrap();
        assert_eq!(bridge.queries().stored_count("RAB"), QueryValue::Number(7.0));

        go_tx.send(()).unwrap();
        eventually(|| bridge.cache().get("RAB2").is_some()).await;
        assert_eq!(bridge.queries().stored_count("RAB2"), QueryValue::Number(3.0));

        assert!(!fetch.is_finished());
        fetch.abort();
        bridge.shutdown();
    }

    #[tokio::test]
    async fn supervisor_reopens_dropped_stream() {
        let url = serve_sessions(vec![
            (vec![reading("RAB", 1)], true),
            (vec![reading("RAB2", 2)], false),
        ])
        .await;
        let bridge = Arc::new(Bridge::start(&config(url)).unwrap());
        let supervisor = tokio::spawn(bridge.clone().supervise(Duration::from_millis(10)));

        eventually(|| bridge.cache().get("RAB2").is_some()).await;
        assert!(bridge.cache().get("RAB").is_none());
        assert_eq!(bridge.queries().stored_count("RAB2"), QueryValue::Number(2.0));

        bridge.shutdown();
        timeout(WAIT, supervisor).await.unwrap().unwrap();
    }
}

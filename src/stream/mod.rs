//! WebSocket connection to the local Rabboni stream service.
//!
//! A [`Connection`] owns one socket driven by a background task. The task
//! publishes its [`ConnectionState`] through a `watch` channel and forwards
//! every lifecycle step as a [`TransportEvent`], in arrival order, over an
//! unbounded channel:
//!
//! ```text
//! Connecting ──handshake ok──▶ Open ──remote close / error / close()──▶ Closed
//!      └────────────connect error / close()─────────────────────────────▲
//! ```

pub mod session;

use std::sync::{Mutex, PoisonError};

use futures::StreamExt;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;

pub use session::LiveSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Message(String),
    Error(String),
    /// Always the last event of a connection.
    Closed,
}

#[derive(Debug)]
pub struct Connection {
    url: String,
    state: watch::Receiver<ConnectionState>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
}

impl Connection {
    /// Start connecting to `url` in the background.
    ///
    /// Returns immediately in the `Connecting` state. Must be called from
    /// within a Tokio runtime. Dropping the `Connection` tears the socket down.
    pub fn open(url: &str) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        info!(url = %url, "Opening stream connection");
        tokio::spawn(drive(url.to_owned(), state_tx, events_tx, shutdown_rx));

        let connection = Self {
            url: url.to_owned(),
            state: state_rx,
            shutdown: Mutex::new(Some(shutdown_tx)),
        };
        (connection, events_rx)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Request teardown. Never fails; every call after the first, and any call
    /// once the connection has closed on its own, is a no-op.
    pub fn close(&self) {
        let shutdown = self
            .shutdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match shutdown {
            Some(tx) if self.state() != ConnectionState::Closed => {
                info!(url = %self.url, state = ?self.state(), "Closing stream connection");
                // The task may have exited between the state check and here.
                let _ = tx.send(());
            }
            _ => debug!(url = %self.url, "Stream connection already closed"),
        }
    }

    /// Resolves once the connection has reached `Closed`.
    pub async fn closed(&self) {
        let mut state = self.state.clone();
        // Err means the driver is gone, which only happens after it published `Closed`.
        let _ = state.wait_for(|s| *s == ConnectionState::Closed).await;
    }
}

fn emit(events: &mpsc::UnboundedSender<TransportEvent>, event: TransportEvent) {
    // The consumer going away is not an error for the socket.
    let _ = events.send(event);
}

async fn drive(
    url: String,
    state: watch::Sender<ConnectionState>,
    events: mpsc::UnboundedSender<TransportEvent>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let connected = tokio::select! {
        res = connect_async(url.as_str()) => res,
        _ = &mut shutdown => {
            info!(url = %url, "Stream connection closed before it opened");
            finish(&url, &state, &events);
            return;
        }
    };

    let mut socket = match connected {
        Ok((socket, _response)) => socket,
        Err(e) => {
            error!(url = %url, error = %e, "Stream connection failed");
            emit(&events, TransportEvent::Error(e.to_string()));
            finish(&url, &state, &events);
            return;
        }
    };

    state.send_replace(ConnectionState::Open);
    emit(&events, TransportEvent::Opened);
    info!(url = %url, "Stream connection open");

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                if let Err(e) = socket.close(None).await {
                    debug!(url = %url, error = %e, "Close handshake did not complete");
                }
                break;
            }
            frame = socket.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    emit(&events, TransportEvent::Message(text.as_str().to_owned()));
                }
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => emit(&events, TransportEvent::Message(text)),
                    Err(e) => {
                        warn!(url = %url, error = %e, "Skipping binary frame that is not UTF-8");
                        emit(&events, TransportEvent::Error(e.to_string()));
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    info!(url = %url, frame = ?frame, "Stream closed by server");
                    // Flush the close reply tungstenite queued when the frame arrived.
                    if let Err(e) = socket.close(None).await {
                        debug!(url = %url, error = %e, "Close reply not delivered");
                    }
                    break;
                }
                // Ping/pong are answered by tungstenite itself.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!(url = %url, error = %e, "Stream connection error");
                    emit(&events, TransportEvent::Error(e.to_string()));
                    break;
                }
                None => break,
            }
        }
    }

    finish(&url, &state, &events);
}

fn finish(
    url: &str,
    state: &watch::Sender<ConnectionState>,
    events: &mpsc::UnboundedSender<TransportEvent>,
) {
    state.send_replace(ConnectionState::Closed);
    emit(events, TransportEvent::Closed);
    info!(url = %url, "Stream connection closed");
}

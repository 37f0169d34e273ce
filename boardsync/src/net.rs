//! Networking bridge between the board state and the sync channel.
//!
//! Owns the WebSocket in background tokio tasks and talks to the
//! caller over channels:
//!
//! ```text
//! caller (sync loop)  ←── NetEvent ───  tokio background tasks
//!                      ─── NetCommand →
//! ```
//!
//! The caller sends [`NetCommand`]s (mutation requests) and drains
//! [`NetEvent`]s (server events, disconnection). Requests are
//! fire-and-forget; confirmation arrives as broadcast events, never
//! as a response.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;

use boardsync_proto::actor::Actor;
use boardsync_proto::wire::{self, BoardEvent, ClientRequest};

/// Commands sent from the caller to the networking background tasks.
#[derive(Debug)]
pub enum NetCommand {
    /// Send a mutation request on the sync channel.
    Send(ClientRequest),
    /// Gracefully shut down the networking tasks.
    Shutdown,
}

/// Events sent from the networking background tasks to the caller.
#[derive(Debug)]
pub enum NetEvent {
    /// A server event arrived on the sync channel (the snapshot bulk
    /// that follows the greeting comes through here too).
    Board(BoardEvent),
    /// The sync channel closed; local state may silently diverge until
    /// a reconnect delivers a fresh snapshot.
    Disconnected,
}

/// Configuration for one sync-channel connection.
#[derive(Debug, Clone)]
pub struct NetConfig {
    /// WebSocket URL of the board server (e.g., `ws://127.0.0.1:9100/ws`).
    pub server_url: String,
    /// Identity token sent in the hello frame.
    pub token: String,
    /// Channel capacity for command/event mpsc channels.
    pub channel_capacity: usize,
}

/// Default channel capacity for commands and events.
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

impl NetConfig {
    /// Creates a `NetConfig` with the default channel capacity.
    #[must_use]
    pub const fn new(server_url: String, token: String) -> Self {
        Self {
            server_url,
            token,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Errors establishing the sync channel.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// The server URL is not a valid URL.
    #[error("invalid server url {url:?}: {source}")]
    InvalidUrl {
        /// The offending URL string.
        url: String,
        /// Underlying parse error.
        source: url::ParseError,
    },
    /// The WebSocket connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),
    /// The hello handshake failed (closed early or rejected token).
    #[error("handshake failed: {0}")]
    Handshake(String),
}

/// Connects to the board server, authenticates, and spawns the
/// background tasks. Returns the command sender, the event receiver,
/// and the authenticated identity echoed by the server.
///
/// The first [`NetEvent`]s the receiver yields are the snapshot bulk
/// and any live events after it; the greeting itself is consumed here
/// and surfaced as the returned [`Actor`].
///
/// # Errors
///
/// Returns [`NetError`] if the URL is invalid, the connection cannot
/// be established, or the server rejects the hello.
pub async fn spawn_net(
    config: NetConfig,
) -> Result<(mpsc::Sender<NetCommand>, mpsc::Receiver<NetEvent>, Actor), NetError> {
    url::Url::parse(&config.server_url).map_err(|source| NetError::InvalidUrl {
        url: config.server_url.clone(),
        source,
    })?;

    let (ws, _) = tokio_tungstenite::connect_async(&config.server_url)
        .await
        .map_err(|e| NetError::Connect(e.to_string()))?;
    let (mut ws_sender, mut ws_receiver) = ws.split();

    // Authenticate: hello out, greeting (or rejection) back.
    let hello = ClientRequest::Hello {
        token: config.token.clone(),
    };
    let json = wire::encode_request(&hello).map_err(|e| NetError::Handshake(e.to_string()))?;
    ws_sender
        .send(tungstenite::Message::Text(json.into()))
        .await
        .map_err(|e| NetError::Connect(e.to_string()))?;

    let actor = loop {
        let Some(msg) = ws_receiver.next().await else {
            return Err(NetError::Handshake("connection closed during hello".into()));
        };
        let msg = msg.map_err(|e| NetError::Connect(e.to_string()))?;
        match msg {
            tungstenite::Message::Text(text) => {
                match wire::decode_event(text.as_str())
                    .map_err(|e| NetError::Handshake(e.to_string()))?
                {
                    BoardEvent::Connected { actor } => break actor,
                    BoardEvent::Error { code, reason } => {
                        return Err(NetError::Handshake(format!("{code}: {reason}")));
                    }
                    other => {
                        return Err(NetError::Handshake(format!(
                            "unexpected event before greeting: {other:?}"
                        )));
                    }
                }
            }
            tungstenite::Message::Close(_) => {
                return Err(NetError::Handshake("server closed during hello".into()));
            }
            _ => {
                // Skip ping/pong frames during the handshake.
            }
        }
    };

    tracing::info!(actor = %actor, url = %config.server_url, "sync channel established");

    let (cmd_tx, mut cmd_rx) = mpsc::channel::<NetCommand>(config.channel_capacity);
    let (evt_tx, evt_rx) = mpsc::channel::<NetEvent>(config.channel_capacity);

    // Reader: decode server events and forward them to the caller.
    tokio::spawn(async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(tungstenite::Message::Text(text)) => {
                    match wire::decode_event(text.as_str()) {
                        Ok(event) => {
                            if evt_tx.send(NetEvent::Board(event)).await.is_err() {
                                // Caller dropped; exit.
                                return;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "undecodable server event");
                        }
                    }
                }
                Ok(tungstenite::Message::Close(_)) | Err(_) => break,
                Ok(_) => {
                    // Ignore binary, ping, pong frames.
                }
            }
        }
        let _ = evt_tx.send(NetEvent::Disconnected).await;
    });

    // Writer: encode caller requests onto the socket.
    tokio::spawn(async move {
        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                NetCommand::Send(request) => match wire::encode_request(&request) {
                    Ok(json) => {
                        if ws_sender
                            .send(tungstenite::Message::Text(json.into()))
                            .await
                            .is_err()
                        {
                            tracing::warn!("sync channel write failed");
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "failed to encode request");
                    }
                },
                NetCommand::Shutdown => {
                    tracing::debug!("net command handler shutting down");
                    let _ = ws_sender.send(tungstenite::Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    Ok((cmd_tx, evt_rx, actor))
}

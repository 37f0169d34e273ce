//! Board server core: shared state, WebSocket sync channel, and
//! broadcaster.
//!
//! Every client holds one persistent WebSocket. The first frame must
//! be a `hello` carrying an identity token; once authenticated, the
//! connection receives a greeting plus a full-board snapshot, then a
//! live stream of change events. Mutation requests arrive on the same
//! channel, are gated by the authorization policy, committed through
//! the [`Board`], and broadcast to every connection — including the
//! initiator, whose optimistic local state the broadcast supersedes.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, RwLock, mpsc};

use boardsync_proto::actor::Actor;
use boardsync_proto::task::{Task, TaskStatus};
use boardsync_proto::wire::{self, BoardEvent, ClientRequest, ErrorCode};

use crate::auth::AuthProvider;
use crate::board::{Board, BoardError};

/// One registered sync-channel connection.
struct Connection {
    sender: mpsc::UnboundedSender<Message>,
    actor: Actor,
}

/// Shared server state: the authoritative board and the connection
/// registry the broadcaster fans out to.
pub struct ServerState {
    /// The authoritative task store.
    pub board: Board,
    /// Registered connections by connection id.
    connections: RwLock<HashMap<u64, Connection>>,
    /// Source of connection ids.
    next_connection_id: AtomicU64,
    /// Serializes commit-plus-broadcast, so every client observes
    /// events in commit order.
    commit_gate: Mutex<()>,
    /// Identity collaborator.
    auth: Box<dyn AuthProvider>,
}

impl ServerState {
    /// Creates server state with an empty board and the given identity
    /// provider.
    pub fn new(auth: impl AuthProvider + 'static) -> Self {
        Self {
            board: Board::new(),
            connections: RwLock::new(HashMap::new()),
            next_connection_id: AtomicU64::new(1),
            commit_gate: Mutex::new(()),
            auth: Box::new(auth),
        }
    }

    /// Registers a connection, returning its id.
    async fn register(&self, actor: Actor, sender: mpsc::UnboundedSender<Message>) -> u64 {
        let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        let mut conns = self.connections.write().await;
        conns.insert(id, Connection { sender, actor });
        id
    }

    /// Removes a connection from the registry.
    async fn unregister(&self, connection_id: u64) {
        let mut conns = self.connections.write().await;
        conns.remove(&connection_id);
    }

    /// Number of currently registered connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Sends an event to every registered connection.
    ///
    /// Connections whose channel is gone are pruned afterwards; their
    /// socket tasks are already shutting down.
    async fn broadcast(&self, event: &BoardEvent) {
        let json = match wire::encode_event(event) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode broadcast event");
                return;
            }
        };
        let mut dead = Vec::new();
        {
            let conns = self.connections.read().await;
            for (id, conn) in conns.iter() {
                if conn
                    .sender
                    .send(Message::Text(json.clone().into()))
                    .is_err()
                {
                    dead.push(*id);
                }
            }
        }
        if !dead.is_empty() {
            let mut conns = self.connections.write().await;
            for id in dead {
                tracing::debug!(connection_id = id, "pruning dead connection");
                conns.remove(&id);
            }
        }
    }

    /// Sends an event to a single connection, if still registered.
    async fn send_to(&self, connection_id: u64, event: &BoardEvent) {
        let conns = self.connections.read().await;
        if let Some(conn) = conns.get(&connection_id)
            && let Ok(json) = wire::encode_event(event)
        {
            let _ = conn.sender.send(Message::Text(json.into()));
        }
    }
}

/// Handles an upgraded WebSocket connection for one client.
///
/// Lifecycle:
/// 1. Wait for the `hello` frame and authenticate its token.
/// 2. Register the connection and send `connected` plus the full
///    snapshot, in that order, before any queued broadcast drains.
/// 3. Run reader/writer tasks until either side closes.
/// 4. Unregister.
pub async fn handle_socket(socket: WebSocket, state: Arc<ServerState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let Some(token) = wait_for_hello(&mut ws_receiver).await else {
        tracing::warn!("connection closed before hello");
        return;
    };

    let Some(actor) = state.auth.authenticate(&token) else {
        tracing::warn!("hello with unknown token");
        let rejection = BoardEvent::Error {
            code: ErrorCode::AuthenticationFailed,
            reason: "unknown token".to_string(),
        };
        let _ = send_event(&mut ws_sender, &rejection).await;
        return;
    };

    tracing::info!(actor = %actor, "client authenticated");

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let connection_id = state.register(actor.clone(), tx).await;

    // Greeting and snapshot go out directly, before the writer task
    // starts draining queued broadcasts, so the client always sees the
    // snapshot first. Events committed in between are replayed after
    // it and absorbed by the client's idempotent merge.
    let snapshot = state.board.snapshot().await;
    let greeting = BoardEvent::Connected {
        actor: actor.clone(),
    };
    let bulk = BoardEvent::TaskBulkUpdate {
        tasks: snapshot.tasks,
        revision: snapshot.revision,
    };
    if send_event(&mut ws_sender, &greeting).await.is_err()
        || send_event(&mut ws_sender, &bulk).await.is_err()
    {
        tracing::warn!(connection_id, "failed to send snapshot, dropping connection");
        state.unregister(connection_id).await;
        return;
    }

    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                tracing::debug!("WebSocket write failed");
                break;
            }
        }
    });

    let reader_state = Arc::clone(&state);
    let reader_actor = actor.clone();
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(text) => match wire::decode_request(text.as_str()) {
                    Ok(request) => {
                        handle_request(&reader_state, connection_id, &reader_actor, request).await;
                    }
                    Err(e) => {
                        tracing::warn!(connection_id, error = %e, "undecodable request");
                        let event = BoardEvent::Error {
                            code: ErrorCode::InvalidRequest,
                            reason: format!("undecodable request: {e}"),
                        };
                        reader_state.send_to(connection_id, &event).await;
                    }
                },
                Message::Close(_) => {
                    tracing::debug!(connection_id, "received close frame");
                    break;
                }
                _ => {
                    // Ignore binary, ping, pong frames.
                }
            }
        }
    });

    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    state.unregister(connection_id).await;
    tracing::info!(connection_id, actor = %actor, "client disconnected");
}

/// Waits for the first frame, expecting a `hello` request.
///
/// Returns the token, or `None` if the connection closes first or the
/// first request is anything else.
async fn wait_for_hello(
    receiver: &mut (impl StreamExt<Item = Result<Message, axum::Error>> + Unpin),
) -> Option<String> {
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => match wire::decode_request(text.as_str()) {
                Ok(ClientRequest::Hello { token }) => {
                    if token.is_empty() {
                        tracing::warn!("received hello with empty token");
                        return None;
                    }
                    return Some(token);
                }
                Ok(other) => {
                    tracing::warn!(request = ?other, "expected hello, got different request");
                    return None;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to decode hello");
                    return None;
                }
            },
            Message::Close(_) => return None,
            _ => {
                // Skip non-text frames during the handshake.
            }
        }
    }
    None
}

/// Applies one authenticated client request to the board and fans the
/// outcome out.
///
/// Rejections are sent to the requesting connection only; a rejected
/// reorder additionally receives a corrective snapshot of the columns
/// the optimistic guess touched, rolling the guess back through the
/// ordinary reconciliation path.
async fn handle_request(
    state: &Arc<ServerState>,
    connection_id: u64,
    actor: &Actor,
    request: ClientRequest,
) {
    match request {
        ClientRequest::Hello { .. } => {
            tracing::warn!(connection_id, "duplicate hello on authenticated channel");
        }
        ClientRequest::TaskCreate {
            id, title, status, ..
        } => {
            let _gate = state.commit_gate.lock().await;
            match state.board.create(id, &title, status, actor).await {
                Ok(task) => state.broadcast(&BoardEvent::TaskUpdate { task }).await,
                Err(e) => reject(state, connection_id, &e).await,
            }
        }
        ClientRequest::TaskEdit { task_id, title } => {
            let _gate = state.commit_gate.lock().await;
            match state.board.edit_title(&task_id, &title, actor).await {
                Ok(task) => state.broadcast(&BoardEvent::TaskUpdate { task }).await,
                Err(e) => reject(state, connection_id, &e).await,
            }
        }
        ClientRequest::TaskDelete { task_id } => {
            let _gate = state.commit_gate.lock().await;
            match state.board.delete(&task_id, actor).await {
                Ok(outcome) => {
                    state
                        .broadcast(&BoardEvent::TaskDelete {
                            task_id: outcome.task_id,
                            revision: outcome.revision,
                        })
                        .await;
                    state
                        .broadcast(&BoardEvent::TaskBulkUpdate {
                            tasks: outcome.column,
                            revision: outcome.revision,
                        })
                        .await;
                }
                Err(e) => reject(state, connection_id, &e).await,
            }
        }
        ClientRequest::TaskReorder {
            task_id,
            status,
            order,
        } => {
            let _gate = state.commit_gate.lock().await;
            match state.board.reorder(&task_id, status, order, actor).await {
                Ok(Some(bulk)) => {
                    state
                        .broadcast(&BoardEvent::TaskBulkUpdate {
                            tasks: bulk.tasks,
                            revision: bulk.revision,
                        })
                        .await;
                }
                Ok(None) => {
                    tracing::debug!(task_id = %task_id, "reorder was a no-op");
                }
                Err(e) => {
                    reject(state, connection_id, &e).await;
                    // Roll the requester's optimistic guess back: send
                    // the authoritative state of the columns the move
                    // named, to this connection only.
                    let mut statuses = vec![status];
                    if let Some(source) = state.board.status_of(&task_id).await
                        && !statuses.contains(&source)
                    {
                        statuses.push(source);
                    }
                    let corrective = state.board.columns(&statuses).await;
                    state
                        .send_to(
                            connection_id,
                            &BoardEvent::TaskBulkUpdate {
                                tasks: corrective.tasks,
                                revision: corrective.revision,
                            },
                        )
                        .await;
                }
            }
        }
    }
}

/// Sends a board error to the requesting connection only.
async fn reject(state: &Arc<ServerState>, connection_id: u64, error: &BoardError) {
    tracing::debug!(connection_id, error = %error, "request rejected");
    let event = BoardEvent::Error {
        code: error.code(),
        reason: error.to_string(),
    };
    state.send_to(connection_id, &event).await;
}

/// Encodes and sends an event directly on a WebSocket sender.
async fn send_event(
    ws_sender: &mut (impl SinkExt<Message, Error = axum::Error> + Unpin),
    event: &BoardEvent,
) -> Result<(), String> {
    let json = wire::encode_event(event).map_err(|e| e.to_string())?;
    ws_sender
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| format!("WebSocket send error: {e}"))
}

/// axum handler serving the full task list as JSON (initial load for
/// clients that want state before opening the sync channel).
async fn list_tasks(
    axum::extract::State(state): axum::extract::State<Arc<ServerState>>,
) -> axum::Json<Vec<Task>> {
    axum::Json(state.board.snapshot().await.tasks)
}

/// axum handler that upgrades an HTTP request to the sync channel.
async fn ws_handler(
    ws: axum::extract::ws::WebSocketUpgrade,
    axum::extract::State(state): axum::extract::State<Arc<ServerState>>,
) -> impl axum::response::IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Starts the board server on the given address and returns the bound
/// address and a join handle.
///
/// This is the primary entry point used by both `main.rs` and test
/// code.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the address.
pub async fn start_server(
    addr: &str,
    state: Arc<ServerState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler))
        .route("/tasks", axum::routing::get(list_tasks))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "board server error");
        }
    });

    Ok((bound_addr, handle))
}

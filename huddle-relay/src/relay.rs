//! Relay server core: shared state, WebSocket handler, and event dispatch.
//!
//! The relay accepts WebSocket connections, assigns each one an identity in
//! the [`ConnectionRegistry`], and fans inbound room events out to the right
//! recipients: chat to the whole room, join notices and WebRTC signaling to
//! everyone but the sender. Delivery is best-effort and fire-and-forget;
//! nothing is stored, acknowledged, or retried.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use huddle_proto::codec;
use huddle_proto::signal::{ClientEvent, ServerEvent};
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::RelayConfig;
use crate::registry::ConnectionRegistry;
use crate::upload::{self, UploadConfig};

/// Default maximum allowed frame size in bytes (1 MiB).
const DEFAULT_MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

/// Default origin allowed to open cross-origin connections (the dashboard's
/// dev server).
const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:3000";

/// Shared relay server state holding the connection registry and the static
/// configuration the router needs.
pub struct RelayState {
    /// Live connections and room membership.
    pub registry: ConnectionRegistry,
    /// Upload collaborator settings; unused by the relay core itself.
    pub upload: UploadConfig,
    allowed_origin: String,
    max_payload_size: usize,
}

impl Default for RelayState {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayState {
    /// Creates a new relay state with an empty registry and default limits.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            upload: UploadConfig::default(),
            allowed_origin: DEFAULT_ALLOWED_ORIGIN.to_string(),
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }

    /// Creates a relay state from a resolved [`RelayConfig`].
    #[must_use]
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            upload: UploadConfig {
                dir: config.upload_dir.clone(),
                public_url: config.public_url.clone(),
            },
            allowed_origin: config.allowed_origin.clone(),
            max_payload_size: config.max_payload_size,
        }
    }

    /// Sends a Close frame to all connected clients. Used for graceful
    /// shutdown and testing.
    pub async fn close_all(&self) {
        self.registry.close_all().await;
    }
}

/// Handles an upgraded WebSocket connection for a single client.
///
/// The connection lifecycle:
/// 1. Register with the registry, which assigns the connection identity.
/// 2. Spawn a writer task draining the outbound channel into the socket.
/// 3. Run the reader loop, dispatching each decoded event.
/// 4. On disconnect, unregister — which removes the identity from every room.
pub async fn handle_socket(socket: WebSocket, state: Arc<RelayState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Identity is a side effect of connecting; there is no application-level
    // registration handshake.
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let connection_id = state.registry.register(tx).await;
    tracing::info!(connection_id = %connection_id, "connection established");

    let writer_id = connection_id.clone();
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                tracing::warn!(connection_id = %writer_id, "WebSocket write failed");
                break;
            }
        }
    });

    let reader_id = connection_id.clone();
    let reader_state = Arc::clone(&state);
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if text.len() > reader_state.max_payload_size {
                        tracing::warn!(
                            connection_id = %reader_id,
                            size = text.len(),
                            max = reader_state.max_payload_size,
                            "frame exceeds size limit, dropped"
                        );
                        continue;
                    }
                    handle_text_frame(&reader_id, text.as_str(), &reader_state).await;
                }
                Message::Close(_) => {
                    tracing::info!(connection_id = %reader_id, "received close frame");
                    break;
                }
                _ => {
                    // Ignore binary, ping, pong frames.
                }
            }
        }
    });

    // Wait for either task to finish, then abort the other.
    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    state.registry.unregister(&connection_id).await;
    tracing::info!(connection_id = %connection_id, "connection closed and unregistered");
}

/// Decodes a text frame from a connection and dispatches it.
///
/// Malformed frames — invalid JSON, unknown event names, missing or mistyped
/// fields — are dropped here. The relay has no acknowledgment channel back to
/// the sender, so the drop is silent apart from the log line.
async fn handle_text_frame(connection_id: &str, text: &str, state: &Arc<RelayState>) {
    let event = match codec::decode_client(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(
                connection_id = %connection_id,
                error = %e,
                "failed to decode frame, dropped"
            );
            return;
        }
    };

    tracing::debug!(
        connection_id = %connection_id,
        room = %event.room_id(),
        "dispatching event"
    );
    dispatch(state, connection_id, event).await;
}

/// Routes one inbound event to its recipients.
///
/// The whole routing policy lives in this match: chat is broadcast to the
/// full room including the sender; join notices and peer-signaling events go
/// to everyone else, with the sender's registry-assigned identity stamped on
/// signaling payloads so recipients know which peer to answer.
async fn dispatch(state: &Arc<RelayState>, sender_id: &str, event: ClientEvent) {
    match event {
        ClientEvent::JoinRoom { room_id, user } => {
            if !state.registry.join(sender_id, &room_id).await {
                // Duplicate join: membership unchanged, no repeat notice.
                tracing::debug!(
                    connection_id = %sender_id,
                    room = %room_id,
                    "duplicate join ignored"
                );
                return;
            }
            let notice = ServerEvent::UserJoined {
                socket_id: sender_id.to_string(),
                user,
            };
            broadcast(state, &room_id, Some(sender_id), &notice).await;
        }
        ClientEvent::SendMessage { room_id, message } => {
            broadcast(state, &room_id, None, &ServerEvent::ReceiveMessage { message }).await;
        }
        ClientEvent::Offer { room_id, offer } => {
            let relayed = ServerEvent::Offer {
                offer,
                from: sender_id.to_string(),
            };
            broadcast(state, &room_id, Some(sender_id), &relayed).await;
        }
        ClientEvent::Answer { room_id, answer } => {
            let relayed = ServerEvent::Answer {
                answer,
                from: sender_id.to_string(),
            };
            broadcast(state, &room_id, Some(sender_id), &relayed).await;
        }
        ClientEvent::IceCandidate { room_id, candidate } => {
            let relayed = ServerEvent::IceCandidate {
                candidate,
                from: sender_id.to_string(),
            };
            broadcast(state, &room_id, Some(sender_id), &relayed).await;
        }
    }
}

/// Delivers an event to every member of a room, minus the optional exclusion.
///
/// The event is encoded once; each recipient gets an independent non-blocking
/// channel send, so a slow or vanished recipient cannot stall the others. A
/// room with no recipients is a no-op, not an error.
async fn broadcast(
    state: &Arc<RelayState>,
    room_id: &str,
    exclude: Option<&str>,
    event: &ServerEvent,
) {
    let recipients = state.registry.room_senders(room_id, exclude).await;
    if recipients.is_empty() {
        tracing::debug!(room = %room_id, "no recipients, event dropped");
        return;
    }

    let text = match codec::encode_server(event) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, "failed to encode event for fan-out");
            return;
        }
    };

    for sender in recipients {
        // A closed channel means the recipient is mid-disconnect; the frame
        // is undeliverable and dropped by the transport, not by us.
        let _ = sender.send(Message::Text(text.clone().into()));
    }
}

/// Builds the axum router for the relay: the WebSocket endpoint, the upload
/// collaborator, static serving of uploaded files, and the CORS/trace layers.
///
/// # Errors
///
/// Returns an error if the configured allowed origin is not a valid header
/// value.
pub fn build_router(
    state: Arc<RelayState>,
) -> Result<axum::Router, Box<dyn std::error::Error + Send + Sync>> {
    let origin: axum::http::HeaderValue = state.allowed_origin.parse()?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any);

    Ok(axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler))
        .route("/upload", axum::routing::post(upload::handle_upload))
        .nest_service("/files", ServeDir::new(&state.upload.dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Starts the relay server on the given address and returns the bound address
/// and a join handle.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(RelayState::new())).await
}

/// Starts the relay server with a pre-configured [`RelayState`].
///
/// This is the primary entry point used by both `main.rs` and test code.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind or the configured origin
/// is invalid.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<RelayState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = build_router(state)?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "relay server error");
        }
    });

    Ok((bound_addr, handle))
}

/// axum handler that upgrades an HTTP request to a WebSocket connection.
async fn ws_handler(
    ws: axum::extract::ws::WebSocketUpgrade,
    axum::extract::State(state): axum::extract::State<Arc<RelayState>>,
) -> impl axum::response::IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

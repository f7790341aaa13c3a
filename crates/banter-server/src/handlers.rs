//! Connection handlers for the banter server.
//!
//! This module owns the server edge: the WebSocket loop feeds inbound
//! events to the gateway and drains the per-connection outbound queue.
//! Delivery happens through unbounded per-connection queues, so the
//! gateway's critical section is never held across a socket write.

use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard};
use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use banter_core::{ConnectionId, EventGateway, Outbound};
use banter_protocol::{codec, ClientEvent};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Shared server state.
pub struct AppState {
    /// The coordination core.
    pub gateway: EventGateway,
    /// Outbound queues keyed by connection.
    pub senders: DashMap<ConnectionId, mpsc::UnboundedSender<String>>,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured room set is invalid.
    pub fn new(config: Config) -> Result<Self> {
        let directory = config.chat.directory()?;
        Ok(Self {
            gateway: EventGateway::new(directory),
            senders: DashMap::new(),
            config,
        })
    }

    /// Queue a batch of deliveries.
    ///
    /// Each event is encoded once and cloned per recipient; a recipient
    /// whose queue is gone (mid-disconnect) is skipped.
    fn dispatch(&self, batches: Vec<Outbound>) {
        for batch in batches {
            let text = match codec::encode(&batch.event) {
                Ok(text) => text,
                Err(e) => {
                    error!(error = %e, "Failed to encode outbound event");
                    metrics::record_error("encode");
                    continue;
                }
            };
            for recipient in &batch.recipients {
                if let Some(tx) = self.senders.get(recipient) {
                    if tx.send(text.clone()).is_ok() {
                        metrics::record_delivery();
                    } else {
                        debug!(connection = %recipient, "Outbound queue closed, delivery skipped");
                    }
                }
            }
        }
    }
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let state = Arc::new(AppState::new(config.clone())?);

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    // Build router
    let app = Router::new()
        .route(&config.transport.websocket_path, get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    // Bind and serve
    let addr = config.bind_addr();
    let listener = TcpListener::bind(addr).await?;

    info!("banter relay listening on {}", addr);
    info!(
        "WebSocket endpoint: ws://{}{}",
        addr, config.transport.websocket_path
    );

    axum::serve(listener, app).await?;

    Ok(())
}

/// Liveness endpoint.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::NO_CONTENT, [("x-status", "ok")])
}

/// Query parameters accepted by the WebSocket endpoint.
#[derive(Debug, Deserialize)]
struct ConnectParams {
    /// Display name; reconnecting with the same name keeps the identity.
    username: Option<String>,
}

/// WebSocket upgrade handler.
///
/// The username token is resolved here, before the core ever sees the
/// connection: a missing or blank name gets a generated guest name.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let username = params
        .username
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(guest_username);
    ws.on_upgrade(move |socket| handle_websocket(socket, state, username))
}

/// Generate a display name for a connection that did not supply one.
fn guest_username() -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("guest_{:x}", timestamp & 0xffff_ffff_ffff)
}

/// Handle a WebSocket connection.
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>, username: String) {
    // Record connection metrics
    let _metrics_guard = ConnectionMetricsGuard::new();

    let connection_id = ConnectionId::generate();
    debug!(connection = %connection_id, username = %username, "WebSocket connected");

    // Split the WebSocket
    let (mut sender, mut receiver) = socket.split();

    // Register the outbound queue before the connect event so the presence
    // broadcast reaches this client too.
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    state.senders.insert(connection_id.clone(), tx);

    state.dispatch(state.gateway.on_connect(connection_id.clone(), username));
    metrics::set_online_users(state.gateway.connection_count());

    let mut close_reason = "stream ended";

    // Message processing loop
    loop {
        tokio::select! {
            biased;

            // Drain queued outbound events
            Some(text) = rx.recv() => {
                metrics::record_message(text.len(), "outbound");
                if sender.send(Message::Text(text)).await.is_err() {
                    close_reason = "send failed";
                    break;
                }
            }

            // Receive from WebSocket
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        metrics::record_message(text.len(), "inbound");

                        if text.len() > state.config.limits.max_message_size {
                            warn!(connection = %connection_id, size = text.len(), "Oversized frame dropped");
                            metrics::record_error("oversized");
                            continue;
                        }

                        match codec::decode(&text) {
                            Ok(event) => handle_event(&state, &connection_id, event),
                            Err(e) => {
                                // A bad frame drops the event, not the connection.
                                warn!(connection = %connection_id, error = %e, "Undecodable frame dropped");
                                metrics::record_error("decode");
                            }
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        warn!(connection = %connection_id, "Binary frame dropped");
                        metrics::record_error("binary");
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            close_reason = "send failed";
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        // Ignore pongs
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!(connection = %connection_id, "Received close frame");
                        close_reason = "client closed";
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(connection = %connection_id, error = %e, "WebSocket error");
                        metrics::record_error("websocket");
                        close_reason = "socket error";
                        break;
                    }
                    None => {
                        debug!(connection = %connection_id, "WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    // Remove the queue first so no further deliveries target this socket,
    // then broadcast the updated presence.
    state.senders.remove(&connection_id);
    state.dispatch(state.gateway.on_disconnect(&connection_id, close_reason));
    metrics::set_online_users(state.gateway.connection_count());

    debug!(connection = %connection_id, reason = %close_reason, "WebSocket disconnected");
}

/// Translate one inbound event into gateway calls and queued deliveries.
fn handle_event(state: &AppState, connection_id: &ConnectionId, event: ClientEvent) {
    let batches = match event {
        ClientEvent::Join { room } => state.gateway.on_join(connection_id, &room),
        ClientEvent::Leave { room } => state.gateway.on_leave(connection_id, &room),
        ClientEvent::Message(payload) => state.gateway.on_message(connection_id, &payload),
    };
    state.dispatch(batches);
}

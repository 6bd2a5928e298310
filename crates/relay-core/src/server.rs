//! WebSocket front end
//!
//! One persistent WebSocket per party. Each connection gets a
//! server-assigned [`ConnectionId`], an outbound channel drained by a
//! writer task, and a forwarder task that turns registry snapshots into
//! `user-list` messages. Disconnect is an implicit `remove`; the peer's
//! controller notices the loss through its own connectivity policy.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use rtcall_presence_core::{Party, PresenceRegistry, RegistryEvent};
use rtcall_signal_core::{ClientMessage, ConnectionId, Envelope, PartyInfo, ServerMessage};

use crate::error::{RelayError, Result};
use crate::router::SignalingRelay;

/// Shared server state: the registry and the relay built on it.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<PresenceRegistry>,
    pub relay: Arc<SignalingRelay>,
}

impl AppState {
    pub fn new() -> Self {
        let registry = PresenceRegistry::new();
        let relay = SignalingRelay::new(registry.clone());
        Self { registry, relay }
    }
}

/// Build the axum application.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until `shutdown` resolves.
pub async fn serve(
    bind: SocketAddr,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|source| RelayError::Bind { addr: bind, source })?;
    info!(%bind, "signaling relay listening");
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(RelayError::Serve)?;
    Ok(())
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: AppState) {
    let connection_id = ConnectionId::generate();
    info!(id = %connection_id, "connection established");

    let (mut socket_tx, mut socket_rx) = socket.split();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<ServerMessage>();
    state.relay.attach(connection_id.clone(), outbound.clone());

    // The assigned id is the client's own identity for the lifetime of
    // this connection; it needs it to read user lists and break glare.
    let _ = outbound.send(ServerMessage::Welcome { id: connection_id.clone() });

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let Ok(text) = serde_json::to_string(&message) else { continue };
            if socket_tx.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let mut registry_events = state.registry.subscribe();
    let snapshots_out = outbound.clone();
    let forwarder = tokio::spawn(async move {
        loop {
            match registry_events.recv().await {
                Ok(RegistryEvent::Snapshot(parties)) => {
                    let users = parties.into_iter().map(party_info).collect();
                    if snapshots_out.send(ServerMessage::UserList { users }).is_err() {
                        break;
                    }
                }
                // Skipped snapshots are fine: each one is the full state.
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "snapshot subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    while let Some(Ok(message)) = socket_rx.next().await {
        match message {
            Message::Text(text) => handle_client_text(&state, &connection_id, &text),
            Message::Close(_) => break,
            _ => {}
        }
    }

    info!(id = %connection_id, "connection closed");
    state.relay.detach(&connection_id);
    state.registry.remove(&connection_id);
    writer.abort();
    forwarder.abort();
}

fn handle_client_text(state: &AppState, connection_id: &ConnectionId, text: &str) {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(err) => {
            debug!(id = %connection_id, %err, "undecodable client message dropped");
            return;
        }
    };

    match message {
        ClientMessage::RegisterUser { name } => {
            state.registry.register(connection_id.clone(), name);
        }
        signaling => {
            if !state.registry.is_reachable(connection_id) {
                debug!(id = %connection_id, "signaling before registration dropped");
                return;
            }
            if let Some(envelope) = Envelope::from_client(connection_id, signaling) {
                state.relay.route(envelope);
            }
        }
    }
}

fn party_info(party: Party) -> PartyInfo {
    PartyInfo { id: party.connection_id, name: party.display_name, status: party.status }
}

//! Websocket stream of notifications and parking updates.
//!
//! The socket is push-only. Each connection subscribes to the
//! [`EventHub`](crate::events::EventHub) and forwards every event as JSON:
//!
//! ```json
//! { "type": "parking_update", "payload": { "space_id": "..", "is_occupied": true, .. } }
//! ```
//!
//! Client frames are read only to notice a close.

use crate::events::WsEvent;
use crate::state::AppState;
use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::{SinkExt, stream::StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

/// Upgrade to a websocket streaming [`WsEvent`]s.
///
/// ```text
/// GET /ws
/// ```
#[allow(clippy::unused_async)] // Axum handler signature requires async
pub async fn handle(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    // Subscribe before the upgrade so nothing published during it is lost.
    let events = state.events.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, events))
}

fn encode(event: &WsEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Message::Text(json)),
        Err(e) => {
            warn!(error = %e, kind = event.kind(), "Failed to serialize event");
            None
        },
    }
}

async fn handle_socket(socket: WebSocket, mut events: broadcast::Receiver<WsEvent>) {
    info!("WebSocket connection established");
    metrics::gauge!("ws.connections").increment(1.0);

    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "WebSocket client lagging, events skipped");
                    continue;
                },
                Err(RecvError::Closed) => break,
            };
            let Some(message) = encode(&event) else {
                continue;
            };
            if sender.send(message).await.is_err() {
                break;
            }
        }
        debug!("WebSocket send task terminated");
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                debug!("Client requested close");
                break;
            }
        }
        debug!("WebSocket receive task terminated");
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    metrics::gauge!("ws.connections").decrement(1.0);
    info!("WebSocket connection closed");
}

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::api::rest::auth::AuthActor;
use crate::models::actor::Actor;
use crate::models::event::OrderEvent;
use crate::state::AppState;

/// Streams committed [`OrderEvent`]s to an authenticated client as JSON text
/// frames, limited to the orders the caller may read.
pub async fn ws_handler(
    auth: AuthActor,
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    // Subscribed before the upgrade completes so no event after the 101 is missed.
    let rx = state.manager.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, rx, auth.actor))
}

async fn handle_socket(socket: WebSocket, mut rx: broadcast::Receiver<OrderEvent>, actor: Actor) {
    let (mut sender, mut receiver) = socket.split();

    info!(actor_id = %actor.id, role = %actor.role, "websocket client connected");

    let send_task = tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "websocket client lagging, dropped order events");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            if !event.visible_to(&actor) {
                continue;
            }

            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, order_id = %event.order_id, "failed to serialize order event for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!("websocket client disconnected");
}

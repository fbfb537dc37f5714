//! WebSocket layer: live presence and event fan-out.
//!
//! `GET /ws/orders?token=…` authenticates, registers the connection in the
//! presence registry, and runs two halves:
//! - a writer task draining the connection's bounded frame queue into the
//!   socket under a best-effort timeout,
//! - a read loop handling the client vocabulary (`join_order`,
//!   `leave_order`, `ping`).
//!
//! Socket teardown (client close, read error, write timeout, replacement by
//! a reconnect) funnels through one cleanup path that removes presence,
//! publishes `user_left`, and closes the operator's access-log sessions.

pub mod fabric;
pub mod messages;
pub mod presence;

pub use fabric::BroadcastFabric;
pub use messages::{ClientMessage, EventKind, EventMessage};
pub use presence::{FrameSender, OutboundFrame, PresenceRegistry};

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code};
use axum::extract::{Query, State};
use axum::response::Response;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::domain::Actor;
use crate::infrastructure::auth::authenticate;
use crate::infrastructure::http::AppState;
use crate::infrastructure::http::request::WsQuery;

/// WebSocket endpoint.
pub async fn ws_orders(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.token))
}

async fn close_with(mut socket: WebSocket, code: u16, reason: &'static str) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await;
}

async fn handle_socket(socket: WebSocket, state: AppState, token: Option<String>) {
    let Some(token) = token else {
        close_with(socket, close_code::POLICY, "Token required").await;
        return;
    };
    let actor = match authenticate(&state.auth, &state.store, &token).await {
        Ok(actor) => actor,
        Err(e) => {
            debug!(error = %e, "websocket authentication failed");
            close_with(socket, close_code::POLICY, "Authentication failed").await;
            return;
        }
    };

    let (tx, rx) = mpsc::channel(state.settings.websocket.send_queue_capacity);
    let outcome = state.registry.connect(actor.id, &actor.name, tx);
    let epoch = outcome.epoch;

    // A replacement connection takes over silently: ask the old writer to
    // close its socket, announce nothing.
    if let Some(old) = outcome.replaced {
        let _ = old.try_send(OutboundFrame::Close);
    }
    if outcome.announce {
        state.fabric.broadcast_to_all(
            &EventMessage::user_joined(actor.id, &actor.name),
            Some(actor.id),
        );
    }
    info!(user_id = actor.id, user_name = %actor.name, "websocket connected");

    let (sink, stream) = socket.split();
    let writer = tokio::spawn(run_writer(
        sink,
        rx,
        state.settings.websocket.write_timeout,
    ));

    run_reader(stream, &state, &actor).await;

    // Cleanup. The epoch guard makes this a no-op when a reconnect has
    // already replaced the entry.
    if let Some(outcome) = state.registry.disconnect(actor.id, Some(epoch)) {
        if let Some(order_id) = outcome.left_order {
            state.fabric.broadcast_to_order(
                &EventMessage::user_left_order(order_id, actor.id, &outcome.user_name),
                order_id,
                Some(actor.id),
            );
        }
        state.fabric.broadcast_to_all(
            &EventMessage::user_left(actor.id, &outcome.user_name),
            Some(actor.id),
        );
        if let Err(e) = state.store.leave_all_accesses(actor.id, Utc::now()).await {
            warn!(user_id = actor.id, error = %e, "could not close access sessions");
        }
        info!(user_id = actor.id, "websocket disconnected");
    }

    writer.abort();
}

type WsSink = futures_util::stream::SplitSink<WebSocket, Message>;
type WsStream = futures_util::stream::SplitStream<WebSocket>;

/// Drain the frame queue into the socket. A failed or timed-out write ends
/// the task; the reader side then observes the closed socket and cleans up.
async fn run_writer(
    mut sink: WsSink,
    mut rx: mpsc::Receiver<OutboundFrame>,
    write_timeout: std::time::Duration,
) {
    while let Some(frame) = rx.recv().await {
        match frame {
            OutboundFrame::Text(text) => {
                let send = sink.send(Message::Text(text.into()));
                match tokio::time::timeout(write_timeout, send).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        debug!(error = %e, "websocket write failed");
                        break;
                    }
                    Err(_) => {
                        debug!("websocket write timed out");
                        break;
                    }
                }
            }
            OutboundFrame::Close => {
                let _ = sink
                    .send(Message::Close(Some(CloseFrame {
                        code: close_code::ERROR,
                        reason: "Replaced by a new connection".into(),
                    })))
                    .await;
                break;
            }
        }
    }
}

async fn run_reader(mut stream: WsStream, state: &AppState, actor: &Actor) {
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => handle_client_message(state, actor, text.as_str()).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(user_id = actor.id, error = %e, "websocket read error");
                break;
            }
        }
    }
}

async fn handle_client_message(state: &AppState, actor: &Actor, raw: &str) {
    let message: ClientMessage = match serde_json::from_str(raw) {
        Ok(message) => message,
        Err(e) => {
            // Unknown types and malformed frames are logged and ignored.
            warn!(user_id = actor.id, error = %e, "unparseable client message");
            return;
        }
    };

    match message {
        ClientMessage::JoinOrder { order_id } => {
            let Some(outcome) = state.registry.join_order(actor.id, order_id) else {
                return;
            };
            if let Some(previous) = outcome.left_previous {
                state.fabric.broadcast_to_order(
                    &EventMessage::user_left_order(previous, actor.id, &outcome.user_name),
                    previous,
                    Some(actor.id),
                );
                if let Err(e) = state.store.leave_access(previous, actor.id, Utc::now()).await {
                    warn!(user_id = actor.id, error = %e, "could not close access session");
                }
            }
            if outcome.newly_joined {
                state.fabric.broadcast_to_order(
                    &EventMessage::user_joined_order(order_id, actor.id, &outcome.user_name),
                    order_id,
                    Some(actor.id),
                );
                info!(user_id = actor.id, order_id, "joined order");
            }
        }
        ClientMessage::LeaveOrder { order_id } => {
            let Some(outcome) = state.registry.leave_order(actor.id, order_id) else {
                return;
            };
            if outcome.removed {
                state.fabric.broadcast_to_order(
                    &EventMessage::user_left_order(order_id, actor.id, &outcome.user_name),
                    order_id,
                    Some(actor.id),
                );
                if let Err(e) = state.store.leave_access(order_id, actor.id, Utc::now()).await {
                    warn!(user_id = actor.id, error = %e, "could not close access session");
                }
                info!(user_id = actor.id, order_id, "left order");
            }
        }
        ClientMessage::Ping { timestamp } => {
            state
                .fabric
                .send_to_user(&EventMessage::pong(timestamp), actor.id);
        }
    }
}

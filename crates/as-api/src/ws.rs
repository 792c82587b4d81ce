//! Live-update WebSocket sessions.
//!
//! Each connection subscribes to the hub, receives the ledger snapshot as
//! `initial_state`, then one `new_message` frame per append until either side
//! goes away.

use std::sync::Arc;

use as_core::{BroadcastHub, Message, Subscription};
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;

use crate::handlers::AppState;

/// Frames pushed to subscribers.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent<'a> {
    InitialState { messages: &'a [Message] },
    NewMessage { message: &'a Message },
}

pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| session(socket, state.hub))
}

async fn session(socket: WebSocket, hub: Arc<BroadcastHub>) {
    let (subscription, snapshot) = hub.subscribe();
    let id = subscription.id();
    tracing::info!(subscriber = id, "client connected via WebSocket");

    pump(socket, subscription, &snapshot).await;

    hub.unsubscribe(id);
    tracing::info!(subscriber = id, "client disconnected");
}

async fn pump(socket: WebSocket, mut subscription: Subscription, snapshot: &[Message]) {
    let id = subscription.id();
    let (mut sink, mut incoming) = socket.split();

    let Some(initial) = encode(&LiveEvent::InitialState { messages: snapshot }) else {
        return;
    };
    if sink.send(WsMessage::Text(initial.into())).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            next = subscription.recv() => match next {
                Some(message) => {
                    let Some(frame) = encode(&LiveEvent::NewMessage { message: &message }) else {
                        break;
                    };
                    if sink.send(WsMessage::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                None => {
                    // Dropped by the hub: lagging or shutting down.
                    let _ = sink.send(WsMessage::Close(None)).await;
                    break;
                }
            },
            frame = incoming.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    tracing::debug!(subscriber = id, text = text.as_str(), "ignoring client frame");
                }
                Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
}

fn encode(event: &LiveEvent<'_>) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode live event");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use as_core::MessageLedger;
    use serde_json::Value;

    #[test]
    fn test_live_event_frames() {
        let message = MessageLedger::new().append_text("hello", "10.0.0.5");

        let initial: Value =
            serde_json::from_str(&encode(&LiveEvent::InitialState { messages: &[] }).unwrap()).unwrap();
        assert_eq!(initial["type"], "initial_state");
        assert_eq!(initial["messages"], Value::Array(vec![]));

        let live: Value =
            serde_json::from_str(&encode(&LiveEvent::NewMessage { message: &message }).unwrap()).unwrap();
        assert_eq!(live["type"], "new_message");
        assert_eq!(live["message"]["content"], "hello");
        assert_eq!(live["message"]["type"], "text");
        assert_eq!(live["message"]["sender_ip"], "10.0.0.5");
    }
}

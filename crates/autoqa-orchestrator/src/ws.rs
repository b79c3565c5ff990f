//! WebSocket event stream: on connect the client is subscribed to the
//! executions channel, then frames are forwarded until the connection
//! drops or a ping/pong timeout fires, the same session-loop shape as
//! `riptide-streaming`'s server (`tokio::select!` over an inbound client
//! stream and an outbound event stream, with a ping interval).

use crate::state::Orchestrator;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const PING_INTERVAL: Duration = Duration::from_secs(30);
const PONG_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
pub struct SubscribeQuery {
    pub user_id: String,
    #[serde(default)]
    pub execution_id: Option<String>,
}

pub async fn ws_handler(
    State(orchestrator): State<Arc<Orchestrator>>,
    Query(query): Query<SubscribeQuery>,
    upgrade: WebSocketUpgrade,
) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| session(socket, orchestrator, query))
}

async fn session(mut socket: WebSocket, orchestrator: Arc<Orchestrator>, query: SubscribeQuery) {
    let mut filters = HashMap::new();
    if let Some(execution_id) = &query.execution_id {
        filters.insert("executionId".to_string(), serde_json::json!(execution_id));
    }

    let (subscription, mut events) = match orchestrator.subscribe_to_executions(query.user_id.clone(), filters) {
        Ok(pair) => pair,
        Err(err) => {
            let _ = socket
                .send(WsMessage::Text(
                    serde_json::json!({"type": "error", "message": err.to_string()}).to_string(),
                ))
                .await;
            return;
        }
    };

    let welcome = serde_json::json!({
        "type": "welcome",
        "subscriptionId": subscription.id,
    });
    if socket.send(WsMessage::Text(welcome.to_string())).await.is_err() {
        orchestrator.bus.unsubscribe(subscription.id);
        return;
    }
    let confirmed = serde_json::json!({
        "type": "subscription-confirmed",
        "channel": "executions",
    });
    if socket.send(WsMessage::Text(confirmed.to_string())).await.is_err() {
        orchestrator.bus.unsubscribe(subscription.id);
        return;
    }

    let mut ping_ticker = tokio::time::interval(PING_INTERVAL);
    let mut last_pong = tokio::time::Instant::now();

    loop {
        tokio::select! {
            biased;
            _ = ping_ticker.tick() => {
                if last_pong.elapsed() > PONG_TIMEOUT {
                    warn!(subscription_id = %subscription.id, "pong timeout, closing connection");
                    break;
                }
                if socket.send(WsMessage::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                orchestrator.bus.touch(subscription.id);
                let frame = serde_json::json!({
                    "type": event.kind,
                    "executionId": event.content.get("executionId"),
                    "timestamp": event.timestamp,
                    "content": event.content,
                });
                if socket.send(WsMessage::Text(frame.to_string())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(WsMessage::Pong(_))) => {
                        last_pong = tokio::time::Instant::now();
                        orchestrator.bus.touch(subscription.id);
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        debug!(subscription_id = %subscription.id, error = %err, "websocket read error");
                        break;
                    }
                }
            }
        }
    }

    orchestrator.bus.unsubscribe(subscription.id);
    info!(subscription_id = %subscription.id, "websocket session closed");
}

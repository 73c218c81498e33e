use async_trait::async_trait;
use axum::{
    extract::{Query, State, WebSocketUpgrade},
    response::Response,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::protocol::WireMessage;
use crate::shared::{AppError, AppState};

use super::connection_manager::ConnectionManager;
use super::routing::{route, RelayError};
use super::socket::{Connection, MessageHandler};

/// Forwards each client action to its receiver, or answers the sender with
/// an `error` frame when it cannot
pub struct RelayMessageHandler {
    connection_manager: Arc<dyn ConnectionManager>,
}

impl RelayMessageHandler {
    pub fn new(connection_manager: Arc<dyn ConnectionManager>) -> Self {
        Self { connection_manager }
    }

    async fn relay(&self, user_id: &str, message: &str) -> Result<(), RelayError> {
        let routed = route(user_id, message)?;
        let frame = routed
            .to_frame(user_id)
            .and_then(|frame| frame.to_json())
            .map_err(|e| RelayError::Malformed(e.to_string()))?;

        if !self
            .connection_manager
            .send_to_user(&routed.receiver_id, &frame)
            .await
        {
            return Err(RelayError::ReceiverOffline(routed.receiver_id));
        }

        debug!(
            sender = %user_id,
            receiver = %routed.receiver_id,
            event = %routed.event.name(),
            "Relayed event"
        );
        Ok(())
    }
}

#[async_trait]
impl MessageHandler for RelayMessageHandler {
    async fn handle_message(&self, user_id: &str, message: String) {
        if let Err(e) = self.relay(user_id, &message).await {
            warn!(user_id = %user_id, error = %e, "Could not relay frame");
            if let Ok(reply) = WireMessage::error(e.to_string()).to_json() {
                self.connection_manager.send_to_user(user_id, &reply).await;
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSocketQuery {
    pub user_id: Option<String>,
}

/// WebSocket upgrade handler
///
/// GET /ws?userId=X
#[instrument(name = "websocket_handler", skip(state, ws))]
pub async fn websocket_handler(
    Query(query): Query<WebSocketQuery>,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let user_id = query
        .user_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| {
            warn!("WebSocket connection without userId");
            AppError::Unauthorized("Missing userId".to_string())
        })?;

    info!(user_id = %user_id, "WebSocket connection requested");
    Ok(ws.on_upgrade(move |socket| handle_websocket_connection(socket, user_id, state)))
}

async fn handle_websocket_connection(
    socket: axum::extract::ws::WebSocket,
    user_id: String,
    state: AppState,
) {
    let connection_id = Uuid::new_v4();
    let (outbound_sender, outbound_receiver) = mpsc::unbounded_channel::<String>();

    state
        .connection_manager
        .add_connection(user_id.clone(), connection_id, outbound_sender)
        .await;
    info!(user_id = %user_id, connection_id = %connection_id, "WebSocket connection established");

    let message_handler = Arc::new(RelayMessageHandler::new(state.connection_manager.clone()));
    let connection = Connection::new(
        user_id.clone(),
        Box::new(socket),
        outbound_receiver,
        message_handler,
    );

    match connection.run().await {
        Ok(()) => info!(user_id = %user_id, "WebSocket connection closed cleanly"),
        Err(e) => warn!(user_id = %user_id, error = ?e, "WebSocket connection error"),
    }

    state
        .connection_manager
        .remove_connection(&user_id, connection_id)
        .await;
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "online": state.connection_manager.online_count().await,
    }))
}

/// The relay's HTTP surface
pub fn relay_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(websocket_handler))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websockets::InMemoryConnectionManager;
    use serde_json::json;

    async fn online(
        manager: &Arc<InMemoryConnectionManager>,
        user_id: &str,
    ) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        manager
            .add_connection(user_id.to_string(), Uuid::new_v4(), tx)
            .await;
        rx
    }

    #[tokio::test]
    async fn test_relays_to_receiver() {
        let manager = Arc::new(InMemoryConnectionManager::new());
        let mut doctor = online(&manager, "doc-1").await;
        let mut patient = online(&manager, "pat-1").await;
        let handler = RelayMessageHandler::new(manager.clone());

        let frame = WireMessage::new(
            "sendMessage",
            json!({"receiverId": "pat-1", "message": {"text": "hello"}}),
        );
        handler
            .handle_message("doc-1", frame.to_json().unwrap())
            .await;

        let delivered = WireMessage::from_json(&patient.recv().await.unwrap()).unwrap();
        assert_eq!(delivered.event, "receiveMessage");
        assert_eq!(delivered.payload, json!({"message": {"text": "hello"}}));
        assert!(doctor.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_offline_receiver_answers_sender_with_error() {
        let manager = Arc::new(InMemoryConnectionManager::new());
        let mut doctor = online(&manager, "doc-1").await;
        let handler = RelayMessageHandler::new(manager.clone());

        let frame = WireMessage::new(
            "initiateCall",
            json!({"appointmentId": "A1", "receiverId": "pat-9", "callerRole": "doctor"}),
        );
        handler
            .handle_message("doc-1", frame.to_json().unwrap())
            .await;

        let reply = WireMessage::from_json(&doctor.recv().await.unwrap()).unwrap();
        assert_eq!(reply.event, "error");
        assert_eq!(reply.payload["message"], "User pat-9 is not connected");
    }
}

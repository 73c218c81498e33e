use async_trait::async_trait;

use super::errors::RealtimeError;
use super::manager::ConnectionManager;
use crate::protocol::{
    AddReactionPayload, OutboundEvent, SendMessagePayload, SendNotificationPayload,
};

/// Outbound half of the channel, as seen by code that only needs to send
#[async_trait]
pub trait Emitter: Send + Sync {
    async fn emit_event(
        &self,
        event: OutboundEvent,
        payload: serde_json::Value,
    ) -> Result<(), RealtimeError>;
}

#[async_trait]
impl Emitter for ConnectionManager {
    async fn emit_event(
        &self,
        event: OutboundEvent,
        payload: serde_json::Value,
    ) -> Result<(), RealtimeError> {
        self.emit(event.as_ref(), &payload).await
    }
}

/// Typed helpers for the chat-side actions
impl ConnectionManager {
    pub async fn send_message(
        &self,
        receiver_id: &str,
        message: serde_json::Value,
    ) -> Result<(), RealtimeError> {
        let payload = SendMessagePayload {
            receiver_id: receiver_id.to_string(),
            message,
        };
        self.emit(OutboundEvent::SendMessage.as_ref(), &payload)
            .await
    }

    pub async fn send_notification(
        &self,
        receiver_id: &str,
        notification: serde_json::Value,
    ) -> Result<(), RealtimeError> {
        let payload = SendNotificationPayload {
            receiver_id: receiver_id.to_string(),
            notification,
        };
        self.emit(OutboundEvent::SendNotification.as_ref(), &payload)
            .await
    }

    pub async fn add_reaction(
        &self,
        receiver_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<(), RealtimeError> {
        let payload = AddReactionPayload {
            receiver_id: receiver_id.to_string(),
            message_id: message_id.to_string(),
            emoji: emoji.to_string(),
        };
        self.emit(OutboundEvent::AddReaction.as_ref(), &payload)
            .await
    }
}

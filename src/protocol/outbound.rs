use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Names of the actions a client sends to the server
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, EnumIter,
)]
#[strum(serialize_all = "camelCase")]
pub enum OutboundEvent {
    SendMessage,
    SendNotification,
    AddReaction,
    InitiateCall,
    AcceptCall,
    RejectCall,
    EndCall,
    Signal,
    ToggleHandRaise,
    ToggleMute,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    pub receiver_id: String,
    pub message: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SendNotificationPayload {
    pub receiver_id: String,
    pub notification: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AddReactionPayload {
    pub receiver_id: String,
    pub message_id: String,
    pub emoji: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InitiateCallPayload {
    pub appointment_id: String,
    pub receiver_id: String,
    pub caller_role: String,
}

/// Shared by accept, reject and end: the call and the other party
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CallActionPayload {
    pub appointment_id: String,
    pub receiver_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RelaySignalPayload {
    pub appointment_id: String,
    pub receiver_id: String,
    pub signal: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToggleHandRaisePayload {
    pub appointment_id: String,
    pub receiver_id: String,
    pub is_raised: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToggleMutePayload {
    pub appointment_id: String,
    pub receiver_id: String,
    pub is_muted: bool,
}

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Names of the events the server pushes to a client
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, EnumIter,
)]
#[strum(serialize_all = "camelCase")]
pub enum EventName {
    ReceiveMessage,
    ReceiveNotification,
    ReceiveReaction,
    IncomingCall,
    CallAccepted,
    CallRejected,
    Signal,
    CallEnded,
    HandRaise,
    MuteStatus,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessagePayload {
    pub message: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationPayload {
    pub notification: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReactionPayload {
    pub message_id: String,
    pub emoji: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IncomingCallPayload {
    pub appointment_id: String,
    pub caller_id: String,
    pub caller_role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CallAcceptedPayload {
    pub appointment_id: String,
    pub acceptor_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CallRejectedPayload {
    pub appointment_id: String,
    pub rejector_id: String,
}

/// Opaque negotiation data exchanged between the two parties of a call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SignalPayload {
    pub appointment_id: String,
    pub sender_id: String,
    pub signal: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CallEndedPayload {
    pub appointment_id: String,
    pub ender_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HandRaisePayload {
    pub appointment_id: String,
    pub user_id: String,
    pub is_raised: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MuteStatusPayload {
    pub appointment_id: String,
    pub user_id: String,
    pub is_muted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorPayload {
    pub message: String,
}

/// A decoded server-to-client event
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    ReceiveMessage(MessagePayload),
    ReceiveNotification(NotificationPayload),
    ReceiveReaction(ReactionPayload),
    IncomingCall(IncomingCallPayload),
    CallAccepted(CallAcceptedPayload),
    CallRejected(CallRejectedPayload),
    Signal(SignalPayload),
    CallEnded(CallEndedPayload),
    HandRaise(HandRaisePayload),
    MuteStatus(MuteStatusPayload),
    Error(ErrorPayload),
}

impl InboundEvent {
    /// Decode the payload of a known event name into its typed form
    pub fn decode(name: EventName, payload: serde_json::Value) -> Result<Self, serde_json::Error> {
        Ok(match name {
            EventName::ReceiveMessage => Self::ReceiveMessage(serde_json::from_value(payload)?),
            EventName::ReceiveNotification => {
                Self::ReceiveNotification(serde_json::from_value(payload)?)
            }
            EventName::ReceiveReaction => Self::ReceiveReaction(serde_json::from_value(payload)?),
            EventName::IncomingCall => Self::IncomingCall(serde_json::from_value(payload)?),
            EventName::CallAccepted => Self::CallAccepted(serde_json::from_value(payload)?),
            EventName::CallRejected => Self::CallRejected(serde_json::from_value(payload)?),
            EventName::Signal => Self::Signal(serde_json::from_value(payload)?),
            EventName::CallEnded => Self::CallEnded(serde_json::from_value(payload)?),
            EventName::HandRaise => Self::HandRaise(serde_json::from_value(payload)?),
            EventName::MuteStatus => Self::MuteStatus(serde_json::from_value(payload)?),
            EventName::Error => Self::Error(serde_json::from_value(payload)?),
        })
    }

    pub fn name(&self) -> EventName {
        match self {
            InboundEvent::ReceiveMessage(_) => EventName::ReceiveMessage,
            InboundEvent::ReceiveNotification(_) => EventName::ReceiveNotification,
            InboundEvent::ReceiveReaction(_) => EventName::ReceiveReaction,
            InboundEvent::IncomingCall(_) => EventName::IncomingCall,
            InboundEvent::CallAccepted(_) => EventName::CallAccepted,
            InboundEvent::CallRejected(_) => EventName::CallRejected,
            InboundEvent::Signal(_) => EventName::Signal,
            InboundEvent::CallEnded(_) => EventName::CallEnded,
            InboundEvent::HandRaise(_) => EventName::HandRaise,
            InboundEvent::MuteStatus(_) => EventName::MuteStatus,
            InboundEvent::Error(_) => EventName::Error,
        }
    }

    /// The appointment a call-related event belongs to
    pub fn appointment_id(&self) -> Option<&str> {
        match self {
            InboundEvent::IncomingCall(p) => Some(&p.appointment_id),
            InboundEvent::CallAccepted(p) => Some(&p.appointment_id),
            InboundEvent::CallRejected(p) => Some(&p.appointment_id),
            InboundEvent::Signal(p) => Some(&p.appointment_id),
            InboundEvent::CallEnded(p) => Some(&p.appointment_id),
            InboundEvent::HandRaise(p) => Some(&p.appointment_id),
            InboundEvent::MuteStatus(p) => Some(&p.appointment_id),
            _ => None,
        }
    }

    /// Serialize back into `(name, payload)` form for the wire
    pub fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            InboundEvent::ReceiveMessage(p) => serde_json::to_value(p),
            InboundEvent::ReceiveNotification(p) => serde_json::to_value(p),
            InboundEvent::ReceiveReaction(p) => serde_json::to_value(p),
            InboundEvent::IncomingCall(p) => serde_json::to_value(p),
            InboundEvent::CallAccepted(p) => serde_json::to_value(p),
            InboundEvent::CallRejected(p) => serde_json::to_value(p),
            InboundEvent::Signal(p) => serde_json::to_value(p),
            InboundEvent::CallEnded(p) => serde_json::to_value(p),
            InboundEvent::HandRaise(p) => serde_json::to_value(p),
            InboundEvent::MuteStatus(p) => serde_json::to_value(p),
            InboundEvent::Error(p) => serde_json::to_value(p),
        }
    }
}

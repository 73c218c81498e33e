use serde::de::DeserializeOwned;
use std::str::FromStr;
use thiserror::Error;

use crate::protocol::{
    AddReactionPayload, CallAcceptedPayload, CallActionPayload, CallEndedPayload,
    CallRejectedPayload, HandRaisePayload, InboundEvent, IncomingCallPayload,
    InitiateCallPayload, MessagePayload, MuteStatusPayload, NotificationPayload, OutboundEvent,
    ReactionPayload, RelaySignalPayload, SendMessagePayload, SendNotificationPayload,
    SignalPayload, ToggleHandRaisePayload, ToggleMutePayload, WireMessage,
};

#[derive(Debug, Error, PartialEq)]
pub enum RelayError {
    #[error("Malformed frame: {0}")]
    Malformed(String),

    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    #[error("Invalid payload for {event}: {reason}")]
    InvalidPayload { event: String, reason: String },

    #[error("User {0} is not connected")]
    ReceiverOffline(String),
}

/// A client action translated into the event its receiver should get
#[derive(Debug, Clone, PartialEq)]
pub struct Routed {
    pub receiver_id: String,
    pub event: InboundEvent,
}

impl Routed {
    /// Wire frame for the receiver, stamped with the original sender
    pub fn to_frame(&self, sender_id: &str) -> Result<WireMessage, serde_json::Error> {
        Ok(WireMessage::new(self.event.name().as_ref(), self.event.to_payload()?)
            .with_sender(sender_id))
    }
}

fn payload<T: DeserializeOwned>(
    event: OutboundEvent,
    value: serde_json::Value,
) -> Result<T, RelayError> {
    serde_json::from_value(value).map_err(|e| RelayError::InvalidPayload {
        event: event.to_string(),
        reason: e.to_string(),
    })
}

/// Translate a raw frame from `sender_id` into a delivery
///
/// The sender's identity always comes from the connection, never from the
/// payload.
pub fn route(sender_id: &str, text: &str) -> Result<Routed, RelayError> {
    let frame = WireMessage::from_json(text).map_err(|e| RelayError::Malformed(e.to_string()))?;
    let event = OutboundEvent::from_str(&frame.event)
        .map_err(|_| RelayError::UnknownEvent(frame.event.clone()))?;
    let value = frame.payload;
    let sender = sender_id.to_string();

    let routed = match event {
        OutboundEvent::SendMessage => {
            let p: SendMessagePayload = payload(event, value)?;
            Routed {
                receiver_id: p.receiver_id,
                event: InboundEvent::ReceiveMessage(MessagePayload { message: p.message }),
            }
        }
        OutboundEvent::SendNotification => {
            let p: SendNotificationPayload = payload(event, value)?;
            Routed {
                receiver_id: p.receiver_id,
                event: InboundEvent::ReceiveNotification(NotificationPayload {
                    notification: p.notification,
                }),
            }
        }
        OutboundEvent::AddReaction => {
            let p: AddReactionPayload = payload(event, value)?;
            Routed {
                receiver_id: p.receiver_id,
                event: InboundEvent::ReceiveReaction(ReactionPayload {
                    message_id: p.message_id,
                    emoji: p.emoji,
                    user_id: sender,
                }),
            }
        }
        OutboundEvent::InitiateCall => {
            let p: InitiateCallPayload = payload(event, value)?;
            Routed {
                receiver_id: p.receiver_id,
                event: InboundEvent::IncomingCall(IncomingCallPayload {
                    appointment_id: p.appointment_id,
                    caller_id: sender,
                    caller_role: p.caller_role,
                }),
            }
        }
        OutboundEvent::AcceptCall => {
            let p: CallActionPayload = payload(event, value)?;
            Routed {
                receiver_id: p.receiver_id,
                event: InboundEvent::CallAccepted(CallAcceptedPayload {
                    appointment_id: p.appointment_id,
                    acceptor_id: sender,
                }),
            }
        }
        OutboundEvent::RejectCall => {
            let p: CallActionPayload = payload(event, value)?;
            Routed {
                receiver_id: p.receiver_id,
                event: InboundEvent::CallRejected(CallRejectedPayload {
                    appointment_id: p.appointment_id,
                    rejector_id: sender,
                }),
            }
        }
        OutboundEvent::EndCall => {
            let p: CallActionPayload = payload(event, value)?;
            Routed {
                receiver_id: p.receiver_id,
                event: InboundEvent::CallEnded(CallEndedPayload {
                    appointment_id: p.appointment_id,
                    ender_id: sender,
                }),
            }
        }
        OutboundEvent::Signal => {
            let p: RelaySignalPayload = payload(event, value)?;
            Routed {
                receiver_id: p.receiver_id,
                event: InboundEvent::Signal(SignalPayload {
                    appointment_id: p.appointment_id,
                    sender_id: sender,
                    signal: p.signal,
                }),
            }
        }
        OutboundEvent::ToggleHandRaise => {
            let p: ToggleHandRaisePayload = payload(event, value)?;
            Routed {
                receiver_id: p.receiver_id,
                event: InboundEvent::HandRaise(HandRaisePayload {
                    appointment_id: p.appointment_id,
                    user_id: sender,
                    is_raised: p.is_raised,
                }),
            }
        }
        OutboundEvent::ToggleMute => {
            let p: ToggleMutePayload = payload(event, value)?;
            Routed {
                receiver_id: p.receiver_id,
                event: InboundEvent::MuteStatus(MuteStatusPayload {
                    appointment_id: p.appointment_id,
                    user_id: sender,
                    is_muted: p.is_muted,
                }),
            }
        }
    };

    Ok(routed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::EventName;
    use rstest::rstest;
    use serde_json::json;

    fn frame(event: &str, payload: serde_json::Value) -> String {
        WireMessage::new(event, payload).to_json().unwrap()
    }

    #[test]
    fn test_send_message_strips_receiver() {
        let text = frame(
            "sendMessage",
            json!({"receiverId": "pat-1", "message": {"text": "hi"}}),
        );
        let routed = route("doc-1", &text).unwrap();
        assert_eq!(routed.receiver_id, "pat-1");
        assert_eq!(
            routed.event,
            InboundEvent::ReceiveMessage(MessagePayload {
                message: json!({"text": "hi"})
            })
        );

        let out = routed.to_frame("doc-1").unwrap();
        assert_eq!(out.event, "receiveMessage");
        assert_eq!(out.meta.unwrap().sender_id.as_deref(), Some("doc-1"));
    }

    #[rstest]
    #[case("initiateCall", json!({"appointmentId": "A1", "receiverId": "r", "callerRole": "doctor"}), EventName::IncomingCall)]
    #[case("acceptCall", json!({"appointmentId": "A1", "receiverId": "r"}), EventName::CallAccepted)]
    #[case("rejectCall", json!({"appointmentId": "A1", "receiverId": "r"}), EventName::CallRejected)]
    #[case("endCall", json!({"appointmentId": "A1", "receiverId": "r"}), EventName::CallEnded)]
    #[case("signal", json!({"appointmentId": "A1", "receiverId": "r", "signal": {"sdp": "x"}}), EventName::Signal)]
    #[case("toggleMute", json!({"appointmentId": "A1", "receiverId": "r", "isMuted": true}), EventName::MuteStatus)]
    #[case("toggleHandRaise", json!({"appointmentId": "A1", "receiverId": "r", "isRaised": true}), EventName::HandRaise)]
    fn test_call_events_route_to_receiver(
        #[case] event: &str,
        #[case] payload: serde_json::Value,
        #[case] expected: EventName,
    ) {
        let routed = route("s", &frame(event, payload)).unwrap();
        assert_eq!(routed.receiver_id, "r");
        assert_eq!(routed.event.name(), expected);
        assert_eq!(routed.event.appointment_id(), Some("A1"));
    }

    #[test]
    fn test_sender_identity_comes_from_connection() {
        let text = frame(
            "initiateCall",
            json!({"appointmentId": "A1", "receiverId": "pat-1", "callerRole": "doctor", "callerId": "forged"}),
        );
        match route("doc-1", &text).unwrap().event {
            InboundEvent::IncomingCall(p) => assert_eq!(p.caller_id, "doc-1"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_frames() {
        assert!(matches!(route("s", "not json"), Err(RelayError::Malformed(_))));
        assert_eq!(
            route("s", &frame("dance", json!({}))),
            Err(RelayError::UnknownEvent("dance".to_string()))
        );
        assert!(matches!(
            route("s", &frame("sendMessage", json!({"message": "hi"}))),
            Err(RelayError::InvalidPayload { .. })
        ));
    }
}

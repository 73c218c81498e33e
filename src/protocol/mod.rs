// Wire protocol shared by the client core and the relay server
//
// Frames are JSON envelopes naming an event; inbound events are what the
// server pushes to clients, outbound events are the actions clients send.

pub use inbound::{
    CallAcceptedPayload, CallEndedPayload, CallRejectedPayload, ErrorPayload, EventName,
    HandRaisePayload, InboundEvent, IncomingCallPayload, MessagePayload, MuteStatusPayload,
    NotificationPayload, ReactionPayload, SignalPayload,
};
pub use messages::{WireMessage, WireMeta};
pub use outbound::{
    AddReactionPayload, CallActionPayload, InitiateCallPayload, OutboundEvent,
    RelaySignalPayload, SendMessagePayload, SendNotificationPayload, ToggleHandRaisePayload,
    ToggleMutePayload,
};

mod inbound;
mod messages;
mod outbound;

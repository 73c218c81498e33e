use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, instrument};

use super::session::{CallDirection, CallState, SignalingError, SignalingSession};
use crate::event::{EventError, EventHandler, HandlerSet};
use crate::protocol::{
    CallActionPayload, EventName, InboundEvent, InitiateCallPayload, OutboundEvent,
    RelaySignalPayload, ToggleHandRaisePayload, ToggleMutePayload,
};
use crate::realtime::{Emitter, RealtimeError};

/// Something the application may want to react to after a call event
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    Ringing {
        appointment_id: String,
        caller_id: String,
        caller_role: String,
    },
    StateChanged {
        appointment_id: String,
        state: CallState,
    },
    SignalReceived {
        appointment_id: String,
        sender_id: String,
        signal: serde_json::Value,
    },
    MuteChanged {
        appointment_id: String,
        user_id: String,
        muted: bool,
    },
    HandRaiseChanged {
        appointment_id: String,
        user_id: String,
        raised: bool,
    },
    Ignored,
}

/// All call sessions of the local user, one per appointment id
///
/// Local actions validate the transition, emit the matching outbound event
/// and only then apply it, so a failed send leaves the session as it was.
/// Sessions are dropped as soon as they reach `Ended`.
#[derive(Clone)]
pub struct SignalingSessions {
    local_id: String,
    emitter: Arc<dyn Emitter>,
    sessions: Arc<Mutex<HashMap<String, SignalingSession>>>,
    updates: broadcast::Sender<SessionUpdate>,
}

impl SignalingSessions {
    pub fn new(local_id: impl Into<String>, emitter: Arc<dyn Emitter>) -> Self {
        let (updates, _) = broadcast::channel(100);
        Self {
            local_id: local_id.into(),
            emitter,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            updates,
        }
    }

    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    /// Updates produced by inbound call events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.updates.subscribe()
    }

    pub async fn state(&self, appointment_id: &str) -> Option<CallState> {
        self.sessions
            .lock()
            .await
            .get(appointment_id)
            .map(|s| s.state())
    }

    pub async fn session(&self, appointment_id: &str) -> Option<SignalingSession> {
        self.sessions.lock().await.get(appointment_id).cloned()
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Forget every session, e.g. when the application decides not to resume
    /// calls after a reconnect
    pub async fn clear(&self) {
        self.sessions.lock().await.clear();
    }

    /// Handlers for the call events, ready to register with the connection manager
    pub fn handler_set(&self) -> HandlerSet {
        let handler: Arc<dyn EventHandler> = Arc::new(SignalingHandler {
            sessions: self.clone(),
        });
        [
            EventName::IncomingCall,
            EventName::CallAccepted,
            EventName::CallRejected,
            EventName::Signal,
            EventName::CallEnded,
            EventName::HandRaise,
            EventName::MuteStatus,
        ]
        .into_iter()
        .fold(HandlerSet::new(), |set, name| {
            set.on(name, Arc::clone(&handler))
        })
    }

    /// Place a call to `remote_id`: Idle -> Ringing
    #[instrument(skip(self))]
    pub async fn initiate(
        &self,
        appointment_id: &str,
        remote_id: &str,
        caller_role: &str,
    ) -> Result<CallState, SignalingError> {
        let mut sessions = self.sessions.lock().await;
        if let Some(existing) = sessions.get(appointment_id) {
            return Err(SignalingError::SessionExists {
                appointment_id: appointment_id.to_string(),
                state: existing.state(),
            });
        }

        let mut session = SignalingSession::new(
            appointment_id,
            self.local_id.as_str(),
            remote_id,
            CallDirection::Outgoing,
        );
        session.can(&[CallState::Idle], "initiate")?;

        let payload = InitiateCallPayload {
            appointment_id: appointment_id.to_string(),
            receiver_id: remote_id.to_string(),
            caller_role: caller_role.to_string(),
        };
        self.emitter
            .emit_event(OutboundEvent::InitiateCall, to_value(&payload)?)
            .await?;

        let state = session.ring()?;
        sessions.insert(appointment_id.to_string(), session);
        info!(appointment_id = %appointment_id, remote_id = %remote_id, "Call initiated");
        Ok(state)
    }

    /// Ringing -> Accepted
    #[instrument(skip(self))]
    pub async fn accept(&self, appointment_id: &str) -> Result<CallState, SignalingError> {
        self.call_action(
            appointment_id,
            &[CallState::Ringing],
            "accept",
            OutboundEvent::AcceptCall,
            SignalingSession::accept,
        )
        .await
    }

    /// Ringing -> Rejected -> Ended
    #[instrument(skip(self))]
    pub async fn reject(&self, appointment_id: &str) -> Result<CallState, SignalingError> {
        self.call_action(
            appointment_id,
            &[CallState::Ringing],
            "reject",
            OutboundEvent::RejectCall,
            SignalingSession::reject,
        )
        .await
    }

    /// Accepted/Active -> Ended
    #[instrument(skip(self))]
    pub async fn end(&self, appointment_id: &str) -> Result<CallState, SignalingError> {
        self.call_action(
            appointment_id,
            &[CallState::Accepted, CallState::Active],
            "end",
            OutboundEvent::EndCall,
            SignalingSession::end,
        )
        .await
    }

    async fn call_action(
        &self,
        appointment_id: &str,
        allowed: &[CallState],
        action: &'static str,
        event: OutboundEvent,
        apply: fn(&mut SignalingSession) -> Result<CallState, SignalingError>,
    ) -> Result<CallState, SignalingError> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .get_mut(appointment_id)
            .ok_or_else(|| SignalingError::NoSession(appointment_id.to_string()))?;
        session.can(allowed, action)?;

        let payload = CallActionPayload {
            appointment_id: appointment_id.to_string(),
            receiver_id: session.remote_id.clone(),
        };
        self.emitter
            .emit_event(event, to_value(&payload)?)
            .await?;

        let state = apply(session)?;
        info!(appointment_id = %appointment_id, action = action, state = %state, "Call updated");
        if state == CallState::Ended {
            sessions.remove(appointment_id);
        }
        Ok(state)
    }

    /// Relay an opaque negotiation payload to the other party
    #[instrument(skip(self, signal))]
    pub async fn send_signal(
        &self,
        appointment_id: &str,
        signal: serde_json::Value,
    ) -> Result<CallState, SignalingError> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .get_mut(appointment_id)
            .ok_or_else(|| SignalingError::NoSession(appointment_id.to_string()))?;
        session.can(&[CallState::Accepted, CallState::Active], "signal")?;

        let payload = RelaySignalPayload {
            appointment_id: appointment_id.to_string(),
            receiver_id: session.remote_id.clone(),
            signal,
        };
        self.emitter
            .emit_event(OutboundEvent::Signal, to_value(&payload)?)
            .await?;

        session.activate()
    }

    /// Fire-and-forget mute flag for the local user
    #[instrument(skip(self))]
    pub async fn set_muted(&self, appointment_id: &str, muted: bool) -> Result<(), SignalingError> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .get_mut(appointment_id)
            .ok_or_else(|| SignalingError::NoSession(appointment_id.to_string()))?;

        let payload = ToggleMutePayload {
            appointment_id: appointment_id.to_string(),
            receiver_id: session.remote_id.clone(),
            is_muted: muted,
        };
        self.emitter
            .emit_event(OutboundEvent::ToggleMute, to_value(&payload)?)
            .await?;

        session.set_muted(&self.local_id, muted);
        Ok(())
    }

    /// Fire-and-forget hand-raise flag for the local user
    #[instrument(skip(self))]
    pub async fn set_hand_raised(
        &self,
        appointment_id: &str,
        raised: bool,
    ) -> Result<(), SignalingError> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .get_mut(appointment_id)
            .ok_or_else(|| SignalingError::NoSession(appointment_id.to_string()))?;

        let payload = ToggleHandRaisePayload {
            appointment_id: appointment_id.to_string(),
            receiver_id: session.remote_id.clone(),
            is_raised: raised,
        };
        self.emitter
            .emit_event(OutboundEvent::ToggleHandRaise, to_value(&payload)?)
            .await?;

        session.set_hand_raised(&self.local_id, raised);
        Ok(())
    }

    /// Drive the state machine from an inbound event
    ///
    /// Events that do not fit the current state are ignored, never errors.
    pub async fn apply(&self, event: &InboundEvent) -> SessionUpdate {
        let mut sessions = self.sessions.lock().await;

        let update = match event {
            InboundEvent::IncomingCall(p) => {
                if let Some(previous) = sessions.get(&p.appointment_id) {
                    info!(
                        appointment_id = %p.appointment_id,
                        previous_state = %previous.state(),
                        "Incoming call replaces existing session"
                    );
                }
                let mut session = SignalingSession::new(
                    p.appointment_id.as_str(),
                    self.local_id.as_str(),
                    p.caller_id.as_str(),
                    CallDirection::Incoming,
                );
                match session.ring() {
                    Ok(_) => {
                        sessions.insert(p.appointment_id.clone(), session);
                        SessionUpdate::Ringing {
                            appointment_id: p.appointment_id.clone(),
                            caller_id: p.caller_id.clone(),
                            caller_role: p.caller_role.clone(),
                        }
                    }
                    Err(_) => SessionUpdate::Ignored,
                }
            }
            InboundEvent::CallAccepted(p) => match sessions.get_mut(&p.appointment_id) {
                Some(session) => state_update(&p.appointment_id, session.accept()),
                None => SessionUpdate::Ignored,
            },
            InboundEvent::CallRejected(p) => match sessions.get_mut(&p.appointment_id) {
                Some(session) => state_update(&p.appointment_id, session.reject()),
                None => SessionUpdate::Ignored,
            },
            InboundEvent::Signal(p) => {
                let activated = sessions
                    .get_mut(&p.appointment_id)
                    .is_some_and(|session| session.activate().is_ok());
                if activated {
                    SessionUpdate::SignalReceived {
                        appointment_id: p.appointment_id.clone(),
                        sender_id: p.sender_id.clone(),
                        signal: p.signal.clone(),
                    }
                } else {
                    SessionUpdate::Ignored
                }
            }
            InboundEvent::CallEnded(p) => match sessions.get_mut(&p.appointment_id) {
                Some(session) => state_update(&p.appointment_id, Ok(session.force_end())),
                None => SessionUpdate::Ignored,
            },
            InboundEvent::MuteStatus(p) => match sessions.get_mut(&p.appointment_id) {
                Some(session) => {
                    session.set_muted(&p.user_id, p.is_muted);
                    SessionUpdate::MuteChanged {
                        appointment_id: p.appointment_id.clone(),
                        user_id: p.user_id.clone(),
                        muted: p.is_muted,
                    }
                }
                None => SessionUpdate::Ignored,
            },
            InboundEvent::HandRaise(p) => match sessions.get_mut(&p.appointment_id) {
                Some(session) => {
                    session.set_hand_raised(&p.user_id, p.is_raised);
                    SessionUpdate::HandRaiseChanged {
                        appointment_id: p.appointment_id.clone(),
                        user_id: p.user_id.clone(),
                        raised: p.is_raised,
                    }
                }
                None => SessionUpdate::Ignored,
            },
            _ => SessionUpdate::Ignored,
        };

        if let SessionUpdate::StateChanged {
            appointment_id,
            state: CallState::Ended,
        } = &update
        {
            sessions.remove(appointment_id);
        }

        if update == SessionUpdate::Ignored {
            debug!(event = %event.name(), appointment_id = ?event.appointment_id(), "Call event ignored");
        } else {
            let _ = self.updates.send(update.clone());
        }
        update
    }
}

fn state_update(
    appointment_id: &str,
    result: Result<CallState, SignalingError>,
) -> SessionUpdate {
    match result {
        Ok(state) => SessionUpdate::StateChanged {
            appointment_id: appointment_id.to_string(),
            state,
        },
        Err(_) => SessionUpdate::Ignored,
    }
}

fn to_value<T: serde::Serialize>(payload: &T) -> Result<serde_json::Value, SignalingError> {
    serde_json::to_value(payload).map_err(|e| SignalingError::Emit(RealtimeError::from(e)))
}

/// Routes the call events from the channel into [`SignalingSessions`]
struct SignalingHandler {
    sessions: SignalingSessions,
}

#[async_trait]
impl EventHandler for SignalingHandler {
    async fn handle(&self, event: &InboundEvent) -> Result<(), EventError> {
        if event.appointment_id().is_none() {
            return Err(EventError::UnexpectedEvent(event.name()));
        }
        self.sessions.apply(event).await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "SignalingHandler"
    }
}

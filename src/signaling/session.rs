use std::collections::HashMap;
use strum_macros::Display;
use thiserror::Error;

use crate::realtime::RealtimeError;

/// Progress of a call for one appointment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum CallState {
    Idle,
    Ringing,
    Accepted,
    Active,
    Rejected,
    Ended,
}

/// Which side placed the call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallDirection {
    Outgoing,
    Incoming,
}

#[derive(Debug, Error)]
pub enum SignalingError {
    #[error("No call session for appointment {0}")]
    NoSession(String),

    #[error("Call for appointment {appointment_id} is already {state}")]
    SessionExists {
        appointment_id: String,
        state: CallState,
    },

    #[error("Cannot {action} call for appointment {appointment_id} while {from}")]
    InvalidTransition {
        appointment_id: String,
        from: CallState,
        action: &'static str,
    },

    #[error(transparent)]
    Emit(#[from] RealtimeError),
}

/// Call state for a single appointment
///
/// Mute and hand-raise flags live beside the state machine rather than in
/// it; they are per-user and the latest write wins.
#[derive(Debug, Clone)]
pub struct SignalingSession {
    pub appointment_id: String,
    pub local_id: String,
    pub remote_id: String,
    pub direction: CallDirection,
    state: CallState,
    muted: HashMap<String, bool>,
    hands_raised: HashMap<String, bool>,
}

impl SignalingSession {
    pub fn new(
        appointment_id: impl Into<String>,
        local_id: impl Into<String>,
        remote_id: impl Into<String>,
        direction: CallDirection,
    ) -> Self {
        Self {
            appointment_id: appointment_id.into(),
            local_id: local_id.into(),
            remote_id: remote_id.into(),
            direction,
            state: CallState::Idle,
            muted: HashMap::new(),
            hands_raised: HashMap::new(),
        }
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state == CallState::Ended
    }

    /// Whether signal payloads may flow
    pub fn is_connected(&self) -> bool {
        matches!(self.state, CallState::Accepted | CallState::Active)
    }

    fn transition(
        &mut self,
        allowed: &[CallState],
        next: CallState,
        action: &'static str,
    ) -> Result<CallState, SignalingError> {
        if !allowed.contains(&self.state) {
            return Err(SignalingError::InvalidTransition {
                appointment_id: self.appointment_id.clone(),
                from: self.state,
                action,
            });
        }
        self.state = next;
        Ok(next)
    }

    /// Check a transition without applying it
    pub fn can(&self, allowed: &[CallState], action: &'static str) -> Result<(), SignalingError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(SignalingError::InvalidTransition {
                appointment_id: self.appointment_id.clone(),
                from: self.state,
                action,
            })
        }
    }

    pub fn ring(&mut self) -> Result<CallState, SignalingError> {
        self.transition(&[CallState::Idle], CallState::Ringing, "ring")
    }

    pub fn accept(&mut self) -> Result<CallState, SignalingError> {
        self.transition(&[CallState::Ringing], CallState::Accepted, "accept")
    }

    /// Rejection passes through `Rejected` and settles on `Ended`
    pub fn reject(&mut self) -> Result<CallState, SignalingError> {
        self.transition(&[CallState::Ringing], CallState::Rejected, "reject")?;
        self.transition(&[CallState::Rejected], CallState::Ended, "reject")
    }

    /// First signal payload moves an accepted call to `Active`
    pub fn activate(&mut self) -> Result<CallState, SignalingError> {
        self.transition(
            &[CallState::Accepted, CallState::Active],
            CallState::Active,
            "signal",
        )
    }

    pub fn end(&mut self) -> Result<CallState, SignalingError> {
        self.transition(
            &[CallState::Accepted, CallState::Active],
            CallState::Ended,
            "end",
        )
    }

    /// End from any live state; used when the other side hangs up
    pub fn force_end(&mut self) -> CallState {
        self.state = CallState::Ended;
        self.state
    }

    pub fn set_muted(&mut self, user_id: &str, muted: bool) {
        self.muted.insert(user_id.to_string(), muted);
    }

    pub fn is_muted(&self, user_id: &str) -> bool {
        self.muted.get(user_id).copied().unwrap_or(false)
    }

    pub fn set_hand_raised(&mut self, user_id: &str, raised: bool) {
        self.hands_raised.insert(user_id.to_string(), raised);
    }

    pub fn is_hand_raised(&self, user_id: &str) -> bool {
        self.hands_raised.get(user_id).copied().unwrap_or(false)
    }
}

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{notifier::Notifier, registry::EventRegistry};
use crate::protocol::{EventName, InboundEvent, WireMessage};
use crate::realtime::RealtimeError;

/// What happened to a single inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// A registered handler ran for this event
    Handled(EventName),
    /// Known event with no handler registered
    Unhandled(EventName),
    /// Event name outside the catalogue
    Ignored(String),
    /// Frame arrived on a channel that is no longer bound
    Stale,
    /// Frame or payload could not be decoded
    Malformed,
}

/// Binds the registry's handlers to whichever channel is currently live
///
/// Each (re)connection calls [`bind`](Self::bind) with the new channel id,
/// which detaches the previous channel first: frames still draining from
/// an old channel are dropped instead of being delivered twice. Handlers are
/// resolved from the registry per frame, so registering a new handler takes
/// effect without a reconnect.
#[derive(Clone)]
pub struct DispatchBinder {
    registry: EventRegistry,
    notifier: Arc<dyn Notifier>,
    bound: Arc<RwLock<Option<Uuid>>>,
    handler_timeout: Duration,
}

impl DispatchBinder {
    pub fn new(registry: EventRegistry, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            registry,
            notifier,
            bound: Arc::new(RwLock::new(None)),
            handler_timeout: Duration::from_secs(30),
        }
    }

    /// Set the timeout for individual handler execution
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    /// Attach all registered handlers to `channel_id`, detaching any previous channel
    pub async fn bind(&self, channel_id: Uuid) -> usize {
        let mut bound = self.bound.write().await;
        if let Some(previous) = bound.take() {
            debug!(channel_id = %previous, "Detached handlers from previous channel");
        }
        *bound = Some(channel_id);

        let names = self.registry.registered_names().await;
        info!(
            channel_id = %channel_id,
            handler_count = names.len(),
            "Bound event handlers to channel"
        );
        names.len()
    }

    pub async fn unbind(&self) {
        if let Some(channel_id) = self.bound.write().await.take() {
            debug!(channel_id = %channel_id, "Unbound event handlers");
        }
    }

    pub async fn bound_channel(&self) -> Option<Uuid> {
        *self.bound.read().await
    }

    /// Decode one text frame from `channel_id` and run its handler
    pub async fn dispatch(&self, channel_id: Uuid, frame: &str) -> DispatchOutcome {
        if *self.bound.read().await != Some(channel_id) {
            debug!(channel_id = %channel_id, "Dropping frame from stale channel");
            return DispatchOutcome::Stale;
        }

        let message = match WireMessage::from_json(frame) {
            Ok(message) => message,
            Err(e) => {
                warn!(channel_id = %channel_id, error = %e, "Failed to parse inbound frame");
                return DispatchOutcome::Malformed;
            }
        };

        let Ok(name) = EventName::from_str(&message.event) else {
            debug!(event = %message.event, "Ignoring unknown event");
            return DispatchOutcome::Ignored(message.event);
        };

        let event = match InboundEvent::decode(name, message.payload) {
            Ok(event) => event,
            Err(e) => {
                let violation = RealtimeError::ProtocolViolation(format!("{name}: {e}"));
                warn!(event = %name, error = %violation, "Malformed payload for known event");
                return DispatchOutcome::Malformed;
            }
        };

        if let InboundEvent::Error(payload) = &event {
            self.notifier
                .notify(&RealtimeError::RemoteError(payload.message.clone()));
        }

        let Some(handler) = self.registry.handler_for(name).await else {
            debug!(event = %name, "No handler registered");
            return DispatchOutcome::Unhandled(name);
        };

        match timeout(self.handler_timeout, handler.handle(&event)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(event = %name, handler = handler.name(), error = %e, "Event handler failed");
            }
            Err(_) => {
                warn!(
                    event = %name,
                    handler = handler.name(),
                    timeout_ms = self.handler_timeout.as_millis() as u64,
                    "Event handler timed out"
                );
            }
        }
        DispatchOutcome::Handled(name)
    }
}

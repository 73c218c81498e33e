use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::protocol::{EventName, InboundEvent};

/// Errors a handler can report back to the dispatcher
///
/// These are logged and never stop dispatch of later events.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("Handler failed: {0}")]
    Failed(String),

    #[error("Handler received unexpected event: {0}")]
    UnexpectedEvent(EventName),
}

impl EventError {
    pub fn failed(msg: impl Into<String>) -> Self {
        EventError::Failed(msg.into())
    }
}

/// Callback bound to one inbound event name
///
/// Handlers run one at a time in the order events arrive on the channel,
/// so a slow handler delays the ones behind it.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &InboundEvent) -> Result<(), EventError>;

    /// Get a human-readable name for this handler (for logging/debugging)
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Adapter turning a plain closure into an [`EventHandler`]
pub struct FnHandler<F> {
    name: &'static str,
    callback: F,
}

#[async_trait]
impl<F> EventHandler for FnHandler<F>
where
    F: Fn(&InboundEvent) + Send + Sync,
{
    async fn handle(&self, event: &InboundEvent) -> Result<(), EventError> {
        (self.callback)(event);
        Ok(())
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// Wrap a closure as a shareable handler
pub fn handler_fn<F>(name: &'static str, callback: F) -> Arc<dyn EventHandler>
where
    F: Fn(&InboundEvent) + Send + Sync + 'static,
{
    Arc::new(FnHandler { name, callback })
}

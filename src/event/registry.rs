use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::handler::EventHandler;
use crate::protocol::EventName;

/// A batch of handlers keyed by event name, merged into the registry at once
#[derive(Default, Clone)]
pub struct HandlerSet {
    entries: HashMap<EventName, Arc<dyn EventHandler>>,
}

impl HandlerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler; a later `on` for the same name replaces the earlier one
    pub fn on(mut self, name: EventName, handler: Arc<dyn EventHandler>) -> Self {
        self.entries.insert(name, handler);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = EventName> + '_ {
        self.entries.keys().copied()
    }
}

/// Event name -> the single handler currently active for it
///
/// Registration overwrites: the previous handler for a name is dropped and
/// never invoked again. Cheap to clone; clones share the same map.
#[derive(Default, Clone)]
pub struct EventRegistry {
    handlers: Arc<RwLock<HashMap<EventName, Arc<dyn EventHandler>>>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a set into the registry under one write lock
    pub async fn register_handlers(&self, set: HandlerSet) {
        let mut handlers = self.handlers.write().await;
        for (name, handler) in set.entries {
            if let Some(previous) = handlers.insert(name, handler) {
                debug!(
                    event = %name,
                    replaced = previous.name(),
                    "Replaced existing event handler"
                );
            }
        }
    }

    pub async fn register(&self, name: EventName, handler: Arc<dyn EventHandler>) {
        self.register_handlers(HandlerSet::new().on(name, handler))
            .await;
    }

    pub async fn unregister(&self, name: EventName) -> bool {
        self.handlers.write().await.remove(&name).is_some()
    }

    pub async fn handler_for(&self, name: EventName) -> Option<Arc<dyn EventHandler>> {
        self.handlers.read().await.get(&name).cloned()
    }

    pub async fn registered_names(&self) -> Vec<EventName> {
        self.handlers.read().await.keys().copied().collect()
    }

    pub async fn clear(&self) {
        self.handlers.write().await.clear();
    }
}

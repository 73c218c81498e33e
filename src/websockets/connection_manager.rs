use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

/// Online users on the relay and the outbound queue of each
#[async_trait]
pub trait ConnectionManager: Send + Sync {
    /// Register a connection; a newer one for the same user replaces the older
    async fn add_connection(
        &self,
        user_id: String,
        connection_id: Uuid,
        sender: mpsc::UnboundedSender<String>,
    );

    /// Remove a connection only if it is still the current one for the user
    async fn remove_connection(&self, user_id: &str, connection_id: Uuid);

    /// Queue a frame for a user; false when they are offline
    async fn send_to_user(&self, user_id: &str, message: &str) -> bool;

    async fn is_online(&self, user_id: &str) -> bool;

    async fn online_count(&self) -> usize;
}

struct Entry {
    connection_id: Uuid,
    sender: mpsc::UnboundedSender<String>,
}

#[derive(Default)]
pub struct InMemoryConnectionManager {
    // user id -> current connection
    connections: Arc<RwLock<HashMap<String, Entry>>>,
}

impl InMemoryConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConnectionManager for InMemoryConnectionManager {
    async fn add_connection(
        &self,
        user_id: String,
        connection_id: Uuid,
        sender: mpsc::UnboundedSender<String>,
    ) {
        let mut connections = self.connections.write().await;
        let previous = connections.insert(
            user_id.clone(),
            Entry {
                connection_id,
                sender,
            },
        );
        if let Some(previous) = previous {
            debug!(
                user_id = %user_id,
                replaced = %previous.connection_id,
                "Newer connection replaces previous one"
            );
            // dropping the old sender ends that connection's outbound loop
        }
    }

    async fn remove_connection(&self, user_id: &str, connection_id: Uuid) {
        let mut connections = self.connections.write().await;
        if connections
            .get(user_id)
            .is_some_and(|entry| entry.connection_id == connection_id)
        {
            connections.remove(user_id);
        }
    }

    async fn send_to_user(&self, user_id: &str, message: &str) -> bool {
        let connections = self.connections.read().await;
        match connections.get(user_id) {
            Some(entry) => entry.sender.send(message.to_string()).is_ok(),
            None => false,
        }
    }

    async fn is_online(&self, user_id: &str) -> bool {
        self.connections.read().await.contains_key(user_id)
    }

    async fn online_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

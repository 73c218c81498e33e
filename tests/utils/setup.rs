//! Builders wiring a connection manager to the mock transport
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use carelink::{ConnectionManager, RealtimeConfig, ReconnectPolicy, SignalingSessions};

use super::mocks::{MockTransport, RecordingNotifier};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestSetup {
    pub manager: ConnectionManager,
    pub transport: Arc<MockTransport>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestSetup {
    /// Connect as `user_id` and hand back the fresh channel
    pub async fn connected_as(&self, user_id: &str) -> super::mocks::MockChannelHandle {
        self.manager
            .connect(user_id)
            .await
            .expect("connect should succeed");
        self.transport.latest_channel()
    }

    /// Signaling table for `user_id`, already registered on the manager
    pub async fn signaling_for(&self, user_id: &str) -> SignalingSessions {
        let sessions = SignalingSessions::new(user_id, Arc::new(self.manager.clone()));
        self.manager.register_handlers(sessions.handler_set()).await;
        sessions
    }
}

pub struct TestSetupBuilder {
    reconnect: ReconnectPolicy,
    connect_timeout: Duration,
    open_delay: Duration,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            reconnect: ReconnectPolicy::default(),
            connect_timeout: Duration::from_secs(10),
            open_delay: Duration::ZERO,
        }
    }

    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn without_auto_reconnect(self) -> Self {
        self.with_reconnect_policy(ReconnectPolicy::disabled())
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    pub fn build(self) -> TestSetup {
        let transport = MockTransport::new();
        transport.set_open_delay(self.open_delay);
        let notifier = RecordingNotifier::new();

        let config = RealtimeConfig::new("ws://realtime.test/ws")
            .with_reconnect_policy(self.reconnect)
            .with_connect_timeout(self.connect_timeout);
        let manager = ConnectionManager::new(config, transport.clone(), notifier.clone());

        TestSetup {
            manager,
            transport,
            notifier,
        }
    }
}

impl Default for TestSetupBuilder {
    fn default() -> Self {
        Self::new()
    }
}

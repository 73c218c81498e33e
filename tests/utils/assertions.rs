//! Waiting and assertion helpers
#![allow(dead_code)] // Test utilities may not all be used in every test

use std::future::Future;
use std::time::Duration;

use carelink::{ConnectionManager, ConnectionState, WireMessage};

use super::mocks::MockChannelHandle;

const WAIT_LIMIT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Poll `condition` until it holds, failing the test after thirty seconds
pub async fn wait_until<F, Fut>(what: &str, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    while !condition().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting until {}",
            what
        );
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

pub async fn wait_for_state(manager: &ConnectionManager, expected: ConnectionState) {
    let mut states = manager.subscribe_state();
    let reached = matches!(
        tokio::time::timeout(WAIT_LIMIT, states.wait_for(|s| *s == expected)).await,
        Ok(Ok(_))
    );
    assert!(
        reached,
        "manager never reached {}, currently {}",
        expected,
        manager.state()
    );
}

/// Let spawned tasks run without moving far in time
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

/// Fluent checks over what a mock channel wrote
pub struct SentFrames {
    frames: Vec<WireMessage>,
}

impl SentFrames {
    pub fn on(channel: &MockChannelHandle) -> Self {
        Self {
            frames: channel.sent(),
        }
    }

    pub fn count(self, expected: usize) -> Self {
        assert_eq!(
            self.frames.len(),
            expected,
            "unexpected frames: {:?}",
            self.frames
        );
        self
    }

    pub fn events(&self) -> Vec<String> {
        self.frames.iter().map(|f| f.event.clone()).collect()
    }

    pub fn last(&self) -> &WireMessage {
        self.frames.last().expect("no frame was sent")
    }

    pub fn last_from(self, sender_id: &str) -> Self {
        let meta = self.last().meta.clone().expect("frame has no meta");
        assert_eq!(meta.sender_id.as_deref(), Some(sender_id));
        self
    }
}

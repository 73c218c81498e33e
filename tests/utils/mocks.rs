//! Scriptable transport and channel doubles for driving the connection manager
#![allow(dead_code)] // Test utilities may not all be used in every test

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

use carelink::event::Notifier;
use carelink::realtime::{Channel, ChannelError, Transport};
use carelink::{InboundEvent, RealtimeError, WireMessage};

// ============================================================================
// Mock Channel
// ============================================================================

enum Incoming {
    Frame(String),
    RemoteClose,
    Drop(String),
}

pub struct MockChannel {
    incoming: mpsc::UnboundedReceiver<Incoming>,
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Channel for MockChannel {
    async fn send_message(&mut self, message: String) -> Result<(), ChannelError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ChannelError::ConnectionClosed);
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn receive_message(&mut self) -> Result<Option<String>, ChannelError> {
        match self.incoming.recv().await {
            Some(Incoming::Frame(text)) => Ok(Some(text)),
            Some(Incoming::RemoteClose) => Ok(None),
            Some(Incoming::Drop(reason)) => Err(ChannelError::ReceiveFailed(reason)),
            None => Err(ChannelError::ConnectionClosed),
        }
    }

    async fn close(&mut self) -> Result<(), ChannelError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Test-side handle onto a channel the manager opened
#[derive(Clone)]
pub struct MockChannelHandle {
    pub user_id: String,
    incoming: mpsc::UnboundedSender<Incoming>,
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl MockChannelHandle {
    /// Push a raw frame as if the server sent it
    pub fn push_raw(&self, text: &str) {
        let _ = self.incoming.send(Incoming::Frame(text.to_string()));
    }

    /// Push a server event
    pub fn push_event(&self, event: &InboundEvent) {
        let frame = WireMessage::new(event.name().as_ref(), event.to_payload().unwrap());
        self.push_raw(&frame.to_json().unwrap());
    }

    /// Server closes the channel on purpose
    pub fn remote_close(&self) {
        let _ = self.incoming.send(Incoming::RemoteClose);
    }

    /// Transport failure underneath the channel
    pub fn drop_connection(&self) {
        let _ = self
            .incoming
            .send(Incoming::Drop("connection reset".to_string()));
    }

    pub fn sent(&self) -> Vec<WireMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|text| WireMessage::from_json(text).unwrap())
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Mock Transport
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpenOutcome {
    Succeed,
    Fail(&'static str),
}

#[derive(Debug, Clone)]
pub struct OpenRecord {
    pub user_id: String,
    pub at: Instant,
}

/// Transport whose open results are scripted; unscripted opens succeed
#[derive(Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<OpenOutcome>>,
    open_delay: Mutex<Duration>,
    opens: Mutex<Vec<OpenRecord>>,
    channels: Mutex<Vec<MockChannelHandle>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, outcomes: impl IntoIterator<Item = OpenOutcome>) {
        self.script.lock().unwrap().extend(outcomes);
    }

    pub fn set_open_delay(&self, delay: Duration) {
        *self.open_delay.lock().unwrap() = delay;
    }

    pub fn open_count(&self) -> usize {
        self.opens.lock().unwrap().len()
    }

    pub fn opens(&self) -> Vec<OpenRecord> {
        self.opens.lock().unwrap().clone()
    }

    /// Channels successfully opened, oldest first
    pub fn channels(&self) -> Vec<MockChannelHandle> {
        self.channels.lock().unwrap().clone()
    }

    pub fn channel(&self, index: usize) -> MockChannelHandle {
        self.channels()
            .get(index)
            .cloned()
            .unwrap_or_else(|| panic!("no channel #{} was opened", index))
    }

    pub fn latest_channel(&self) -> MockChannelHandle {
        self.channels()
            .last()
            .cloned()
            .expect("no channel was opened")
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self, user_id: &str) -> Result<Box<dyn Channel>, ChannelError> {
        self.opens.lock().unwrap().push(OpenRecord {
            user_id: user_id.to_string(),
            at: Instant::now(),
        });

        let delay = *self.open_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(OpenOutcome::Succeed);
        if let OpenOutcome::Fail(reason) = outcome {
            return Err(ChannelError::ConnectFailed(reason.to_string()));
        }

        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        self.channels.lock().unwrap().push(MockChannelHandle {
            user_id: user_id.to_string(),
            incoming: incoming_tx,
            sent: sent.clone(),
            closed: closed.clone(),
        });

        Ok(Box::new(MockChannel {
            incoming: incoming_rx,
            sent,
            closed,
        }))
    }
}

// ============================================================================
// Recorders
// ============================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    errors: Mutex<Vec<RealtimeError>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn errors(&self) -> Vec<RealtimeError> {
        self.errors.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, error: &RealtimeError) {
        self.errors.lock().unwrap().push(error.clone());
    }
}

/// Collects every event a handler built from it receives
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<InboundEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handler(&self, name: &'static str) -> Arc<dyn carelink::EventHandler> {
        let events = self.events.clone();
        carelink::handler_fn(name, move |event| {
            events.lock().unwrap().push(event.clone());
        })
    }

    pub fn events(&self) -> Vec<InboundEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

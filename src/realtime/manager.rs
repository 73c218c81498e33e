use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use strum_macros::Display;
use tokio::sync::{watch, Mutex};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::errors::RealtimeError;
use super::link::{Link, LinkExit};
use super::transport::{Transport, WebSocketTransport};
use crate::config::RealtimeConfig;
use crate::event::{DispatchBinder, EventRegistry, HandlerSet, LogNotifier, Notifier};
use crate::protocol::WireMessage;

/// Observable lifecycle of the manager's channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

type SharedOutcome = Shared<BoxFuture<'static, Result<(), RealtimeError>>>;

/// A handle on one connection attempt, cloned by every waiter
#[derive(Clone)]
struct Attempt {
    outcome: SharedOutcome,
    /// Set by the first waiter that reports a failure, so it is notified once
    reported: Arc<AtomicBool>,
}

/// The single in-flight connection attempt
struct PendingConnection {
    id: Uuid,
    user_id: String,
    attempt: Attempt,
    task: AbortHandle,
}

#[derive(Default)]
struct Inner {
    identity: Option<String>,
    /// Bumped whenever the identity is cleared or replaced; a retry loop
    /// started under an older epoch stops at its next check.
    epoch: u64,
    link: Option<Link>,
    pending: Option<PendingConnection>,
    retry: Option<JoinHandle<()>>,
}

struct Core {
    config: RealtimeConfig,
    transport: Arc<dyn Transport>,
    registry: EventRegistry,
    binder: DispatchBinder,
    notifier: Arc<dyn Notifier>,
    inner: Mutex<Inner>,
    state: watch::Sender<ConnectionState>,
}

/// Owns the client's channel: identity, live link, pending attempt, handlers
///
/// Cheap to clone; clones share one underlying connection. Create one per
/// logical client session.
#[derive(Clone)]
pub struct ConnectionManager {
    core: Arc<Core>,
}

impl ConnectionManager {
    pub fn new(
        config: RealtimeConfig,
        transport: Arc<dyn Transport>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let registry = EventRegistry::new();
        let binder = DispatchBinder::new(registry.clone(), Arc::clone(&notifier))
            .with_handler_timeout(config.handler_timeout);
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            core: Arc::new(Core {
                config,
                transport,
                registry,
                binder,
                notifier,
                inner: Mutex::new(Inner::default()),
                state,
            }),
        }
    }

    /// Manager over the WebSocket transport that reports failures to the log
    pub fn with_websocket(config: RealtimeConfig) -> Self {
        let transport = Arc::new(WebSocketTransport::new(&config));
        Self::new(config, transport, Arc::new(LogNotifier))
    }

    pub fn state(&self) -> ConnectionState {
        *self.core.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.core.state.subscribe()
    }

    pub async fn identity(&self) -> Option<String> {
        self.core.inner.lock().await.identity.clone()
    }

    pub async fn is_live(&self) -> bool {
        self.core
            .inner
            .lock()
            .await
            .link
            .as_ref()
            .is_some_and(|link| link.is_alive())
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.core.registry
    }

    /// Merge handlers into the registry; takes effect on the live channel immediately
    pub async fn register_handlers(&self, set: HandlerSet) {
        self.core.registry.register_handlers(set).await;
    }

    /// Open (or join) a channel for `user_id`
    ///
    /// Returns immediately when already connected as `user_id`, joins the
    /// in-flight attempt when one exists for the same identity, and tears
    /// down any channel or attempt for a different identity first.
    #[instrument(skip(self))]
    pub async fn connect(&self, user_id: &str) -> Result<(), RealtimeError> {
        let Some(attempt) = self.core.begin_connect(user_id).await else {
            return Ok(());
        };
        let result = attempt.outcome.await;
        if let Err(e @ RealtimeError::ConnectionFailed(_)) = &result {
            if !attempt.reported.swap(true, Ordering::AcqRel) {
                self.core.notifier.notify(e);
            }
        }
        result
    }

    /// Reconnect with the bound identity; no-op when none is bound
    #[instrument(skip(self))]
    pub async fn reconnect(&self) -> Result<(), RealtimeError> {
        match self.identity().await {
            Some(user_id) => self.connect(&user_id).await,
            None => {
                debug!("Reconnect requested without a bound identity, ignoring");
                Ok(())
            }
        }
    }

    /// Tear everything down: channel, identity, handlers, pending and queued attempts
    #[instrument(skip(self))]
    pub async fn disconnect(&self, reason: Option<&str>) {
        let mut inner = self.core.inner.lock().await;
        let was_active = inner.identity.is_some()
            || inner.link.is_some()
            || inner.pending.is_some()
            || inner.retry.is_some();

        inner.identity = None;
        inner.epoch += 1;

        if let Some(retry) = inner.retry.take() {
            retry.abort();
        }
        if let Some(pending) = inner.pending.take() {
            pending.task.abort();
            let _ = pending.attempt.outcome.await;
        }
        self.core.binder.unbind().await;
        if let Some(link) = inner.link.take() {
            link.shutdown().await;
        }
        self.core.registry.clear().await;
        self.core.set_state(ConnectionState::Disconnected);

        if was_active {
            info!(reason = reason.unwrap_or("unspecified"), "Disconnected");
        }
    }

    /// Send one event, reconnecting at most once if the channel is not live
    ///
    /// Resolves after the frame is written. There is no retry of the send
    /// itself: delivery is at most once.
    #[instrument(skip(self, payload))]
    pub async fn emit<P>(&self, event: &str, payload: &P) -> Result<(), RealtimeError>
    where
        P: Serialize + Sync + ?Sized,
    {
        let user_id = self
            .identity()
            .await
            .ok_or(RealtimeError::Unauthenticated)?;
        let text = WireMessage::from_payload(event, payload)?
            .with_sender(user_id.as_str())
            .to_json()?;

        if !self.is_live().await {
            debug!(event = %event, "Channel not live, attempting one reconnection before emit");
            self.core
                .connect_inner(&user_id)
                .await
                .map_err(|e| RealtimeError::ConnectionUnavailable(e.to_string()))?;
        }

        let written = {
            let inner = self.core.inner.lock().await;
            let link = inner
                .link
                .as_ref()
                .filter(|link| link.is_alive())
                .ok_or_else(|| {
                    RealtimeError::ConnectionUnavailable("channel closed before send".to_string())
                })?;
            link.send(text)
                .map_err(|e| RealtimeError::ConnectionUnavailable(e.to_string()))?
        };

        match written.await {
            Ok(Ok(())) => {
                debug!(event = %event, "Event emitted");
                Ok(())
            }
            Ok(Err(e)) => Err(RealtimeError::ConnectionUnavailable(e.to_string())),
            Err(_) => Err(RealtimeError::ConnectionUnavailable(
                "channel closed before the frame was written".to_string(),
            )),
        }
    }
}

impl Core {
    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = %previous, to = %next, "Connection state changed");
        }
    }

    async fn connect_inner(self: &Arc<Self>, user_id: &str) -> Result<(), RealtimeError> {
        match self.begin_connect(user_id).await {
            Some(attempt) => attempt.outcome.await,
            None => Ok(()),
        }
    }

    async fn begin_connect(self: &Arc<Self>, user_id: &str) -> Option<Attempt> {
        let mut inner = self.inner.lock().await;
        self.begin_connect_locked(&mut inner, user_id).await
    }

    /// Decide under the lock whether to reuse, join or start an attempt
    async fn begin_connect_locked(
        self: &Arc<Self>,
        inner: &mut Inner,
        user_id: &str,
    ) -> Option<Attempt> {
        if let Some(link) = &inner.link {
            if link.user_id == user_id && link.is_alive() {
                debug!(user_id = %user_id, "Already connected");
                return None;
            }
        }

        if let Some(pending) = &inner.pending {
            if pending.user_id == user_id {
                debug!(user_id = %user_id, attempt_id = %pending.id, "Joining in-flight connection attempt");
                return Some(pending.attempt.clone());
            }
        }

        if inner.identity.as_deref() != Some(user_id) {
            if let Some(previous) = &inner.identity {
                info!(previous = %previous, next = %user_id, "Superseding connection for a different identity");
            }
            inner.identity = Some(user_id.to_string());
            inner.epoch += 1;
            if let Some(retry) = inner.retry.take() {
                retry.abort();
            }
        }

        // Release the superseded attempt and channel before opening a new one
        if let Some(pending) = inner.pending.take() {
            pending.task.abort();
            let _ = pending.attempt.outcome.await;
        }

        // A link that died before its exit was handled is taken over here,
        // so the backoff it would have started moves to this attempt
        let mut resume_on_failure = false;
        if let Some(link) = inner.link.take() {
            self.binder.unbind().await;
            let same_user = link.user_id == user_id;
            let exit = link.shutdown().await;
            resume_on_failure = same_user && matches!(exit, Some(LinkExit::Dropped(_)));
        }

        Some(self.start_attempt(inner, user_id, resume_on_failure))
    }

    fn start_attempt(
        self: &Arc<Self>,
        inner: &mut Inner,
        user_id: &str,
        resume_on_failure: bool,
    ) -> Attempt {
        let attempt_id = Uuid::new_v4();
        info!(user_id = %user_id, attempt_id = %attempt_id, "Opening channel");
        self.set_state(ConnectionState::Connecting);

        let task = tokio::spawn(Arc::clone(self).run_attempt(
            attempt_id,
            user_id.to_string(),
            resume_on_failure,
        ));
        let abort = task.abort_handle();
        let outcome = async move {
            match task.await {
                Ok(result) => result,
                Err(e) if e.is_cancelled() => Err(RealtimeError::Cancelled),
                Err(e) => Err(RealtimeError::ConnectionFailed(e.to_string())),
            }
        }
        .boxed()
        .shared();

        let attempt = Attempt {
            outcome,
            reported: Arc::new(AtomicBool::new(false)),
        };
        inner.pending = Some(PendingConnection {
            id: attempt_id,
            user_id: user_id.to_string(),
            attempt: attempt.clone(),
            task: abort,
        });
        attempt
    }

    async fn run_attempt(
        self: Arc<Self>,
        attempt_id: Uuid,
        user_id: String,
        resume_on_failure: bool,
    ) -> Result<(), RealtimeError> {
        let opened = match timeout(self.config.connect_timeout, self.transport.open(&user_id)).await
        {
            Ok(Ok(channel)) => Ok(channel),
            Ok(Err(e)) => Err(RealtimeError::ConnectionFailed(e.to_string())),
            Err(_) => Err(RealtimeError::ConnectionFailed(format!(
                "timed out after {}ms",
                self.config.connect_timeout.as_millis()
            ))),
        };

        let mut inner = self.inner.lock().await;
        if !inner.pending.as_ref().is_some_and(|p| p.id == attempt_id) {
            debug!(attempt_id = %attempt_id, "Connection attempt superseded, discarding");
            if let Ok(mut channel) = opened {
                let _ = channel.close().await;
            }
            return Err(RealtimeError::Cancelled);
        }
        inner.pending = None;

        match opened {
            Ok(channel) => {
                let channel_id = Uuid::new_v4();
                self.binder.bind(channel_id).await;
                let link = Link::spawn(
                    channel_id,
                    user_id.clone(),
                    channel,
                    self.binder.clone(),
                    self.exit_callback(),
                );
                inner.link = Some(link);
                self.set_state(ConnectionState::Connected);
                info!(user_id = %user_id, channel_id = %channel_id, "Channel connected");
                Ok(())
            }
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                warn!(user_id = %user_id, error = %e, "Connection attempt failed");
                if resume_on_failure && self.config.reconnect.max_attempts > 0 {
                    self.schedule_retry(&mut inner, user_id);
                }
                Err(e)
            }
        }
    }

    /// Callback handed to each link; reacts to exits we did not initiate
    fn exit_callback(self: &Arc<Self>) -> impl FnOnce(Uuid, LinkExit) + Send + 'static {
        let core: Weak<Core> = Arc::downgrade(self);
        move |channel_id, exit| {
            if exit == LinkExit::Local {
                return;
            }
            if let Some(core) = core.upgrade() {
                tokio::spawn(core.handle_link_exit(channel_id, exit));
            }
        }
    }

    // Boxed so the exit -> retry -> connect -> exit chain has a nameable Send type
    fn handle_link_exit(
        self: Arc<Self>,
        channel_id: Uuid,
        exit: LinkExit,
    ) -> BoxFuture<'static, ()> {
        async move {
            let mut inner = self.inner.lock().await;
            if inner.link.as_ref().map(|link| link.id) != Some(channel_id) {
                debug!(channel_id = %channel_id, "Exit from a channel that is no longer current");
                return;
            }
            let Some(link) = inner.link.take() else {
                return;
            };
            self.binder.unbind().await;
            self.set_state(ConnectionState::Disconnected);

            match exit {
                LinkExit::Local => {}
                LinkExit::RemoteClosed => {
                    info!(user_id = %link.user_id, "Channel closed by server, clearing identity");
                    inner.identity = None;
                    inner.epoch += 1;
                }
                LinkExit::Dropped(e) => {
                    warn!(user_id = %link.user_id, error = %e, "Channel dropped");
                    if self.config.reconnect.max_attempts == 0 {
                        self.notifier
                            .notify(&RealtimeError::ConnectionFailed(e.to_string()));
                        return;
                    }
                    self.schedule_retry(&mut inner, link.user_id.clone());
                }
            }
        }
        .boxed()
    }

    fn schedule_retry(self: &Arc<Self>, inner: &mut Inner, user_id: String) {
        if let Some(previous) = inner.retry.take() {
            previous.abort();
        }
        let retry = Arc::clone(self).retry_loop(user_id, inner.epoch);
        inner.retry = Some(tokio::spawn(retry));
    }

    async fn session_matches(&self, user_id: &str, epoch: u64) -> bool {
        let inner = self.inner.lock().await;
        inner.epoch == epoch && inner.identity.as_deref() == Some(user_id)
    }

    /// Bounded exponential backoff after a transport drop
    fn retry_loop(self: Arc<Self>, user_id: String, epoch: u64) -> BoxFuture<'static, ()> {
        async move { self.run_retries(user_id, epoch).await }.boxed()
    }

    async fn run_retries(self: Arc<Self>, user_id: String, epoch: u64) {
        let policy = self.config.reconnect.clone();

        for attempt in 1..=policy.max_attempts {
            let delay = policy.delay_for_attempt(attempt);
            info!(
                user_id = %user_id,
                attempt = attempt,
                max_attempts = policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "Scheduling reconnection attempt"
            );
            sleep(delay).await;

            if !self.session_matches(&user_id, epoch).await {
                debug!(user_id = %user_id, "Session changed, abandoning reconnection");
                return;
            }

            match self.connect_inner(&user_id).await {
                Ok(()) => {
                    info!(user_id = %user_id, attempt = attempt, "Reconnected");
                    return;
                }
                Err(RealtimeError::Cancelled) => return,
                Err(e) => {
                    warn!(user_id = %user_id, attempt = attempt, error = %e, "Reconnection attempt failed");
                }
            }
        }

        if self.session_matches(&user_id, epoch).await {
            error!(
                user_id = %user_id,
                attempts = policy.max_attempts,
                "Reconnection attempts exhausted"
            );
            self.set_state(ConnectionState::Disconnected);
            self.notifier.notify(&RealtimeError::ConnectionFailed(format!(
                "gave up after {} reconnection attempts",
                policy.max_attempts
            )));
        }
    }
}

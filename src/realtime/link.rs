use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use super::transport::{Channel, ChannelError};
use crate::event::DispatchBinder;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// A frame queued for the pump together with the caller awaiting its write
pub(crate) struct OutboundFrame {
    pub text: String,
    pub ack: oneshot::Sender<Result<(), ChannelError>>,
}

/// Why a link stopped running
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LinkExit {
    /// Our side closed it (disconnect or supersede)
    Local,
    /// The server closed the channel deliberately
    RemoteClosed,
    /// The transport failed underneath us
    Dropped(ChannelError),
}

/// A live channel owned by the connection manager
///
/// Runs two tasks: the pump, which owns the channel and moves frames in both
/// directions, and the dispatcher, which feeds inbound frames to the binder
/// one at a time. Keeping dispatch off the pump lets a handler emit without
/// waiting on itself.
pub(crate) struct Link {
    pub id: Uuid,
    pub user_id: String,
    outbound: mpsc::UnboundedSender<OutboundFrame>,
    pump: JoinHandle<LinkExit>,
    _dispatch: JoinHandle<()>,
}

impl Link {
    pub fn spawn<F>(
        id: Uuid,
        user_id: String,
        channel: Box<dyn Channel>,
        binder: DispatchBinder,
        on_exit: F,
    ) -> Self
    where
        F: FnOnce(Uuid, LinkExit) + Send + 'static,
    {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<OutboundFrame>();
        let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel::<String>();

        let dispatch = tokio::spawn(async move {
            while let Some(frame) = inbound_rx.recv().await {
                binder.dispatch(id, &frame).await;
            }
        });

        let pump_user = user_id.clone();
        let pump = tokio::spawn(async move {
            let exit = run_pump(channel, outbound_rx, inbound_tx).await;
            debug!(channel_id = %id, user_id = %pump_user, exit = ?exit, "Channel pump stopped");
            on_exit(id, exit.clone());
            exit
        });

        Self {
            id,
            user_id,
            outbound: outbound_tx,
            pump,
            _dispatch: dispatch,
        }
    }

    pub fn is_alive(&self) -> bool {
        !self.pump.is_finished() && !self.outbound.is_closed()
    }

    /// Queue a frame; the returned receiver resolves once it has been written
    pub fn send(
        &self,
        text: String,
    ) -> Result<oneshot::Receiver<Result<(), ChannelError>>, ChannelError> {
        let (ack, written) = oneshot::channel();
        self.outbound
            .send(OutboundFrame { text, ack })
            .map_err(|_| ChannelError::ConnectionClosed)?;
        Ok(written)
    }

    /// Close the channel and wait for the pump to finish
    ///
    /// Returns how the pump stopped; a link that had already died reports
    /// its original exit rather than `Local`.
    pub async fn shutdown(self) -> Option<LinkExit> {
        let Link {
            id, outbound, pump, ..
        } = self;
        drop(outbound);

        let abort = pump.abort_handle();
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, pump).await {
            Ok(Ok(exit)) => Some(exit),
            Ok(Err(_)) => None,
            Err(_) => {
                warn!(channel_id = %id, "Channel did not close in time, aborting");
                abort.abort();
                None
            }
        }
    }
}

/// Run the channel - handles both sending and receiving until disconnect
async fn run_pump(
    mut channel: Box<dyn Channel>,
    mut outbound_rx: mpsc::UnboundedReceiver<OutboundFrame>,
    inbound_tx: mpsc::UnboundedSender<String>,
) -> LinkExit {
    loop {
        tokio::select! {
            // Outbound frames (from our app to the server)
            frame = outbound_rx.recv() => {
                match frame {
                    Some(OutboundFrame { text, ack }) => {
                        if let Err(e) = channel.send_message(text).await {
                            let _ = ack.send(Err(e.clone()));
                            return LinkExit::Dropped(e);
                        }
                        let _ = ack.send(Ok(()));
                    }
                    None => break, // Manager released the link
                }
            }

            // Inbound frames (from the server to our handlers)
            msg = channel.receive_message() => {
                match msg {
                    Ok(Some(text)) => {
                        if inbound_tx.send(text).is_err() {
                            break;
                        }
                    }
                    Ok(None) => return LinkExit::RemoteClosed,
                    Err(e) => return LinkExit::Dropped(e),
                }
            }
        }
    }

    // Clean disconnect
    let _ = channel.close().await;
    LinkExit::Local
}

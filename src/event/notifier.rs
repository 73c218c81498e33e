use tracing::error;

use crate::realtime::RealtimeError;

/// Sink for failures the user should see
///
/// The UI layer implements this to raise a toast or banner; the default
/// implementation only logs.
pub trait Notifier: Send + Sync {
    fn notify(&self, error: &RealtimeError);
}

/// Notifier that reports through `tracing`
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, err: &RealtimeError) {
        error!(error = %err, "Realtime failure");
    }
}

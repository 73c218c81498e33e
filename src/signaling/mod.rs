// Per-appointment call signaling on top of the realtime channel

pub use session::{CallDirection, CallState, SignalingError, SignalingSession};
pub use sessions::{SessionUpdate, SignalingSessions};

mod session;
mod sessions;

// Realtime layer for the CareLink telehealth client, plus the relay server
// the client talks to.

pub mod config;
pub mod event;
pub mod protocol;
pub mod realtime;
pub mod shared;
pub mod signaling;
pub mod websockets;

// Re-export commonly used types for easier access in tests
pub use config::{RealtimeConfig, ReconnectPolicy, RelayConfig};
pub use event::{handler_fn, EventHandler, EventRegistry, HandlerSet, Notifier};
pub use protocol::{EventName, InboundEvent, OutboundEvent, WireMessage};
pub use realtime::{ConnectionManager, ConnectionState, Emitter, RealtimeError};
pub use shared::{AppError, AppState};
pub use signaling::{CallState, SessionUpdate, SignalingError, SignalingSessions};
pub use websockets::relay_router;

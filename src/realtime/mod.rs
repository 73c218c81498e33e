// Client side of the realtime channel
//
// The connection manager owns the single channel per client session and
// the emission gateway on top of it; the transport is the seam to the
// network.

// Public API
pub use emitter::Emitter;
pub use errors::RealtimeError;
pub use manager::{ConnectionManager, ConnectionState};
pub use transport::{
    endpoint_url, Channel, ChannelError, Transport, WebSocketChannel, WebSocketTransport,
};

// Internal modules
mod emitter;
mod errors;
mod link;
mod manager;
mod transport;

// Relay server: routes client actions to the receiving user's socket

// Public API
pub use connection_manager::{ConnectionManager, InMemoryConnectionManager};
pub use handler::{relay_router, websocket_handler, RelayMessageHandler};
pub use routing::{route, RelayError, Routed};
pub use socket::MessageHandler;

// Internal modules
mod connection_manager;
mod handler;
mod routing;
mod socket;

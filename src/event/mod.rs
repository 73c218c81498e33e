// Inbound event plumbing for the client core
//
// The registry holds one handler per event name, the dispatch binder attaches
// those handlers to whichever channel is live and routes decoded frames to
// them, and the notifier surfaces failures the user should see.

// Public API - what other modules can use
pub use dispatcher::{DispatchBinder, DispatchOutcome};
pub use handler::{handler_fn, EventError, EventHandler, FnHandler};
pub use notifier::{LogNotifier, Notifier};
pub use registry::{EventRegistry, HandlerSet};

// Internal modules
mod dispatcher;
mod handler;
mod notifier;
mod registry;

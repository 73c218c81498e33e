pub mod assertions;
pub mod mocks;
pub mod setup;

// Re-export main utilities for use by test files
#[allow(unused_imports)]
pub use assertions::{settle, wait_for_state, wait_until, SentFrames};
#[allow(unused_imports)]
pub use mocks::{EventLog, MockChannelHandle, MockTransport, OpenOutcome, RecordingNotifier};
#[allow(unused_imports)]
pub use setup::{TestSetup, TestSetupBuilder};

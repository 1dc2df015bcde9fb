// Pipeline: the relay loop and the pieces it is built from.

pub mod preview;
pub mod relay;
pub mod retry;
pub mod shutdown;

pub use relay::{CycleReport, Relay, RelaySettings, RelayState};

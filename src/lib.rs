// Ferry: relay new research-forum posts to discussion boards
//
// This is the library root. Each module corresponds to one stage or
// boundary of the relay: source → filter → ledger → delivery, with the
// pipeline module driving the loop.

pub mod config;
pub mod delivery;
pub mod error;
pub mod filter;
pub mod ledger;
pub mod output;
pub mod pipeline;
pub mod source;
pub mod status;

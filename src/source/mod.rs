// Upstream source: where new posts come from.
//
// The orchestrator only sees the Extractor trait. The Discourse extractor
// is the production implementation; tests script their own.

pub mod client;
pub mod discourse;
pub mod models;
pub mod traits;

// Extractor trait: the boundary between the relay and the upstream forum.

use async_trait::async_trait;

use super::models::SourcePost;
use crate::error::ExtractionError;

/// Produces the current upstream listing as an ordered list of posts.
///
/// Each call is a fresh pass over the listing. Order is fixed per
/// implementation and the orchestrator delivers in exactly that order.
/// Failure must be reported as an error, never as an empty list.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    async fn extract(&self) -> Result<Vec<SourcePost>, ExtractionError>;
}

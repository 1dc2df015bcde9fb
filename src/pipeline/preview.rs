// Preview: what the next cycle would do, without doing any of it.
//
// Runs the same extract → filter → ledger check → render steps as the
// relay but never calls a delivery client and never writes the ledger.

use crate::delivery::{FormattedMessage, MessageTemplate};
use crate::error::ExtractionError;
use crate::filter::Filter;
use crate::ledger::Ledger;
use crate::source::models::SourcePost;
use crate::source::traits::Extractor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Would be sent to these destinations (in order).
    Deliver(Vec<String>),
    /// Rejected by the named filter rule.
    Rejected(&'static str),
    /// Every destination already has it.
    AlreadyDelivered,
}

#[derive(Debug, Clone)]
pub struct PreviewEntry {
    pub post: SourcePost,
    pub verdict: Verdict,
    pub message: FormattedMessage,
}

pub async fn preview(
    extractor: &dyn Extractor,
    filter: &Filter,
    ledger: &Ledger,
    destinations: &[String],
    template: &MessageTemplate,
) -> Result<Vec<PreviewEntry>, ExtractionError> {
    let posts = extractor.extract().await?;

    Ok(posts
        .into_iter()
        .map(|post| {
            let verdict = match filter.first_rejection(&post) {
                Some(rule) => Verdict::Rejected(rule),
                None => {
                    let pending: Vec<String> = destinations
                        .iter()
                        .filter(|d| !ledger.contains(&post.topic_id, d))
                        .cloned()
                        .collect();
                    if pending.is_empty() {
                        Verdict::AlreadyDelivered
                    } else {
                        Verdict::Deliver(pending)
                    }
                }
            };
            let message = template.render(&post);
            PreviewEntry {
                post,
                verdict,
                message,
            }
        })
        .collect())
}

// Delivery client trait: the swap-ready boundary to destination boards.
//
// The production implementation submits to Reddit. DryRunClient logs what
// would be sent. Tests script their own.

use async_trait::async_trait;
use tracing::info;

use super::message::FormattedMessage;
use crate::error::DeliveryError;

/// Sends one formatted message to one destination.
///
/// Implementations report failure as Transient (worth retrying) or
/// Permanent (retrying this cycle cannot help). The caller owns retries;
/// `deliver` makes a single attempt.
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    async fn deliver(
        &self,
        destination: &str,
        message: &FormattedMessage,
    ) -> Result<(), DeliveryError>;
}

/// Logs the message instead of sending it, and always succeeds.
pub struct DryRunClient;

#[async_trait]
impl DeliveryClient for DryRunClient {
    async fn deliver(
        &self,
        destination: &str,
        message: &FormattedMessage,
    ) -> Result<(), DeliveryError> {
        info!(
            destination,
            title = %message.title,
            body = %message.body,
            "[dry run] Would submit post"
        );
        Ok(())
    }
}

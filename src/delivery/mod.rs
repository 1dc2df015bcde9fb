// Delivery: formatting posts and handing them to a destination board.

pub mod message;
pub mod rate_limiter;
pub mod reddit;
pub mod traits;

pub use message::{FormattedMessage, MessageTemplate};
pub use traits::{DeliveryClient, DryRunClient};

//! Messaging adapters (Slack).

#[cfg(test)]
pub mod memory;
pub mod slack;
pub mod traits;

pub use traits::{Messaging, MessagingDyn};

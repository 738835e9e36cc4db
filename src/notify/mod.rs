//! Notification payloads and delivery channels

pub mod notifier;
pub mod telegram;

pub use notifier::*;
pub use telegram::*;

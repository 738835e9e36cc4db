//! Arbibot - cross-venue AMM arbitrage engine
//!
//! Watches one asset pair across several constant-product venues, and when
//! the price spread clears a threshold buys on the cheap venue and sells on
//! the expensive one, widening slippage tolerance step by step until the
//! swap lands, the margin disappears or the slippage ceiling is reached.

pub mod config;
pub mod types;
pub mod errors;
pub mod network;
pub mod chain;
pub mod venues;
pub mod arbitrage;
pub mod scheduler;
pub mod notify;
pub mod utils;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used items
pub use config::{Config, CONFIG};
pub use errors::{BotError, BotResult};
pub use types::*;

// Type alias for our concrete provider
pub type ConcreteProvider = alloy::providers::RootProvider<alloy::transports::BoxTransport>;

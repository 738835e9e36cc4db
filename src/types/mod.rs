//! Core data types and structures

pub mod addresses;
pub mod venues;
pub mod session;
pub mod arbitrage;
pub mod execution;

pub use addresses::*;
pub use venues::*;
pub use session::*;
pub use arbitrage::*;
pub use execution::*;

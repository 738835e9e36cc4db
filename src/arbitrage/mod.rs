//! Arbitrage detection, execution and session orchestration

pub mod engine;
pub mod evaluator;
pub mod executor;
pub mod rebalancer;
pub mod session;

pub use engine::*;
pub use evaluator::*;
pub use executor::*;
pub use rebalancer::*;
pub use session::*;

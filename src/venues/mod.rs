//! Venue pricing, ranking and validation

pub mod aggregator;
pub mod reader;
pub mod validation;

pub use aggregator::*;
pub use reader::*;
pub use validation::*;

//! Cycle scheduling and the single-flight guard

pub mod guard;
pub mod runner;

pub use guard::*;
pub use runner::*;

//! Error types shared across the engine

pub mod bot_error;

pub use bot_error::*;

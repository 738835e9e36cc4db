//! Data persistence and file operations

pub mod jobs;
pub mod ledger;

pub use jobs::*;
pub use ledger::*;

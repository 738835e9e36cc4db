//! Chain access: read/write traits and the alloy implementation

pub mod abi;
pub mod alloy_client;
pub mod traits;

pub use alloy_client::*;
pub use traits::*;

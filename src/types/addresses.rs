//! Network addresses and default venue set

use alloy::primitives::{Address, address};

// Avalanche C-Chain mainnet tokens
pub const WAVAX_MAINNET: Address = address!("B31f66AA3C1e785363F0875A1B74E27b85FD66c7");
pub const WETH_E_MAINNET: Address = address!("49D5c2BdFfac6CE2BFdB6640F4F80f226bc10bAB");

/// Venues scanned when `VENUES` is not set. Pair and router addresses are
/// always taken from the environment.
pub const DEFAULT_VENUES: &[&str] = &["trader-joe", "pangolin", "sushi"];

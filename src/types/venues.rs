//! Venue and token definitions

use alloy::primitives::Address;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Naming family of the router's native-asset swap functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RouterFlavor {
    /// `swapExactETHForTokens` / `swapExactTokensForETH`
    Eth,
    /// `swapExactAVAXForTokens` / `swapExactTokensForAVAX`
    Avax,
}

impl FromStr for RouterFlavor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eth" => Ok(RouterFlavor::Eth),
            "avax" => Ok(RouterFlavor::Avax),
            other => Err(format!("unknown router flavor '{}'", other)),
        }
    }
}

/// A configured liquidity venue: one constant-product pair plus the router
/// used to quote and execute swaps against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Venue {
    pub id: String,
    pub pair: Address,
    pub router: Address,
    pub flavor: RouterFlavor,
    /// Set by start-up validation once `token0()` has been read.
    pub base_is_token0: bool,
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenInfo {
    pub symbol: String,
    /// Wrapped address; the base asset is held natively and wrapped by the router.
    pub address: Address,
    pub decimals: u8,
}

/// The traded pair. `base` is the native asset the account holds between
/// cycles (AVAX in the reference deployment), `quote` the ERC-20 it rotates
/// through (WETH).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetPair {
    pub base: TokenInfo,
    pub quote: TokenInfo,
}

/// Per-venue unit prices derived from reserves. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VenueQuote {
    pub venue: String,
    /// One unit of base priced in quote (`quote_reserve / base_reserve`).
    pub price_in_quote_asset: Decimal,
    /// One unit of quote priced in base (`base_reserve / quote_reserve`).
    pub price_in_base_asset: Decimal,
}

//! Arbitrage opportunity types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use super::VenueQuote;

/// Ranked view over one cycle's venue quotes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSpread {
    pub highest: VenueQuote,
    pub lowest: VenueQuote,
    pub percentage_difference: Decimal,
    /// Quotes in descending `price_in_quote_asset` order.
    pub ranked: Vec<VenueQuote>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArbitrageOpportunity {
    pub id: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub buy_venue: String,
    pub sell_venue: String,
    pub percentage_difference: Decimal,
    pub expected_profit: Decimal,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    pub token_in: String,
    pub token_out: String,
    pub initial_balance: Decimal,
    pub slippage: Decimal,
}

//! Position rebalancing: unwinds quote-asset leftovers back into base

use rust_decimal::Decimal;
use tracing::{info, warn};
use crate::{
    arbitrage::executor::{LegPlan, SlippageAdaptiveExecutor},
    types::{AssetPair, ExecutionReport, SwapDirection, Venue},
    venues::{aggregate, read_all_quotes},
};

/// Holding quote while base has dropped below the floor means a round trip
/// was left half done.
pub fn is_skewed(base_balance: Decimal, quote_balance: Decimal, min_base_balance: Decimal) -> bool {
    quote_balance > Decimal::ZERO && base_balance < min_base_balance
}

#[derive(Debug)]
pub enum RebalanceOutcome {
    NotNeeded,
    /// Balances or prices could not be read; nothing was attempted.
    Unavailable(String),
    Ran(ExecutionReport),
}

impl RebalanceOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, RebalanceOutcome::Ran(report) if report.succeeded())
    }
}

pub struct PositionRebalancer<'a> {
    pub executor: &'a SlippageAdaptiveExecutor<'a>,
    pub pair: &'a AssetPair,
    pub venues: &'a [Venue],
    pub min_base_balance: Decimal,
}

impl<'a> PositionRebalancer<'a> {
    /// Checks the skew and, if present, runs the reverse leg on the sell side
    /// of a fresh ranking: the venue with the highest base price in quote.
    /// `reference` is the last recorded base balance; the leg will not
    /// return less than it.
    pub async fn rebalance(&self, reference: Option<Decimal>) -> RebalanceOutcome {
        let reader = self.executor.reader;
        let balances = (
            reader.get_balance(None).await,
            reader.get_balance(Some(self.pair.quote.address)).await,
        );
        let (base_balance, quote_balance) = match balances {
            (Ok(base), Ok(quote)) => (base, quote),
            (Err(e), _) | (_, Err(e)) => {
                warn!("⚠️ Rebalance check skipped, balance read failed: {}", e);
                return RebalanceOutcome::Unavailable(e.to_string());
            }
        };

        if !is_skewed(base_balance, quote_balance, self.min_base_balance) {
            return RebalanceOutcome::NotNeeded;
        }

        info!(
            "⚖️ Skew detected: {} {} below floor {} while holding {} {}",
            base_balance, self.pair.base.symbol, self.min_base_balance, quote_balance, self.pair.quote.symbol
        );

        let quotes = read_all_quotes(reader, self.venues).await;
        let spread = match aggregate(&quotes) {
            Ok(spread) => spread,
            Err(e) => {
                warn!("⚠️ Rebalance postponed: {}", e);
                return RebalanceOutcome::Unavailable(e.to_string());
            }
        };

        let Some(venue) = self.venues.iter().find(|v| v.id == spread.highest.venue) else {
            return RebalanceOutcome::Unavailable(format!("venue {} not configured", spread.highest.venue));
        };

        let plan = LegPlan {
            direction: SwapDirection::Reverse,
            venue: venue.clone(),
            token_in: self.pair.quote.clone(),
            token_out: self.pair.base.clone(),
            amount_in: quote_balance,
            unit_price: spread.highest.price_in_base_asset,
            spread: spread.percentage_difference,
            min_return: reference,
        };

        RebalanceOutcome::Ran(self.executor.run(&plan, None).await)
    }
}

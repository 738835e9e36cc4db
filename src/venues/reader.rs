//! Venue price reads from pair reserves

use futures::future::join_all;
use rust_decimal::Decimal;
use tracing::{debug, warn};
use crate::{
    chain::ChainReader,
    errors::{BotError, BotResult},
    types::{Venue, VenueQuote},
};

/// Reads one venue's reserves and derives both unit prices. No retries:
/// a failed or empty read is returned to the caller as-is.
pub async fn read_venue_quote(reader: &dyn ChainReader, venue: &Venue) -> BotResult<VenueQuote> {
    let (r0, r1) = reader.get_reserves(venue).await?;
    let (base_reserve, quote_reserve) = if venue.base_is_token0 { (r0, r1) } else { (r1, r0) };

    if base_reserve <= Decimal::ZERO || quote_reserve <= Decimal::ZERO {
        return Err(BotError::InvalidReserves {
            venue: venue.id.clone(),
            details: format!("base={} quote={}", base_reserve, quote_reserve),
        });
    }

    let quote = VenueQuote {
        venue: venue.id.clone(),
        price_in_quote_asset: quote_reserve / base_reserve,
        price_in_base_asset: base_reserve / quote_reserve,
    };
    debug!(
        venue = %venue.id,
        price_in_quote_asset = %quote.price_in_quote_asset,
        price_in_base_asset = %quote.price_in_base_asset,
        "venue priced"
    );
    Ok(quote)
}

/// Reads every venue concurrently. Failed venues are logged and left out;
/// the rest keep their configured order.
pub async fn read_all_quotes(reader: &dyn ChainReader, venues: &[Venue]) -> Vec<VenueQuote> {
    let results = join_all(venues.iter().map(|v| read_venue_quote(reader, v))).await;

    venues
        .iter()
        .zip(results)
        .filter_map(|(venue, result)| match result {
            Ok(quote) => Some(quote),
            Err(e) => {
                warn!("⚠️ Excluding {} from this cycle: {}", venue.id, e);
                None
            }
        })
        .collect()
}

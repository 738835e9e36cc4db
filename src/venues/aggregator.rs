//! Cross-venue price ranking

use rust_decimal::Decimal;
use crate::{
    config::MIN_VENUES,
    errors::{BotError, BotResult},
    types::{PriceSpread, VenueQuote},
    utils::percentage_difference,
};

/// Ranks quotes by `price_in_quote_asset`, highest first. Ties keep input
/// order, so the first-listed venue wins on both ends.
pub fn aggregate(quotes: &[VenueQuote]) -> BotResult<PriceSpread> {
    if quotes.len() < MIN_VENUES {
        return Err(BotError::InsufficientVenues {
            available: quotes.len(),
            required: MIN_VENUES,
        });
    }

    let mut ranked = quotes.to_vec();
    // sort_by is stable
    ranked.sort_by(|a, b| b.price_in_quote_asset.cmp(&a.price_in_quote_asset));

    let highest = ranked[0].clone();
    let lowest = quotes
        .iter()
        .fold(None::<&VenueQuote>, |best, q| match best {
            Some(b) if b.price_in_quote_asset <= q.price_in_quote_asset => Some(b),
            _ => Some(q),
        })
        .cloned()
        .ok_or(BotError::InsufficientVenues { available: 0, required: MIN_VENUES })?;

    let spread = percentage_difference(highest.price_in_quote_asset, lowest.price_in_quote_asset)
        .max(Decimal::ZERO);

    Ok(PriceSpread {
        highest,
        lowest,
        percentage_difference: spread,
        ranked,
    })
}

//! Start-up venue validation

use anyhow::anyhow;
use tracing::{error, info};
use crate::{
    chain::ChainReader,
    config::MIN_VENUES,
    errors::{BotError, BotResult},
    network::retry::{retry_with_backoff, RetryConfig},
    types::{AssetPair, Venue},
};

/// Confirms the venue's pair holds exactly the traded tokens and has
/// liquidity, and records which side the base token sits on.
pub async fn validate_venue_with_retry(
    reader: &dyn ChainReader,
    venue: &Venue,
    pair: &AssetPair,
    retry: &RetryConfig,
) -> BotResult<Venue> {
    retry_with_backoff(
        || async {
            let (token0, token1) = reader.get_pair_tokens(venue).await?;

            let base_is_token0 = if token0 == pair.base.address && token1 == pair.quote.address {
                true
            } else if token1 == pair.base.address && token0 == pair.quote.address {
                false
            } else {
                return Err(anyhow!(
                    "not a {}/{} pair (token0={}, token1={})",
                    pair.base.symbol, pair.quote.symbol, token0, token1
                ));
            };

            let validated = Venue { base_is_token0, ..venue.clone() };
            let (r0, r1) = reader.get_reserves(&validated).await?;
            if r0.is_zero() || r1.is_zero() {
                return Err(anyhow!("pair has zero liquidity"));
            }

            Ok(validated)
        },
        retry,
        &format!("validate venue {}", venue.id),
    ).await
}

pub async fn initialize_and_validate_venues(
    reader: &dyn ChainReader,
    venues: Vec<Venue>,
    pair: &AssetPair,
    retry: &RetryConfig,
) -> BotResult<Vec<Venue>> {
    info!("\n🔍 Validating {} venues for {}/{}...", venues.len(), pair.base.symbol, pair.quote.symbol);
    let mut valid = Vec::with_capacity(venues.len());
    let mut failures = 0;

    for venue in &venues {
        match validate_venue_with_retry(reader, venue, pair, retry).await {
            Ok(v) => {
                info!("✅ {} - pair {} (base is token{})", v.id, v.pair, if v.base_is_token0 { 0 } else { 1 });
                valid.push(v);
            }
            Err(e) => {
                error!("❌ {} - Validation failed: {}", venue.id, e);
                failures += 1;
            }
        }
    }

    if valid.len() < MIN_VENUES {
        return Err(BotError::config(
            "VENUES",
            format!("{} valid venue(s) after validation, at least {} required", valid.len(), MIN_VENUES),
        ));
    }

    info!("✅ Validated {} venues (failed: {})", valid.len(), failures);
    Ok(valid)
}

//! Network provider setup and signer loading

use alloy::{
    providers::{Provider, ProviderBuilder},
    signers::local::PrivateKeySigner,
};
use anyhow::{Context, Result};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};
use crate::{
    config::Config,
    errors::{BotError, BotResult},
    network::retry::{retry_with_backoff, RetryConfig},
    ConcreteProvider,
};

pub async fn setup_mainnet_provider(config: &Config) -> Result<Arc<ConcreteProvider>> {
    let rpc_url = config
        .rpc_url
        .as_ref()
        .ok_or_else(|| BotError::config("MAINNET_RPC_PROVIDER", "RPC endpoint is required"))?;

    let provider: Arc<ConcreteProvider> = Arc::new(
        ProviderBuilder::new()
            .on_http(rpc_url.parse().context("Invalid RPC URL")?)
            .boxed()
    );

    info!("🔗 Testing connection to RPC endpoint...");
    let block = retry_with_backoff(
        || async {
            provider.get_block_number().await
                .context("Failed to get block number")
        },
        &RetryConfig {
            max_attempts: 5,
            initial_delay_ms: 500,
            max_delay_ms: 10000,
            exponential_base: 2.0,
        },
        "RPC connection",
    ).await
    .map_err(|e| {
        warn!("⚠️ Network connection attempt failed: {}", e);
        anyhow::anyhow!("Network connection failed: {}", e)
    })?;

    info!("✅ Connected at block {}", block);
    Ok(provider)
}

/// Parses the configured private key into a local signer.
pub fn load_signer(config: &Config) -> BotResult<PrivateKeySigner> {
    let key = config
        .private_key
        .as_deref()
        .ok_or_else(|| BotError::config("PRIVATE_KEY", "signing key is required"))?;

    PrivateKeySigner::from_str(key.trim())
        .map_err(|_| BotError::config("PRIVATE_KEY", "not a valid secp256k1 private key"))
}

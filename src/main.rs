//! Arbibot - Main Entry Point
//!
//! Opens one trading session for the configured account and runs arbitrage
//! cycles on a fixed interval until the session ends or Ctrl+C.

use arbibot::*;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let config = CONFIG.clone();

    // Initialize logging
    utils::setup_output_directories(&config.output_dir)?;
    let _logging_guard = utils::setup_logging(&config.output_dir)?;

    info!("🤖 Arbibot v{} - Cross-venue AMM arbitrage", env!("CARGO_PKG_VERSION"));
    info!("📋 Configuration:");
    info!("   Pair: {}/{}", config.base_symbol, config.quote_symbol);
    info!("   Venues: {}", config.venues.iter().map(|v| v.id.as_str()).collect::<Vec<_>>().join(", "));
    info!("   Min Difference: {}%", config.min_difference_threshold);
    info!("   Slippage: {}% → {}% (step {}%)", config.slippage_start, config.max_slippage, config.slippage_step);
    info!("   Gas Reserve: {} {}", config.gas_reserve, config.base_symbol);
    info!("   Min Base Balance: {} {}", config.min_base_balance, config.base_symbol);
    info!("   Tick Interval: {}s", config.tick_interval_secs);
    info!("   Session Duration: {} minutes", config.session_duration_mins);

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("❌ {}", e);
        return Err(e.into());
    }

    // Setup network provider and signer
    let provider = network::setup_mainnet_provider(&config).await?;
    let signer = network::load_signer(&config)?;
    let wallet_address = signer.address();
    let client = Arc::new(chain::AlloyChainClient::new(provider, signer, &config)?);
    info!("👛 Trading from {}", wallet_address);

    // Initialize and validate venues
    let venues = venues::initialize_and_validate_venues(
        client.as_ref(),
        config.venue_set()?,
        &config.asset_pair(),
        &network::RetryConfig::default(),
    ).await?;

    // Ledger, job flags and notifications
    let ledger = Arc::new(storage::JsonlLedger::new(&config.output_dir));
    let jobs = Arc::new(storage::LocalJobStatusStore::open(
        std::path::Path::new(&config.output_dir).join("jobs").join("jobs.json"),
    )?);
    let notifier: Arc<dyn notify::Notifier> = match notify::TelegramNotifier::from_config(&config)? {
        Some(telegram) => {
            info!("📣 Telegram notifications enabled");
            Arc::new(telegram)
        }
        None => {
            info!("📣 No Telegram credentials, notifications go to the log");
            Arc::new(notify::LogNotifier)
        }
    };

    let engine = arbitrage::init_arbitrage(
        &config,
        Account {
            email: config.account_email.clone(),
            wallet_address,
        },
        venues,
        arbitrage::EngineDeps {
            reader: client.clone(),
            writer: client,
            ledger,
            jobs,
            notifier,
        },
    ).await?;

    // Setup shutdown handler
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("\n📛 Received shutdown signal (Ctrl+C)..."),
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
        let _ = shutdown_tx.send(true);
    });

    let stats = scheduler::run_scheduler(
        engine.clone(),
        Duration::from_secs(config.tick_interval_secs),
        shutdown_rx,
    ).await;

    // Print final statistics
    utils::print_session_stats(engine.session(), &stats);
    info!("👋 Session {} closed", engine.session().id);

    Ok(())
}

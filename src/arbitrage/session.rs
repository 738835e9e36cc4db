//! Trading session bootstrap

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use crate::{
    arbitrage::engine::{ArbitrageEngine, EngineDeps, EngineSettings},
    config::Config,
    errors::BotResult,
    types::{Account, JobRecord, JobStatus, TradingSession, Venue},
};

/// Opens a session for `account`: records it, registers its job flag in
/// `pending` and returns the engine ready to be scheduled. The first tick of
/// the scheduler runs a cycle immediately. Invalid strategy settings fail
/// here, before anything is recorded.
pub async fn init_arbitrage(
    config: &Config,
    account: Account,
    venues: Vec<Venue>,
    deps: EngineDeps,
) -> BotResult<Arc<ArbitrageEngine>> {
    config.validate_strategy()?;

    let session = TradingSession::new(account, Duration::minutes(config.session_duration_mins));

    if let Err(e) = deps.ledger.record_session(&session).await {
        warn!("⚠️ Failed to record session {}: {}", session.id, e);
    }

    deps.jobs
        .create_job(JobRecord {
            session_id: session.id.clone(),
            name: session.job_name(),
            status: JobStatus::Pending,
            payload: serde_json::json!({ "email": session.account.email }),
            updated_at: Utc::now(),
            lease: None,
        })
        .await?;

    info!(
        "🚀 Session {} for {} until {} ({} venues)",
        session.id,
        session.account.email,
        session.end_time.format("%H:%M:%S"),
        venues.len()
    );

    Ok(Arc::new(ArbitrageEngine::new(
        session,
        config.asset_pair(),
        venues,
        EngineSettings::from_config(config),
        deps,
    )))
}

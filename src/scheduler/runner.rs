//! Fixed-interval cycle scheduling for one session

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{error, info};
use crate::arbitrage::{ArbitrageEngine, SessionStats};

/// Ticks the engine every `tick_interval` until the session ends or
/// `shutdown` flips. Each tick runs as its own task, so a slow cycle never
/// delays the timer; the job flag decides whether a tick does anything.
pub async fn run_scheduler(
    engine: Arc<ArbitrageEngine>,
    tick_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> SessionStats {
    let remaining = (engine.session().end_time - Utc::now()).to_std().unwrap_or_default();
    let deadline = Instant::now() + remaining;

    let mut interval = time::interval(tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut in_flight = JoinSet::new();

    info!("\n🚀 Starting cycle scheduler (every {}s)...\n", tick_interval.as_secs());

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                info!("📛 Shutdown signal received, stopping scheduler...");
                break;
            }
            _ = time::sleep_until(deadline) => {
                info!("⏰ Session {} reached its end time", engine.session().id);
                break;
            }
            _ = interval.tick() => {
                let engine = engine.clone();
                in_flight.spawn(async move {
                    engine.tick().await;
                });
            }
        }

        // Reap finished ticks so the set does not grow for the whole session
        while let Some(joined) = in_flight.try_join_next() {
            if let Err(e) = joined {
                error!("❌ Cycle task panicked: {}", e);
            }
        }
    }

    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            error!("❌ Cycle task panicked: {}", e);
        }
    }

    engine.stats()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitrage::{EngineDeps, EngineSettings, SlippagePolicy};
    use crate::storage::{JobStatusStore, LocalJobStatusStore};
    use crate::testing::{asset_pair, session, venue, FakeChain, RecordingLedger, RecordingNotifier};
    use crate::types::{JobRecord, JobStatus};
    use rust_decimal_macros::dec;

    async fn quiet_engine(session_secs: i64) -> Arc<ArbitrageEngine> {
        let chain = Arc::new(FakeChain::new());
        chain.set_price("A", dec!(10));
        chain.set_price("B", dec!(10.01));
        chain.set_balance(None, dec!(5));

        let mut session = session();
        session.end_time = session.start_time + chrono::Duration::seconds(session_secs);
        let jobs = Arc::new(LocalJobStatusStore::in_memory());
        jobs.create_job(JobRecord {
            session_id: session.id.clone(),
            name: session.job_name(),
            status: JobStatus::Pending,
            payload: serde_json::Value::Null,
            updated_at: chrono::Utc::now(),
            lease: None,
        })
        .await
        .unwrap();

        Arc::new(ArbitrageEngine::new(
            session,
            asset_pair(),
            vec![venue("A"), venue("B")],
            EngineSettings {
                min_difference_threshold: dec!(2),
                gas_reserve: dec!(0.2),
                min_base_balance: dec!(1.5),
                policy: SlippagePolicy { start: dec!(0.5), step: dec!(0.1), max: dec!(1.0) },
                max_cycle_wait: chrono::Duration::minutes(20),
                explorer_tx_url: String::new(),
                notify_on_abandon: false,
            },
            EngineDeps {
                reader: chain.clone(),
                writer: chain,
                ledger: Arc::new(RecordingLedger::default()),
                jobs,
                notifier: Arc::new(RecordingNotifier::default()),
            },
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_until_session_end() {
        let engine = quiet_engine(60).await;
        let (_tx, rx) = watch::channel(false);

        let stats = run_scheduler(engine, Duration::from_secs(5), rx).await;

        // 0s, 5s, ... 55s and possibly the tick landing on the deadline
        assert!((12..=13).contains(&stats.cycles), "cycles = {}", stats.cycles);
        assert_eq!(stats.skipped_ticks, 0);
        assert_eq!(stats.opportunities, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_before_any_tick() {
        let engine = quiet_engine(600).await;
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let stats = run_scheduler(engine, Duration::from_secs(5), rx).await;
        assert_eq!(stats.cycles, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn ended_session_never_ticks() {
        let engine = quiet_engine(-1).await;
        let (_tx, rx) = watch::channel(false);

        let stats = run_scheduler(engine, Duration::from_secs(5), rx).await;
        assert_eq!(stats.cycles, 0);
    }
}

//! Arbitrage cycle orchestration

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use crate::{
    arbitrage::{
        evaluator::{evaluate, Decision},
        executor::{LegPlan, SlippageAdaptiveExecutor, SlippagePolicy},
        rebalancer::{is_skewed, PositionRebalancer, RebalanceOutcome},
    },
    chain::{ChainReader, ChainWriter},
    config::Config,
    notify::{Notification, Notifier},
    scheduler::{GuardOutcome, SingleFlightGuard},
    storage::{JobStatusStore, Ledger},
    types::{
        ArbitrageOpportunity, AssetPair, BalanceSnapshot, ExecutionOutcome, ExecutionReport,
        PriceSpread, SwapDirection, TradingSession, Venue,
    },
    utils::{print_execution_report, print_opportunity},
    venues::{aggregate, read_all_quotes},
};

/// Strategy knobs the engine reads every cycle.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub min_difference_threshold: Decimal,
    pub gas_reserve: Decimal,
    pub min_base_balance: Decimal,
    pub policy: SlippagePolicy,
    pub max_cycle_wait: chrono::Duration,
    pub explorer_tx_url: String,
    pub notify_on_abandon: bool,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            min_difference_threshold: config.min_difference_threshold,
            gas_reserve: config.gas_reserve,
            min_base_balance: config.min_base_balance,
            policy: SlippagePolicy::from_config(config),
            max_cycle_wait: chrono::Duration::seconds(config.max_cycle_wait_secs as i64),
            explorer_tx_url: config.explorer_tx_url.clone(),
            notify_on_abandon: config.notify_on_abandon,
        }
    }
}

/// Shared services the engine talks to.
#[derive(Clone)]
pub struct EngineDeps {
    pub reader: Arc<dyn ChainReader>,
    pub writer: Arc<dyn ChainWriter>,
    pub ledger: Arc<dyn Ledger>,
    pub jobs: Arc<dyn JobStatusStore>,
    pub notifier: Arc<dyn Notifier>,
}

#[derive(Debug)]
pub enum CycleOutcome {
    BalanceUnavailable(String),
    InsufficientVenues { available: usize },
    NoOpportunity { spread: Decimal },
    /// A leftover quote position could not be unwound; no forward leg ran.
    SkewUnresolved,
    Executed {
        forward: ExecutionReport,
        rebalance: Option<ExecutionReport>,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStats {
    pub cycles: u64,
    pub skipped_ticks: u64,
    pub opportunities: u64,
    pub swaps: u64,
    pub failed_attempts: u64,
    pub abandoned_legs: u64,
    pub realized_profit: Decimal,
}

pub struct ArbitrageEngine {
    session: TradingSession,
    pair: AssetPair,
    venues: Vec<Venue>,
    settings: EngineSettings,
    deps: EngineDeps,
    guard: SingleFlightGuard,
    last_snapshot: Mutex<Option<BalanceSnapshot>>,
    stats: Mutex<SessionStats>,
}

impl ArbitrageEngine {
    pub fn new(
        session: TradingSession,
        pair: AssetPair,
        venues: Vec<Venue>,
        settings: EngineSettings,
        deps: EngineDeps,
    ) -> Self {
        let guard = SingleFlightGuard::new(deps.jobs.clone(), session.id.clone(), settings.max_cycle_wait);
        Self {
            session,
            pair,
            venues,
            settings,
            deps,
            guard,
            last_snapshot: Mutex::new(None),
            stats: Mutex::new(SessionStats::default()),
        }
    }

    pub fn session(&self) -> &TradingSession {
        &self.session
    }

    pub fn stats(&self) -> SessionStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn update_stats(&self, f: impl FnOnce(&mut SessionStats)) {
        if let Ok(mut stats) = self.stats.lock() {
            f(&mut stats);
        }
    }

    /// One scheduler tick. Never fails; a busy flag makes it a no-op.
    pub async fn tick(&self) -> GuardOutcome<CycleOutcome> {
        let outcome = self.guard.run_exclusive(|| self.run_cycle()).await;
        match &outcome {
            GuardOutcome::Ran(result) => {
                self.update_stats(|s| s.cycles += 1);
                debug!(session_id = %self.session.id, ?result, "cycle finished");
            }
            GuardOutcome::Skipped | GuardOutcome::Unavailable(_) => {
                self.update_stats(|s| s.skipped_ticks += 1);
            }
        }
        outcome
    }

    fn executor(&self) -> SlippageAdaptiveExecutor<'_> {
        SlippageAdaptiveExecutor {
            session: &self.session,
            reader: self.deps.reader.as_ref(),
            writer: self.deps.writer.as_ref(),
            ledger: self.deps.ledger.as_ref(),
            policy: self.settings.policy,
            explorer_tx_url: &self.settings.explorer_tx_url,
        }
    }

    async fn balances(&self) -> Result<(Decimal, Decimal), String> {
        let reader = self.deps.reader.as_ref();
        let base = reader.get_balance(None).await.map_err(|e| e.to_string())?;
        let quote = reader
            .get_balance(Some(self.pair.quote.address))
            .await
            .map_err(|e| e.to_string())?;
        Ok((base, quote))
    }

    /// Last base snapshot, from memory first and the ledger otherwise.
    async fn reference_balance(&self) -> Option<Decimal> {
        let cached = self
            .last_snapshot
            .lock()
            .ok()
            .and_then(|s| s.as_ref().map(|s| s.balance));
        if cached.is_some() {
            return cached;
        }

        match self
            .deps
            .ledger
            .latest_balance_snapshot(&self.session.account.email, &self.pair.base.symbol)
            .await
        {
            Ok(snapshot) => snapshot.map(|s| s.balance),
            Err(e) => {
                warn!("⚠️ Could not read last balance snapshot: {}", e);
                None
            }
        }
    }

    async fn notify(&self, notification: Notification) {
        if let Err(e) = self.deps.notifier.notify(&self.session.id, &notification).await {
            warn!("⚠️ Notification failed: {}", e);
        }
    }

    /// Notifies and counts a finished leg.
    async fn report_leg(&self, report: &ExecutionReport) {
        print_execution_report(report);
        let failed = report.failed_attempts() as u64;
        let succeeded = report.succeeded();
        self.update_stats(|s| {
            s.failed_attempts += failed;
            if succeeded {
                s.swaps += 1;
            } else {
                s.abandoned_legs += 1;
            }
        });

        match &report.outcome {
            ExecutionOutcome::Succeeded(transaction) => {
                self.notify(Notification::SwapSucceeded {
                    direction: report.direction,
                    transaction: transaction.clone(),
                })
                .await;
            }
            ExecutionOutcome::Abandoned(reason) if self.settings.notify_on_abandon => {
                self.notify(Notification::abandoned(
                    report.direction,
                    &report.venue,
                    reason,
                    report.final_slippage,
                    report.attempts,
                ))
                .await;
            }
            ExecutionOutcome::Abandoned(_) => {}
        }
    }

    /// Runs the reverse leg if the account is skewed, then reports realized
    /// profit when it closes a round trip.
    async fn rebalance(&self, executor: &SlippageAdaptiveExecutor<'_>) -> RebalanceOutcome {
        let reference = self.reference_balance().await;
        let rebalancer = PositionRebalancer {
            executor,
            pair: &self.pair,
            venues: &self.venues,
            min_base_balance: self.settings.min_base_balance,
        };

        let outcome = rebalancer.rebalance(reference).await;
        if let RebalanceOutcome::Ran(report) = &outcome {
            self.report_leg(report).await;
            if let (true, Some(reference)) = (report.succeeded(), reference) {
                self.report_profit(reference).await;
            }
        }
        outcome
    }

    async fn report_profit(&self, reference: Decimal) {
        let current = match self.deps.reader.get_balance(None).await {
            Ok(balance) => balance,
            Err(e) => {
                warn!("⚠️ Could not read balance for profit report: {}", e);
                return;
            }
        };
        let profit = current - reference;
        info!("💰 Realized {} {} (from {} to {})", profit, self.pair.base.symbol, reference, current);
        self.update_stats(|s| s.realized_profit += profit);
        self.notify(Notification::ProfitRealized {
            token_symbol: self.pair.base.symbol.clone(),
            reference_balance: reference,
            current_balance: current,
            profit,
        })
        .await;
    }

    fn opportunity_from(&self, spread: &PriceSpread, base_balance: Decimal, expected_profit: Decimal) -> ArbitrageOpportunity {
        ArbitrageOpportunity {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: self.session.id.clone(),
            timestamp: Utc::now(),
            updated_at: None,
            buy_venue: spread.lowest.venue.clone(),
            sell_venue: spread.highest.venue.clone(),
            percentage_difference: spread.percentage_difference,
            expected_profit,
            buy_price: spread.lowest.price_in_quote_asset,
            sell_price: spread.highest.price_in_quote_asset,
            token_in: self.pair.base.symbol.clone(),
            token_out: self.pair.quote.symbol.clone(),
            initial_balance: base_balance,
            slippage: self.settings.policy.start,
        }
    }

    /// One full cycle: price, decide, trade, rebalance.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let (mut base_balance, quote_balance) = match self.balances().await {
            Ok(balances) => balances,
            Err(e) => {
                warn!("⚠️ Balance read failed, ending cycle: {}", e);
                return CycleOutcome::BalanceUnavailable(e);
            }
        };

        let quotes = read_all_quotes(self.deps.reader.as_ref(), &self.venues).await;
        let spread = match aggregate(&quotes) {
            Ok(spread) => spread,
            Err(e) => {
                warn!("⚠️ {}", e);
                return CycleOutcome::InsufficientVenues { available: quotes.len() };
            }
        };

        let settings = &self.settings;
        let check = |balance: Decimal| {
            evaluate(
                spread.percentage_difference,
                settings.min_difference_threshold,
                balance,
                settings.gas_reserve,
                settings.policy.start,
            )
        };

        if !check(base_balance).is_go() {
            info!(
                "😴 Spread {:.4}% between {} and {} below {}%",
                spread.percentage_difference, spread.highest.venue, spread.lowest.venue,
                settings.min_difference_threshold
            );
            return CycleOutcome::NoOpportunity { spread: spread.percentage_difference };
        }

        let executor = self.executor();

        if is_skewed(base_balance, quote_balance, settings.min_base_balance) {
            info!("⚖️ Unwinding leftover {} before the forward leg", self.pair.quote.symbol);
            match self.rebalance(&executor).await {
                RebalanceOutcome::NotNeeded => {}
                outcome if outcome.succeeded() => {}
                _ => return CycleOutcome::SkewUnresolved,
            }
            match self.deps.reader.get_balance(None).await {
                Ok(balance) => base_balance = balance,
                Err(e) => return CycleOutcome::BalanceUnavailable(e.to_string()),
            }
        }

        let (tradable, expected_profit) = match check(base_balance) {
            Decision::Go { tradable, expected_profit } => (tradable, expected_profit),
            Decision::Skip(_) => {
                return CycleOutcome::NoOpportunity { spread: spread.percentage_difference };
            }
        };

        let Some(buy_venue) = self.venues.iter().find(|v| v.id == spread.lowest.venue) else {
            return CycleOutcome::InsufficientVenues { available: quotes.len() };
        };

        let mut opportunity = self.opportunity_from(&spread, base_balance, expected_profit);
        self.update_stats(|s| s.opportunities += 1);
        print_opportunity(&opportunity);
        if let Err(e) = self.deps.ledger.record_opportunity(&opportunity).await {
            warn!("⚠️ Failed to record opportunity: {}", e);
        }

        let plan = LegPlan {
            direction: SwapDirection::Forward,
            venue: buy_venue.clone(),
            token_in: self.pair.base.clone(),
            token_out: self.pair.quote.clone(),
            amount_in: tradable,
            unit_price: spread.lowest.price_in_quote_asset,
            spread: spread.percentage_difference,
            min_return: None,
        };
        let forward = executor.run(&plan, Some(&mut opportunity)).await;
        if let Some(snapshot) = &forward.snapshot {
            if let Ok(mut last) = self.last_snapshot.lock() {
                *last = Some(snapshot.clone());
            }
        }
        self.report_leg(&forward).await;

        let rebalance = match self.rebalance(&executor).await {
            RebalanceOutcome::Ran(report) => Some(report),
            RebalanceOutcome::NotNeeded | RebalanceOutcome::Unavailable(_) => None,
        };

        CycleOutcome::Executed { forward, rebalance }
    }
}

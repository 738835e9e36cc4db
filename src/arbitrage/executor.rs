//! Slippage-adaptive swap executor
//!
//! One leg of a round trip runs as an explicit state machine:
//! `Idle → Quoting → Evaluating → Swapping → {Succeeded, Abandoned}`.
//! A failed quote or swap records a `FailedAttempt`, raises slippage by one
//! step and loops back to `Quoting`; stepping past the ceiling abandons the
//! leg without another try. Every transition is also emitted as an
//! [`ExecutorEvent`] so callers can narrate the leg however they like.

use alloy::primitives::Address;
use chrono::Utc;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use tracing::{debug, info, warn};
use crate::{
    arbitrage::evaluator::{expected_profit, margin},
    chain::{ChainReader, ChainWriter},
    config::Config,
    errors::BotError,
    storage::Ledger,
    types::{
        AbandonReason, ArbitrageOpportunity, BalanceSnapshot, ExecutionOutcome, ExecutionReport,
        ExecutionState, ExecutorEvent, FailedAttempt, SwapDirection, SwapParams, SwapTransaction,
        TokenInfo, TokenPair, TradingSession, Venue, VenueQuote,
    },
    utils::round_slippage,
    venues::read_venue_quote,
};

/// Start, step and ceiling of the slippage ladder, in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlippagePolicy {
    pub start: Decimal,
    pub step: Decimal,
    pub max: Decimal,
}

impl SlippagePolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            start: config.slippage_start,
            step: config.slippage_step,
            max: config.max_slippage,
        }
    }

    /// Next rung, or `None` once it would pass the ceiling. A non-positive
    /// step has no next rung.
    pub fn next(&self, current: Decimal) -> Option<Decimal> {
        if self.step <= Decimal::ZERO {
            return None;
        }
        let next = round_slippage(current + self.step);
        (next <= self.max).then_some(next)
    }

    /// Every slippage value a leg may try, in order.
    pub fn ladder(&self) -> Vec<Decimal> {
        let mut rungs = vec![round_slippage(self.start)];
        while let Some(next) = rungs.last().and_then(|s| self.next(*s)) {
            rungs.push(next);
        }
        rungs
    }
}

/// What one leg trades and where.
#[derive(Debug, Clone)]
pub struct LegPlan {
    pub direction: SwapDirection,
    pub venue: Venue,
    pub token_in: TokenInfo,
    pub token_out: TokenInfo,
    pub amount_in: Decimal,
    /// Unit price of `token_in` in `token_out` at detection time.
    pub unit_price: Decimal,
    /// Spread the margin check is measured against.
    pub spread: Decimal,
    /// Reverse legs: abandon if the simulated output falls below this.
    pub min_return: Option<Decimal>,
}

impl LegPlan {
    pub fn tokens(&self) -> TokenPair {
        TokenPair {
            token_in: self.token_in.symbol.clone(),
            token_out: self.token_out.symbol.clone(),
        }
    }

    fn is_native_in(&self) -> bool {
        self.direction == SwapDirection::Forward
    }

    fn is_native_out(&self) -> bool {
        self.direction == SwapDirection::Reverse
    }

    fn price_from(&self, quote: &VenueQuote) -> Decimal {
        match self.direction {
            SwapDirection::Forward => quote.price_in_quote_asset,
            SwapDirection::Reverse => quote.price_in_base_asset,
        }
    }

    /// Balance key of the received asset; the native asset reads as `None`.
    fn out_balance_token(&self) -> Option<Address> {
        (!self.is_native_out()).then_some(self.token_out.address)
    }
}

pub struct SlippageAdaptiveExecutor<'a> {
    pub session: &'a TradingSession,
    pub reader: &'a dyn ChainReader,
    pub writer: &'a dyn ChainWriter,
    pub ledger: &'a dyn Ledger,
    pub policy: SlippagePolicy,
    pub explorer_tx_url: &'a str,
}

/// Mutable bookkeeping for one leg.
struct LegRun {
    state: ExecutionState,
    events: Vec<ExecutorEvent>,
    attempt: u32,
}

impl LegRun {
    fn transition(&mut self, next: ExecutionState) {
        debug!(from = self.state.name(), to = next.name(), "executor transition");
        self.state = next;
    }

    fn emit(&mut self, event: ExecutorEvent) {
        debug!(?event, "executor event");
        self.events.push(event);
    }
}

enum Escalation {
    Retry(Decimal),
    Exhausted(AbandonReason),
}

impl<'a> SlippageAdaptiveExecutor<'a> {
    /// Runs the leg to a terminal state. Never returns an error: every
    /// failure is either retried or folded into the `Abandoned` outcome.
    pub async fn run(
        &self,
        plan: &LegPlan,
        mut opportunity: Option<&mut ArbitrageOpportunity>,
    ) -> ExecutionReport {
        let mut run = LegRun {
            state: ExecutionState::Idle,
            events: Vec::new(),
            attempt: 0,
        };

        let snapshot = match plan.direction {
            SwapDirection::Forward => self.take_snapshot(plan, &mut run).await,
            SwapDirection::Reverse => None,
        };

        let mut slippage = round_slippage(self.policy.start);
        let mut expected_out = plan.amount_in * plan.unit_price;

        info!(
            "🔁 {:?} leg on {}: {} {} → {} from {}% slippage",
            plan.direction, plan.venue, plan.amount_in, plan.token_in.symbol, plan.token_out.symbol, slippage
        );

        loop {
            run.attempt += 1;
            let attempt = run.attempt;
            run.transition(ExecutionState::Quoting { attempt, slippage });

            match read_venue_quote(self.reader, &plan.venue).await {
                Ok(quote) => expected_out = plan.amount_in * plan.price_from(&quote),
                Err(e) => warn!("⚠️ Re-pricing {} failed, keeping previous expectation: {}", plan.venue, e),
            }

            let simulated_out = match self.simulate(plan).await {
                Ok(amount) => amount,
                Err(e) => {
                    match self.escalate(plan, &mut run, slippage, expected_out, &e, opportunity.as_deref_mut()).await {
                        Escalation::Retry(next) => {
                            slippage = next;
                            continue;
                        }
                        Escalation::Exhausted(reason) => {
                            return self.abandon(plan, run, reason, slippage, snapshot);
                        }
                    }
                }
            };

            let diff_percentage = if expected_out.is_zero() {
                Decimal::ZERO
            } else {
                (expected_out - simulated_out) / expected_out * dec!(100)
            };
            run.transition(ExecutionState::Evaluating {
                attempt,
                slippage,
                expected_out,
                simulated_out,
                diff_percentage,
            });
            run.emit(ExecutorEvent::Quoted {
                attempt,
                slippage,
                expected_out,
                simulated_out,
                diff_percentage,
            });

            let leg_margin = margin(plan.spread, diff_percentage, slippage);
            run.emit(ExecutorEvent::MarginChecked { attempt, margin: leg_margin });
            info!(
                "📐 Attempt {}: expected {} got {} (diff {:.4}%), margin {:.4}%",
                attempt, expected_out, simulated_out, diff_percentage, leg_margin
            );
            if leg_margin < Decimal::ZERO {
                return self.abandon(
                    plan,
                    run,
                    AbandonReason::InsufficientMargin { margin: leg_margin },
                    slippage,
                    snapshot,
                );
            }

            if let Some(reference) = plan.min_return {
                if simulated_out < reference {
                    return self.abandon(
                        plan,
                        run,
                        AbandonReason::BelowReferenceBalance { simulated_out, reference },
                        slippage,
                        snapshot,
                    );
                }
            }

            let params = SwapParams {
                venue: plan.venue.id.clone(),
                token_in: plan.token_in.address,
                token_out: plan.token_out.address,
                amount_in: plan.amount_in,
                amount_out_min: simulated_out * (Decimal::ONE - slippage / dec!(100)),
                slippage,
                is_native_in: plan.is_native_in(),
                is_native_out: plan.is_native_out(),
            };
            run.emit(ExecutorEvent::SwapSubmitted {
                attempt,
                slippage,
                amount_out_min: params.amount_out_min,
            });
            run.transition(ExecutionState::Swapping {
                attempt,
                params: params.clone(),
                expected_out,
            });

            match self.writer.execute_swap(&params).await {
                Ok(tx_hash) => {
                    let transaction = self.confirm(plan, &tx_hash).await;
                    run.emit(ExecutorEvent::Succeeded { attempt, tx_hash });
                    run.transition(ExecutionState::Succeeded {
                        attempt,
                        transaction: transaction.clone(),
                    });
                    info!("✅ {:?} leg confirmed at {}% slippage: {}", plan.direction, slippage, transaction.link);
                    return ExecutionReport {
                        direction: plan.direction,
                        venue: plan.venue.id.clone(),
                        tokens: plan.tokens(),
                        outcome: ExecutionOutcome::Succeeded(transaction),
                        attempts: attempt,
                        final_slippage: slippage,
                        snapshot,
                        events: run.events,
                    };
                }
                Err(e) => {
                    match self.escalate(plan, &mut run, slippage, expected_out, &e, opportunity.as_deref_mut()).await {
                        Escalation::Retry(next) => slippage = next,
                        Escalation::Exhausted(reason) => {
                            return self.abandon(plan, run, reason, slippage, snapshot);
                        }
                    }
                }
            }
        }
    }

    async fn take_snapshot(&self, plan: &LegPlan, run: &mut LegRun) -> Option<BalanceSnapshot> {
        let balance = self.reader.get_balance(None).await;
        let block = self.reader.get_block_number().await;
        let (balance, block_number) = match (balance, block) {
            (Ok(balance), Ok(block)) => (balance, block),
            (Err(e), _) | (_, Err(e)) => {
                warn!("⚠️ Could not snapshot {} balance: {}", plan.token_in.symbol, e);
                return None;
            }
        };

        let snapshot = BalanceSnapshot {
            account: self.session.account.email.clone(),
            address: self.session.account.wallet_address,
            token_symbol: plan.token_in.symbol.clone(),
            balance,
            block_number,
            timestamp: Utc::now(),
        };
        if let Err(e) = self.ledger.record_balance_snapshot(&snapshot).await {
            warn!("⚠️ Failed to record balance snapshot: {}", e);
        }
        run.emit(ExecutorEvent::SnapshotTaken { balance, block_number });
        Some(snapshot)
    }

    async fn simulate(&self, plan: &LegPlan) -> Result<Decimal, BotError> {
        let amounts = self
            .writer
            .quote_swap(&plan.venue, plan.token_in.address, plan.token_out.address, plan.amount_in)
            .await?;
        amounts.last().copied().ok_or_else(|| BotError::Quote {
            venue: plan.venue.id.clone(),
            reason: "router returned no amounts".to_string(),
        })
    }

    async fn confirm(&self, plan: &LegPlan, tx_hash: &str) -> SwapTransaction {
        let balance = match self.reader.get_balance(plan.out_balance_token()).await {
            Ok(balance) => Some(balance),
            Err(e) => {
                warn!("⚠️ Could not read {} balance after swap: {}", plan.token_out.symbol, e);
                None
            }
        };

        let transaction = SwapTransaction {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: self.session.id.clone(),
            transaction_hash: tx_hash.to_string(),
            link: format!("{}{}", self.explorer_tx_url, tx_hash),
            amount: plan.amount_in,
            tokens: plan.tokens(),
            balance,
            timestamp: Utc::now(),
        };
        if let Err(e) = self.ledger.record_transaction(&transaction).await {
            warn!("⚠️ Failed to record transaction {}: {}", tx_hash, e);
        }
        transaction
    }

    async fn escalate(
        &self,
        plan: &LegPlan,
        run: &mut LegRun,
        slippage: Decimal,
        expected_out: Decimal,
        error: &BotError,
        opportunity: Option<&mut ArbitrageOpportunity>,
    ) -> Escalation {
        let reason = error.reason();
        warn!("❌ Attempt {} failed at {}% slippage: {}", run.attempt, slippage, reason);

        let failed = FailedAttempt {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: self.session.id.clone(),
            slippage,
            reason: reason.clone(),
            venue: plan.venue.id.clone(),
            tokens: plan.tokens(),
            amount_in: plan.amount_in,
            amount_out_expected: expected_out,
            timestamp: Utc::now(),
        };
        if let Err(e) = self.ledger.record_failed_attempt(&failed).await {
            warn!("⚠️ Failed to record failed attempt: {}", e);
        }
        run.emit(ExecutorEvent::AttemptFailed {
            attempt: run.attempt,
            slippage,
            reason,
        });

        let Some(next) = self.policy.next(slippage) else {
            return Escalation::Exhausted(AbandonReason::SlippageExhausted {
                last_slippage: slippage,
                max_slippage: self.policy.max,
            });
        };

        run.emit(ExecutorEvent::SlippageEscalated { from: slippage, to: next });
        if let Some(opportunity) = opportunity {
            opportunity.slippage = next;
            opportunity.expected_profit = expected_profit(plan.amount_in, plan.spread, next);
            opportunity.updated_at = Some(Utc::now());
            if let Err(e) = self.ledger.update_opportunity(opportunity).await {
                warn!("⚠️ Failed to update opportunity {}: {}", opportunity.id, e);
            }
        }
        info!("⬆️ Slippage {}% → {}%", slippage, next);
        Escalation::Retry(next)
    }

    fn abandon(
        &self,
        plan: &LegPlan,
        mut run: LegRun,
        reason: AbandonReason,
        slippage: Decimal,
        snapshot: Option<BalanceSnapshot>,
    ) -> ExecutionReport {
        warn!("🛑 {:?} leg on {} abandoned: {}", plan.direction, plan.venue, reason);
        let attempt = run.attempt;
        run.emit(ExecutorEvent::Abandoned { attempt, reason: reason.clone() });
        run.transition(ExecutionState::Abandoned { attempt, reason: reason.clone() });

        ExecutionReport {
            direction: plan.direction,
            venue: plan.venue.id.clone(),
            tokens: plan.tokens(),
            outcome: ExecutionOutcome::Abandoned(reason),
            attempts: attempt,
            final_slippage: slippage,
            snapshot,
            events: run.events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{asset_pair, session, venue, FakeChain, RecordingLedger, SwapScript};
    use proptest::prelude::*;

    fn policy() -> SlippagePolicy {
        SlippagePolicy { start: dec!(0.5), step: dec!(0.1), max: dec!(1.0) }
    }

    fn forward_plan(spread: Decimal) -> LegPlan {
        let pair = asset_pair();
        LegPlan {
            direction: SwapDirection::Forward,
            venue: venue("C"),
            token_in: pair.base,
            token_out: pair.quote,
            amount_in: dec!(10),
            unit_price: dec!(9.8),
            spread,
            min_return: None,
        }
    }

    fn executor<'a>(
        session: &'a TradingSession,
        chain: &'a FakeChain,
        ledger: &'a RecordingLedger,
    ) -> SlippageAdaptiveExecutor<'a> {
        SlippageAdaptiveExecutor {
            session,
            reader: chain,
            writer: chain,
            ledger,
            policy: policy(),
            explorer_tx_url: "https://snowtrace.io/tx/",
        }
    }

    #[test]
    fn ladder_steps_to_the_ceiling() {
        assert_eq!(
            policy().ladder(),
            vec![dec!(0.5), dec!(0.6), dec!(0.7), dec!(0.8), dec!(0.9), dec!(1.0)]
        );
        assert_eq!(policy().next(dec!(1.0)), None);
    }

    #[test]
    fn zero_step_ladder_has_a_single_rung() {
        let flat = SlippagePolicy { start: dec!(0.5), step: Decimal::ZERO, max: dec!(1.0) };
        assert_eq!(flat.next(dec!(0.5)), None);
        assert_eq!(flat.ladder(), vec![dec!(0.5)]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_confirmation_is_awaited_not_retried() {
        let chain = FakeChain::new();
        chain.set_price("C", dec!(9.8));
        chain.set_quote_out("C", dec!(97.02));
        chain.set_balance(None, dec!(10.2));
        chain.slow_confirmations("C", std::time::Duration::from_secs(45 * 60));
        let ledger = RecordingLedger::default();
        let session = session();

        let report = executor(&session, &chain, &ledger).run(&forward_plan(dec!(7.14)), None).await;

        assert!(report.succeeded());
        assert_eq!(report.attempts, 1);
        assert_eq!(chain.submitted_swaps().len(), 1);
        assert!(ledger.failed_attempts().is_empty());
    }

    #[tokio::test]
    async fn succeeds_first_try_and_records_transaction() {
        let chain = FakeChain::new();
        chain.set_price("C", dec!(9.8));
        chain.set_quote_out("C", dec!(97.02));
        chain.set_balance(None, dec!(10.2));
        let ledger = RecordingLedger::default();
        let session = session();

        let report = executor(&session, &chain, &ledger).run(&forward_plan(dec!(7.14)), None).await;

        assert!(report.succeeded());
        assert_eq!(report.attempts, 1);
        assert_eq!(report.final_slippage, dec!(0.5));
        assert!(report.snapshot.is_some());
        assert_eq!(ledger.transactions().len(), 1);
        assert_eq!(ledger.snapshots().len(), 1);
        assert!(ledger.failed_attempts().is_empty());

        let swaps = chain.submitted_swaps();
        assert_eq!(swaps.len(), 1);
        assert!(swaps[0].is_native_in);
        // 97.02 * (1 - 0.5%)
        assert_eq!(swaps[0].amount_out_min, dec!(96.5349));
    }

    #[tokio::test]
    async fn all_failures_walk_the_ladder_then_abandon() {
        let chain = FakeChain::new();
        chain.set_price("C", dec!(9.8));
        chain.set_quote_out("C", dec!(98));
        chain.script_swaps("C", SwapScript::AlwaysRevert("INSUFFICIENT_OUTPUT_AMOUNT".into()));
        let ledger = RecordingLedger::default();
        let session = session();
        let mut opportunity = crate::testing::opportunity();

        let report = executor(&session, &chain, &ledger)
            .run(&forward_plan(dec!(7.14)), Some(&mut opportunity))
            .await;

        let tried: Vec<_> = ledger.failed_attempts().iter().map(|f| f.slippage).collect();
        assert_eq!(tried, policy().ladder());
        assert_eq!(chain.submitted_swaps().len(), 6);
        assert_eq!(report.attempts, 6);
        assert_eq!(
            report.outcome,
            ExecutionOutcome::Abandoned(AbandonReason::SlippageExhausted {
                last_slippage: dec!(1.0),
                max_slippage: dec!(1.0),
            })
        );
        assert_eq!(opportunity.slippage, dec!(1.0));
        assert_eq!(ledger.opportunity_updates().len(), 5);
        assert!(ledger.transactions().is_empty());
    }

    #[tokio::test]
    async fn widening_diff_abandons_on_margin() {
        // spread 7.14: diff 5.0 at 0.5 proceeds, diff 8.0 at 0.6 does not
        let chain = FakeChain::new();
        chain.set_price("C", dec!(10));
        chain.queue_quote_outs("C", vec![dec!(95), dec!(92)]);
        chain.script_swaps("C", SwapScript::AlwaysRevert("EXPIRED".into()));
        let ledger = RecordingLedger::default();
        let session = session();
        let mut plan = forward_plan(dec!(7.14));
        plan.unit_price = dec!(10);

        let report = executor(&session, &chain, &ledger).run(&plan, None).await;

        assert_eq!(report.attempts, 2);
        assert_eq!(chain.submitted_swaps().len(), 1);
        assert_eq!(ledger.failed_attempts().len(), 1);
        match report.outcome {
            ExecutionOutcome::Abandoned(AbandonReason::InsufficientMargin { margin }) => {
                assert_eq!(margin, dec!(-1.46));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn quote_failure_counts_as_attempt() {
        let chain = FakeChain::new();
        chain.set_price("C", dec!(9.8));
        chain.set_quote_out("C", dec!(98));
        chain.fail_next_quotes("C", 1);
        let ledger = RecordingLedger::default();
        let session = session();

        let report = executor(&session, &chain, &ledger).run(&forward_plan(dec!(7.14)), None).await;

        assert!(report.succeeded());
        assert_eq!(report.attempts, 2);
        assert_eq!(report.final_slippage, dec!(0.6));
        assert_eq!(ledger.failed_attempts()[0].slippage, dec!(0.5));
    }

    #[tokio::test]
    async fn reverse_leg_refuses_to_lose_base() {
        let chain = FakeChain::new();
        chain.set_price("B", dec!(10.5));
        chain.set_quote_out("B", dec!(9.9));
        let ledger = RecordingLedger::default();
        let session = session();
        let pair = asset_pair();
        let plan = LegPlan {
            direction: SwapDirection::Reverse,
            venue: venue("B"),
            token_in: pair.quote,
            token_out: pair.base,
            amount_in: dec!(105),
            unit_price: Decimal::ONE / dec!(10.5),
            spread: dec!(7.14),
            min_return: Some(dec!(10)),
        };

        let report = executor(&session, &chain, &ledger).run(&plan, None).await;

        assert!(matches!(
            report.outcome,
            ExecutionOutcome::Abandoned(AbandonReason::BelowReferenceBalance { .. })
        ));
        assert!(report.snapshot.is_none());
        assert!(chain.submitted_swaps().is_empty());
        assert!(ledger.failed_attempts().is_empty());
    }

    #[tokio::test]
    async fn events_follow_state_order() {
        let chain = FakeChain::new();
        chain.set_price("C", dec!(9.8));
        chain.set_quote_out("C", dec!(98));
        chain.script_swaps("C", SwapScript::FailTimes(1, "reverted".into()));
        let ledger = RecordingLedger::default();
        let session = session();

        let report = executor(&session, &chain, &ledger).run(&forward_plan(dec!(7.14)), None).await;

        let kinds: Vec<&str> = report
            .events
            .iter()
            .map(|e| match e {
                ExecutorEvent::SnapshotTaken { .. } => "snapshot",
                ExecutorEvent::Quoted { .. } => "quoted",
                ExecutorEvent::MarginChecked { .. } => "margin",
                ExecutorEvent::SwapSubmitted { .. } => "submitted",
                ExecutorEvent::AttemptFailed { .. } => "failed",
                ExecutorEvent::SlippageEscalated { .. } => "escalated",
                ExecutorEvent::Succeeded { .. } => "succeeded",
                ExecutorEvent::Abandoned { .. } => "abandoned",
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                "snapshot", "quoted", "margin", "submitted", "failed", "escalated",
                "quoted", "margin", "submitted", "succeeded",
            ]
        );
        assert_eq!(report.failed_attempts(), 1);
    }

    proptest! {
        #[test]
        fn ladder_is_monotonic_and_bounded(
            start in 0u32..200u32,
            step in 1u32..100u32,
            span in 0u32..500u32,
        ) {
            let policy = SlippagePolicy {
                start: Decimal::new(start as i64, 2),
                step: Decimal::new(step as i64, 2),
                max: Decimal::new((start + span) as i64, 2),
            };
            let ladder = policy.ladder();
            prop_assert_eq!(ladder[0], policy.start);
            for pair in ladder.windows(2) {
                prop_assert_eq!(pair[1] - pair[0], policy.step);
            }
            let last = *ladder.last().unwrap();
            prop_assert!(last <= policy.max);
            prop_assert!(policy.next(last).is_none());
        }
    }
}

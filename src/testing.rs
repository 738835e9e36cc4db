//! Scripted chain, recording ledger and notifier shared by unit tests

use alloy::primitives::{address, Address};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use crate::{
    chain::{ChainReader, ChainWriter},
    errors::{BotError, BotResult},
    notify::{Notification, Notifier},
    storage::Ledger,
    types::{
        Account, ArbitrageOpportunity, AssetPair, BalanceSnapshot, FailedAttempt, RouterFlavor,
        SwapParams, SwapTransaction, TokenInfo, TradingSession, Venue,
    },
};

pub const BASE: Address = address!("00000000000000000000000000000000000000aa");
pub const QUOTE: Address = address!("00000000000000000000000000000000000000bb");
pub const ACCOUNT: Address = address!("0000000000000000000000000000000000000001");

/// Reserve depth used by `FakeChain::set_price`.
const DEPTH: Decimal = dec!(1000);

pub fn venue(id: &str) -> Venue {
    Venue {
        id: id.to_string(),
        pair: Address::ZERO,
        router: Address::ZERO,
        flavor: RouterFlavor::Avax,
        base_is_token0: true,
    }
}

pub fn asset_pair() -> AssetPair {
    AssetPair {
        base: TokenInfo { symbol: "AVAX".to_string(), address: BASE, decimals: 18 },
        quote: TokenInfo { symbol: "WETH".to_string(), address: QUOTE, decimals: 18 },
    }
}

pub fn session() -> TradingSession {
    TradingSession::new(
        Account { email: "ops@example.com".to_string(), wallet_address: ACCOUNT },
        Duration::minutes(30),
    )
}

pub fn opportunity() -> ArbitrageOpportunity {
    ArbitrageOpportunity {
        id: uuid::Uuid::new_v4().to_string(),
        session_id: "s1".to_string(),
        timestamp: Utc::now(),
        updated_at: None,
        buy_venue: "C".to_string(),
        sell_venue: "B".to_string(),
        percentage_difference: dec!(7.14),
        expected_profit: dec!(0.664),
        buy_price: dec!(9.8),
        sell_price: dec!(10.5),
        token_in: "AVAX".to_string(),
        token_out: "WETH".to_string(),
        initial_balance: dec!(10.2),
        slippage: dec!(0.5),
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Debug, Clone)]
pub enum SwapScript {
    AlwaysRevert(String),
    FailTimes(u32, String),
}

type SwapHook = Arc<dyn Fn(&FakeChain) + Send + Sync>;

#[derive(Default)]
struct ChainState {
    reserves: HashMap<String, (Decimal, Decimal)>,
    failing_reserves: HashSet<String>,
    tokens: HashMap<String, (Address, Address)>,
    balances: HashMap<Option<Address>, Decimal>,
    quote_outs: HashMap<String, VecDeque<Decimal>>,
    quote_failures: HashMap<String, u32>,
    swap_scripts: HashMap<String, SwapScript>,
    swap_hooks: HashMap<String, SwapHook>,
    confirm_delays: HashMap<String, std::time::Duration>,
    submitted: Vec<SwapParams>,
    tx_counter: u64,
}

/// Deterministic in-memory chain. Venues are keyed by id.
#[derive(Default)]
pub struct FakeChain {
    state: Mutex<ChainState>,
}

impl FakeChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_reserves(&self, venue: &str, r0: Decimal, r1: Decimal) {
        lock(&self.state).reserves.insert(venue.to_string(), (r0, r1));
    }

    /// Base-token0 reserves that price one base at `price` quote.
    pub fn set_price(&self, venue: &str, price: Decimal) {
        self.set_reserves(venue, DEPTH, DEPTH * price);
    }

    pub fn fail_reserves(&self, venue: &str) {
        lock(&self.state).failing_reserves.insert(venue.to_string());
    }

    pub fn set_tokens(&self, venue: &str, token0: Address, token1: Address) {
        lock(&self.state).tokens.insert(venue.to_string(), (token0, token1));
    }

    pub fn set_balance(&self, token: Option<Address>, balance: Decimal) {
        lock(&self.state).balances.insert(token, balance);
    }

    pub fn set_quote_out(&self, venue: &str, amount: Decimal) {
        self.queue_quote_outs(venue, vec![amount]);
    }

    /// Quotes are served in order; the last one repeats.
    pub fn queue_quote_outs(&self, venue: &str, amounts: Vec<Decimal>) {
        lock(&self.state).quote_outs.insert(venue.to_string(), amounts.into());
    }

    pub fn fail_next_quotes(&self, venue: &str, times: u32) {
        lock(&self.state).quote_failures.insert(venue.to_string(), times);
    }

    pub fn script_swaps(&self, venue: &str, script: SwapScript) {
        lock(&self.state).swap_scripts.insert(venue.to_string(), script);
    }

    /// Runs after every successful swap on `venue`, e.g. to move balances.
    pub fn on_swap(&self, venue: &str, hook: impl Fn(&FakeChain) + Send + Sync + 'static) {
        lock(&self.state).swap_hooks.insert(venue.to_string(), Arc::new(hook));
    }

    /// Successful swaps on `venue` take `delay` to confirm.
    pub fn slow_confirmations(&self, venue: &str, delay: std::time::Duration) {
        lock(&self.state).confirm_delays.insert(venue.to_string(), delay);
    }

    pub fn submitted_swaps(&self) -> Vec<SwapParams> {
        lock(&self.state).submitted.clone()
    }
}

#[async_trait]
impl ChainReader for FakeChain {
    async fn get_reserves(&self, venue: &Venue) -> BotResult<(Decimal, Decimal)> {
        let state = lock(&self.state);
        if state.failing_reserves.contains(&venue.id) {
            return Err(BotError::Network {
                message: format!("getReserves timed out on {}", venue.id),
                source: None,
                retry_count: 0,
            });
        }
        state.reserves.get(&venue.id).copied().ok_or_else(|| BotError::Network {
            message: format!("no reserves scripted for {}", venue.id),
            source: None,
            retry_count: 0,
        })
    }

    async fn get_pair_tokens(&self, venue: &Venue) -> BotResult<(Address, Address)> {
        lock(&self.state).tokens.get(&venue.id).copied().ok_or_else(|| BotError::Network {
            message: format!("no tokens scripted for {}", venue.id),
            source: None,
            retry_count: 0,
        })
    }

    async fn get_block_number(&self) -> BotResult<u64> {
        Ok(1_000_000)
    }

    async fn get_balance(&self, token: Option<Address>) -> BotResult<Decimal> {
        Ok(lock(&self.state).balances.get(&token).copied().unwrap_or_default())
    }
}

#[async_trait]
impl ChainWriter for FakeChain {
    async fn quote_swap(
        &self,
        venue: &Venue,
        _token_in: Address,
        _token_out: Address,
        amount_in: Decimal,
    ) -> BotResult<Vec<Decimal>> {
        let mut state = lock(&self.state);
        if let Some(remaining) = state.quote_failures.get_mut(&venue.id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(BotError::Quote {
                    venue: venue.id.clone(),
                    reason: "execution reverted".to_string(),
                });
            }
        }

        let queue = state.quote_outs.get_mut(&venue.id).ok_or_else(|| BotError::Quote {
            venue: venue.id.clone(),
            reason: "no quote scripted".to_string(),
        })?;
        let out = if queue.len() > 1 { queue.pop_front() } else { queue.front().copied() };
        let out = out.ok_or_else(|| BotError::Quote {
            venue: venue.id.clone(),
            reason: "no quote scripted".to_string(),
        })?;
        Ok(vec![amount_in, out])
    }

    async fn execute_swap(&self, params: &SwapParams) -> BotResult<String> {
        let (result, hook, delay) = {
            let mut state = lock(&self.state);
            state.submitted.push(params.clone());

            let revert = match state.swap_scripts.get_mut(&params.venue) {
                Some(SwapScript::AlwaysRevert(reason)) => Some(reason.clone()),
                Some(SwapScript::FailTimes(remaining, reason)) if *remaining > 0 => {
                    *remaining -= 1;
                    Some(reason.clone())
                }
                _ => None,
            };

            match revert {
                Some(reason) => (
                    Err(BotError::Swap {
                        venue: params.venue.clone(),
                        slippage: params.slippage,
                        reason,
                        tx_hash: None,
                    }),
                    None,
                    None,
                ),
                None => {
                    state.tx_counter += 1;
                    (
                        Ok(format!("0x{:064x}", state.tx_counter)),
                        state.swap_hooks.get(&params.venue).cloned(),
                        state.confirm_delays.get(&params.venue).copied(),
                    )
                }
            }
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(hook) = hook {
            hook(self);
        }
        result
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum LedgerRecord {
    Session(TradingSession),
    Opportunity(ArbitrageOpportunity),
    OpportunityUpdate(ArbitrageOpportunity),
    Transaction(SwapTransaction),
    FailedAttempt(FailedAttempt),
    Snapshot(BalanceSnapshot),
}

#[derive(Default)]
pub struct RecordingLedger {
    records: Mutex<Vec<LedgerRecord>>,
    seeded: Mutex<Option<BalanceSnapshot>>,
}

impl RecordingLedger {
    fn push(&self, record: LedgerRecord) {
        lock(&self.records).push(record);
    }

    pub fn records(&self) -> Vec<LedgerRecord> {
        lock(&self.records).clone()
    }

    /// Pretends an earlier run left a base snapshot behind.
    pub fn seed_snapshot(&self, balance: Decimal) {
        *lock(&self.seeded) = Some(BalanceSnapshot {
            account: "ops@example.com".to_string(),
            address: ACCOUNT,
            token_symbol: "AVAX".to_string(),
            balance,
            block_number: 1,
            timestamp: Utc::now(),
        });
    }

    pub fn opportunities(&self) -> Vec<ArbitrageOpportunity> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                LedgerRecord::Opportunity(o) => Some(o),
                _ => None,
            })
            .collect()
    }

    pub fn opportunity_updates(&self) -> Vec<ArbitrageOpportunity> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                LedgerRecord::OpportunityUpdate(o) => Some(o),
                _ => None,
            })
            .collect()
    }

    pub fn transactions(&self) -> Vec<SwapTransaction> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                LedgerRecord::Transaction(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    pub fn failed_attempts(&self) -> Vec<FailedAttempt> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                LedgerRecord::FailedAttempt(f) => Some(f),
                _ => None,
            })
            .collect()
    }

    pub fn snapshots(&self) -> Vec<BalanceSnapshot> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                LedgerRecord::Snapshot(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    /// Records as JSON with generated ids and clock readings removed.
    pub fn projection(&self) -> Vec<serde_json::Value> {
        const VOLATILE: &[&str] = &["id", "session_id", "timestamp", "updated_at", "start_time", "end_time"];
        self.records()
            .iter()
            .map(|record| {
                let mut value = serde_json::to_value(record).unwrap_or_default();
                if let Some(map) = value.as_object_mut() {
                    for key in VOLATILE {
                        map.remove(*key);
                    }
                }
                value
            })
            .collect()
    }
}

#[async_trait]
impl Ledger for RecordingLedger {
    async fn record_session(&self, session: &TradingSession) -> BotResult<()> {
        self.push(LedgerRecord::Session(session.clone()));
        Ok(())
    }

    async fn record_opportunity(&self, opportunity: &ArbitrageOpportunity) -> BotResult<()> {
        self.push(LedgerRecord::Opportunity(opportunity.clone()));
        Ok(())
    }

    async fn update_opportunity(&self, opportunity: &ArbitrageOpportunity) -> BotResult<()> {
        self.push(LedgerRecord::OpportunityUpdate(opportunity.clone()));
        Ok(())
    }

    async fn record_transaction(&self, transaction: &SwapTransaction) -> BotResult<()> {
        self.push(LedgerRecord::Transaction(transaction.clone()));
        Ok(())
    }

    async fn record_failed_attempt(&self, attempt: &FailedAttempt) -> BotResult<()> {
        self.push(LedgerRecord::FailedAttempt(attempt.clone()));
        Ok(())
    }

    async fn record_balance_snapshot(&self, snapshot: &BalanceSnapshot) -> BotResult<()> {
        self.push(LedgerRecord::Snapshot(snapshot.clone()));
        Ok(())
    }

    async fn latest_balance_snapshot(
        &self,
        account: &str,
        token_symbol: &str,
    ) -> BotResult<Option<BalanceSnapshot>> {
        let recorded = self
            .snapshots()
            .into_iter()
            .rev()
            .find(|s| s.account == account && s.token_symbol == token_symbol);
        Ok(recorded.or_else(|| lock(&self.seeded).clone()))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, Notification)>>,
}

impl RecordingNotifier {
    pub fn notifications(&self) -> Vec<Notification> {
        lock(&self.sent).iter().map(|(_, n)| n.clone()).collect()
    }

    pub fn titles(&self) -> Vec<String> {
        self.notifications().iter().map(Notification::title).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, session_id: &str, notification: &Notification) -> BotResult<()> {
        lock(&self.sent).push((session_id.to_string(), notification.clone()));
        Ok(())
    }
}

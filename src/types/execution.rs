//! Swap execution types: parameters, ledger records and executor state

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SwapDirection {
    /// Base → quote, the leg that opens a round trip.
    Forward,
    /// Quote → base, the rebalancing leg that closes it.
    Reverse,
}

/// Everything a router swap needs, spelled out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwapParams {
    pub venue: String,
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: Decimal,
    pub amount_out_min: Decimal,
    pub slippage: Decimal,
    pub is_native_in: bool,
    pub is_native_out: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenPair {
    pub token_in: String,
    pub token_out: String,
}

impl fmt::Display for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.token_in, self.token_out)
    }
}

/// A confirmed swap leg.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwapTransaction {
    pub id: String,
    pub session_id: String,
    pub transaction_hash: String,
    pub link: String,
    pub amount: Decimal,
    pub tokens: TokenPair,
    /// Balance of the received asset after confirmation, when it could be read.
    pub balance: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedAttempt {
    pub id: String,
    pub session_id: String,
    pub slippage: Decimal,
    pub reason: String,
    pub venue: String,
    pub tokens: TokenPair,
    pub amount_in: Decimal,
    pub amount_out_expected: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub account: String,
    pub address: Address,
    pub token_symbol: String,
    pub balance: Decimal,
    pub block_number: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AbandonReason {
    /// `spread - diff - slippage` went negative.
    InsufficientMargin { margin: Decimal },
    /// The reverse leg would return less base than the last snapshot.
    BelowReferenceBalance { simulated_out: Decimal, reference: Decimal },
    /// The next step would exceed the slippage ceiling.
    SlippageExhausted { last_slippage: Decimal, max_slippage: Decimal },
}

impl fmt::Display for AbandonReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbandonReason::InsufficientMargin { margin } => {
                write!(f, "insufficient margin ({:.4}%)", margin)
            }
            AbandonReason::BelowReferenceBalance { simulated_out, reference } => {
                write!(f, "would return {} below last recorded balance {}", simulated_out, reference)
            }
            AbandonReason::SlippageExhausted { last_slippage, max_slippage } => {
                write!(f, "slippage exhausted at {}% (max {}%)", last_slippage, max_slippage)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExecutionState {
    Idle,
    Quoting {
        attempt: u32,
        slippage: Decimal,
    },
    Evaluating {
        attempt: u32,
        slippage: Decimal,
        expected_out: Decimal,
        simulated_out: Decimal,
        diff_percentage: Decimal,
    },
    Swapping {
        attempt: u32,
        params: SwapParams,
        expected_out: Decimal,
    },
    Succeeded {
        attempt: u32,
        transaction: SwapTransaction,
    },
    Abandoned {
        attempt: u32,
        reason: AbandonReason,
    },
}

impl ExecutionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionState::Succeeded { .. } | ExecutionState::Abandoned { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExecutionState::Idle => "idle",
            ExecutionState::Quoting { .. } => "quoting",
            ExecutionState::Evaluating { .. } => "evaluating",
            ExecutionState::Swapping { .. } => "swapping",
            ExecutionState::Succeeded { .. } => "succeeded",
            ExecutionState::Abandoned { .. } => "abandoned",
        }
    }
}

/// Structured narration of one leg; rendering is left to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExecutorEvent {
    SnapshotTaken {
        balance: Decimal,
        block_number: u64,
    },
    Quoted {
        attempt: u32,
        slippage: Decimal,
        expected_out: Decimal,
        simulated_out: Decimal,
        diff_percentage: Decimal,
    },
    MarginChecked {
        attempt: u32,
        margin: Decimal,
    },
    SwapSubmitted {
        attempt: u32,
        slippage: Decimal,
        amount_out_min: Decimal,
    },
    AttemptFailed {
        attempt: u32,
        slippage: Decimal,
        reason: String,
    },
    SlippageEscalated {
        from: Decimal,
        to: Decimal,
    },
    Succeeded {
        attempt: u32,
        tx_hash: String,
    },
    Abandoned {
        attempt: u32,
        reason: AbandonReason,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExecutionOutcome {
    Succeeded(SwapTransaction),
    Abandoned(AbandonReason),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionReport {
    pub direction: SwapDirection,
    pub venue: String,
    pub tokens: TokenPair,
    pub outcome: ExecutionOutcome,
    pub attempts: u32,
    pub final_slippage: Decimal,
    /// Forward legs only: the base balance recorded before capital moved.
    pub snapshot: Option<BalanceSnapshot>,
    pub events: Vec<ExecutorEvent>,
}

impl ExecutionReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, ExecutionOutcome::Succeeded(_))
    }

    pub fn failed_attempts(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, ExecutorEvent::AttemptFailed { .. }))
            .count()
    }
}

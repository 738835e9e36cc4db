//! Custom error types for the bot

use alloy::primitives::Address;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
        retry_count: u32,
    },

    #[error("Contract interaction failed: {contract} - {message}")]
    Contract {
        contract: Address,
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Invalid reserves on {venue}: {details}")]
    InvalidReserves {
        venue: String,
        details: String,
    },

    #[error("Insufficient venues: {available} reported, at least {required} required")]
    InsufficientVenues {
        available: usize,
        required: usize,
    },

    #[error("Quote failed on {venue}: {reason}")]
    Quote {
        venue: String,
        reason: String,
    },

    #[error("Swap failed on {venue} at {slippage}% slippage: {reason}")]
    Swap {
        venue: String,
        slippage: Decimal,
        reason: String,
        tx_hash: Option<String>,
    },

    #[error("Invalid configuration for {field}: {reason}")]
    Config {
        field: String,
        reason: String,
    },

    #[error("Ledger write failed: {context}")]
    Ledger {
        context: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Notification via {channel} failed")]
    Notification {
        channel: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Job status error for session {session_id}: {message}")]
    JobStatus {
        session_id: String,
        message: String,
    },

    #[error("Data parsing error: {context}")]
    DataParsing {
        context: String,
        #[source]
        source: anyhow::Error,
    },
}

impl BotError {
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        BotError::Config {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Revert reason as recorded on a failed attempt.
    pub fn reason(&self) -> String {
        match self {
            BotError::Swap { reason, .. } | BotError::Quote { reason, .. } => reason.clone(),
            other => other.to_string(),
        }
    }
}

pub type BotResult<T> = Result<T, BotError>;

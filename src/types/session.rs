//! Trading session and job status records

use alloy::primitives::Address;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub email: String,
    pub wallet_address: Address,
}

/// One continuous run for one account.
#[derive(Debug, Clone, Serialize)]
pub struct TradingSession {
    pub id: String,
    pub account: Account,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl TradingSession {
    pub fn new(account: Account, duration: Duration) -> Self {
        let start_time = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            account,
            start_time,
            end_time: start_time + duration,
        }
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        now >= self.end_time
    }

    pub fn job_name(&self) -> String {
        format!("arbitrage-{}", self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
}

/// The externally-owned single-flight flag for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub session_id: String,
    pub name: String,
    pub status: JobStatus,
    pub payload: serde_json::Value,
    pub updated_at: DateTime<Utc>,
    /// Lease of the cycle currently holding the flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease: Option<String>,
}

//! Append-only record ledger

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::info;
use crate::{
    errors::{BotError, BotResult},
    types::{ArbitrageOpportunity, BalanceSnapshot, FailedAttempt, SwapTransaction, TradingSession},
};

/// Where sessions, opportunities and swap outcomes are recorded. Callers
/// treat every write as fire-and-forget.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn record_session(&self, session: &TradingSession) -> BotResult<()>;
    async fn record_opportunity(&self, opportunity: &ArbitrageOpportunity) -> BotResult<()>;
    /// Persists the opportunity's current slippage and expected profit.
    async fn update_opportunity(&self, opportunity: &ArbitrageOpportunity) -> BotResult<()>;
    async fn record_transaction(&self, transaction: &SwapTransaction) -> BotResult<()>;
    async fn record_failed_attempt(&self, attempt: &FailedAttempt) -> BotResult<()>;
    async fn record_balance_snapshot(&self, snapshot: &BalanceSnapshot) -> BotResult<()>;
    async fn latest_balance_snapshot(
        &self,
        account: &str,
        token_symbol: &str,
    ) -> BotResult<Option<BalanceSnapshot>>;
}

/// Daily JSONL files under `<root>/<kind>/`. Opportunity updates are
/// appended as new revision lines rather than rewritten.
pub struct JsonlLedger {
    root: PathBuf,
    snapshots: Mutex<HashMap<(String, String), BalanceSnapshot>>,
}

impl JsonlLedger {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            snapshots: Mutex::new(HashMap::new()),
        }
    }

    fn file_for(&self, kind: &str, prefix: &str) -> PathBuf {
        self.root
            .join(kind)
            .join(format!("{}_{}.jsonl", prefix, Utc::now().format("%Y-%m-%d")))
    }

    async fn append<T: Serialize>(&self, kind: &str, prefix: &str, record: &T) -> BotResult<()> {
        let filename = self.file_for(kind, prefix);
        let write = async {
            let line = format!("{}\n", serde_json::to_string(record)?);
            if let Some(dir) = filename.parent() {
                tokio::fs::create_dir_all(dir).await?;
            }
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&filename)
                .await?;
            file.write_all(line.as_bytes()).await?;
            anyhow::Ok(())
        };

        write.await.map_err(|source| BotError::Ledger {
            context: format!("append to {}", filename.display()),
            source,
        })
    }
}

/// Newest matching snapshot under `<root>/balances`, scanning daily files
/// oldest first.
fn scan_snapshots(root: &Path, account: &str, token_symbol: &str) -> anyhow::Result<Option<BalanceSnapshot>> {
    let dir = root.join("balances");
    if !dir.is_dir() {
        return Ok(None);
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(&dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "jsonl"))
        .collect();
    files.sort();

    let mut latest = None;
    for path in files {
        latest = scan_file(&path, account, token_symbol)?.or(latest);
    }
    Ok(latest)
}

fn scan_file(path: &Path, account: &str, token_symbol: &str) -> anyhow::Result<Option<BalanceSnapshot>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("open {}", path.display()))?;
    let mut latest = None;
    for line in BufReader::new(file).lines() {
        let line = line?;
        // Skip torn or foreign lines
        let Ok(snapshot) = serde_json::from_str::<BalanceSnapshot>(&line) else {
            continue;
        };
        if snapshot.account == account && snapshot.token_symbol == token_symbol {
            latest = Some(snapshot);
        }
    }
    Ok(latest)
}

#[async_trait]
impl Ledger for JsonlLedger {
    async fn record_session(&self, session: &TradingSession) -> BotResult<()> {
        self.append("sessions", "session", session).await?;
        info!(
            session_id = %session.id,
            account = %session.account.email,
            end_time = %session.end_time,
            "Recorded trading session"
        );
        Ok(())
    }

    async fn record_opportunity(&self, opportunity: &ArbitrageOpportunity) -> BotResult<()> {
        self.append("opportunities", "arbitrage", opportunity).await?;
        info!(
            opportunity_id = %opportunity.id,
            spread = %opportunity.percentage_difference,
            expected_profit = %opportunity.expected_profit,
            "Saved arbitrage opportunity"
        );
        Ok(())
    }

    async fn update_opportunity(&self, opportunity: &ArbitrageOpportunity) -> BotResult<()> {
        self.append("opportunities", "arbitrage", opportunity).await?;
        info!(
            opportunity_id = %opportunity.id,
            slippage = %opportunity.slippage,
            expected_profit = %opportunity.expected_profit,
            "Updated arbitrage opportunity"
        );
        Ok(())
    }

    async fn record_transaction(&self, transaction: &SwapTransaction) -> BotResult<()> {
        self.append("transactions", "swaps", transaction).await?;
        info!(
            tx_hash = %transaction.transaction_hash,
            tokens = %transaction.tokens,
            amount = %transaction.amount,
            "Saved swap transaction"
        );
        Ok(())
    }

    async fn record_failed_attempt(&self, attempt: &FailedAttempt) -> BotResult<()> {
        self.append("failed_attempts", "failed", attempt).await?;
        info!(
            venue = %attempt.venue,
            slippage = %attempt.slippage,
            reason = %attempt.reason,
            "Saved failed swap attempt"
        );
        Ok(())
    }

    async fn record_balance_snapshot(&self, snapshot: &BalanceSnapshot) -> BotResult<()> {
        self.append("balances", "snapshot", snapshot).await?;
        if let Ok(mut cache) = self.snapshots.lock() {
            cache.insert(
                (snapshot.account.clone(), snapshot.token_symbol.clone()),
                snapshot.clone(),
            );
        }
        info!(
            token = %snapshot.token_symbol,
            balance = %snapshot.balance,
            block = snapshot.block_number,
            "Saved balance snapshot"
        );
        Ok(())
    }

    async fn latest_balance_snapshot(
        &self,
        account: &str,
        token_symbol: &str,
    ) -> BotResult<Option<BalanceSnapshot>> {
        let cached = self
            .snapshots
            .lock()
            .ok()
            .and_then(|cache| cache.get(&(account.to_string(), token_symbol.to_string())).cloned());
        if cached.is_some() {
            return Ok(cached);
        }

        let root = self.root.clone();
        let (account, token_symbol) = (account.to_string(), token_symbol.to_string());
        tokio::task::spawn_blocking(move || scan_snapshots(&root, &account, &token_symbol))
            .await
            .map_err(anyhow::Error::from)
            .and_then(|scanned| scanned)
            .map_err(|source| BotError::Ledger {
                context: "read balance snapshots".to_string(),
                source,
            })
    }
}

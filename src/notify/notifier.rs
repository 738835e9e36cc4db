//! Outbound notifications for completed and abandoned legs

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;
use crate::{
    errors::BotResult,
    types::{AbandonReason, SwapDirection, SwapTransaction},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    SwapSucceeded {
        direction: SwapDirection,
        transaction: SwapTransaction,
    },
    LegAbandoned {
        direction: SwapDirection,
        venue: String,
        reason: String,
        final_slippage: Decimal,
        attempts: u32,
    },
    ProfitRealized {
        token_symbol: String,
        reference_balance: Decimal,
        current_balance: Decimal,
        profit: Decimal,
    },
}

impl Notification {
    pub fn abandoned(
        direction: SwapDirection,
        venue: &str,
        reason: &AbandonReason,
        final_slippage: Decimal,
        attempts: u32,
    ) -> Self {
        Notification::LegAbandoned {
            direction,
            venue: venue.to_string(),
            reason: reason.to_string(),
            final_slippage,
            attempts,
        }
    }

    pub fn title(&self) -> String {
        match self {
            Notification::SwapSucceeded { transaction, .. } => format!("SWAP {}", transaction.tokens),
            Notification::LegAbandoned { direction, venue, .. } => {
                format!("ABANDONED {:?} leg on {}", direction, venue)
            }
            Notification::ProfitRealized { profit, token_symbol, .. } => {
                format!("PROFIT {} {}", profit, token_symbol)
            }
        }
    }

    /// Title followed by the pretty-printed payload in an HTML `<pre>` block.
    pub fn render_html(&self) -> String {
        let body = serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("\"{}\"", e));
        format!("{} <pre>{}</pre>", self.title(), escape_html(&body))
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, session_id: &str, notification: &Notification) -> BotResult<()>;
}

/// Writes notifications to the log only. Used when no chat credentials are set.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, session_id: &str, notification: &Notification) -> BotResult<()> {
        info!(session_id, "📣 {}", notification.title());
        Ok(())
    }
}

//! Telegram Bot API notifier

use async_trait::async_trait;
use anyhow::Context;
use std::time::Duration;
use tracing::debug;
use crate::{
    config::Config,
    errors::{BotError, BotResult},
    notify::{Notification, Notifier},
};

pub struct TelegramNotifier {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(api_url: &str, api_key: &str, chat_id: &str) -> BotResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| BotError::Notification {
                channel: "telegram".to_string(),
                source: e.into(),
            })?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            chat_id: chat_id.to_string(),
        })
    }

    /// `None` when either credential is missing.
    pub fn from_config(config: &Config) -> BotResult<Option<Self>> {
        match (&config.telegram_api_key, &config.telegram_group_id) {
            (Some(key), Some(group)) => Self::new(&config.telegram_api_url, key, group).map(Some),
            _ => Ok(None),
        }
    }

    async fn send(&self, text: String) -> anyhow::Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_url, self.api_key);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "chat_id": self.chat_id,
                "text": text,
                "parse_mode": "HTML",
            }))
            .send()
            .await
            .context("HTTP request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Telegram API error: {} - {}", status, body);
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, session_id: &str, notification: &Notification) -> BotResult<()> {
        self.send(notification.render_html())
            .await
            .map_err(|source| BotError::Notification {
                channel: "telegram".to_string(),
                source,
            })?;
        debug!(session_id, "Sent Telegram notification: {}", notification.title());
        Ok(())
    }
}

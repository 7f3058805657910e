use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::TwilioConfig;

const SMS_TIMEOUT: Duration = Duration::from_secs(10);
/// Messages in flight at once for a batch send
pub const SMS_BATCH_CONCURRENCY: usize = 8;

/// What happened to a text message. Delivery problems never fail the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SmsOutcome {
    Sent { sid: String },
    Skipped { reason: String },
    Failed { error: String },
}

impl SmsOutcome {
    fn skipped(reason: &str) -> Self {
        SmsOutcome::Skipped {
            reason: reason.to_string(),
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, SmsOutcome::Sent { .. })
    }
}

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    message: Option<String>,
}

/// Twilio Programmable Messaging client
#[derive(Debug, Clone)]
pub struct SmsService {
    client: Client,
    config: Option<TwilioConfig>,
    base_url: Option<String>,
}

impl SmsService {
    pub fn new(config: Option<TwilioConfig>, base_url: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(SMS_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_some()
    }

    /// Text `body` to `to`. A missing number or disabled provider skips the send.
    pub async fn send(&self, to: Option<&str>, body: &str) -> SmsOutcome {
        let Some(config) = &self.config else {
            return SmsOutcome::skipped("sms disabled");
        };
        let Some(to) = to.filter(|number| !number.trim().is_empty()) else {
            return SmsOutcome::skipped("no phone number");
        };

        match self.post_message(config, to, body).await {
            Ok(sid) => {
                tracing::info!(sid = %sid, "sms sent");
                SmsOutcome::Sent { sid }
            }
            Err(err) => {
                tracing::warn!(error = %err, "sms delivery failed");
                SmsOutcome::Failed {
                    error: err.to_string(),
                }
            }
        }
    }

    /// Send many messages with bounded concurrency; outcomes keep input order.
    pub async fn send_batch(&self, messages: Vec<(Option<String>, String)>) -> Vec<SmsOutcome> {
        stream::iter(messages)
            .map(|(to, body)| async move { self.send(to.as_deref(), &body).await })
            .buffered(SMS_BATCH_CONCURRENCY)
            .collect()
            .await
    }

    async fn post_message(&self, config: &TwilioConfig, to: &str, body: &str) -> Result<String> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            config.api_base.trim_end_matches('/'),
            config.account_sid
        );
        let params = [("To", to), ("From", config.from_number.as_str()), ("Body", body)];

        let response = self
            .client
            .post(url)
            .basic_auth(&config.account_sid, Some(&config.auth_token))
            .form(&params)
            .send()
            .await
            .context("Failed to reach SMS provider")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<ProviderError>()
                .await
                .ok()
                .and_then(|e| e.message)
                .unwrap_or_else(|| "no detail".to_string());
            anyhow::bail!("SMS provider returned {}: {}", status, detail);
        }

        let message = response
            .json::<MessageResource>()
            .await
            .context("Failed to parse SMS provider response")?;

        Ok(message.sid)
    }

    fn portal_link(&self) -> Option<String> {
        self.base_url.as_ref().map(|base| format!("{}/player", base))
    }

    fn with_link(&self, text: String) -> String {
        match self.portal_link() {
            Some(link) => format!("{} {}", text, link),
            None => text,
        }
    }

    pub fn login_code_message(&self, player_name: &str, code: &str) -> String {
        self.with_link(format!(
            "Hi {}! Your player login code is {}.",
            player_name, code
        ))
    }

    pub fn shared_note_message(&self, player_name: &str) -> String {
        self.with_link(format!("Hi {}, your coach shared a new note with you.", player_name))
    }

    pub fn drill_assigned_message(&self, player_name: &str, drill_title: &str) -> String {
        self.with_link(format!(
            "Hi {}, you have a new drill to work on: {}.",
            player_name, drill_title
        ))
    }
}

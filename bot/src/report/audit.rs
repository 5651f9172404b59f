//! Audit notifications posted to a Discord webhook

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::settings::{FooterMode, Settings};
use crate::errors::BotError;

pub const TITLE: &str = "Deployment Status";
pub const FOOTER_LABEL: &str = "Deployment Bot";
pub const COLOR_SUCCESS: u32 = 0x008000;
pub const COLOR_FAILED: u32 = 0x800000;

/// Audited outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Success,
    Failed,
}

impl AuditStatus {
    pub fn color(&self) -> u32 {
        match self {
            AuditStatus::Success => COLOR_SUCCESS,
            AuditStatus::Failed => COLOR_FAILED,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AuditStatus::Success => "Deployment Successful!",
            AuditStatus::Failed => "Deployment Failed!",
        }
    }
}

/// One audited event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditNotice {
    pub status: AuditStatus,
    pub environment: String,
    pub branch: String,
    /// Display identity of the member who triggered the attempt
    pub author: String,
    pub timestamp: DateTime<Utc>,
}

/// Sink for audit notices
#[async_trait]
pub trait AuditNotifier: Send + Sync {
    async fn notify(&self, notice: &AuditNotice) -> Result<(), BotError>;
}

/// Discord webhook execute body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub fields: Vec<EmbedField>,
    pub thumbnail: EmbedImage,
    pub footer: EmbedFooter,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedImage {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedFooter {
    pub text: String,
    pub icon_url: String,
}

/// Build the card for a notice
pub fn build_payload(notice: &AuditNotice, thumbnail_url: &str, footer: FooterMode) -> WebhookPayload {
    let footer_text = match footer {
        FooterMode::Static => FOOTER_LABEL.to_string(),
        FooterMode::Author => notice.author.clone(),
    };

    WebhookPayload {
        embeds: vec![Embed {
            title: TITLE.to_string(),
            description: notice.status.description().to_string(),
            color: notice.status.color(),
            fields: vec![
                EmbedField {
                    name: "Environment".to_string(),
                    value: notice.environment.clone(),
                    inline: true,
                },
                EmbedField {
                    name: "Branch".to_string(),
                    value: notice.branch.clone(),
                    inline: true,
                },
            ],
            thumbnail: EmbedImage {
                url: thumbnail_url.to_string(),
            },
            footer: EmbedFooter {
                text: footer_text,
                icon_url: thumbnail_url.to_string(),
            },
            timestamp: notice.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        }],
    }
}

/// Posts notices to a Discord webhook URL
pub struct WebhookNotifier {
    client: Client,
    url: String,
    thumbnail_url: String,
    footer: FooterMode,
}

impl WebhookNotifier {
    pub fn new(
        url: &str,
        thumbnail_url: &str,
        footer: FooterMode,
        timeout: Duration,
    ) -> Result<Self, BotError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: url.to_string(),
            thumbnail_url: thumbnail_url.to_string(),
            footer,
        })
    }

    pub fn from_settings(settings: &Settings, timeout: Duration) -> Result<Self, BotError> {
        Self::new(
            settings.deployment_log_webhook(),
            &settings.audit_thumbnail_url,
            settings.policy.audit_footer,
            timeout,
        )
    }
}

#[async_trait]
impl AuditNotifier for WebhookNotifier {
    async fn notify(&self, notice: &AuditNotice) -> Result<(), BotError> {
        let payload = build_payload(notice, &self.thumbnail_url, self.footer);
        debug!("Posting {:?} audit notice for branch {}", notice.status, notice.branch);

        let response = self.client.post(&self.url).json(&payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::AuditError(format!("{}: {}", status, body)));
        }

        Ok(())
    }
}

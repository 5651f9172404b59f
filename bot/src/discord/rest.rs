//! Discord REST client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};

use crate::discord::models::{AllowedMentions, CreateMessage, EditMessage, Member, Message};
use crate::discord::ChatClient;
use crate::errors::BotError;

pub const DEFAULT_API_BASE_URL: &str = "https://discord.com/api/v10";

/// HTTP client for the Discord REST API
pub struct DiscordHttp {
    client: Client,
    base_url: String,
    authorization: String,
}

impl DiscordHttp {
    /// Create a new client authenticated with a bot token
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, BotError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(
                "DiscordBot (https://github.com/deploybot/deploybot, ",
                env!("CARGO_PKG_VERSION"),
                ")"
            ))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            authorization: format!("Bot {}", token),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, BotError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header(header::AUTHORIZATION, &self.authorization)
            .send()
            .await?;

        Ok(check_status("GET", response).await?.json().await?)
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, BotError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, &self.authorization)
            .json(body)
            .send()
            .await?;

        Ok(check_status("POST", response).await?.json().await?)
    }

    async fn patch<B: Serialize>(&self, path: &str, body: &B) -> Result<(), BotError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("PATCH {}", url);

        let response = self
            .client
            .patch(&url)
            .header(header::AUTHORIZATION, &self.authorization)
            .json(body)
            .send()
            .await?;

        check_status("PATCH", response).await?;
        Ok(())
    }
}

async fn check_status(verb: &str, response: Response) -> Result<Response, BotError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    error!("HTTP {} failed: {} - {}", verb, status, body);
    Err(BotError::DiscordError {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl ChatClient for DiscordHttp {
    async fn send_message(&self, channel_id: &str, content: &str) -> Result<String, BotError> {
        let body = CreateMessage {
            content,
            allowed_mentions: AllowedMentions::default(),
        };
        let message: Message = self
            .post(&format!("/channels/{}/messages", channel_id), &body)
            .await?;
        Ok(message.id)
    }

    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<(), BotError> {
        self.patch(
            &format!("/channels/{}/messages/{}", channel_id, message_id),
            &EditMessage { content },
        )
        .await
    }

    async fn member_roles(&self, guild_id: &str, user_id: &str) -> Result<Vec<String>, BotError> {
        let member: Member = self
            .get(&format!("/guilds/{}/members/{}", guild_id, user_id))
            .await?;
        Ok(member.roles)
    }
}

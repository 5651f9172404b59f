//! Discord adapter: REST calls and the gateway event stream

pub mod gateway;
pub mod models;
pub mod rest;

use async_trait::async_trait;

use crate::errors::BotError;

/// Chat operations the deploy pipeline needs from the platform
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Post a message to a channel, returning the new message id
    async fn send_message(&self, channel_id: &str, content: &str) -> Result<String, BotError>;

    /// Replace the content of a message previously sent by the bot
    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<(), BotError>;

    /// Role ids held by a guild member
    async fn member_roles(&self, guild_id: &str, user_id: &str) -> Result<Vec<String>, BotError>;
}

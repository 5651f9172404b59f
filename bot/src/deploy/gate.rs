//! Decides whether a chat message may be treated as a deploy command

use tracing::{debug, trace};

use crate::config::settings::Settings;
use crate::discord::models::Message;
use crate::discord::ChatClient;

pub const COMMAND_PREFIX: char = '!';

/// Gate verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Not for us; drop without a trace
    Ignore,
    /// A channel member without the deploy role
    Deny,
    /// Authorized; carries the text after the prefix
    Admit(String),
}

/// Check author, channel, prefix and role, in that order.
///
/// The role lookup only happens for prefixed messages in the deploy channel,
/// so ordinary chatter never reaches the platform API.
pub async fn admit(message: &Message, settings: &Settings, chat: &dyn ChatClient) -> Admission {
    if message.author.bot || message.channel_id != settings.deployment_channel {
        return Admission::Ignore;
    }

    let Some(text) = message.content.strip_prefix(COMMAND_PREFIX) else {
        return Admission::Ignore;
    };

    let Some(guild_id) = message.guild_id.as_deref() else {
        trace!("Ignoring message {} without a guild", message.id);
        return Admission::Ignore;
    };

    match chat.member_roles(guild_id, &message.author.id).await {
        Ok(roles) if roles.iter().any(|role| *role == settings.deployment_role) => {
            Admission::Admit(text.to_string())
        }
        Ok(_) => {
            debug!("{} lacks the deploy role", message.author.tag());
            Admission::Deny
        }
        Err(e) => {
            debug!("Role lookup for {} failed: {}", message.author.id, e);
            Admission::Ignore
        }
    }
}

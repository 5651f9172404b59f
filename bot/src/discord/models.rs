//! Discord wire types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Gateway opcodes used by the bot
pub mod opcode {
    pub const DISPATCH: u8 = 0;
    pub const HEARTBEAT: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const RECONNECT: u8 = 7;
    pub const INVALID_SESSION: u8 = 9;
    pub const HELLO: u8 = 10;
    pub const HEARTBEAT_ACK: u8 = 11;
}

/// Gateway intents
pub mod intents {
    pub const GUILDS: u64 = 1 << 0;
    pub const GUILD_MEMBERS: u64 = 1 << 1;
    pub const GUILD_MESSAGES: u64 = 1 << 9;
    pub const MESSAGE_CONTENT: u64 = 1 << 15;
}

/// Raw gateway frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPayload {
    pub op: u8,

    #[serde(default)]
    pub d: Option<Value>,

    #[serde(default)]
    pub s: Option<u64>,

    #[serde(default)]
    pub t: Option<String>,
}

/// `d` of the Hello frame
#[derive(Debug, Clone, Deserialize)]
pub struct Hello {
    pub heartbeat_interval: u64,
}

/// `d` of the READY dispatch
#[derive(Debug, Clone, Deserialize)]
pub struct Ready {
    pub user: User,
    pub session_id: String,
}

/// Discord user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,

    pub username: String,

    #[serde(default)]
    pub global_name: Option<String>,

    #[serde(default)]
    pub discriminator: Option<String>,

    #[serde(default)]
    pub bot: bool,
}

impl User {
    /// Name shown to people: global display name, else username
    pub fn display_name(&self) -> &str {
        self.global_name.as_deref().unwrap_or(&self.username)
    }

    /// `username#1234` for legacy accounts, plain username otherwise
    pub fn tag(&self) -> String {
        match self.discriminator.as_deref() {
            Some(d) if d != "0" => format!("{}#{}", self.username, d),
            _ => self.username.clone(),
        }
    }
}

/// Message from a MESSAGE_CREATE dispatch or a REST response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,

    pub channel_id: String,

    #[serde(default)]
    pub guild_id: Option<String>,

    pub author: User,

    #[serde(default)]
    pub content: String,
}

/// Guild member returned by `GET /guilds/{guild}/members/{user}`
#[derive(Debug, Clone, Deserialize)]
pub struct Member {
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Body for creating a message
#[derive(Debug, Clone, Serialize)]
pub struct CreateMessage<'a> {
    pub content: &'a str,
    pub allowed_mentions: AllowedMentions,
}

/// Body for editing a message
#[derive(Debug, Clone, Serialize)]
pub struct EditMessage<'a> {
    pub content: &'a str,
}

/// Mentions the bot is allowed to ping; empty means none
#[derive(Debug, Clone, Default, Serialize)]
pub struct AllowedMentions {
    pub parse: Vec<String>,
}

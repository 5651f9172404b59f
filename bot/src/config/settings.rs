//! Runtime settings read from the process environment
//!
//! Every field has its own variable and its own missing-field error. Optional
//! variables fall back to documented defaults.

use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::errors::BotError;
use crate::logs::LogLevel;

pub const VAR_TOKEN: &str = "TOKEN";
pub const VAR_ENVIRONMENT: &str = "ENVIRONMENT";
pub const VAR_BRANCH: &str = "BRANCH";
pub const VAR_DEPLOYMENT_LOCATION: &str = "DEPLOYMENT_LOCATION";
pub const VAR_DEPLOYMENT_CHANNEL: &str = "DEPLOYMENT_CHANNEL";
pub const VAR_DEPLOYMENT_ROLE: &str = "DEPLOYMENT_ROLE";
pub const VAR_DEPLOYMENT_LOG_WEBHOOK: &str = "DEPLOYMENT_LOG_WEBHOOK";
pub const VAR_CANONICAL_BRANCH: &str = "CANONICAL_BRANCH";
pub const VAR_AUDIT_THUMBNAIL_URL: &str = "AUDIT_THUMBNAIL_URL";
pub const VAR_AUDIT_FOOTER: &str = "AUDIT_FOOTER";
pub const VAR_DENY_UNAUTHORIZED_REPLY: &str = "DENY_UNAUTHORIZED_REPLY";
pub const VAR_REPLY_UNKNOWN_COMMAND: &str = "REPLY_UNKNOWN_COMMAND";
pub const VAR_LOG_LEVEL: &str = "LOG_LEVEL";
pub const VAR_LOG_DIR: &str = "LOG_DIR";
pub const VAR_LOG_JSON: &str = "LOG_JSON";

pub const DEFAULT_ENVIRONMENT: &str = "Production";
pub const DEFAULT_CANONICAL_BRANCH: &str = "main";
pub const DEFAULT_THUMBNAIL_URL: &str =
    "https://r2.fivemanage.com/3i2fhQIkHIaRFDy1YIvi8/images/image.png";

/// What the audit card footer shows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FooterMode {
    /// Fixed service label
    #[default]
    Static,
    /// Identity of the member who triggered the attempt
    Author,
}

impl std::str::FromStr for FooterMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "static" => Ok(FooterMode::Static),
            "author" => Ok(FooterMode::Author),
            _ => Err(format!("Invalid audit footer mode: {}", s)),
        }
    }
}

/// Replies for the ambiguous edges of the command surface
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Policy {
    /// Tell a channel member without the deploy role that they were refused
    pub deny_unauthorized_reply: bool,

    /// Answer `!<something>` that is not `deploy`
    pub reply_unknown_command: bool,

    /// Audit card footer contents
    pub audit_footer: FooterMode,
}

/// Bot settings, immutable once loaded
#[derive(Clone)]
pub struct Settings {
    /// Discord bot token
    token: SecretString,

    /// Environment label shown on audit cards
    pub environment: String,

    /// The single branch this instance may deploy
    pub branch: String,

    /// Branch operators are reminded to return to after deploying another one
    pub canonical_branch: String,

    /// Substituted for `${LOCATION}` in templates
    pub deployment_location: String,

    /// Channel accepting deploy commands
    pub deployment_channel: String,

    /// Role required to deploy
    pub deployment_role: String,

    /// Audit webhook endpoint
    deployment_log_webhook: SecretString,

    /// Thumbnail on audit cards
    pub audit_thumbnail_url: String,

    pub policy: Policy,

    pub log_level: LogLevel,

    pub log_dir: Option<PathBuf>,

    pub log_json: bool,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("token", &"[REDACTED]")
            .field("environment", &self.environment)
            .field("branch", &self.branch)
            .field("canonical_branch", &self.canonical_branch)
            .field("deployment_location", &self.deployment_location)
            .field("deployment_channel", &self.deployment_channel)
            .field("deployment_role", &self.deployment_role)
            .field("deployment_log_webhook", &"[REDACTED]")
            .field("audit_thumbnail_url", &self.audit_thumbnail_url)
            .field("policy", &self.policy)
            .field("log_level", &self.log_level)
            .field("log_dir", &self.log_dir)
            .field("log_json", &self.log_json)
            .finish()
    }
}

impl Settings {
    /// Load `.env` into the process environment, then read the settings.
    ///
    /// A missing default `.env` is tolerated; an explicitly requested file must exist.
    pub fn load(env_file: Option<&Path>) -> Result<Self, BotError> {
        match env_file {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| {
                    BotError::ConfigError(format!("Unable to load {}: {}", path.display(), e))
                })?;
            }
            None => match dotenvy::dotenv() {
                Ok(path) => debug!("Loaded environment from {}", path.display()),
                Err(e) if e.not_found() => debug!("No .env file found, using process environment"),
                Err(e) => return Err(BotError::ConfigError(format!("Unable to load .env: {}", e))),
            },
        }

        Self::from_env()
    }

    /// Read settings from the process environment
    pub fn from_env() -> Result<Self, BotError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, BotError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| -> Result<String, BotError> {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or(BotError::MissingConfig(key))
        };
        let optional = |key: &str| -> Option<String> {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let flag = |key: &str| -> Result<bool, BotError> {
            match optional(key) {
                None => Ok(false),
                Some(value) => parse_bool(&value)
                    .ok_or_else(|| BotError::ConfigError(format!("{} must be a boolean, got {}", key, value))),
            }
        };

        let token = required(VAR_TOKEN)?;
        let branch = required(VAR_BRANCH)?;
        let deployment_location = required(VAR_DEPLOYMENT_LOCATION)?;
        let deployment_channel = required(VAR_DEPLOYMENT_CHANNEL)?;
        let deployment_role = required(VAR_DEPLOYMENT_ROLE)?;
        let deployment_log_webhook = required(VAR_DEPLOYMENT_LOG_WEBHOOK)?;

        url::Url::parse(&deployment_log_webhook).map_err(|e| {
            BotError::ConfigError(format!("{} is not a valid URL: {}", VAR_DEPLOYMENT_LOG_WEBHOOK, e))
        })?;

        let audit_footer = match optional(VAR_AUDIT_FOOTER) {
            Some(value) => value.parse().map_err(BotError::ConfigError)?,
            None => FooterMode::default(),
        };
        let log_level = match optional(VAR_LOG_LEVEL) {
            Some(value) => value.parse().map_err(BotError::ConfigError)?,
            None => LogLevel::default(),
        };

        Ok(Self {
            token: SecretString::new(token.into()),
            environment: optional(VAR_ENVIRONMENT).unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
            branch,
            canonical_branch: optional(VAR_CANONICAL_BRANCH)
                .unwrap_or_else(|| DEFAULT_CANONICAL_BRANCH.to_string()),
            deployment_location,
            deployment_channel,
            deployment_role,
            deployment_log_webhook: SecretString::new(deployment_log_webhook.into()),
            audit_thumbnail_url: optional(VAR_AUDIT_THUMBNAIL_URL)
                .unwrap_or_else(|| DEFAULT_THUMBNAIL_URL.to_string()),
            policy: Policy {
                deny_unauthorized_reply: flag(VAR_DENY_UNAUTHORIZED_REPLY)?,
                reply_unknown_command: flag(VAR_REPLY_UNKNOWN_COMMAND)?,
                audit_footer,
            },
            log_level,
            log_dir: optional(VAR_LOG_DIR).map(PathBuf::from),
            log_json: flag(VAR_LOG_JSON)?,
        })
    }

    /// Get the bot token
    pub fn token(&self) -> &str {
        self.token.expose_secret()
    }

    /// Get the audit webhook URL
    pub fn deployment_log_webhook(&self) -> &str {
        self.deployment_log_webhook.expose_secret()
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            (VAR_TOKEN, "bot-token"),
            (VAR_BRANCH, "main"),
            (VAR_DEPLOYMENT_LOCATION, "/srv/app"),
            (VAR_DEPLOYMENT_CHANNEL, "100"),
            (VAR_DEPLOYMENT_ROLE, "200"),
            (VAR_DEPLOYMENT_LOG_WEBHOOK, "https://discord.com/api/webhooks/1/abc"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> Result<Settings, BotError> {
        Settings::from_lookup(|key| env.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn test_settings_defaults() {
        let settings = load(&base_env()).unwrap();

        assert_eq!(settings.token(), "bot-token");
        assert_eq!(settings.branch, "main");
        assert_eq!(settings.environment, DEFAULT_ENVIRONMENT);
        assert_eq!(settings.canonical_branch, DEFAULT_CANONICAL_BRANCH);
        assert_eq!(settings.policy, Policy::default());
        assert_eq!(settings.log_dir, None);
    }

    #[test]
    fn test_settings_missing_field_is_named() {
        for var in [
            VAR_TOKEN,
            VAR_BRANCH,
            VAR_DEPLOYMENT_LOCATION,
            VAR_DEPLOYMENT_CHANNEL,
            VAR_DEPLOYMENT_ROLE,
            VAR_DEPLOYMENT_LOG_WEBHOOK,
        ] {
            let mut env = base_env();
            env.remove(var);
            match load(&env) {
                Err(BotError::MissingConfig(name)) => assert_eq!(name, var),
                other => panic!("expected missing {}, got {:?}", var, other),
            }
        }
    }

    #[test]
    fn test_settings_blank_field_is_missing() {
        let mut env = base_env();
        env.insert(VAR_BRANCH, "   ");
        assert!(matches!(load(&env), Err(BotError::MissingConfig(VAR_BRANCH))));
    }

    #[test]
    fn test_settings_policy_flags() {
        let mut env = base_env();
        env.insert(VAR_DENY_UNAUTHORIZED_REPLY, "true");
        env.insert(VAR_REPLY_UNKNOWN_COMMAND, "1");
        env.insert(VAR_AUDIT_FOOTER, "Author");
        env.insert(VAR_ENVIRONMENT, "Staging");

        let settings = load(&env).unwrap();
        assert!(settings.policy.deny_unauthorized_reply);
        assert!(settings.policy.reply_unknown_command);
        assert_eq!(settings.policy.audit_footer, FooterMode::Author);
        assert_eq!(settings.environment, "Staging");
    }

    #[test]
    fn test_settings_rejects_bad_values() {
        let mut env = base_env();
        env.insert(VAR_DENY_UNAUTHORIZED_REPLY, "maybe");
        assert!(matches!(load(&env), Err(BotError::ConfigError(_))));

        let mut env = base_env();
        env.insert(VAR_DEPLOYMENT_LOG_WEBHOOK, "not a url");
        assert!(matches!(load(&env), Err(BotError::ConfigError(_))));
    }

    #[test]
    fn test_settings_debug_redacts_secrets() {
        let settings = load(&base_env()).unwrap();
        let debug_str = format!("{:?}", settings);
        assert!(!debug_str.contains("bot-token"));
        assert!(!debug_str.contains("webhooks/1/abc"));
        assert!(debug_str.contains("[REDACTED]"));
    }
}

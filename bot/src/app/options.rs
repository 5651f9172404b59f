//! Application configuration options

use std::path::PathBuf;
use std::time::Duration;

use crate::config::dictionary::DEFAULT_DICTIONARY_FILE;
use crate::deploy::executor;
use crate::discord::gateway;
use crate::discord::rest::DEFAULT_API_BASE_URL;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Explicit `.env` file; the working directory's `.env` is tried otherwise
    pub env_file: Option<PathBuf>,

    /// Command dictionary file
    pub dictionary_file: PathBuf,

    /// Discord REST API base URL
    pub api_base_url: String,

    /// Timeout for Discord REST and webhook requests
    pub http_timeout: Duration,

    /// Gateway options
    pub gateway: gateway::Options,

    /// Executor options
    pub executor: executor::Options,

    /// Capacity of the gateway → handler event channel
    pub event_buffer: usize,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            env_file: None,
            dictionary_file: PathBuf::from(DEFAULT_DICTIONARY_FILE),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            http_timeout: Duration::from_secs(10),
            gateway: gateway::Options::default(),
            executor: executor::Options::default(),
            event_buffer: 64,
        }
    }
}

/// Lifecycle options for the bot
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown, running deployments included
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            // Deployment budget plus time to report the outcome
            max_shutdown_delay: Duration::from_secs(150),
        }
    }
}

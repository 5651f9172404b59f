//! Deploy Bot Library
//!
//! Chat-triggered deployment launcher: authorized members of a Discord
//! channel run `!deploy <branch> <key>`, the bot resolves the key to a shell
//! command template, runs it under a time budget, and reports the outcome in
//! the channel and to an audit webhook.

pub mod app;
pub mod config;
pub mod deploy;
pub mod discord;
pub mod errors;
pub mod logs;
pub mod report;
pub mod utils;

//! Deploy Bot - Entry Point
//!
//! Listens in one Discord channel for `!deploy <branch> <key>` and runs the
//! matching command from the dictionary file.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use deploybot::app::options::AppOptions;
use deploybot::app::run::run;
use deploybot::config::dictionary::CommandDictionary;
use deploybot::config::settings::Settings;
use deploybot::logs::{init_logging, LogOptions};
use deploybot::utils::version_info;

use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Failed to serialize version info: {e}"),
        }
        return ExitCode::SUCCESS;
    }

    let mut options = AppOptions::default();
    if let Some(path) = cli_args.get("env-file") {
        options.env_file = Some(PathBuf::from(path));
    }
    if let Some(path) = cli_args.get("dictionary") {
        options.dictionary_file = PathBuf::from(path);
    }

    // Settings come first: they carry the log configuration
    let settings = match Settings::load(options.env_file.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            if let Err(log_err) = init_logging(LogOptions::default()) {
                eprintln!("Failed to initialize logging: {log_err}");
            }
            error!("Unable to load settings: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level,
        log_dir: settings.log_dir.clone(),
        json_format: settings.log_json,
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    let dictionary = match CommandDictionary::load(&options.dictionary_file).await {
        Ok(dictionary) => dictionary,
        Err(e) => {
            error!("Unable to load command dictionary: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Running deploy bot {} ({}) with settings: {:?}", version.version, version.git_hash, settings);
    match run(settings, dictionary, options, await_shutdown_signal()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Deploy bot stopped: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) = match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            _ => {
                error!("Failed to install signal handlers, falling back to Ctrl+C");
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Ctrl+C received, shutting down...");
                }
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Ctrl+C received, shutting down...");
    }
}

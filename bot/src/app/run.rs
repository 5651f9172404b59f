//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

use crate::app::handler::{DeployHandler, Handled};
use crate::app::options::{AppOptions, LifecycleOptions};
use crate::config::dictionary::CommandDictionary;
use crate::config::settings::Settings;
use crate::deploy::executor::ShellRunner;
use crate::discord::gateway::GatewayConnection;
use crate::discord::rest::DiscordHttp;
use crate::errors::BotError;
use crate::report::audit::WebhookNotifier;

/// Run the deploy bot until the shutdown signal fires or the gateway drops
pub async fn run(
    settings: Settings,
    dictionary: CommandDictionary,
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), BotError> {
    info!("Initializing deploy bot...");

    let settings = Arc::new(settings);
    let dictionary = Arc::new(dictionary);

    let chat = Arc::new(DiscordHttp::new(
        &options.api_base_url,
        settings.token(),
        options.http_timeout,
    )?);
    let audit = Arc::new(WebhookNotifier::from_settings(&settings, options.http_timeout)?);
    let runner = Arc::new(ShellRunner::new(options.executor.shell.clone()));

    let handler = DeployHandler::new(
        settings.clone(),
        dictionary,
        chat,
        audit,
        runner,
        options.executor.clone(),
    );

    // Startup-fatal: nothing is spawned until the gateway is READY
    let connection = GatewayConnection::connect(&options.gateway, settings.token()).await?;
    info!(
        "Listening for deploy commands as {} in channel {} (branch {})",
        connection.user().tag(),
        settings.deployment_channel,
        settings.branch
    );

    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let (events_tx, mut events_rx) = mpsc::channel(options.event_buffer);

    let mut gateway_shutdown_rx = shutdown_tx.subscribe();
    let gateway_handle = tokio::spawn(connection.run(
        events_tx,
        Box::pin(async move {
            let _ = gateway_shutdown_rx.recv().await;
        }),
    ));
    let mut shutdown_manager = ShutdownManager::new(
        shutdown_tx,
        options.lifecycle.clone(),
        gateway_handle,
        handler.tasks().clone(),
    );

    tokio::pin!(shutdown_signal);
    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Shutdown signal received, shutting down...");
                break;
            }
            event = events_rx.recv() => {
                let Some(message) = event else {
                    // The gateway task ended on its own; surface its error
                    return shutdown_manager.shutdown().await;
                };
                match handler.handle_message(&message).await {
                    Handled::Spawned(_) | Handled::Ignored => {}
                    other => info!("Message {} from {}: {:?}", message.id, message.author.tag(), other),
                }
            }
        }
    }

    shutdown_manager.shutdown().await
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    gateway_handle: Option<JoinHandle<Result<(), BotError>>>,
    tasks: TaskTracker,
}

impl ShutdownManager {
    fn new(
        shutdown_tx: broadcast::Sender<()>,
        lifecycle_options: LifecycleOptions,
        gateway_handle: JoinHandle<Result<(), BotError>>,
        tasks: TaskTracker,
    ) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            gateway_handle: Some(gateway_handle),
            tasks,
        }
    }

    async fn shutdown(&mut self) -> Result<(), BotError> {
        let _ = self.shutdown_tx.send(());

        let max_delay = self.lifecycle_options.max_shutdown_delay;
        match tokio::time::timeout(max_delay, self.shutdown_impl()).await {
            Ok(result) => result,
            Err(_) => {
                error!("Shutdown timed out after {:?}, forcing shutdown...", max_delay);
                Err(BotError::ShutdownError("timed out".to_string()))
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), BotError> {
        info!("Shutting down deploy bot...");

        let gateway_result = match self.gateway_handle.take() {
            Some(handle) => handle.await.map_err(|e| BotError::ShutdownError(e.to_string()))?,
            None => Ok(()),
        };

        // Deployments in flight still finish, report and audit
        self.tasks.close();
        if !self.tasks.is_empty() {
            info!("Waiting for {} running task(s) to finish...", self.tasks.len());
        }
        self.tasks.wait().await;

        info!("Shutdown complete");
        gateway_result
    }
}

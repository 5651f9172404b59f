//! Per-message deploy pipeline: gate, parse, validate, then spawn the executor

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::config::dictionary::CommandDictionary;
use crate::config::settings::Settings;
use crate::deploy::attempt::{Author, DeployAttempt};
use crate::deploy::command::{self, Command};
use crate::deploy::executor::{self, resolve_template, CommandRunner, DeploymentExecutor};
use crate::deploy::gate::{self, Admission};
use crate::deploy::validate::{validate, Rejection};
use crate::discord::models::Message;
use crate::discord::ChatClient;
use crate::report::audit::{AuditNotice, AuditNotifier, AuditStatus};
use crate::report::messages;
use crate::report::reporter::StatusReporter;

/// What became of a message
#[derive(Debug)]
pub enum Handled {
    /// Failed the gate, or not a command we answer
    Ignored,
    /// Member lacks the deploy role
    Denied,
    /// Prefixed command other than `deploy`
    UnknownCommand(String),
    /// `deploy` with too few arguments
    Usage,
    /// Turned down by validation
    Rejected(Rejection),
    /// Acknowledgement and executor running in their own task
    Spawned(JoinHandle<DeployAttempt>),
}

/// Handles chat messages against immutable settings and dictionary
pub struct DeployHandler {
    settings: Arc<Settings>,
    dictionary: Arc<CommandDictionary>,
    chat: Arc<dyn ChatClient>,
    reporter: StatusReporter,
    executor: DeploymentExecutor,
    tasks: TaskTracker,
}

impl DeployHandler {
    pub fn new(
        settings: Arc<Settings>,
        dictionary: Arc<CommandDictionary>,
        chat: Arc<dyn ChatClient>,
        audit: Arc<dyn AuditNotifier>,
        runner: Arc<dyn CommandRunner>,
        options: executor::Options,
    ) -> Self {
        let tasks = TaskTracker::new();
        let reporter = StatusReporter::new(chat.clone(), audit, tasks.clone());
        let executor = DeploymentExecutor::new(
            runner,
            reporter.clone(),
            options,
            settings.environment.clone(),
            settings.canonical_branch.clone(),
        );

        Self {
            settings,
            dictionary,
            chat,
            reporter,
            executor,
            tasks,
        }
    }

    /// Tracker holding every reply, audit and deployment spawned so far
    pub fn tasks(&self) -> &TaskTracker {
        &self.tasks
    }

    /// Wait until all background work started so far has finished
    pub async fn wait_idle(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    /// Process one message.
    ///
    /// Only the role lookup is awaited here. Replies, audits and the deployment
    /// itself run on the task tracker.
    pub async fn handle_message(&self, message: &Message) -> Handled {
        let policy = &self.settings.policy;
        let channel_id = message.channel_id.as_str();

        let text = match gate::admit(message, &self.settings, self.chat.as_ref()).await {
            Admission::Admit(text) => text,
            Admission::Deny => {
                if policy.deny_unauthorized_reply {
                    self.reporter.reply_in_background(channel_id, messages::PERMISSION_DENIED);
                }
                return Handled::Denied;
            }
            Admission::Ignore => return Handled::Ignored,
        };

        let request = match command::parse(&text) {
            Command::Deploy(request) => request,
            Command::Empty => return Handled::Ignored,
            Command::Unknown(name) => {
                if policy.reply_unknown_command {
                    self.reporter
                        .reply_in_background(channel_id, messages::unknown_command(&name));
                }
                return Handled::UnknownCommand(name);
            }
            Command::MissingFields => {
                self.reporter.reply_in_background(channel_id, messages::USAGE);
                return Handled::Usage;
            }
        };

        let author = Author::from(&message.author);

        let template = match validate(&request, &self.dictionary, &self.settings.branch) {
            Ok(template) => template,
            Err(rejection) => {
                self.reject(channel_id, &author, &rejection);
                return Handled::Rejected(rejection);
            }
        };

        let resolved = resolve_template(template, &self.settings.deployment_location, &request.branch);
        let attempt = DeployAttempt::new(author, channel_id, request.branch, request.key, resolved);
        info!(
            "Deploy attempt {} by {}: key {} on branch {}",
            attempt.id, attempt.author.tag, attempt.key, attempt.branch
        );

        let reporter = self.reporter.clone();
        let executor = self.executor.clone();
        Handled::Spawned(self.tasks.spawn(async move {
            let ack_id = reporter.reply(&attempt.channel_id, messages::IN_PROGRESS).await;
            executor.execute(attempt, ack_id).await
        }))
    }

    fn reject(&self, channel_id: &str, author: &Author, rejection: &Rejection) {
        match rejection {
            Rejection::UnknownKey(key) => {
                debug!("{} asked for unknown key {}", author.tag, key);
                self.reporter.reply_in_background(channel_id, messages::invalid_key(key));
            }
            Rejection::InvalidBranch(branch) => {
                info!("{} tried to deploy disallowed branch {}", author.tag, branch);
                self.reporter.reply_in_background(channel_id, messages::invalid_branch(branch));
                self.reporter.audit_in_background(AuditNotice {
                    status: AuditStatus::Failed,
                    environment: self.settings.environment.clone(),
                    branch: branch.clone(),
                    author: author.identity(),
                    timestamp: Utc::now(),
                });
            }
        }
    }
}

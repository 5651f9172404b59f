//! Test doubles for the deploy pipeline

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use deploybot::app::handler::DeployHandler;
use deploybot::config::dictionary::CommandDictionary;
use deploybot::config::settings::Settings;
use deploybot::deploy::executor::{self, CommandRunner, Execution, ExecutionStatus};
use deploybot::discord::models::{Message, User};
use deploybot::discord::ChatClient;
use deploybot::errors::BotError;
use deploybot::report::audit::{AuditNotice, AuditNotifier};
use tokio::sync::Barrier;

pub const CHANNEL: &str = "100";
pub const GUILD: &str = "50";
pub const ROLE: &str = "200";
pub const LOCATION: &str = "/srv/app";

pub fn settings(extra: &[(&str, &str)]) -> Settings {
    let mut env: HashMap<String, String> = [
        ("TOKEN", "bot-token"),
        ("BRANCH", "main"),
        ("DEPLOYMENT_LOCATION", LOCATION),
        ("DEPLOYMENT_CHANNEL", CHANNEL),
        ("DEPLOYMENT_ROLE", ROLE),
        ("DEPLOYMENT_LOG_WEBHOOK", "https://discord.com/api/webhooks/1/abc"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in extra {
        env.insert(k.to_string(), v.to_string());
    }
    Settings::from_lookup(|key| env.get(key).cloned()).unwrap()
}

pub fn dictionary() -> CommandDictionary {
    [
        ("good-key", "deploy --dir ${LOCATION} --branch ${BRANCH}"),
        ("echo", "echo ${LOCATION} ${BRANCH}"),
        ("fail", "echo compiling; echo 'error: boom' >&2; exit 4"),
        ("slow", "sleep 30"),
    ]
    .into_iter()
    .collect()
}

pub fn user(id: &str, username: &str) -> User {
    User {
        id: id.to_string(),
        username: username.to_string(),
        global_name: None,
        discriminator: Some("0".to_string()),
        bot: false,
    }
}

pub fn message(author: User, channel_id: &str, content: &str) -> Message {
    Message {
        id: format!("msg-{}", content.len()),
        channel_id: channel_id.to_string(),
        guild_id: Some(GUILD.to_string()),
        author,
        content: content.to_string(),
    }
}

pub fn command(content: &str) -> Message {
    message(user("7", "alice"), CHANNEL, content)
}

/// Records everything sent to the chat
pub struct FakeChat {
    roles: Mutex<HashMap<String, Vec<String>>>,
    fail_sends: bool,
    next_id: AtomicUsize,
    pub sent: Mutex<Vec<(String, String)>>,
    pub edits: Mutex<Vec<(String, String, String)>>,
    pub role_lookups: AtomicUsize,
}

impl FakeChat {
    /// Every user holds the deploy role unless overridden
    pub fn new() -> Self {
        Self {
            roles: Mutex::new(HashMap::new()),
            fail_sends: false,
            next_id: AtomicUsize::new(1),
            sent: Mutex::new(Vec::new()),
            edits: Mutex::new(Vec::new()),
            role_lookups: AtomicUsize::new(0),
        }
    }

    pub fn failing_sends() -> Self {
        Self {
            fail_sends: true,
            ..Self::new()
        }
    }

    pub fn set_roles(&self, user_id: &str, roles: &[&str]) {
        self.roles
            .lock()
            .unwrap()
            .insert(user_id.to_string(), roles.iter().map(|r| r.to_string()).collect());
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, text)| text.clone()).collect()
    }

    pub fn edit_texts(&self) -> Vec<String> {
        self.edits.lock().unwrap().iter().map(|(_, _, text)| text.clone()).collect()
    }
}

#[async_trait]
impl ChatClient for FakeChat {
    async fn send_message(&self, channel_id: &str, content: &str) -> Result<String, BotError> {
        self.sent
            .lock()
            .unwrap()
            .push((channel_id.to_string(), content.to_string()));
        if self.fail_sends {
            return Err(BotError::DiscordError {
                status: 500,
                body: "unavailable".to_string(),
            });
        }
        Ok(format!("reply-{}", self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn edit_message(&self, channel_id: &str, message_id: &str, content: &str) -> Result<(), BotError> {
        self.edits.lock().unwrap().push((
            channel_id.to_string(),
            message_id.to_string(),
            content.to_string(),
        ));
        Ok(())
    }

    async fn member_roles(&self, _guild_id: &str, user_id: &str) -> Result<Vec<String>, BotError> {
        self.role_lookups.fetch_add(1, Ordering::SeqCst);
        match self.roles.lock().unwrap().get(user_id) {
            Some(roles) if roles.iter().any(|r| r == "lookup-fails") => Err(BotError::DiscordError {
                status: 404,
                body: "Unknown Member".to_string(),
            }),
            Some(roles) => Ok(roles.clone()),
            None => Ok(vec![ROLE.to_string()]),
        }
    }
}

/// Records audit notices
#[derive(Default)]
pub struct FakeAudit {
    fail: bool,
    delay: Option<Duration>,
    pub notices: Mutex<Vec<AuditNotice>>,
}

impl FakeAudit {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Each notice takes `delay` to deliver, like a webhook near its timeout
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn notices(&self) -> Vec<AuditNotice> {
        self.notices.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditNotifier for FakeAudit {
    async fn notify(&self, notice: &AuditNotice) -> Result<(), BotError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.notices.lock().unwrap().push(notice.clone());
        if self.fail {
            return Err(BotError::AuditError("502 Bad Gateway".to_string()));
        }
        Ok(())
    }
}

/// Returns a scripted result and records the commands it was asked to run
pub struct FakeRunner {
    status: ExecutionStatus,
    output: String,
    barrier: Option<Arc<Barrier>>,
    pub commands: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn succeeding(output: &str) -> Self {
        Self {
            status: ExecutionStatus::Succeeded,
            output: output.to_string(),
            barrier: None,
            commands: Mutex::new(Vec::new()),
        }
    }

    /// Every run waits until `parties` runs are in flight at once
    pub fn rendezvous(parties: usize) -> Self {
        Self {
            barrier: Some(Arc::new(Barrier::new(parties))),
            ..Self::succeeding("")
        }
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, command: &str, _timeout: Duration) -> Execution {
        self.commands.lock().unwrap().push(command.to_string());
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        Execution {
            status: self.status.clone(),
            output: self.output.clone(),
        }
    }
}

pub struct Harness {
    pub chat: Arc<FakeChat>,
    pub audit: Arc<FakeAudit>,
    pub handler: DeployHandler,
}

pub fn harness(
    settings: Settings,
    chat: FakeChat,
    audit: FakeAudit,
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
) -> Harness {
    let chat = Arc::new(chat);
    let audit = Arc::new(audit);
    let handler = DeployHandler::new(
        Arc::new(settings),
        Arc::new(dictionary()),
        chat.clone(),
        audit.clone(),
        runner,
        executor::Options {
            timeout,
            shell: "bash".to_string(),
        },
    );
    Harness { chat, audit, handler }
}

//! Best-effort delivery of chat replies and audit notices
//!
//! Sink failures are logged and swallowed. Nothing here is retried and nothing
//! here can change the outcome of a deploy attempt. The `*_in_background`
//! variants run on the shared task tracker so the event loop never waits on a
//! sink.

use std::sync::Arc;

use tokio_util::task::TaskTracker;
use tracing::warn;

use crate::discord::ChatClient;
use crate::report::audit::{AuditNotice, AuditNotifier};

#[derive(Clone)]
pub struct StatusReporter {
    chat: Arc<dyn ChatClient>,
    audit: Arc<dyn AuditNotifier>,
    tasks: TaskTracker,
}

impl StatusReporter {
    pub fn new(chat: Arc<dyn ChatClient>, audit: Arc<dyn AuditNotifier>, tasks: TaskTracker) -> Self {
        Self { chat, audit, tasks }
    }

    /// Send a message, returning its id when delivery succeeded
    pub async fn reply(&self, channel_id: &str, content: &str) -> Option<String> {
        match self.chat.send_message(channel_id, content).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Failed to send message to channel {}: {}", channel_id, e);
                None
            }
        }
    }

    /// Edit `message_id` in place, or send a fresh message when there is none
    pub async fn edit_or_reply(&self, channel_id: &str, message_id: Option<&str>, content: &str) {
        let Some(message_id) = message_id else {
            self.reply(channel_id, content).await;
            return;
        };

        if let Err(e) = self.chat.edit_message(channel_id, message_id, content).await {
            warn!("Failed to edit message {} in channel {}: {}", message_id, channel_id, e);
        }
    }

    /// Fire the audit webhook
    pub async fn audit(&self, notice: AuditNotice) {
        if let Err(e) = self.audit.notify(&notice).await {
            warn!(
                "Failed to post {:?} audit notice for branch {}: {}",
                notice.status, notice.branch, e
            );
        }
    }

    pub fn reply_in_background(&self, channel_id: &str, content: impl Into<String>) {
        let reporter = self.clone();
        let channel_id = channel_id.to_string();
        let content = content.into();
        self.tasks.spawn(async move {
            reporter.reply(&channel_id, &content).await;
        });
    }

    pub fn audit_in_background(&self, notice: AuditNotice) {
        let reporter = self.clone();
        self.tasks.spawn(async move {
            reporter.audit(notice).await;
        });
    }
}

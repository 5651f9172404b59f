//! One end-to-end processing of an authorized deploy command

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::discord::models::User;

/// Attempt outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pending,
    Success,
    Failed,
}

impl Outcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Outcome::Pending)
    }
}

/// Who triggered an attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: String,
    pub tag: String,
    pub display_name: String,
}

impl Author {
    /// Identity shown on audit cards
    pub fn identity(&self) -> String {
        if self.display_name == self.tag {
            self.tag.clone()
        } else {
            format!("{} ({})", self.display_name, self.tag)
        }
    }
}

impl From<&User> for Author {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            tag: user.tag(),
            display_name: user.display_name().to_string(),
        }
    }
}

/// A deploy attempt; owned by exactly one task and never shared
#[derive(Debug, Clone)]
pub struct DeployAttempt {
    pub id: Uuid,
    pub author: Author,
    pub channel_id: String,
    pub branch: String,
    pub key: String,
    pub command: String,
    pub started_at: DateTime<Utc>,
    outcome: Outcome,
    output: String,
    error: Option<String>,
    finished_at: Option<DateTime<Utc>>,
}

impl DeployAttempt {
    pub fn new(
        author: Author,
        channel_id: impl Into<String>,
        branch: impl Into<String>,
        key: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            author,
            channel_id: channel_id.into(),
            branch: branch.into(),
            key: key.into(),
            command: command.into(),
            started_at: Utc::now(),
            outcome: Outcome::Pending,
            output: String::new(),
            error: None,
            finished_at: None,
        }
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Captured process output
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Record success. Fails if the attempt already finished.
    pub fn succeed(&mut self, output: String) -> Result<(), String> {
        self.finish(Outcome::Success, output, None)
    }

    /// Record failure. Fails if the attempt already finished.
    pub fn fail(&mut self, error: String, output: String) -> Result<(), String> {
        self.finish(Outcome::Failed, output, Some(error))
    }

    fn finish(&mut self, outcome: Outcome, output: String, error: Option<String>) -> Result<(), String> {
        if self.outcome.is_terminal() {
            return Err(format!(
                "Attempt {} already finished as {:?}",
                self.id, self.outcome
            ));
        }
        self.outcome = outcome;
        self.output = output;
        self.error = error;
        self.finished_at = Some(Utc::now());
        Ok(())
    }
}

//! Command dictionary: short deploy keys mapped to shell command templates

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::errors::BotError;

/// Default dictionary file, relative to the working directory
pub const DEFAULT_DICTIONARY_FILE: &str = "dictionary.json";

/// Immutable key → template mapping.
///
/// Templates may reference `${LOCATION}` and `${BRANCH}`. There is no way to
/// mutate a dictionary once it has been built.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct CommandDictionary {
    templates: HashMap<String, String>,
}

impl CommandDictionary {
    /// Read and parse a dictionary file
    pub async fn load(path: &Path) -> Result<Self, BotError> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            BotError::DictionaryError(format!("Unable to read {}: {}", path.display(), e))
        })?;
        let dictionary = Self::from_json(&raw).map_err(|e| match e {
            BotError::JsonError(e) => {
                BotError::DictionaryError(format!("Malformed {}: {}", path.display(), e))
            }
            other => other,
        })?;

        info!("Loaded {} deploy keys from {}", dictionary.len(), path.display());
        Ok(dictionary)
    }

    /// Parse a dictionary from a JSON object of string to string
    pub fn from_json(raw: &str) -> Result<Self, BotError> {
        let dictionary: Self = serde_json::from_str(raw)?;
        if let Some(key) = dictionary.templates.keys().find(|key| key.trim().is_empty()) {
            return Err(BotError::DictionaryError(format!(
                "Dictionary key {:?} is blank",
                key
            )));
        }
        Ok(dictionary)
    }

    /// Template for a key, if the key exists
    pub fn get(&self, key: &str) -> Option<&str> {
        self.templates.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CommandDictionary {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            templates: iter
                .into_iter()
                .map(|(key, template)| (key.into(), template.into()))
                .collect(),
        }
    }
}

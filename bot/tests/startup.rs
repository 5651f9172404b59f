//! Startup inputs: dictionary files and settings

use std::io::Write;

use deploybot::config::dictionary::CommandDictionary;
use deploybot::errors::BotError;
use tempfile::NamedTempFile;

fn write_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_dictionary_load_from_file() {
    let file = write_file(r#"{"api": "cd ${LOCATION} && ./deploy.sh ${BRANCH}"}"#);

    let dictionary = tokio_test::block_on(CommandDictionary::load(file.path())).unwrap();
    assert_eq!(dictionary.len(), 1);
    assert_eq!(dictionary.get("api"), Some("cd ${LOCATION} && ./deploy.sh ${BRANCH}"));
}

#[test]
fn test_dictionary_malformed_file_is_fatal() {
    let file = write_file(r#"{"api": "unterminated"#);

    let result = tokio_test::block_on(CommandDictionary::load(file.path()));
    assert!(matches!(result, Err(BotError::DictionaryError(msg)) if msg.starts_with("Malformed")));
}

#[test]
fn test_dictionary_missing_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let result = tokio_test::block_on(CommandDictionary::load(&dir.path().join("dictionary.json")));
    assert!(matches!(result, Err(BotError::DictionaryError(msg)) if msg.starts_with("Unable to read")));
}

#[test]
fn test_settings_missing_explicit_env_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let result = deploybot::config::settings::Settings::load(Some(&dir.path().join("missing.env")));
    assert!(matches!(result, Err(BotError::ConfigError(msg)) if msg.starts_with("Unable to load")));
}

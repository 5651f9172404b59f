//! Tokenizes `!deploy <branch> <key>`

pub const DEPLOY_COMMAND: &str = "deploy";

/// A validated-shape deploy request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployRequest {
    /// Lower-cased branch token
    pub branch: String,
    /// Key token, case preserved
    pub key: String,
}

/// Parsed command text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Nothing after the prefix
    Empty,
    /// Some other command name, lower-cased
    Unknown(String),
    /// `deploy` with fewer than two arguments
    MissingFields,
    Deploy(DeployRequest),
}

/// Parse the text following the prefix. Tokens past the key are ignored.
pub fn parse(text: &str) -> Command {
    let mut tokens = text.split_whitespace();

    let Some(command) = tokens.next().map(str::to_lowercase) else {
        return Command::Empty;
    };
    if command != DEPLOY_COMMAND {
        return Command::Unknown(command);
    }

    match (tokens.next(), tokens.next()) {
        (Some(branch), Some(key)) => Command::Deploy(DeployRequest {
            branch: branch.to_lowercase(),
            key: key.to_string(),
        }),
        _ => Command::MissingFields,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deploy(branch: &str, key: &str) -> Command {
        Command::Deploy(DeployRequest {
            branch: branch.to_string(),
            key: key.to_string(),
        })
    }

    #[test]
    fn test_parse_deploy() {
        assert_eq!(parse("deploy main api"), deploy("main", "api"));
    }

    #[test]
    fn test_parse_is_case_insensitive_for_command_and_branch() {
        assert_eq!(parse("DePloy MAIN Api"), deploy("main", "Api"));
    }

    #[test]
    fn test_parse_ignores_extra_tokens_and_whitespace() {
        assert_eq!(parse("  deploy\tmain   api please now "), deploy("main", "api"));
    }

    #[test]
    fn test_parse_missing_fields() {
        assert_eq!(parse("deploy"), Command::MissingFields);
        assert_eq!(parse("deploy main"), Command::MissingFields);
    }

    #[test]
    fn test_parse_unknown_and_empty() {
        assert_eq!(parse("Restart main api"), Command::Unknown("restart".to_string()));
        assert_eq!(parse(""), Command::Empty);
        assert_eq!(parse("   "), Command::Empty);
    }
}

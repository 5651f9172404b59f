//! Key and branch checks

use std::sync::LazyLock;

use regex::Regex;

use crate::config::dictionary::CommandDictionary;
use crate::deploy::command::DeployRequest;

static BRANCH_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("branch pattern is valid"));

/// Why a request was turned down
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Key not in the dictionary
    UnknownKey(String),
    /// Malformed, or not the allowed branch
    InvalidBranch(String),
}

pub fn is_well_formed_branch(branch: &str) -> bool {
    BRANCH_PATTERN.is_match(branch)
}

/// Resolve the key to its template, then check the branch.
pub fn validate<'d>(
    request: &DeployRequest,
    dictionary: &'d CommandDictionary,
    allowed_branch: &str,
) -> Result<&'d str, Rejection> {
    let template = dictionary
        .get(&request.key)
        .ok_or_else(|| Rejection::UnknownKey(request.key.clone()))?;

    if !is_well_formed_branch(&request.branch) || request.branch != allowed_branch {
        return Err(Rejection::InvalidBranch(request.branch.clone()));
    }

    Ok(template)
}

//! Chat message texts

/// Discord rejects message content longer than this
pub const MAX_MESSAGE_LEN: usize = 2000;

pub const PERMISSION_DENIED: &str = "You do not have permission to deploy.";
pub const USAGE: &str = "Missing fields. Usage: `!deploy <branch> <key>`";
pub const IN_PROGRESS: &str = "Deployment in progress...";

pub fn unknown_command(command: &str) -> String {
    format!("Invalid command `({})` specified.", command)
}

pub fn invalid_key(key: &str) -> String {
    format!("Invalid key `({})` specified.", key)
}

pub fn invalid_branch(branch: &str) -> String {
    format!("Invalid branch `({})` specified.", branch)
}

/// Success text, with a reminder when a non-canonical branch went out
pub fn success(branch: &str, canonical_branch: &str, key: &str) -> String {
    let mut message = "Deployment successful; wait 10s before restart.".to_string();
    if branch != canonical_branch {
        message.push_str(&format!(
            " Make sure to return to `{}` once done (e.g. `!deploy {} {}`).",
            canonical_branch, canonical_branch, key
        ));
    }
    message
}

/// Failure text: the error, then as much of the output tail as fits
pub fn failure(error: &str, output: &str) -> String {
    let header = format!("Deployment failed: {}", error);
    let output = output.trim();
    if output.is_empty() {
        return head(&header, MAX_MESSAGE_LEN);
    }

    // header + "\n```\n" + tail + "\n```"
    let budget = MAX_MESSAGE_LEN.saturating_sub(header.chars().count() + 9);
    if budget < 16 {
        return head(&header, MAX_MESSAGE_LEN);
    }
    format!("{}\n```\n{}\n```", header, tail(&output.replace("```", "'''"), budget))
}

/// Last `max` characters of `text`
fn tail(text: &str, max: usize) -> &str {
    let count = text.chars().count();
    if count <= max {
        return text;
    }
    match text.char_indices().nth(count - max) {
        Some((index, _)) => &text[index..],
        None => text,
    }
}

/// First `max` characters of `text`
fn head(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_on_canonical_branch() {
        assert_eq!(
            success("main", "main", "api"),
            "Deployment successful; wait 10s before restart."
        );
    }

    #[test]
    fn test_success_reminds_to_return() {
        let message = success("hotfix", "main", "api");
        assert!(message.contains("return to `main`"));
        assert!(message.contains("`!deploy main api`"));
    }

    #[test]
    fn test_failure_includes_output() {
        let message = failure("exit status 2", "step 1\nboom\n");
        assert!(message.starts_with("Deployment failed: exit status 2"));
        assert!(message.contains("```\nstep 1\nboom\n```"));
    }

    #[test]
    fn test_failure_keeps_output_tail_within_limit() {
        let output = format!("{}THE END", "é".repeat(5000));
        let message = failure("exit status 1", &output);
        assert!(message.chars().count() <= MAX_MESSAGE_LEN);
        assert!(message.contains("THE END"));
    }

    #[test]
    fn test_failure_with_oversized_error_keeps_its_start() {
        let error = format!("failed to start: {}", "x".repeat(3000));
        let message = failure(&error, "some output");
        assert_eq!(message.chars().count(), MAX_MESSAGE_LEN);
        assert!(message.starts_with("Deployment failed: failed to start: xxx"));
    }

    #[test]
    fn test_head_and_tail() {
        assert_eq!(head("déploy", 2), "dé");
        assert_eq!(tail("déploy", 3), "loy");
        assert_eq!(head("ok", 10), "ok");
    }

    #[test]
    fn test_failure_without_output() {
        assert_eq!(failure("timed out", "  \n"), "Deployment failed: timed out");
    }
}

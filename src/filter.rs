//! Decides whether a push event authorizes a deployment for a listener.

use tracing::info;

use crate::config::ListenerRule;
use crate::payload::PushEvent;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum FilterRejection {
    #[error("pusher {field} {actual:?} does not match required '{expected}'")]
    Identity {
        field: &'static str,
        expected: String,
        actual: Option<String>,
    },

    #[error("listener has no branch configured")]
    BranchNotConfigured,

    #[error("pushed branch '{actual}' does not match '{expected}'")]
    Branch { expected: String, actual: String },

    #[error("no commit message contains flag '{0}'")]
    CommitFlag(String),
}

/// Runs the identity, branch and commit-flag checks in that order and returns
/// the listener's pinned branch when all of them pass.
pub fn evaluate<'a>(
    rule: &'a ListenerRule,
    payload: &PushEvent,
) -> Result<&'a str, FilterRejection> {
    let pusher = &payload.pusher;
    let identity = [
        ("username", &rule.filters.username, &pusher.username),
        ("email", &rule.filters.email, &pusher.email),
        ("name", &rule.filters.name, &pusher.name),
    ];
    for (field, expected, actual) in identity {
        if let Some(expected) = expected {
            if actual.as_ref() != Some(expected) {
                return Err(FilterRejection::Identity {
                    field,
                    expected: expected.clone(),
                    actual: actual.clone(),
                });
            }
        }
    }

    // Branch pinning is mandatory
    let expected = rule
        .branch
        .as_deref()
        .ok_or(FilterRejection::BranchNotConfigured)?;
    let actual = payload.branch();
    if actual != expected {
        return Err(FilterRejection::Branch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }

    if let Some(flag) = &rule.commit_flag {
        if !payload.commits.iter().any(|c| c.message.contains(flag.as_str())) {
            return Err(FilterRejection::CommitFlag(flag.clone()));
        }
    }

    Ok(expected)
}

/// Same as [`evaluate`], logging the reason a push was ignored.
pub fn approved_branch<'a>(rule: &'a ListenerRule, payload: &PushEvent) -> Option<&'a str> {
    match evaluate(rule, payload) {
        Ok(branch) => Some(branch),
        Err(reason) => {
            info!(
                "Push to '{}' ignored by listener filter: {}",
                rule.repository, reason
            );
            None
        }
    }
}

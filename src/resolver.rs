use tracing::{error, warn};

use crate::config::{Config, ListenerRule};
use crate::error::WebhookError;
use crate::payload::PushEvent;

/// Finds the listener configured for the payload's repository.
pub fn resolve_listener<'a>(
    config: &'a Config,
    payload: &PushEvent,
) -> Result<&'a ListenerRule, WebhookError> {
    let Some(repository) = payload.repository_name() else {
        error!("No repository.name field in push event payload: {:?}", payload);
        return Err(WebhookError::Validation(
            "missing repository name".to_string(),
        ));
    };

    config.find_listener(repository).ok_or_else(|| {
        warn!("No listener configured for repository '{}'", repository);
        WebhookError::Validation(format!("repository '{}' is not configured", repository))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::payload::Repository;

    fn config() -> Config {
        parse_config(
            r#"{"reposDirectory": "/r", "serveDirectory": "/s", "listeners": [
                {"repository": "site", "branch": "master", "dist": {"in": "dist", "out": "site"}, "strategy": {"type": "default"}}
            ]}"#,
        )
        .unwrap()
    }

    fn payload(name: Option<&str>) -> PushEvent {
        PushEvent {
            git_ref: "refs/heads/master".to_string(),
            repository: Some(Repository {
                name: name.map(String::from),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn resolves_configured_repository() {
        let config = config();
        let rule = resolve_listener(&config, &payload(Some("site"))).unwrap();
        assert_eq!(rule.repository, "site");
    }

    #[test]
    fn missing_name_is_a_validation_error() {
        let config = config();
        assert!(matches!(
            resolve_listener(&config, &payload(None)),
            Err(WebhookError::Validation(_))
        ));
        assert!(matches!(
            resolve_listener(&config, &PushEvent::default()),
            Err(WebhookError::Validation(_))
        ));
    }

    #[test]
    fn unknown_repository_is_a_validation_error() {
        let config = config();
        assert!(matches!(
            resolve_listener(&config, &payload(Some("other"))),
            Err(WebhookError::Validation(_))
        ));
    }
}

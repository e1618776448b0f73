//! Deployment configuration: `config.json` inside the configured directory.
//!
//! The file is parsed into loose serde structs first and then validated into
//! the strict types below, so a listener missing `dist` or `strategy` is
//! rejected at load time instead of halfway through a deployment.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{CodeCastError, Result};

pub const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub repos_directory: PathBuf,
    pub serve_directory: PathBuf,
    pub listeners: Vec<ListenerRule>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListenerRule {
    pub filters: IdentityFilter,
    pub repository: String,
    pub branch: Option<String>,
    pub commit_flag: Option<String>,
    pub dist: Dist,
    pub strategy: Strategy,
}

/// Pusher identity constraints. Unset fields are not checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IdentityFilter {
    pub username: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Where the build output lives (`input`, relative to the working copy) and
/// where it is published (`output`, relative to the serve directory).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dist {
    pub input: PathBuf,
    pub output: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    Default,
    Custom { script: Option<String> },
    Unsupported(String),
}

impl Strategy {
    pub fn kind(&self) -> &str {
        match self {
            Strategy::Default => "default",
            Strategy::Custom { .. } => "custom",
            Strategy::Unsupported(kind) => kind,
        }
    }
}

impl Config {
    /// Finds the first listener registered for a repository.
    pub fn find_listener(&self, repository: &str) -> Option<&ListenerRule> {
        self.listeners.iter().find(|l| l.repository == repository)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    repos_directory: Option<PathBuf>,
    serve_directory: Option<PathBuf>,
    #[serde(default)]
    listeners: Vec<RawListener>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawListener {
    filters: Option<IdentityFilter>,
    repository: Option<String>,
    branch: Option<String>,
    commit_flag: Option<String>,
    dist: Option<RawDist>,
    strategy: Option<RawStrategy>,
}

#[derive(Debug, Deserialize)]
struct RawDist {
    #[serde(rename = "in")]
    input: Option<String>,
    out: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawStrategy {
    #[serde(rename = "type")]
    kind: Option<String>,
    script: Option<String>,
}

/// Reads and validates `<dir>/config.json`.
pub async fn load_config(dir: impl AsRef<Path>) -> Result<Config> {
    let path = dir.as_ref().join(CONFIG_FILE_NAME);
    let contents = fs::read_to_string(&path)
        .await
        .map_err(|source| CodeCastError::ConfigRead {
            path: path.clone(),
            source,
        })?;

    let config = parse_config(&contents)
        .map_err(|e| with_path(e, &path))?;
    debug!(
        "Loaded {} listener(s) from {}",
        config.listeners.len(),
        path.display()
    );
    Ok(config)
}

fn with_path(err: CodeCastError, path: &Path) -> CodeCastError {
    match err {
        CodeCastError::ConfigParse { source, .. } => CodeCastError::ConfigParse {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    }
}

/// Parses and validates a configuration document.
pub fn parse_config(contents: &str) -> Result<Config> {
    let raw: RawConfig =
        serde_json::from_str(contents).map_err(|source| CodeCastError::ConfigParse {
            path: PathBuf::new(),
            source,
        })?;
    raw.validate()
}

impl RawConfig {
    fn validate(self) -> Result<Config> {
        let repos_directory = required_dir(self.repos_directory, "reposDirectory")?;
        let serve_directory = required_dir(self.serve_directory, "serveDirectory")?;

        let mut seen = HashSet::new();
        let mut listeners = Vec::with_capacity(self.listeners.len());
        for (idx, raw) in self.listeners.into_iter().enumerate() {
            let listener = raw.validate(idx)?;
            if !seen.insert(listener.repository.clone()) {
                warn!(
                    "Listener #{} duplicates repository '{}'; only the first one is used",
                    idx, listener.repository
                );
            }
            listeners.push(listener);
        }

        Ok(Config {
            repos_directory,
            serve_directory,
            listeners,
        })
    }
}

impl RawListener {
    fn validate(self, idx: usize) -> Result<ListenerRule> {
        let invalid = |msg: &str| CodeCastError::InvalidConfig(format!("listener #{}: {}", idx, msg));

        let repository = self
            .repository
            .filter(|r| !r.is_empty())
            .ok_or_else(|| invalid("missing 'repository'"))?;

        let dist = self.dist.ok_or_else(|| invalid("missing 'dist'"))?;
        let input = relative_path(dist.input, "dist.in").map_err(|m| invalid(&m))?;
        let output = relative_path(dist.out, "dist.out").map_err(|m| invalid(&m))?;

        let strategy = self.strategy.ok_or_else(|| invalid("missing 'strategy'"))?;
        let strategy = match strategy.kind.as_deref() {
            Some("default") => Strategy::Default,
            Some("custom") => Strategy::Custom {
                script: strategy.script,
            },
            Some(other) => Strategy::Unsupported(other.to_string()),
            None => return Err(invalid("missing 'strategy.type'")),
        };

        Ok(ListenerRule {
            filters: self.filters.unwrap_or_default(),
            repository,
            branch: self.branch,
            commit_flag: self.commit_flag,
            dist: Dist { input, output },
            strategy,
        })
    }
}

fn required_dir(value: Option<PathBuf>, field: &str) -> Result<PathBuf> {
    value
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| CodeCastError::InvalidConfig(format!("missing '{}'", field)))
}

/// Dist paths must stay inside their base directory.
fn relative_path(value: Option<String>, field: &str) -> std::result::Result<PathBuf, String> {
    let value = value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| format!("missing '{}'", field))?;
    let path = PathBuf::from(&value);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(format!("'{}' must be a relative path without '..', got '{}'", field, value));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "reposDirectory": "/srv/repos",
        "serveDirectory": "/srv/www",
        "listeners": [
            {
                "filters": { "username": "alice" },
                "repository": "site",
                "branch": "master",
                "commitFlag": "[deploy]",
                "dist": { "in": "dist", "out": "site" },
                "strategy": { "type": "default" }
            },
            {
                "repository": "tool",
                "dist": { "in": "build", "out": "tool" },
                "strategy": { "type": "custom", "script": "./deploy.sh" }
            }
        ]
    }"#;

    #[test]
    fn parses_valid_config() {
        let config = parse_config(VALID).unwrap();
        assert_eq!(config.repos_directory, PathBuf::from("/srv/repos"));
        assert_eq!(config.listeners.len(), 2);

        let site = config.find_listener("site").unwrap();
        assert_eq!(site.filters.username.as_deref(), Some("alice"));
        assert_eq!(site.commit_flag.as_deref(), Some("[deploy]"));
        assert_eq!(site.dist.input, PathBuf::from("dist"));
        assert_eq!(site.strategy, Strategy::Default);

        let tool = config.find_listener("tool").unwrap();
        assert_eq!(tool.filters, IdentityFilter::default());
        assert_eq!(tool.branch, None);
        assert_eq!(
            tool.strategy,
            Strategy::Custom {
                script: Some("./deploy.sh".to_string())
            }
        );
    }

    #[test]
    fn rejects_listener_without_dist() {
        let err = parse_config(
            r#"{"reposDirectory": "/r", "serveDirectory": "/s",
                "listeners": [{"repository": "site", "strategy": {"type": "default"}}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("missing 'dist'"), "{}", err);
    }

    #[test]
    fn rejects_listener_without_strategy() {
        let err = parse_config(
            r#"{"reposDirectory": "/r", "serveDirectory": "/s",
                "listeners": [{"repository": "site", "dist": {"in": "a", "out": "b"}}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("missing 'strategy'"), "{}", err);
    }

    #[test]
    fn rejects_escaping_dist_paths() {
        for dist in [r#"{"in": "../x", "out": "b"}"#, r#"{"in": "a", "out": "/etc"}"#] {
            let doc = format!(
                r#"{{"reposDirectory": "/r", "serveDirectory": "/s",
                    "listeners": [{{"repository": "site", "dist": {}, "strategy": {{"type": "default"}}}}]}}"#,
                dist
            );
            assert!(matches!(
                parse_config(&doc),
                Err(CodeCastError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn rejects_missing_directories() {
        assert!(matches!(
            parse_config(r#"{"serveDirectory": "/s", "listeners": []}"#),
            Err(CodeCastError::InvalidConfig(_))
        ));
    }

    #[test]
    fn unknown_strategy_is_kept_as_unsupported() {
        let config = parse_config(
            r#"{"reposDirectory": "/r", "serveDirectory": "/s",
                "listeners": [{"repository": "site", "dist": {"in": "a", "out": "b"},
                               "strategy": {"type": "docker"}}]}"#,
        )
        .unwrap();
        assert_eq!(config.listeners[0].strategy.kind(), "docker");
    }

    #[test]
    fn first_duplicate_listener_wins() {
        let config = parse_config(
            r#"{"reposDirectory": "/r", "serveDirectory": "/s", "listeners": [
                {"repository": "site", "branch": "main", "dist": {"in": "a", "out": "b"}, "strategy": {"type": "default"}},
                {"repository": "site", "branch": "dev", "dist": {"in": "a", "out": "b"}, "strategy": {"type": "default"}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(
            config.find_listener("site").unwrap().branch.as_deref(),
            Some("main")
        );
    }

    #[tokio::test]
    async fn load_config_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(dir.path()).await.unwrap_err();
        assert!(matches!(err, CodeCastError::ConfigRead { .. }));
    }

    #[tokio::test]
    async fn load_config_reports_path_on_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "{ not json").unwrap();
        match load_config(dir.path()).await.unwrap_err() {
            CodeCastError::ConfigParse { path, .. } => {
                assert_eq!(path, dir.path().join(CONFIG_FILE_NAME))
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}

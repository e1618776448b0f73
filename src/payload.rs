//! Push event payload sent by the source-control host

use serde::Deserialize;

/// The subset of a push event the relay looks at
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushEvent {
    #[serde(rename = "ref", default)]
    pub git_ref: String,
    #[serde(default)]
    pub repository: Option<Repository>,
    #[serde(default)]
    pub pusher: Pusher,
    #[serde(default)]
    pub commits: Vec<Commit>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Repository {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pusher {
    pub name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Commit {
    pub id: Option<String>,
    #[serde(default)]
    pub message: String,
}

impl PushEvent {
    /// Last path segment of `ref`, e.g. `main` for `refs/heads/main`.
    pub fn branch(&self) -> &str {
        self.git_ref.rsplit('/').next().unwrap_or_default()
    }

    /// Repository name, if present and non-empty.
    pub fn repository_name(&self) -> Option<&str> {
        self.repository
            .as_ref()
            .and_then(|r| r.name.as_deref())
            .filter(|n| !n.is_empty())
    }
}

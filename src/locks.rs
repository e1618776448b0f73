use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::info;

/// One execution permit per repository.
///
/// Deployments of different repositories run concurrently; a second trigger
/// for a repository that is already deploying waits for the first to finish.
#[derive(Default)]
pub struct RepoLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl RepoLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, repository: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(repository.to_string()).or_default())
        };

        match Arc::clone(&lock).try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                info!(
                    "A deployment of '{}' is already running; waiting for it to finish",
                    repository
                );
                lock.lock_owned().await
            }
        }
    }
}

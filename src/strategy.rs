//! Dispatches a listener's strategy.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::command::{CommandRunner, CommandSpec};
use crate::config::{Config, ListenerRule, Strategy};
use crate::deployment::Deployment;
use crate::error::WebhookError;
use crate::locks::RepoLocks;
use crate::pipeline::{DefaultPipeline, DeployRequest};

pub struct StrategyExecutor {
    runner: Arc<dyn CommandRunner>,
    locks: RepoLocks,
}

impl StrategyExecutor {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            locks: RepoLocks::new(),
        }
    }

    /// Runs the listener's strategy for `branch`, the branch the event
    /// filter approved. Only `default` is implemented.
    pub async fn execute(
        &self,
        rule: &ListenerRule,
        branch: &str,
        config: &Config,
    ) -> Result<Deployment, WebhookError> {
        match &rule.strategy {
            Strategy::Default => {
                let request = DeployRequest {
                    repository: &rule.repository,
                    branch,
                    dist: &rule.dist,
                    repos_directory: &config.repos_directory,
                    serve_directory: &config.serve_directory,
                };

                let _permit = self.locks.acquire(&rule.repository).await;
                info!(
                    "Starting default pipeline for '{}' branch '{}'",
                    rule.repository, branch
                );
                Ok(DefaultPipeline::new(self.runner.as_ref())
                    .run(&request)
                    .await?)
            }
            Strategy::Custom { script } => {
                if let Some(script) = script {
                    let workdir = config.repos_directory.join(&rule.repository);
                    debug!("Custom strategy would run {}", custom_command(script, &workdir));
                }
                warn!(
                    "Listener for '{}' uses the custom strategy, which is not implemented",
                    rule.repository
                );
                Err(WebhookError::NotImplemented(rule.strategy.kind().to_string()))
            }
            Strategy::Unsupported(kind) => {
                warn!(
                    "Listener for '{}' uses unknown strategy '{}'",
                    rule.repository, kind
                );
                Err(WebhookError::NotImplemented(kind.clone()))
            }
        }
    }
}

/// The command a custom strategy script maps to, run through `sh -c` inside
/// the working copy.
pub fn custom_command(script: &str, workdir: &std::path::Path) -> CommandSpec {
    CommandSpec::new("sh")
        .args(["-c", script])
        .current_dir(workdir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandOutput;
    use crate::config::{Dist, IdentityFilter};
    use async_trait::async_trait;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingRunner {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CommandRunner for CountingRunner {
        async fn run(&self, _spec: &CommandSpec) -> io::Result<CommandOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CommandOutput {
                exit_code: Some(0),
                stdout: "other-branch\n".to_string(),
                stderr: String::new(),
            })
        }
    }

    /// Answers every command as if on `master`, holding each one briefly so
    /// overlapping pipelines would be observed.
    #[derive(Default)]
    struct SlowRunner {
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    #[async_trait]
    impl CommandRunner for SlowRunner {
        async fn run(&self, _spec: &CommandSpec) -> io::Result<CommandOutput> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(CommandOutput {
                exit_code: Some(0),
                stdout: "master\n".to_string(),
                stderr: String::new(),
            })
        }
    }

    fn config() -> Config {
        Config {
            repos_directory: "/nonexistent/repos".into(),
            serve_directory: "/nonexistent/www".into(),
            listeners: Vec::new(),
        }
    }

    fn rule(strategy: Strategy) -> ListenerRule {
        ListenerRule {
            filters: IdentityFilter::default(),
            repository: "site".to_string(),
            branch: Some("master".to_string()),
            commit_flag: None,
            dist: Dist {
                input: "dist".into(),
                output: "site".into(),
            },
            strategy,
        }
    }

    #[tokio::test]
    async fn custom_strategy_is_not_implemented() {
        let runner = Arc::new(CountingRunner::default());
        let executor = StrategyExecutor::new(runner.clone());

        let err = executor
            .execute(
                &rule(Strategy::Custom {
                    script: Some("./deploy.sh".to_string()),
                }),
                "master",
                &config(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, WebhookError::NotImplemented(ref kind) if kind == "custom"));
        assert_eq!(runner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_strategy_is_not_implemented() {
        let runner = Arc::new(CountingRunner::default());
        let executor = StrategyExecutor::new(runner.clone());

        let err = executor
            .execute(
                &rule(Strategy::Unsupported("docker".to_string())),
                "master",
                &config(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, WebhookError::NotImplemented(ref kind) if kind == "docker"));
        assert_eq!(runner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn default_strategy_runs_the_pipeline() {
        let runner = Arc::new(CountingRunner::default());
        let executor = StrategyExecutor::new(runner.clone());

        let err = executor
            .execute(&rule(Strategy::Default), "master", &config())
            .await
            .unwrap_err();

        // the runner reports another branch, so only the branch check ran
        assert!(matches!(
            err,
            WebhookError::Pipeline(crate::error::PipelineError::BranchMismatch { .. })
        ));
        assert_eq!(runner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn custom_command_runs_through_the_shell() {
        let spec = custom_command("make deploy", std::path::Path::new("/srv/repos/site"));
        assert_eq!(spec.command_line(), "sh -c make deploy");
    }

    #[tokio::test]
    async fn same_repository_deployments_do_not_overlap() {
        let runner = Arc::new(SlowRunner::default());
        let executor = StrategyExecutor::new(runner.clone());
        let rule = rule(Strategy::Default);
        let config = config();

        let (first, second) = tokio::join!(
            executor.execute(&rule, "master", &config),
            executor.execute(&rule, "master", &config),
        );

        // every command ran; publishing fails on the missing directories
        for result in [first, second] {
            assert!(matches!(
                result,
                Err(WebhookError::Pipeline(crate::error::PipelineError::MoveFiles(_)))
            ));
        }
        assert_eq!(runner.max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_repositories_deploy_concurrently() {
        let runner = Arc::new(SlowRunner::default());
        let executor = StrategyExecutor::new(runner.clone());
        let site = rule(Strategy::Default);
        let docs = ListenerRule {
            repository: "docs".to_string(),
            ..rule(Strategy::Default)
        };
        let config = config();

        let _ = tokio::join!(
            executor.execute(&site, "master", &config),
            executor.execute(&docs, "master", &config),
        );

        assert_eq!(runner.max_active.load(Ordering::SeqCst), 2);
    }
}

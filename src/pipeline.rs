//! The default strategy: verify branch, pull, install, build, publish.
//!
//! Steps run strictly in order and the first failure ends the run. Nothing is
//! rolled back: a working copy left at a freshly pulled commit after a failed
//! build stays there until an operator intervenes.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::command::{CommandOutput, CommandRunner, CommandSpec};
use crate::config::Dist;
use crate::deployment::{Deployment, Step, StepReport};
use crate::error::PipelineError;
use crate::publish::publish_dir;

/// Everything the default pipeline needs to deploy one repository
#[derive(Debug, Clone)]
pub struct DeployRequest<'a> {
    pub repository: &'a str,
    pub branch: &'a str,
    pub dist: &'a Dist,
    pub repos_directory: &'a Path,
    pub serve_directory: &'a Path,
}

impl DeployRequest<'_> {
    pub fn working_copy(&self) -> PathBuf {
        self.repos_directory.join(self.repository)
    }

    pub fn publish_source(&self) -> PathBuf {
        self.working_copy().join(&self.dist.input)
    }

    pub fn publish_target(&self) -> PathBuf {
        self.serve_directory.join(&self.dist.output)
    }
}

pub fn branch_command(workdir: &Path) -> CommandSpec {
    CommandSpec::new("git")
        .args(["rev-parse", "--abbrev-ref", "HEAD"])
        .current_dir(workdir)
}

pub fn pull_command(workdir: &Path) -> CommandSpec {
    CommandSpec::new("git").arg("pull").current_dir(workdir)
}

pub fn install_command(workdir: &Path) -> CommandSpec {
    CommandSpec::new("npm").arg("install").current_dir(workdir)
}

pub fn build_command(workdir: &Path) -> CommandSpec {
    CommandSpec::new("npm").args(["run", "build"]).current_dir(workdir)
}

pub struct DefaultPipeline<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> DefaultPipeline<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// Runs all steps, returning the report of a successful deployment.
    pub async fn run(&self, request: &DeployRequest<'_>) -> Result<Deployment, PipelineError> {
        let mut deployment = Deployment::new(request.repository.to_string(), request.branch.to_string());
        let span = info_span!(
            "deployment",
            id = %deployment.id,
            repository = %request.repository
        );

        let result = self
            .run_steps(request, &mut deployment)
            .instrument(span)
            .await;

        match &result {
            Ok(()) => {
                deployment.mark_success();
                info!(
                    "Deployment {} of '{}' completed in {}ms",
                    deployment.id,
                    deployment.repository,
                    deployment.duration_ms().unwrap_or_default()
                );
            }
            Err(e) => {
                deployment.mark_failed(e.to_string());
                error!(
                    "Deployment {} of '{}' failed after {:?}: {}",
                    deployment.id,
                    deployment.repository,
                    deployment.executed_steps(),
                    e
                );
            }
        }
        match serde_json::to_string(&deployment) {
            Ok(report) => debug!("Deployment report: {}", report),
            Err(e) => warn!("Could not serialize deployment report: {}", e),
        }

        result.map(|()| deployment)
    }

    async fn run_steps(
        &self,
        request: &DeployRequest<'_>,
        deployment: &mut Deployment,
    ) -> Result<(), PipelineError> {
        let workdir = request.working_copy();

        // 1. the working copy must already be on the listener's branch
        let output = self
            .run_checked(
                Step::VerifyBranch,
                branch_command(&workdir),
                deployment,
                PipelineError::BranchCheck,
            )
            .await?;
        let actual = output.stdout.trim();
        if actual.to_lowercase() != request.branch.trim().to_lowercase() {
            return Err(PipelineError::BranchMismatch {
                expected: request.branch.to_string(),
                actual: actual.to_string(),
            });
        }

        // 2. git pull
        self.run_checked(
            Step::Pull,
            pull_command(&workdir),
            deployment,
            PipelineError::Pull,
        )
        .await?;

        // 3. dependencies; warnings on stderr are fine as long as it exits 0
        self.run_checked(
            Step::InstallDependencies,
            install_command(&workdir),
            deployment,
            PipelineError::InstallDeps,
        )
        .await?;

        // 4. build
        self.run_checked(
            Step::Build,
            build_command(&workdir),
            deployment,
            PipelineError::Build,
        )
        .await?;

        // 5. publish
        self.publish(request, deployment).await
    }

    /// Runs one command step. Failing to start or a non-zero exit both end the pipeline.
    async fn run_checked(
        &self,
        step: Step,
        spec: CommandSpec,
        deployment: &mut Deployment,
        fail: fn(String) -> PipelineError,
    ) -> Result<CommandOutput, PipelineError> {
        info!("Running {}", spec);
        let started = Instant::now();
        let result = self.runner.run(&spec).await;
        let elapsed = millis(started.elapsed());

        match result {
            Ok(output) => {
                deployment.record(StepReport::new(
                    step,
                    spec.command_line(),
                    output.exit_code,
                    elapsed,
                    output.combined(),
                ));
                if output.success() {
                    info!("{} output:\n{}", step, output.combined());
                    Ok(output)
                } else {
                    error!("{} failed:\n{}", step, output.combined());
                    Err(fail(output.failure_reason()))
                }
            }
            Err(e) => {
                let msg = format!("'{}' failed to start: {}", spec.command_line(), e);
                error!("{}", msg);
                deployment.record(StepReport::new(
                    step,
                    spec.command_line(),
                    None,
                    elapsed,
                    msg.clone(),
                ));
                Err(fail(msg))
            }
        }
    }

    async fn publish(
        &self,
        request: &DeployRequest<'_>,
        deployment: &mut Deployment,
    ) -> Result<(), PipelineError> {
        let source = request.publish_source();
        let target = request.publish_target();
        let description = format!("move {}/* {}", source.display(), target.display());
        info!("Running {}", description);

        let started = Instant::now();
        let result = publish_dir(&source, &target).await;
        let elapsed = millis(started.elapsed());

        match result {
            Ok(moved) => {
                if moved == 0 {
                    warn!("Nothing to publish in {}", source.display());
                }
                let summary = format!("moved {} entries", moved);
                info!("{} output:\n{}", Step::Publish, summary);
                deployment.record(StepReport::new(Step::Publish, description, Some(0), elapsed, summary));
                Ok(())
            }
            Err(e) => {
                let msg = format!("{} -> {}: {}", source.display(), target.display(), e);
                error!("{} failed: {}", Step::Publish, msg);
                deployment.record(StepReport::new(Step::Publish, description, None, elapsed, msg.clone()));
                Err(PipelineError::MoveFiles(msg))
            }
        }
    }
}

/// Step durations are stored as signed milliseconds; saturate rather than wrap.
fn millis(elapsed: Duration) -> i64 {
    i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
}

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Maximum size for captured step output before truncation (1MB)
pub const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Running,
    Success,
    Failed,
}

/// The default strategy's steps, in execution order
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    VerifyBranch,
    Pull,
    InstallDependencies,
    Build,
    Publish,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::VerifyBranch => "verify_branch",
            Step::Pull => "pull",
            Step::InstallDependencies => "install_dependencies",
            Step::Build => "build",
            Step::Publish => "publish",
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: Step,
    pub command: String,
    pub exit_code: Option<i32>,
    pub duration_ms: i64,
    pub output: String,
    pub output_truncated: bool,
}

impl StepReport {
    pub fn new(
        step: Step,
        command: String,
        exit_code: Option<i32>,
        duration_ms: i64,
        mut output: String,
    ) -> Self {
        let output_truncated = truncate_output(&mut output);
        Self {
            step,
            command,
            exit_code,
            duration_ms,
            output,
            output_truncated,
        }
    }
}

/// One run of the default pipeline. Lives only as long as the request.
#[derive(Debug, Clone, Serialize)]
pub struct Deployment {
    pub id: String,
    pub repository: String,
    pub branch: String,
    pub status: DeploymentStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub steps: Vec<StepReport>,
    pub error: Option<String>,
}

impl Deployment {
    pub fn new(repository: String, branch: String) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            repository,
            branch,
            status: DeploymentStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            steps: Vec::new(),
            error: None,
        }
    }

    pub fn record(&mut self, report: StepReport) {
        self.steps.push(report);
    }

    pub fn executed_steps(&self) -> Vec<Step> {
        self.steps.iter().map(|s| s.step).collect()
    }

    pub fn mark_success(&mut self) {
        self.status = DeploymentStatus::Success;
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: String) {
        self.status = DeploymentStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error = Some(error);
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.completed_at
            .map(|done| (done - self.started_at).num_milliseconds())
    }
}

/// Cuts `output` down to [`MAX_OUTPUT_SIZE`] on a char boundary.
fn truncate_output(output: &mut String) -> bool {
    if output.len() <= MAX_OUTPUT_SIZE {
        return false;
    }
    let mut cut = MAX_OUTPUT_SIZE;
    while !output.is_char_boundary(cut) {
        cut -= 1;
    }
    output.truncate(cut);
    output.push_str("\n... (output truncated)");
    true
}

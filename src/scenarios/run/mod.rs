//! Scenario execution engine.
//!
//! Each scenario runs in its own workspace: skip check, prepare, stage, seed,
//! execute, verify. Errors stay local to the scenario that raised them.
mod exec;
mod validate;

use super::config::{LoadedMatrix, ScenarioDescriptor};
use super::report::{RunReport, ScenarioOutcome, ScenarioStatus};
use super::seed::{run_to_completion, split_command, SeedContext};
use super::skip::{should_skip, SkipFlags};
use super::{DEFAULT_SNIPPET_MAX_BYTES, DEFAULT_SNIPPET_MAX_LINES, DEFAULT_TIMEOUT_SECONDS};
use crate::staging::{stage, StageRequest};
use crate::util::{bounded_snippet, display_path};
use crate::workspace::Workspace;
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

pub use exec::{execute, resolve_launcher, ExecOptions, ExecutionResult};
pub use validate::verify;

/// Runner-wide settings, fixed for one invocation.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub skip_flags: SkipFlags,
    /// Used when neither the scenario nor the matrix sets a timeout.
    pub default_timeout: Option<Duration>,
    pub keep_workspaces: bool,
    /// Parent for workspaces; the system temp dir when `None`.
    pub workspace_parent: Option<PathBuf>,
    pub snippet_max_lines: usize,
    pub snippet_max_bytes: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            skip_flags: SkipFlags::default(),
            default_timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)),
            keep_workspaces: false,
            workspace_parent: None,
            snippet_max_lines: DEFAULT_SNIPPET_MAX_LINES,
            snippet_max_bytes: DEFAULT_SNIPPET_MAX_BYTES,
        }
    }
}

/// Which scenarios of a matrix to run.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Scenario must carry every listed marker.
    pub markers: Vec<String>,
    /// Substring that must appear in the scenario id.
    pub filter: Option<String>,
}

impl Selection {
    pub fn matches(&self, scenario: &ScenarioDescriptor) -> bool {
        let filtered_in = match self.filter.as_deref() {
            Some(filter) => scenario.id.contains(filter),
            None => true,
        };
        filtered_in && self.markers.iter().all(|marker| scenario.has_marker(marker))
    }
}

/// Run every selected scenario of `matrix` in order and collect a report.
pub fn run_matrix(
    matrix: &LoadedMatrix,
    selection: &Selection,
    options: &RunOptions,
) -> Result<RunReport> {
    let cwd = std::env::current_dir().ok();
    let mut outcomes = Vec::new();
    for scenario in matrix.scenarios.iter().filter(|s| selection.matches(s)) {
        let outcome = run_scenario(scenario, options);
        tracing::debug!("{}", outcome.summary_line());
        outcomes.push(outcome);
    }
    let report = RunReport::from_outcomes(display_path(&matrix.path, cwd.as_deref()), outcomes)?;
    tracing::info!(
        total = report.scenario_count,
        passed = report.pass_count,
        failed = report.fail_count,
        skipped = report.skip_count,
        errors = report.setup_error_count,
        "run summary"
    );
    Ok(report)
}

/// Run one scenario end to end. Never fails; problems become the outcome.
pub fn run_scenario(scenario: &ScenarioDescriptor, options: &RunOptions) -> ScenarioOutcome {
    if let Some(reason) = should_skip(&options.skip_flags, scenario.dependency) {
        tracing::info!(scenario = %scenario.id, "{reason}");
        let mut outcome = ScenarioOutcome::new(&scenario.id, ScenarioStatus::Skipped);
        outcome.dependency = scenario.dependency;
        outcome.skip_reason = Some(reason.to_string());
        return outcome;
    }

    tracing::info!(scenario = %scenario.id, "running scenario");
    let workspace = match Workspace::create(&scenario.id, options.workspace_parent.as_deref()) {
        Ok(workspace) => workspace,
        Err(err) => return setup_error(scenario, &err),
    };

    let mut outcome = match prepare_and_execute(scenario, workspace.path(), options) {
        Ok(result) => verified_outcome(scenario, &result, options),
        Err(err) => setup_error(scenario, &err),
    };

    if options.keep_workspaces {
        let kept = workspace.keep();
        tracing::info!(scenario = %scenario.id, path = %kept.display(), "kept workspace");
        outcome.workspace = Some(kept.display().to_string());
    } else if let Err(err) = workspace.close() {
        tracing::warn!(scenario = %scenario.id, "{err:#}");
    }
    outcome
}

fn prepare_and_execute(
    scenario: &ScenarioDescriptor,
    workspace_root: &Path,
    options: &RunOptions,
) -> Result<ExecutionResult> {
    if let Some(prepare) = scenario.prepare.as_deref() {
        run_prepare(prepare, workspace_root, scenario).context("prepare")?;
    }

    let script_source = scenario.script_source();
    let context_source = scenario.context_source();
    let data_source = scenario.data_source();
    let staged = stage(
        &StageRequest {
            script: &script_source,
            context_dir: &context_source,
            data_dir: data_source.as_deref(),
        },
        workspace_root,
    )
    .context("stage fixtures")?;
    tracing::debug!(
        scenario = %scenario.id,
        context = %staged.context_dir.display(),
        data = ?staged.data_dir,
        "staged fixtures"
    );

    if let Some(seed) = scenario.seed.as_ref() {
        tracing::info!(scenario = %scenario.id, seed = %seed.describe(), "seeding data");
        seed.run(&SeedContext {
            workspace_root,
            env: &scenario.env,
        })
        .with_context(|| format!("seed: {}", seed.describe()))?;
    }

    let exec_options = ExecOptions {
        interpreter: scenario.interpreter.as_deref(),
        timeout: effective_timeout(scenario.timeout_seconds, options.default_timeout)?,
        env: Some(&scenario.env),
    };
    let result = execute(&staged.script, workspace_root, &exec_options).context("execute")?;
    tracing::debug!(
        scenario = %scenario.id,
        stdout = %String::from_utf8_lossy(&result.stdout),
        stderr = %String::from_utf8_lossy(&result.stderr),
        "captured output"
    );
    Ok(result)
}

fn run_prepare(prepare: &str, workspace_root: &Path, scenario: &ScenarioDescriptor) -> Result<()> {
    let argv = split_command(prepare)?;
    tracing::info!(scenario = %scenario.id, command = %prepare, "running prepare command");
    let mut cmd = Command::new(&argv[0]);
    cmd.args(&argv[1..]);
    cmd.current_dir(workspace_root);
    cmd.envs(&scenario.env);
    run_to_completion(cmd, &argv[0])
}

/// Scenario setting wins over the runner default; zero disables the timeout.
pub fn effective_timeout(
    scenario_seconds: Option<f64>,
    default: Option<Duration>,
) -> Result<Option<Duration>> {
    match scenario_seconds {
        Some(seconds) if seconds == 0.0 => Ok(None),
        Some(seconds) => timeout_duration(seconds).map(Some),
        None => Ok(default),
    }
}

/// Convert a timeout in seconds, rejecting values a `Duration` cannot hold.
pub fn timeout_duration(seconds: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(seconds)
        .map_err(|_| anyhow!("timeout_seconds {seconds} is out of range"))
}

fn verified_outcome(
    scenario: &ScenarioDescriptor,
    result: &ExecutionResult,
    options: &RunOptions,
) -> ScenarioOutcome {
    let failures = verify(result, &scenario.expect);
    let status = if failures.is_empty() {
        ScenarioStatus::Passed
    } else {
        ScenarioStatus::Failed
    };
    let mut outcome = ScenarioOutcome::new(&scenario.id, status);
    outcome.dependency = scenario.dependency;
    outcome.failures = failures;
    outcome.command_line = Some(result.command_line.clone());
    outcome.exit_code = result.exit_code;
    outcome.exit_signal = result.exit_signal;
    outcome.timed_out = result.timed_out;
    outcome.duration_ms = Some(result.duration_ms);
    outcome.stdout_snippet = bounded_snippet(
        &String::from_utf8_lossy(&result.stdout),
        options.snippet_max_lines,
        options.snippet_max_bytes,
    );
    outcome.stderr_snippet = bounded_snippet(
        &String::from_utf8_lossy(&result.stderr),
        options.snippet_max_lines,
        options.snippet_max_bytes,
    );
    outcome
}

fn setup_error(scenario: &ScenarioDescriptor, err: &anyhow::Error) -> ScenarioOutcome {
    tracing::error!(scenario = %scenario.id, "setup failed: {err:#}");
    let mut outcome = ScenarioOutcome::new(&scenario.id, ScenarioStatus::SetupError);
    outcome.dependency = scenario.dependency;
    outcome.setup_error = Some(format!("{err:#}"));
    outcome
}

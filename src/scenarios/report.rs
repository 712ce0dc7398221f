//! Run report formats.
//!
//! One outcome per selected scenario; skips and setup errors are first-class
//! statuses rather than failures.
use super::DependencyTag;
use crate::util::now_epoch_ms;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;

pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Final state of a scenario.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    Passed,
    Failed,
    Skipped,
    SetupError,
}

impl ScenarioStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ScenarioStatus::Passed => "PASS",
            ScenarioStatus::Failed => "FAIL",
            ScenarioStatus::Skipped => "SKIP",
            ScenarioStatus::SetupError => "ERROR",
        }
    }
}

/// Outcome for a single scenario.
#[derive(Debug, Serialize, Clone)]
pub struct ScenarioOutcome {
    pub scenario_id: String,
    pub status: ScenarioStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependency: Option<DependencyTag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup_error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_line: Option<String>,
    /// Present only when the workspace was kept for inspection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_signal: Option<i32>,
    pub timed_out: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u128>,
    pub stdout_snippet: String,
    pub stderr_snippet: String,
}

impl ScenarioOutcome {
    pub(crate) fn new(scenario_id: &str, status: ScenarioStatus) -> Self {
        Self {
            scenario_id: scenario_id.to_string(),
            status,
            dependency: None,
            skip_reason: None,
            setup_error: None,
            failures: Vec::new(),
            command_line: None,
            workspace: None,
            exit_code: None,
            exit_signal: None,
            timed_out: false,
            duration_ms: None,
            stdout_snippet: String::new(),
            stderr_snippet: String::new(),
        }
    }

    /// One-line human summary.
    pub fn summary_line(&self) -> String {
        let detail = match self.status {
            ScenarioStatus::Passed => String::new(),
            ScenarioStatus::Skipped => self.skip_reason.clone().unwrap_or_default(),
            ScenarioStatus::SetupError => self.setup_error.clone().unwrap_or_default(),
            ScenarioStatus::Failed => self.failures.join("; "),
        };
        if detail.is_empty() {
            format!("{} {}", self.status.as_str(), self.scenario_id)
        } else {
            format!("{} {}: {detail}", self.status.as_str(), self.scenario_id)
        }
    }
}

/// Report for one run over a matrix.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub schema_version: u32,
    pub generated_at_epoch_ms: u128,
    pub matrix_path: String,
    pub scenario_count: usize,
    pub pass_count: usize,
    pub fail_count: usize,
    pub skip_count: usize,
    pub setup_error_count: usize,
    pub scenarios: Vec<ScenarioOutcome>,
}

impl RunReport {
    pub fn from_outcomes(matrix_path: String, scenarios: Vec<ScenarioOutcome>) -> Result<Self> {
        let count = |status: ScenarioStatus| {
            scenarios
                .iter()
                .filter(|outcome| outcome.status == status)
                .count()
        };
        Ok(Self {
            schema_version: REPORT_SCHEMA_VERSION,
            generated_at_epoch_ms: now_epoch_ms()?,
            matrix_path,
            scenario_count: scenarios.len(),
            pass_count: count(ScenarioStatus::Passed),
            fail_count: count(ScenarioStatus::Failed),
            skip_count: count(ScenarioStatus::Skipped),
            setup_error_count: count(ScenarioStatus::SetupError),
            scenarios,
        })
    }

    /// True when nothing failed and no setup error occurred.
    pub fn success(&self) -> bool {
        self.fail_count == 0 && self.setup_error_count == 0
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(self).context("serialize run report")?;
        fs::write(path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn counts_and_success_follow_statuses() {
        let outcomes = vec![
            ScenarioOutcome::new("a", ScenarioStatus::Passed),
            ScenarioOutcome::new("b", ScenarioStatus::Skipped),
            ScenarioOutcome::new("c", ScenarioStatus::Passed),
        ];
        let report = RunReport::from_outcomes("m.json".to_string(), outcomes).unwrap();
        assert_eq!(report.scenario_count, 3);
        assert_eq!(report.pass_count, 2);
        assert_eq!(report.skip_count, 1);
        assert!(report.success());

        let failing = RunReport::from_outcomes(
            "m.json".to_string(),
            vec![ScenarioOutcome::new("d", ScenarioStatus::SetupError)],
        )
        .unwrap();
        assert_eq!(failing.setup_error_count, 1);
        assert!(!failing.success());
    }

    #[test]
    fn summary_line_includes_detail() {
        let mut outcome = ScenarioOutcome::new("flow", ScenarioStatus::Failed);
        outcome.failures = vec!["x".to_string(), "y".to_string()];
        assert_eq!(outcome.summary_line(), "FAIL flow: x; y");
        assert_eq!(
            ScenarioOutcome::new("ok", ScenarioStatus::Passed).summary_line(),
            "PASS ok"
        );
    }

    #[test]
    fn report_is_written_as_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out/report.json");
        let mut outcome = ScenarioOutcome::new("skipped", ScenarioStatus::Skipped);
        outcome.dependency = Some(DependencyTag::DatabaseA);
        let report = RunReport::from_outcomes("m.json".to_string(), vec![outcome]).unwrap();
        report.write(&path).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["scenarios"][0]["status"], "skipped");
        assert_eq!(value["scenarios"][0]["dependency"], "database_a");
        assert_eq!(value["skip_count"], 1);
    }
}

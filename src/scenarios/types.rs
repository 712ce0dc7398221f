//! JSON schema types for scenario matrices.
//!
//! These types keep scenario intent declarative; the runner stays a mechanical
//! stager and executor.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// External system a scenario depends on, used to decide skip eligibility.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum DependencyTag {
    DatabaseA,
    DatabaseB,
    DataframeEngine,
    RelationalEngine,
    DistributedEngine,
    SqlToolkit,
    /// Tags this build does not know about; never skipped.
    #[serde(other)]
    Unknown,
}

impl DependencyTag {
    pub fn as_str(self) -> &'static str {
        match self {
            DependencyTag::DatabaseA => "database_a",
            DependencyTag::DatabaseB => "database_b",
            DependencyTag::DataframeEngine => "dataframe_engine",
            DependencyTag::RelationalEngine => "relational_engine",
            DependencyTag::DistributedEngine => "distributed_engine",
            DependencyTag::SqlToolkit => "sql_toolkit",
            DependencyTag::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DependencyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_sql_client() -> String {
    "psql".to_string()
}

/// Pre-execution data seeding, bound to explicit parameters.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum SeedSpec {
    /// Drop, recreate and load a table from a CSV file through an SQL client.
    CsvTable {
        table: String,
        csv: String,
        connection: String,
        #[serde(default = "default_sql_client")]
        client: String,
    },
    /// Arbitrary command run inside the workspace.
    Command { command: String },
}

/// Matrix-level defaults applied when scenario fields are omitted.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct ScenarioDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

/// Scenario matrix file.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ScenarioMatrix {
    pub schema_version: u32,
    /// Root that scenario paths resolve against; relative to the matrix file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<ScenarioDefaults>,
    #[serde(default)]
    pub scenarios: Vec<ScenarioSpec>,
}

/// Single scenario entry as written in a matrix file.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ScenarioSpec {
    /// Reporting id; falls back to the script path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub script: String,
    /// Overrides the matrix `base_dir` for this scenario.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<String>,
    pub context_dir: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<SeedSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependency: Option<DependencyTag>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub markers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prepare: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_stderr: Option<String>,
    #[serde(default)]
    pub expected_failure: bool,
}

impl ScenarioSpec {
    pub fn expect(&self) -> ScenarioExpect {
        ScenarioExpect {
            expected_stdout: self.expected_stdout.clone(),
            expected_stderr: self.expected_stderr.clone(),
            expected_failure: self.expected_failure,
        }
    }
}

/// Observable outcome a scenario must produce.
///
/// Empty strings are treated as "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScenarioExpect {
    pub expected_stdout: Option<String>,
    pub expected_stderr: Option<String>,
    pub expected_failure: bool,
}

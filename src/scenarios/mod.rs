//! Scenario matrices, skip policy, seeding, and execution.
//!
//! A matrix declares scenarios as data; the runner stages each one into a
//! throwaway workspace, runs its script, and checks the observed outcome.
const DEFAULT_SNIPPET_MAX_BYTES: usize = 4096;
const DEFAULT_SNIPPET_MAX_LINES: usize = 60;
const DEFAULT_TIMEOUT_SECONDS: u64 = 600;
pub const MATRIX_SCHEMA_VERSION: u32 = 1;

mod config;
mod report;
mod run;
mod seed;
mod skip;
mod types;

pub use config::{load_matrix, resolve_matrix, validate_matrix, LoadedMatrix, ScenarioDescriptor};
pub use report::{RunReport, ScenarioOutcome, ScenarioStatus, REPORT_SCHEMA_VERSION};
pub use run::{
    effective_timeout, execute, resolve_launcher, run_matrix, run_scenario, timeout_duration,
    verify, ExecOptions, ExecutionResult, RunOptions, Selection,
};
pub use seed::{build_seed_action, CommandSeed, CsvTableSeed, SeedAction, SeedContext};
pub use skip::{should_skip, SkipFlag, SkipFlags, SkipReason};
pub use types::*;

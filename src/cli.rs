//! CLI argument parsing for the scenario runner.
//!
//! The CLI stays thin: it turns flags into [`RunOptions`] and [`Selection`]
//! and leaves all policy to the library.
use crate::scenarios::{effective_timeout, RunOptions, Selection, SkipFlag, SkipFlags};
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "scenrun",
    version,
    about = "Run script-based scenarios in isolated workspaces",
    after_help = "Examples:\n  \
        scenrun run --matrix tests/integration/matrix.json\n  \
        scenrun run --matrix matrix.json --marker docs --skip-database-a\n  \
        scenrun list --matrix matrix.json --json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Run(RunArgs),
    List(ListArgs),
}

/// Run command inputs.
#[derive(Parser, Debug)]
#[command(about = "Run the selected scenarios and report outcomes")]
pub struct RunArgs {
    /// Scenario matrix JSON file
    #[arg(long, value_name = "FILE")]
    pub matrix: PathBuf,

    #[command(flatten)]
    pub select: SelectArgs,

    #[command(flatten)]
    pub skip: SkipArgs,

    /// Default timeout in seconds for scenarios that set none (0 disables)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<f64>,

    /// Leave workspaces on disk and report their paths
    #[arg(long)]
    pub keep_workspaces: bool,

    /// Directory to create workspaces in (defaults to the system temp dir)
    #[arg(long, value_name = "DIR")]
    pub workspace_dir: Option<PathBuf>,

    /// Write the JSON run report to this path
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Enable debug logging, including captured script output
    #[arg(long)]
    pub verbose: bool,
}

/// List command inputs.
#[derive(Parser, Debug)]
#[command(about = "List the scenarios a matrix declares")]
pub struct ListArgs {
    /// Scenario matrix JSON file
    #[arg(long, value_name = "FILE")]
    pub matrix: PathBuf,

    #[command(flatten)]
    pub select: SelectArgs,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Default)]
pub struct SelectArgs {
    /// Only scenarios carrying this marker (repeatable; all must match)
    #[arg(long = "marker", value_name = "MARKER")]
    pub markers: Vec<String>,

    /// Only scenarios whose id contains this text
    #[arg(long, value_name = "TEXT")]
    pub filter: Option<String>,
}

impl SelectArgs {
    pub fn into_selection(self) -> Selection {
        Selection {
            markers: self.markers,
            filter: self.filter,
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct SkipArgs {
    /// Skip scenarios that need database A
    #[arg(long)]
    pub skip_database_a: bool,

    /// Skip scenarios that need database B
    #[arg(long)]
    pub skip_database_b: bool,

    /// Skip scenarios that need the dataframe engine
    #[arg(long)]
    pub skip_dataframe_engine: bool,

    /// Skip scenarios that need the embedded relational engine
    #[arg(long)]
    pub skip_relational_engine: bool,

    /// Skip scenarios that need the distributed engine
    #[arg(long)]
    pub skip_distributed_engine: bool,

    /// Skip everything reached through the SQL toolkit
    #[arg(long)]
    pub skip_sql_toolkit: bool,
}

impl SkipArgs {
    pub fn to_flags(&self) -> SkipFlags {
        let switches = [
            (self.skip_database_a, SkipFlag::DatabaseA),
            (self.skip_database_b, SkipFlag::DatabaseB),
            (self.skip_dataframe_engine, SkipFlag::DataframeEngine),
            (self.skip_relational_engine, SkipFlag::RelationalEngine),
            (self.skip_distributed_engine, SkipFlag::DistributedEngine),
            (self.skip_sql_toolkit, SkipFlag::SqlToolkit),
        ];
        SkipFlags::new(
            switches
                .into_iter()
                .filter_map(|(set, flag)| set.then_some(flag)),
        )
    }
}

impl RunArgs {
    /// Runner options for these arguments.
    pub fn run_options(&self) -> anyhow::Result<RunOptions> {
        let defaults = RunOptions::default();
        let default_timeout = match self.timeout {
            Some(secs) if !secs.is_finite() || secs < 0.0 => {
                return Err(anyhow::anyhow!("--timeout must be a non-negative number"));
            }
            secs => effective_timeout(secs, defaults.default_timeout).context("--timeout")?,
        };
        Ok(RunOptions {
            skip_flags: self.skip.to_flags(),
            default_timeout,
            keep_workspaces: self.keep_workspaces,
            workspace_parent: self.workspace_dir.clone(),
            ..defaults
        })
    }
}

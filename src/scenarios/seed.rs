//! Pre-execution data seeding.
//!
//! Seed actions are built once from an explicit [`SeedSpec`] and run right
//! before the scenario script. A failed seed is a setup error for that
//! scenario; seeding drops and recreates its target, so there is no retry.
use super::SeedSpec;
use anyhow::{anyhow, Context, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Environment a seed action runs in.
pub struct SeedContext<'a> {
    pub workspace_root: &'a Path,
    pub env: &'a BTreeMap<String, String>,
}

/// Side-effecting action that prepares external state for a scenario.
pub trait SeedAction: fmt::Debug + Send + Sync {
    /// Short human-readable label used in logs and reports.
    fn describe(&self) -> String;

    fn run(&self, context: &SeedContext<'_>) -> Result<()>;
}

/// Build the seed action for `spec`, resolving relative paths against `base_dir`.
pub fn build_seed_action(spec: &SeedSpec, base_dir: &Path) -> Result<Box<dyn SeedAction>> {
    match spec {
        SeedSpec::CsvTable {
            table,
            csv,
            connection,
            client,
        } => Ok(Box::new(CsvTableSeed::new(
            table,
            &base_dir.join(csv),
            connection,
            client,
        )?)),
        SeedSpec::Command { command } => Ok(Box::new(CommandSeed::new(command)?)),
    }
}

/// Drops a table, recreates it from a CSV header, and loads the rows through
/// a psql-compatible client.
///
/// Every column is created as `TEXT`; no type inference is done on the rows.
/// Scripts that need numeric semantics must cast in their queries.
#[derive(Debug, Clone)]
pub struct CsvTableSeed {
    table: String,
    csv_path: PathBuf,
    connection: String,
    client: Vec<String>,
}

impl CsvTableSeed {
    pub fn new(table: &str, csv_path: &Path, connection: &str, client: &str) -> Result<Self> {
        validate_table_name(table)?;
        let client = split_command(client).context("parse seed client")?;
        let csv_path = std::path::absolute(csv_path)
            .with_context(|| format!("resolve {}", csv_path.display()))?;
        Ok(Self {
            table: table.to_string(),
            csv_path,
            connection: connection.to_string(),
            client,
        })
    }

    /// Statements sent to the client, in order.
    pub fn statements(&self) -> Result<Vec<String>> {
        let columns = read_csv_header(&self.csv_path)?;
        let column_defs = columns
            .iter()
            .map(|column| format!("{} TEXT", quote_identifier(column)))
            .collect::<Vec<_>>()
            .join(", ");
        let csv_literal = self.csv_path.to_string_lossy().replace('\'', "''");
        Ok(vec![
            format!("DROP TABLE IF EXISTS {}", self.table),
            format!("CREATE TABLE {} ({column_defs})", self.table),
            format!(
                "\\copy {} FROM '{csv_literal}' WITH (FORMAT csv, HEADER true)",
                self.table
            ),
        ])
    }
}

impl SeedAction for CsvTableSeed {
    fn describe(&self) -> String {
        format!("load table {} from {}", self.table, self.csv_path.display())
    }

    fn run(&self, context: &SeedContext<'_>) -> Result<()> {
        let statements = self.statements()?;
        tracing::info!(table = %self.table, "dropping table");
        tracing::info!(
            table = %self.table,
            csv = %self.csv_path.display(),
            "creating table from csv"
        );
        let mut cmd = Command::new(&self.client[0]);
        cmd.args(&self.client[1..]);
        cmd.arg(&self.connection);
        cmd.args(["-v", "ON_ERROR_STOP=1"]);
        for statement in &statements {
            cmd.arg("-c").arg(statement);
        }
        cmd.current_dir(context.workspace_root);
        cmd.envs(context.env);
        run_to_completion(cmd, &self.client[0])
            .with_context(|| format!("seed table {}", self.table))
    }
}

/// Runs an arbitrary command inside the workspace.
#[derive(Debug, Clone)]
pub struct CommandSeed {
    argv: Vec<String>,
}

impl CommandSeed {
    pub fn new(command: &str) -> Result<Self> {
        Ok(Self {
            argv: split_command(command).context("parse seed command")?,
        })
    }
}

impl SeedAction for CommandSeed {
    fn describe(&self) -> String {
        format!("run {}", shell_words::join(&self.argv))
    }

    fn run(&self, context: &SeedContext<'_>) -> Result<()> {
        let mut cmd = Command::new(&self.argv[0]);
        cmd.args(&self.argv[1..]);
        cmd.current_dir(context.workspace_root);
        cmd.envs(context.env);
        run_to_completion(cmd, &self.argv[0])
    }
}

pub(crate) fn split_command(command: &str) -> Result<Vec<String>> {
    let argv = shell_words::split(command).with_context(|| format!("parse command: {command}"))?;
    if argv.is_empty() {
        return Err(anyhow!("command must not be empty"));
    }
    Ok(argv)
}

pub(crate) fn run_to_completion(mut cmd: Command, program: &str) -> Result<()> {
    let output = cmd.output().with_context(|| format!("spawn {program}"))?;
    if !output.status.success() {
        return Err(anyhow!(
            "{program} exited with {}: {}",
            output
                .status
                .code()
                .map(|code| code.to_string())
                .unwrap_or_else(|| "signal".to_string()),
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(())
}

fn validate_table_name(table: &str) -> Result<()> {
    let valid_part = |part: &str| {
        let mut chars = part.chars();
        matches!(chars.next(), Some(ch) if ch.is_ascii_alphabetic() || ch == '_')
            && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
    };
    let parts: Vec<&str> = table.split('.').collect();
    if parts.len() > 2 || !parts.iter().all(|part| valid_part(part)) {
        return Err(anyhow!("invalid table name {table:?}"));
    }
    Ok(())
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn read_csv_header(path: &Path) -> Result<Vec<String>> {
    let file = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut line = String::new();
    BufReader::new(file)
        .read_line(&mut line)
        .with_context(|| format!("read header of {}", path.display()))?;
    let line = line.trim_start_matches('\u{feff}').trim_end_matches(['\r', '\n']);
    let columns = parse_csv_header(line)?;
    if columns.is_empty() || columns.iter().any(|column| column.is_empty()) {
        return Err(anyhow!("csv {} has an empty header column", path.display()));
    }
    Ok(columns)
}

fn parse_csv_header(line: &str) -> Result<Vec<String>> {
    if line.is_empty() {
        return Ok(Vec::new());
    }
    let mut columns = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => columns.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    if in_quotes {
        return Err(anyhow!("unterminated quote in csv header"));
    }
    columns.push(current);
    Ok(columns.into_iter().map(|c| c.trim().to_string()).collect())
}

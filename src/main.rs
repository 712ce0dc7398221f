use anyhow::Result;
use clap::Parser;
use scenrun::cli::{Command, ListArgs, RootArgs, RunArgs};
use scenrun::scenarios::{load_matrix, run_matrix};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> Result<ExitCode> {
    let args = RootArgs::parse();
    match args.command {
        Command::Run(args) => cmd_run(args),
        Command::List(args) => cmd_list(args),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn cmd_run(args: RunArgs) -> Result<ExitCode> {
    init_logging(args.verbose);
    let options = args.run_options()?;
    let matrix = load_matrix(&args.matrix)?;
    let report_path = args.report.clone();
    let report = run_matrix(&matrix, &args.select.into_selection(), &options)?;

    for outcome in &report.scenarios {
        println!("{}", outcome.summary_line());
    }
    println!(
        "{} scenarios: {} passed, {} failed, {} skipped, {} errors",
        report.scenario_count,
        report.pass_count,
        report.fail_count,
        report.skip_count,
        report.setup_error_count
    );
    if let Some(path) = report_path {
        report.write(&path)?;
        tracing::info!(path = %path.display(), "wrote run report");
    }

    Ok(if report.success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn cmd_list(args: ListArgs) -> Result<ExitCode> {
    init_logging(false);
    let matrix = load_matrix(&args.matrix)?;
    let selection = args.select.into_selection();
    let selected: Vec<_> = matrix
        .scenarios
        .iter()
        .filter(|scenario| selection.matches(scenario))
        .collect();

    if args.json {
        let entries: Vec<serde_json::Value> = selected
            .iter()
            .map(|scenario| {
                serde_json::json!({
                    "id": scenario.id,
                    "script": scenario.script_source(),
                    "context_dir": scenario.context_source(),
                    "dependency": scenario.dependency,
                    "markers": scenario.markers,
                    "seed": scenario.seed.as_ref().map(|seed| seed.describe()),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for scenario in selected {
            let dependency = scenario
                .dependency
                .map(|tag| tag.as_str())
                .unwrap_or("-");
            println!("{}\t{}\t{}", scenario.id, dependency, scenario.markers.join(","));
        }
    }
    Ok(ExitCode::SUCCESS)
}

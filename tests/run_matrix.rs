//! End-to-end runs of scenario matrices through the library API.

mod common;

use common::{serial, MatrixFixture};
use scenrun::scenarios::{
    load_matrix, run_matrix, DependencyTag, RunOptions, ScenarioStatus, Selection, SkipFlag,
    SkipFlags,
};
use serde_json::json;

fn options(fixture: &MatrixFixture) -> RunOptions {
    RunOptions {
        workspace_parent: Some(fixture.workspaces.path().to_path_buf()),
        ..RunOptions::default()
    }
}

#[test]
fn staged_scenario_passes_and_restores_cwd() {
    let _serial = serial();
    let fixture = MatrixFixture::new();
    fixture.write_file("sets/taxi/rows.csv", "id,fare\n1,2.5\n");
    let script = fixture.script(
        "flow",
        "test -f ctx/config.yml || exit 3\n\
         test -f data/rows.csv || exit 4\n\
         test \"$FLOW_MODE\" = docs || exit 5\n\
         printf 'OK\\n'\n",
    );
    let matrix = fixture.matrix(json!([{
        "id": "flow",
        "script": script,
        "context_dir": "fixtures/ctx",
        "data_dir": "sets/taxi",
        "env": { "FLOW_MODE": "docs" },
        "expected_stdout": "OK\n"
    }]));

    let before = std::env::current_dir().unwrap();
    let loaded = load_matrix(&matrix).unwrap();
    let report = run_matrix(&loaded, &Selection::default(), &options(&fixture)).unwrap();
    assert_eq!(std::env::current_dir().unwrap(), before);

    let outcome = &report.scenarios[0];
    assert_eq!(outcome.status, ScenarioStatus::Passed, "{outcome:?}");
    assert_eq!(outcome.stdout_snippet, "OK\n");
    assert!(report.success());
    assert_eq!(fixture.leftover_workspaces(), 0);
}

#[test]
fn skipped_scenario_never_prepares_or_runs() {
    let _serial = serial();
    let fixture = MatrixFixture::new();
    let marker = fixture.path().join("prepared.txt");
    let script = fixture.script("pg", "touch ran.txt\n");
    let matrix = fixture.matrix(json!([{
        "id": "postgres_flow",
        "script": script,
        "context_dir": "fixtures/ctx",
        "dependency": "database_a",
        "prepare": format!("touch {}", marker.display()),
        "seed": { "kind": "command", "command": format!("touch {}", marker.display()) }
    }]));

    let loaded = load_matrix(&matrix).unwrap();
    let run_options = RunOptions {
        skip_flags: SkipFlags::new([SkipFlag::SqlToolkit]),
        ..options(&fixture)
    };
    let report = run_matrix(&loaded, &Selection::default(), &run_options).unwrap();

    let outcome = &report.scenarios[0];
    assert_eq!(outcome.status, ScenarioStatus::Skipped);
    assert_eq!(outcome.dependency, Some(DependencyTag::DatabaseA));
    assert!(outcome
        .skip_reason
        .as_deref()
        .unwrap()
        .contains("--skip-sql-toolkit"));
    assert!(!marker.exists());
    assert_eq!(fixture.leftover_workspaces(), 0);
    assert!(report.success());
}

#[test]
fn failures_and_setup_errors_do_not_stop_the_run() {
    let _serial = serial();
    let fixture = MatrixFixture::new();
    let failing = fixture.script("fails", "echo boom >&2\nexit 2\n");
    let passing = fixture.script("passes", "printf 'OK\\n'\n");
    let matrix = fixture.matrix(json!([
        { "id": "fails", "script": failing, "context_dir": "fixtures/ctx" },
        { "id": "no_context", "script": passing, "context_dir": "fixtures/missing" },
        { "id": "passes", "script": passing, "context_dir": "fixtures/ctx" }
    ]));

    let loaded = load_matrix(&matrix).unwrap();
    let report = run_matrix(&loaded, &Selection::default(), &options(&fixture)).unwrap();

    let statuses: Vec<_> = report.scenarios.iter().map(|o| o.status).collect();
    assert_eq!(
        statuses,
        vec![
            ScenarioStatus::Failed,
            ScenarioStatus::SetupError,
            ScenarioStatus::Passed
        ]
    );
    let failed = &report.scenarios[0];
    assert_eq!(failed.exit_code, Some(2));
    assert_eq!(failed.stderr_snippet, "boom\n");
    assert_eq!(failed.failures, vec!["expected exit_code 0, observed 2"]);
    assert!(report.scenarios[1]
        .setup_error
        .as_deref()
        .unwrap()
        .contains("fixtures/missing"));
    assert_eq!(report.fail_count, 1);
    assert_eq!(report.setup_error_count, 1);
    assert!(!report.success());
    assert_eq!(fixture.leftover_workspaces(), 0);
}

#[test]
fn failing_seed_is_a_setup_error_and_the_run_continues() {
    let _serial = serial();
    let fixture = MatrixFixture::new();
    let marker = fixture.path().join("script_ran.txt");
    let seeded = fixture.script("seeded", &format!("touch {}\n", marker.display()));
    let passing = fixture.script("passes", "printf 'OK\\n'\n");
    let matrix = fixture.matrix(json!([
        {
            "id": "bad_seed",
            "script": seeded,
            "context_dir": "fixtures/ctx",
            "seed": { "kind": "command", "command": "sh -c 'echo no database >&2; exit 3'" }
        },
        { "id": "passes", "script": passing, "context_dir": "fixtures/ctx" }
    ]));

    let loaded = load_matrix(&matrix).unwrap();
    let report = run_matrix(&loaded, &Selection::default(), &options(&fixture)).unwrap();

    let seed_failure = &report.scenarios[0];
    assert_eq!(seed_failure.status, ScenarioStatus::SetupError);
    let message = seed_failure.setup_error.as_deref().unwrap();
    assert!(message.starts_with("seed: run sh -c"), "{message}");
    assert!(message.contains("no database"), "{message}");
    assert!(!marker.exists());
    assert_eq!(report.scenarios[1].status, ScenarioStatus::Passed);
    assert_eq!(report.setup_error_count, 1);
    assert_eq!(fixture.leftover_workspaces(), 0);
}

#[test]
fn background_process_is_reaped_when_script_exits() {
    let _serial = serial();
    let fixture = MatrixFixture::new();
    let script = fixture.script("detaches", "sleep 30 &\necho started\n");
    let matrix = fixture.matrix(json!([{
        "id": "detaches",
        "script": script,
        "context_dir": "fixtures/ctx",
        "timeout_seconds": 0.5,
        "expected_stdout": "started\n"
    }]));

    let loaded = load_matrix(&matrix).unwrap();
    let started = std::time::Instant::now();
    let report = run_matrix(&loaded, &Selection::default(), &options(&fixture)).unwrap();
    assert!(started.elapsed() < std::time::Duration::from_secs(10));
    let outcome = &report.scenarios[0];
    assert_eq!(outcome.status, ScenarioStatus::Passed, "{outcome:?}");
    assert!(!outcome.timed_out);
}

#[test]
fn seed_runs_in_workspace_before_script() {
    let _serial = serial();
    let fixture = MatrixFixture::new();
    let script = fixture.script("seeded", "cat seeded.txt\n");
    let matrix = fixture.matrix(json!([{
        "script": script,
        "context_dir": "fixtures/ctx",
        "seed": { "kind": "command", "command": "sh -c 'echo rows > seeded.txt'" },
        "expected_stdout": "rows\n"
    }]));

    let loaded = load_matrix(&matrix).unwrap();
    let report = run_matrix(&loaded, &Selection::default(), &options(&fixture)).unwrap();
    let outcome = &report.scenarios[0];
    assert_eq!(outcome.scenario_id, "scripts/seeded.sh");
    assert_eq!(outcome.status, ScenarioStatus::Passed, "{outcome:?}");
}

#[test]
fn expected_failure_and_timeout() {
    let _serial = serial();
    let fixture = MatrixFixture::new();
    let raises = fixture.script("raises", "echo 'ValueError' >&2\nexit 1\n");
    let hangs = fixture.script("hangs", "sleep 30\n");
    let matrix = fixture.matrix(json!([
        {
            "id": "raises",
            "script": raises,
            "context_dir": "fixtures/ctx",
            "expected_failure": true,
            "expected_stderr": "ValueError\n"
        },
        {
            "id": "hangs",
            "script": hangs,
            "context_dir": "fixtures/ctx",
            "timeout_seconds": 0.3
        }
    ]));

    let loaded = load_matrix(&matrix).unwrap();
    let report = run_matrix(&loaded, &Selection::default(), &options(&fixture)).unwrap();
    assert_eq!(report.scenarios[0].status, ScenarioStatus::Passed);
    let hung = &report.scenarios[1];
    assert_eq!(hung.status, ScenarioStatus::Failed);
    assert!(hung.timed_out);
    assert!(hung.failures[0].starts_with("timed out after"));
}

#[test]
fn selection_filters_by_marker_and_id() {
    let _serial = serial();
    let fixture = MatrixFixture::new();
    let script = fixture.script("noop", "true\n");
    let matrix = fixture.matrix(json!([
        {
            "id": "docs_postgres",
            "script": script,
            "context_dir": "fixtures/ctx",
            "markers": ["docs", "integration"]
        },
        {
            "id": "docs_sqlite",
            "script": script,
            "context_dir": "fixtures/ctx",
            "markers": ["docs"]
        },
        {
            "id": "cli_init",
            "script": script,
            "context_dir": "fixtures/ctx",
            "markers": ["integration"]
        }
    ]));
    let loaded = load_matrix(&matrix).unwrap();

    let docs = Selection {
        markers: vec!["docs".to_string()],
        filter: None,
    };
    let report = run_matrix(&loaded, &docs, &options(&fixture)).unwrap();
    let ids: Vec<_> = report.scenarios.iter().map(|o| o.scenario_id.as_str()).collect();
    assert_eq!(ids, vec!["docs_postgres", "docs_sqlite"]);

    let both = Selection {
        markers: vec!["docs".to_string(), "integration".to_string()],
        filter: Some("postgres".to_string()),
    };
    let report = run_matrix(&loaded, &both, &options(&fixture)).unwrap();
    assert_eq!(report.scenario_count, 1);
    assert_eq!(report.scenarios[0].scenario_id, "docs_postgres");
}

//! Shared test infrastructure for integration tests.

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::{Mutex, MutexGuard};
use tempfile::TempDir;

static SERIAL: Mutex<()> = Mutex::new(());

/// Serialize tests that run scenarios in-process; they move the working directory.
#[allow(dead_code)]
pub fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Scratch tree holding scripts, fixtures, and a matrix file.
pub struct MatrixFixture {
    pub root: TempDir,
    /// Parent for scenario workspaces, so tests can count leftovers.
    pub workspaces: TempDir,
}

impl MatrixFixture {
    pub fn new() -> Self {
        let fixture = Self {
            root: TempDir::new().expect("fixture root"),
            workspaces: TempDir::new().expect("workspace parent"),
        };
        fixture.write_file("fixtures/ctx/config.yml", "name: ctx\n");
        fixture
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn write_file(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.root.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create fixture parent");
        }
        fs::write(&path, contents).expect("write fixture file");
        path
    }

    /// Write `scripts/<name>.sh` with `body`.
    pub fn script(&self, name: &str, body: &str) -> String {
        let rel = format!("scripts/{name}.sh");
        self.write_file(&rel, body);
        rel
    }

    /// Write `matrix.json` with the given scenarios and return its path.
    pub fn matrix(&self, scenarios: Value) -> PathBuf {
        let matrix = serde_json::json!({
            "schema_version": 1,
            "defaults": { "interpreter": "sh", "timeout_seconds": 20 },
            "scenarios": scenarios,
        });
        self.write_file(
            "matrix.json",
            &serde_json::to_string_pretty(&matrix).expect("serialize matrix"),
        )
    }

    pub fn leftover_workspaces(&self) -> usize {
        fs::read_dir(self.workspaces.path())
            .expect("read workspace parent")
            .count()
    }

    /// Run the built binary with `args`.
    #[allow(dead_code)]
    pub fn scenrun(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_scenrun"))
            .args(args)
            .current_dir(self.root.path())
            .env_remove("RUST_LOG")
            .output()
            .expect("spawn scenrun")
    }
}

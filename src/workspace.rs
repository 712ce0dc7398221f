//! Per-scenario scratch workspaces and the process working directory.
//!
//! The working directory is process-global. Every change goes through
//! [`WorkingDirGuard`], which serializes callers on one lock and restores the
//! previous directory when dropped, including on error and panic paths.
//! Running scenarios truly in parallel needs one process per scenario.
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::TempDir;

static WORKING_DIR_LOCK: Mutex<()> = Mutex::new(());

/// Exclusively owned scratch directory for one scenario run.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh workspace, under `parent` when given.
    pub fn create(scenario_id: &str, parent: Option<&Path>) -> Result<Self> {
        let prefix = format!("scenrun-{}-", sanitize_prefix(scenario_id));
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let dir = match parent {
            Some(parent) => {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
                builder.tempdir_in(parent)
            }
            None => builder.tempdir(),
        }
        .context("create scenario workspace")?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Leave the directory on disk for inspection and return its path.
    pub fn keep(self) -> PathBuf {
        self.dir.keep()
    }

    /// Remove the directory now, surfacing cleanup errors.
    pub fn close(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .with_context(|| format!("remove workspace {}", path.display()))
    }
}

fn sanitize_prefix(id: &str) -> String {
    let cleaned: String = id
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect();
    let trimmed = cleaned.trim_matches('_');
    let mut end = trimmed.len().min(40);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}

/// Scoped change of the process working directory.
///
/// Holds the process-wide lock for its lifetime, so only one guard exists at
/// a time.
pub struct WorkingDirGuard {
    previous: PathBuf,
    _lock: MutexGuard<'static, ()>,
}

impl WorkingDirGuard {
    pub fn enter(dir: &Path) -> Result<Self> {
        // A panic while holding the guard still restored the directory in
        // drop, so a poisoned lock is safe to reuse.
        let lock = WORKING_DIR_LOCK
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let previous = env::current_dir().context("read current working directory")?;
        env::set_current_dir(dir).with_context(|| format!("enter {}", dir.display()))?;
        tracing::debug!(
            from = %previous.display(),
            to = %dir.display(),
            "changed working directory"
        );
        Ok(Self {
            previous,
            _lock: lock,
        })
    }

    pub fn previous(&self) -> &Path {
        &self.previous
    }
}

impl Drop for WorkingDirGuard {
    fn drop(&mut self) {
        if let Err(err) = env::set_current_dir(&self.previous) {
            tracing::error!(
                path = %self.previous.display(),
                "failed to restore working directory: {err}"
            );
        }
    }
}

#[cfg(test)]
pub(crate) fn serial_test_lock() -> MutexGuard<'static, ()> {
    static SERIAL: Mutex<()> = Mutex::new(());
    SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

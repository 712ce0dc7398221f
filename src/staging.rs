//! Fixture staging into scenario workspaces.
//!
//! A workspace must look exactly like the authoring environment: the context
//! tree under its own folder name, optional data under `data/`, and the entry
//! script at a fixed name in the root.
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Folder name for staged data fixtures.
pub const DATA_DIR_NAME: &str = "data";
/// Stem of the staged entry script.
pub const SCRIPT_STEM: &str = "test_script";

/// Sources a scenario wants staged.
#[derive(Debug, Clone)]
pub struct StageRequest<'a> {
    pub script: &'a Path,
    pub context_dir: &'a Path,
    pub data_dir: Option<&'a Path>,
}

/// Absolute paths of everything staged into a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedPaths {
    pub context_dir: PathBuf,
    pub data_dir: Option<PathBuf>,
    pub script: PathBuf,
}

/// Copy a scenario's fixtures into `workspace_root`.
pub fn stage(request: &StageRequest<'_>, workspace_root: &Path) -> Result<StagedPaths> {
    if !request.script.is_file() {
        return Err(anyhow!(
            "scenario script {} does not exist",
            request.script.display()
        ));
    }
    let context_name = request.context_dir.file_name().ok_or_else(|| {
        anyhow!(
            "context dir {} has no folder name",
            request.context_dir.display()
        )
    })?;
    let context_dir = workspace_root.join(context_name);
    copy_tree(request.context_dir, &context_dir).context("stage context")?;

    let data_dir = match request.data_dir {
        Some(source) => {
            let dest = workspace_root.join(DATA_DIR_NAME);
            copy_tree(source, &dest).context("stage data")?;
            Some(dest)
        }
        None => None,
    };

    let script = workspace_root.join(staged_script_name(request.script));
    if script.exists() {
        return Err(anyhow!("staged script {} already exists", script.display()));
    }
    fs::copy(request.script, &script).with_context(|| {
        format!(
            "copy {} to {}",
            request.script.display(),
            script.display()
        )
    })?;

    Ok(StagedPaths {
        context_dir,
        data_dir,
        script,
    })
}

/// Fixed entry-script name, keeping the source extension.
pub fn staged_script_name(script: &Path) -> String {
    match script.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if !ext.is_empty() => format!("{SCRIPT_STEM}.{ext}"),
        _ => SCRIPT_STEM.to_string(),
    }
}

/// Recursively copy `source` to `dest`. `dest` must not exist yet.
pub fn copy_tree(source: &Path, dest: &Path) -> Result<()> {
    let meta = fs::metadata(source)
        .with_context(|| format!("fixture source {} does not exist", source.display()))?;
    if !meta.is_dir() {
        return Err(anyhow!("fixture source {} is not a directory", source.display()));
    }
    if dest.exists() || dest.is_symlink() {
        return Err(anyhow!(
            "refusing to stage into existing path {}",
            dest.display()
        ));
    }
    fs::create_dir_all(dest).with_context(|| format!("create {}", dest.display()))?;
    for file in collect_files_recursive(source)? {
        let rel = file
            .strip_prefix(source)
            .context("strip fixture prefix")?;
        let target = dest.join(rel);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        fs::copy(&file, &target)
            .with_context(|| format!("copy {} to {}", file.display(), target.display()))?;
    }
    for dir in collect_dirs_recursive(source)? {
        let rel = dir.strip_prefix(source).context("strip fixture prefix")?;
        let target = dest.join(rel);
        fs::create_dir_all(&target).with_context(|| format!("create {}", target.display()))?;
    }
    Ok(())
}

/// All regular files below `root`, sorted. Symlinks are followed.
pub fn collect_files_recursive(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !root.exists() {
        return Ok(files);
    }
    for entry in fs::read_dir(root).with_context(|| format!("read {}", root.display()))? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            files.extend(collect_files_recursive(&path)?);
        } else if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

// Empty directories carry meaning for some fixtures, so they are staged too.
fn collect_dirs_recursive(root: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(root).with_context(|| format!("read {}", root.display()))? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path.clone());
            dirs.extend(collect_dirs_recursive(&path)?);
        }
    }
    dirs.sort();
    Ok(dirs)
}

//! Matrix loading and resolution into runnable scenario descriptors.
use super::run::timeout_duration;
use super::seed::{build_seed_action, split_command, SeedAction};
use super::{
    DependencyTag, ScenarioExpect, ScenarioMatrix, ScenarioSpec, MATRIX_SCHEMA_VERSION,
};
use anyhow::{anyhow, Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Fully resolved scenario, ready to stage and execute.
#[derive(Debug)]
pub struct ScenarioDescriptor {
    pub id: String,
    pub base_dir: PathBuf,
    /// Relative to `base_dir` unless absolute.
    pub script: PathBuf,
    pub context_dir: PathBuf,
    pub data_dir: Option<PathBuf>,
    pub seed: Option<Box<dyn SeedAction>>,
    pub dependency: Option<DependencyTag>,
    pub markers: Vec<String>,
    pub prepare: Option<String>,
    pub interpreter: Option<String>,
    /// Seconds; `Some(0.0)` disables the timeout, `None` defers to the runner.
    pub timeout_seconds: Option<f64>,
    pub env: BTreeMap<String, String>,
    pub expect: ScenarioExpect,
}

impl ScenarioDescriptor {
    pub fn new(
        id: impl Into<String>,
        base_dir: impl Into<PathBuf>,
        script: impl Into<PathBuf>,
        context_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            base_dir: base_dir.into(),
            script: script.into(),
            context_dir: context_dir.into(),
            data_dir: None,
            seed: None,
            dependency: None,
            markers: Vec::new(),
            prepare: None,
            interpreter: None,
            timeout_seconds: None,
            env: BTreeMap::new(),
            expect: ScenarioExpect::default(),
        }
    }

    pub fn script_source(&self) -> PathBuf {
        self.base_dir.join(&self.script)
    }

    pub fn context_source(&self) -> PathBuf {
        self.base_dir.join(&self.context_dir)
    }

    pub fn data_source(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| self.base_dir.join(dir))
    }

    pub fn has_marker(&self, marker: &str) -> bool {
        self.markers.iter().any(|value| value == marker)
    }
}

/// Matrix file loaded from disk together with its resolved scenarios.
#[derive(Debug)]
pub struct LoadedMatrix {
    pub path: PathBuf,
    pub scenarios: Vec<ScenarioDescriptor>,
}

/// Read, validate and resolve a matrix file.
pub fn load_matrix(path: &Path) -> Result<LoadedMatrix> {
    let bytes = fs::read(path).with_context(|| format!("read matrix {}", path.display()))?;
    let matrix: ScenarioMatrix = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse matrix {}", path.display()))?;
    let matrix_dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let matrix_dir = std::path::absolute(&matrix_dir)
        .with_context(|| format!("resolve {}", matrix_dir.display()))?;
    let scenarios = resolve_matrix(&matrix, &matrix_dir)
        .with_context(|| format!("resolve matrix {}", path.display()))?;
    Ok(LoadedMatrix {
        path: path.to_path_buf(),
        scenarios,
    })
}

/// Validate `matrix` and resolve each entry against `matrix_dir`.
pub fn resolve_matrix(
    matrix: &ScenarioMatrix,
    matrix_dir: &Path,
) -> Result<Vec<ScenarioDescriptor>> {
    validate_matrix(matrix)?;
    let default_base = match matrix.base_dir.as_deref() {
        Some(base) => matrix_dir.join(base),
        None => matrix_dir.to_path_buf(),
    };
    matrix
        .scenarios
        .iter()
        .map(|spec| {
            resolve_scenario(matrix, spec, &default_base)
                .with_context(|| format!("scenario {}", scenario_id(spec)))
        })
        .collect()
}

fn resolve_scenario(
    matrix: &ScenarioMatrix,
    spec: &ScenarioSpec,
    default_base: &Path,
) -> Result<ScenarioDescriptor> {
    let defaults = matrix.defaults.as_ref();
    let base_dir = match spec.base_dir.as_deref() {
        Some(base) => default_base.join(base),
        None => default_base.to_path_buf(),
    };

    let mut env = defaults
        .map(|value| value.env.clone())
        .unwrap_or_default();
    env.extend(spec.env.iter().map(|(k, v)| (k.clone(), v.clone())));

    let seed = spec
        .seed
        .as_ref()
        .map(|seed| build_seed_action(seed, &base_dir))
        .transpose()
        .context("build seed action")?;

    Ok(ScenarioDescriptor {
        id: scenario_id(spec),
        script: PathBuf::from(&spec.script),
        context_dir: PathBuf::from(&spec.context_dir),
        data_dir: spec.data_dir.as_ref().map(PathBuf::from),
        seed,
        dependency: spec.dependency,
        markers: spec.markers.clone(),
        prepare: spec.prepare.clone(),
        interpreter: spec
            .interpreter
            .clone()
            .or_else(|| defaults.and_then(|value| value.interpreter.clone())),
        timeout_seconds: spec
            .timeout_seconds
            .or_else(|| defaults.and_then(|value| value.timeout_seconds)),
        env,
        expect: spec.expect(),
        base_dir,
    })
}

fn scenario_id(spec: &ScenarioSpec) -> String {
    spec.id.clone().unwrap_or_else(|| spec.script.clone())
}

/// Structural checks that need no filesystem access.
pub fn validate_matrix(matrix: &ScenarioMatrix) -> Result<()> {
    if matrix.schema_version != MATRIX_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported matrix schema_version {} (expected {MATRIX_SCHEMA_VERSION})",
            matrix.schema_version
        ));
    }
    if let Some(defaults) = matrix.defaults.as_ref() {
        validate_timeout(defaults.timeout_seconds).context("defaults")?;
        if let Some(interpreter) = defaults.interpreter.as_deref() {
            split_command(interpreter).context("defaults interpreter")?;
        }
    }
    let mut seen = BTreeSet::new();
    for spec in &matrix.scenarios {
        let id = scenario_id(spec);
        if id.trim().is_empty() {
            return Err(anyhow!("scenario id must not be empty"));
        }
        if !seen.insert(id.clone()) {
            return Err(anyhow!("duplicate scenario id {id:?}"));
        }
        if spec.script.trim().is_empty() {
            return Err(anyhow!("scenario {id}: script must not be empty"));
        }
        if spec.context_dir.trim().is_empty() {
            return Err(anyhow!("scenario {id}: context_dir must not be empty"));
        }
        if spec.markers.iter().any(|marker| marker.trim().is_empty()) {
            return Err(anyhow!("scenario {id}: markers must not be empty"));
        }
        validate_timeout(spec.timeout_seconds).with_context(|| format!("scenario {id}"))?;
        if let Some(prepare) = spec.prepare.as_deref() {
            split_command(prepare).with_context(|| format!("scenario {id}: prepare"))?;
        }
        if let Some(interpreter) = spec.interpreter.as_deref() {
            split_command(interpreter).with_context(|| format!("scenario {id}: interpreter"))?;
        }
    }
    Ok(())
}

fn validate_timeout(timeout_seconds: Option<f64>) -> Result<()> {
    match timeout_seconds {
        Some(value) if !value.is_finite() || value < 0.0 => {
            Err(anyhow!("timeout_seconds must be a non-negative number"))
        }
        Some(value) => timeout_duration(value).map(|_| ()),
        None => Ok(()),
    }
}

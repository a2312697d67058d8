//! External artifacts consumed read-only by the workflow core.
//!
//! Requirements, implementation plan and validation report are produced by
//! agents. The core only reads them, and a missing artifact is a normal
//! condition rather than an error.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::ArtifactError;

/// Default directory, relative to the project root, holding all workflow files.
pub const DEFAULT_STATE_DIR: &str = ".workflow";

/// Where workflow files live for a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    /// Project root directory
    pub root: PathBuf,

    /// Workflow directory (usually `<root>/.workflow`)
    pub state_dir: PathBuf,
}

impl ProjectLayout {
    /// Layout with the default state directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let state_dir = root.join(DEFAULT_STATE_DIR);
        Self { root, state_dir }
    }

    /// Layout with a custom state directory, relative to the root unless absolute.
    pub fn with_state_dir(root: impl Into<PathBuf>, state_dir: impl AsRef<Path>) -> Self {
        let root = root.into();
        let state_dir = root.join(state_dir);
        Self { root, state_dir }
    }

    pub fn state_file(&self) -> PathBuf {
        self.state_dir.join("workflow-state.json")
    }

    pub fn requirements_file(&self) -> PathBuf {
        self.state_dir.join("requirements.json")
    }

    pub fn plan_file(&self) -> PathBuf {
        self.state_dir.join("implementation-plan.json")
    }

    pub fn validation_report_file(&self) -> PathBuf {
        self.state_dir.join("validation-report.json")
    }

    pub fn checkpoints_dir(&self) -> PathBuf {
        self.state_dir.join("checkpoints")
    }

    pub fn escalations_file(&self) -> PathBuf {
        self.state_dir.join("escalations.json")
    }

    /// Resolve a user-supplied document path against the project root.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        }
    }
}

/// Requirements document produced by the requirements-analysis agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequirementsDoc {
    /// Extracted features; their shape is owned by the producing agent
    #[serde(default)]
    pub features: Vec<serde_json::Value>,
}

/// Implementation plan produced by the plan agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImplementationPlan {
    /// Planned tasks
    #[serde(default)]
    pub tasks: Vec<serde_json::Value>,

    /// Planned file layout
    #[serde(default)]
    pub file_structure: FileStructure,
}

/// The `file_structure` section of a plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileStructure {
    #[serde(default)]
    pub files: Vec<PlannedFile>,
}

/// A planned file: either a bare path or an object with a `path`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlannedFile {
    Path(String),
    Entry {
        #[serde(default)]
        path: String,
        #[serde(default, alias = "type")]
        role: Option<String>,
    },
    Other(serde_json::Value),
}

impl PlannedFile {
    /// The planned path; empty when the entry carries none.
    pub fn path(&self) -> String {
        match self {
            Self::Path(path) | Self::Entry { path, .. } => path.clone(),
            Self::Other(value) => value.to_string(),
        }
    }
}

impl ImplementationPlan {
    /// Non-empty planned paths, in plan order.
    pub fn planned_paths(&self) -> Vec<String> {
        self.file_structure.files.iter().map(PlannedFile::path).filter(|p| !p.is_empty()).collect()
    }

    /// Whether the plan declares any work at all.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty() && self.file_structure.files.is_empty()
    }
}

/// Test and coverage results produced by the test agents.
///
/// Counts are read as plain JSON numbers, so `10` and `10.0` are both
/// accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    #[serde(default)]
    pub tests_passed: Option<f64>,

    #[serde(default)]
    pub tests_total: Option<f64>,

    #[serde(default)]
    pub coverage_percent: Option<f64>,
}

impl ValidationReport {
    /// A report that carries none of the known fields says nothing.
    pub fn is_empty(&self) -> bool {
        self.tests_passed.is_none() && self.tests_total.is_none() && self.coverage_percent.is_none()
    }
}

/// Load a JSON document; `Ok(None)` when the file does not exist.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ArtifactError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .map_err(|source| ArtifactError::Read { path: path.to_path_buf(), source })?;
    let value = serde_json::from_str(&content)
        .map_err(|source| ArtifactError::Parse { path: path.to_path_buf(), source })?;

    Ok(Some(value))
}

/// Snapshot of all artifacts the gates look at.
#[derive(Debug, Clone, Default)]
pub struct Artifacts {
    pub requirements: Option<RequirementsDoc>,
    pub plan: Option<ImplementationPlan>,
    pub report: Option<ValidationReport>,
}

impl Artifacts {
    /// Load every artifact for a project.
    ///
    /// Unreadable or malformed artifacts are logged and treated as absent,
    /// which makes the gate that needs them fail with its "missing" reason.
    pub fn load(layout: &ProjectLayout) -> Self {
        Self {
            requirements: load_or_warn(&layout.requirements_file()),
            plan: load_or_warn(&layout.plan_file()),
            report: load_or_warn(&layout.validation_report_file()),
        }
    }
}

fn load_or_warn<T: DeserializeOwned>(path: &Path) -> Option<T> {
    match load_json(path) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring unreadable artifact");
            None
        }
    }
}

//! Run state persistence.
//!
//! Every workflow operation goes through a [`StateStore`] passed in by the
//! caller: [`FileStateStore`] in production, [`MemoryStateStore`] in tests.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use parking_lot::Mutex;

use super::error::StoreError;
use super::state::WorkflowState;

/// Wholesale load/save of a run's state.
pub trait StateStore {
    /// Load the live state. `Ok(None)` when no run exists.
    fn load(&self) -> Result<Option<WorkflowState>, StoreError>;

    /// Replace the live state.
    fn save(&self, state: &WorkflowState) -> Result<(), StoreError>;
}

impl<S: StateStore + ?Sized> StateStore for &S {
    fn load(&self) -> Result<Option<WorkflowState>, StoreError> {
        (**self).load()
    }

    fn save(&self, state: &WorkflowState) -> Result<(), StoreError> {
        (**self).save(state)
    }
}

/// JSON file store.
///
/// Writes go to a temporary file in the same directory which is then
/// renamed over the state file, so a failed or interrupted write leaves the
/// previous state intact.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    /// Create a store backed by the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn write_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Write { path: self.path.clone(), source }
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> Result<Option<WorkflowState>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)
            .map_err(|source| StoreError::Read { path: self.path.clone(), source })?;
        let state = serde_json::from_str(&content)
            .map_err(|source| StoreError::Corrupt { path: self.path.clone(), source })?;

        Ok(Some(state))
    }

    fn save(&self, state: &WorkflowState) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(state).map_err(StoreError::Serialize)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| self.write_error(e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| self.write_error(e))?;
        tmp.write_all(content.as_bytes()).map_err(|e| self.write_error(e))?;
        tmp.persist(&self.path).map_err(|e| self.write_error(e.error))?;

        tracing::debug!(path = ?self.path, stage = %state.current_stage, "Saved workflow state");
        Ok(())
    }
}

/// In-memory store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: Mutex<Option<WorkflowState>>,
    saves: Mutex<usize>,
    read_only: Mutex<bool>,
}

impl MemoryStateStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a state.
    pub fn with_state(state: WorkflowState) -> Self {
        Self { state: Mutex::new(Some(state)), ..Self::default() }
    }

    /// Current state, if any.
    pub fn snapshot(&self) -> Option<WorkflowState> {
        self.state.lock().clone()
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }

    /// Make every subsequent save fail.
    pub fn set_read_only(&self, read_only: bool) {
        *self.read_only.lock() = read_only;
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<Option<WorkflowState>, StoreError> {
        Ok(self.state.lock().clone())
    }

    fn save(&self, state: &WorkflowState) -> Result<(), StoreError> {
        if *self.read_only.lock() {
            return Err(StoreError::Unavailable("store is read-only".to_string()));
        }
        *self.state.lock() = Some(state.clone());
        *self.saves.lock() += 1;
        Ok(())
    }
}

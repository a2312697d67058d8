//! Checkpoints taken at session boundaries.
//!
//! A checkpoint is an immutable snapshot of the run state. Snapshots are
//! never rewritten; the live state only records where the latest one is.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::artifacts::ProjectLayout;
use super::error::{WorkflowError, WorkflowResult};
use super::stage::Stage;
use super::state::WorkflowState;
use super::store::StateStore;

/// Stop reason used when the host does not give one.
pub const DEFAULT_STOP_REASON: &str = "session_end";

/// Highest numeric suffix tried when snapshot names collide. Suffixes are
/// zero-padded to three digits so file-name order stays chronological.
const MAX_NAME_SUFFIX: u32 = 1000;

/// On-disk checkpoint document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub created_at: DateTime<Utc>,
    pub state: WorkflowState,
    pub stop_reason: String,
}

impl Checkpoint {
    /// Read a snapshot.
    pub fn read(path: &Path) -> WorkflowResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|source| WorkflowError::Checkpoint { path: path.to_path_buf(), source })?;
        serde_json::from_str(&content)
            .map_err(|source| WorkflowError::CorruptCheckpoint { path: path.to_path_buf(), source })
    }
}

/// Session boundary notification from the host.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StopEvent {
    #[serde(default)]
    pub stop_reason: Option<String>,
}

impl StopEvent {
    /// Parse a stop event; `None` when malformed.
    pub fn parse(input: &str) -> Option<Self> {
        serde_json::from_str(input).ok()
    }

    pub fn reason(&self) -> &str {
        self.stop_reason.as_deref().filter(|r| !r.is_empty()).unwrap_or(DEFAULT_STOP_REASON)
    }
}

/// Where to pick up a resumed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResumePoint {
    pub run_id: String,
    pub current_stage: Stage,
    pub current_task: Option<String>,

    /// Agents expected next, e.g. `security-auditor and legal-reviewer`
    pub next_agent: String,

    /// Snapshot the state was restored from, when there was no live state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restored_from: Option<PathBuf>,
}

/// Creates snapshots and restores runs from them.
pub struct CheckpointManager<'a, S: StateStore> {
    store: &'a S,
    layout: &'a ProjectLayout,
}

impl<'a, S: StateStore> CheckpointManager<'a, S> {
    pub fn new(store: &'a S, layout: &'a ProjectLayout) -> Self {
        Self { store, layout }
    }

    /// Snapshot the live state and point it at the new snapshot.
    ///
    /// Returns the snapshot path, or `None` when no run is live.
    pub fn create(&self, stop_reason: &str) -> WorkflowResult<Option<PathBuf>> {
        let Some(mut state) = self.store.load()? else {
            return Ok(None);
        };

        let now = Utc::now();
        let checkpoint =
            Checkpoint { created_at: now, state: state.clone(), stop_reason: stop_reason.to_string() };
        let content = serde_json::to_string_pretty(&checkpoint).map_err(|source| {
            WorkflowError::CorruptCheckpoint { path: self.layout.checkpoints_dir(), source }
        })?;

        let path = self.write_new(&now, &content)?;
        tracing::info!(path = ?path, stop_reason, "Checkpoint created");

        state.last_checkpoint = Some(path.display().to_string());
        state.checkpoint_at = Some(now);
        state.can_resume = true;
        self.store.save(&state)?;

        Ok(Some(path))
    }

    /// Latest snapshot by file name, if any.
    pub fn latest(&self) -> WorkflowResult<Option<PathBuf>> {
        let dir = self.layout.checkpoints_dir();
        if !dir.is_dir() {
            return Ok(None);
        }

        let entries =
            fs::read_dir(&dir).map_err(|source| WorkflowError::Checkpoint { path: dir.clone(), source })?;
        let latest = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
            .max_by(|a, b| a.file_name().cmp(&b.file_name()));

        Ok(latest)
    }

    /// The live state, or the latest snapshot's state copied into the store.
    ///
    /// Returns the state and the snapshot it came from, if any.
    pub fn restore(&self) -> WorkflowResult<Option<(WorkflowState, Option<PathBuf>)>> {
        if let Some(state) = self.store.load()? {
            return Ok(Some((state, None)));
        }

        let Some(path) = self.latest()? else {
            return Ok(None);
        };
        let checkpoint = Checkpoint::read(&path)?;
        self.store.save(&checkpoint.state)?;
        tracing::info!(path = ?path, "Restored state from checkpoint");

        Ok(Some((checkpoint.state, Some(path))))
    }

    /// Restore and mark the run as resumed.
    pub fn resume(&self) -> WorkflowResult<Option<ResumePoint>> {
        let Some((mut state, restored_from)) = self.restore()? else {
            return Ok(None);
        };

        state.touch();
        state.can_resume = true;
        self.store.save(&state)?;

        Ok(Some(ResumePoint {
            run_id: state.run_id,
            current_stage: state.current_stage,
            current_task: state.current_task,
            next_agent: state.current_stage.agents_display(),
            restored_from,
        }))
    }

    fn write_new(&self, now: &DateTime<Utc>, content: &str) -> WorkflowResult<PathBuf> {
        let dir = self.layout.checkpoints_dir();
        let io_err = |path: &Path, source: io::Error| WorkflowError::Checkpoint {
            path: path.to_path_buf(),
            source,
        };
        fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;

        let stem = format!("checkpoint_{}", now.format("%Y%m%d_%H%M%S"));
        for n in 0..MAX_NAME_SUFFIX {
            let name = if n == 0 { format!("{stem}.json") } else { format!("{stem}_{n:03}.json") };
            let path = dir.join(name);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(content.as_bytes()).map_err(|e| io_err(&path, e))?;
                    return Ok(path);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(io_err(&path, e)),
            }
        }

        Err(io_err(
            &dir,
            io::Error::new(io::ErrorKind::AlreadyExists, "no free checkpoint name"),
        ))
    }
}

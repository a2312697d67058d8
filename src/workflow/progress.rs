//! File-level progress tracking.
//!
//! Records files touched by tool actions and keeps the derived progress
//! figures current. Tracking is advisory: it never moves `current_stage`
//! and never fails the caller.

use serde::Deserialize;

use super::artifacts::{load_json, ImplementationPlan, ProjectLayout};
use super::error::WorkflowResult;
use super::paths::FileCoverage;
use super::stage::{Stage, StageStatus};
use super::store::StateStore;

/// Kind of file action a tool performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolAction {
    Create,
    Modify,
}

impl ToolAction {
    /// Map a tool name to an action. Tools that don't write files yield `None`.
    pub fn from_tool(tool_name: &str) -> Option<Self> {
        match tool_name {
            "Write" => Some(Self::Create),
            "Edit" | "MultiEdit" => Some(Self::Modify),
            _ => None,
        }
    }
}

/// A tool invocation reported by the host.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolEvent {
    #[serde(default)]
    pub tool_name: String,

    #[serde(default)]
    pub tool_input: ToolInput,
}

/// Tool arguments the workflow cares about.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolInput {
    #[serde(default, alias = "filePath")]
    pub file_path: Option<String>,

    /// Shell command, for `Bash`
    #[serde(default)]
    pub command: Option<String>,
}

impl ToolEvent {
    /// Parse an event from JSON; `None` when malformed.
    pub fn parse(input: &str) -> Option<Self> {
        serde_json::from_str(input).ok()
    }

    /// Event for a file tool.
    pub fn file(tool_name: &str, file_path: &str) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            tool_input: ToolInput { file_path: Some(file_path.to_string()), ..ToolInput::default() },
        }
    }

    /// Non-empty file path argument, if any.
    pub fn file_path(&self) -> Option<&str> {
        self.tool_input.file_path.as_deref().filter(|p| !p.is_empty())
    }
}

/// Updates run state after file-writing tool actions.
pub struct ProgressTracker<'a, S: StateStore> {
    store: &'a S,
    layout: &'a ProjectLayout,
}

impl<'a, S: StateStore> ProgressTracker<'a, S> {
    pub fn new(store: &'a S, layout: &'a ProjectLayout) -> Self {
        Self { store, layout }
    }

    /// Record a tool action. Errors are logged and swallowed.
    ///
    /// Returns whether the live state was updated.
    pub fn track(&self, event: &ToolEvent) -> bool {
        match self.try_track(event) {
            Ok(updated) => updated,
            Err(e) => {
                tracing::warn!(error = %e, "Progress tracking skipped");
                false
            }
        }
    }

    fn try_track(&self, event: &ToolEvent) -> WorkflowResult<bool> {
        let Some(action) = ToolAction::from_tool(&event.tool_name) else {
            return Ok(false);
        };
        let Some(path) = event.file_path() else {
            return Ok(false);
        };
        let Some(mut state) = self.store.load()? else {
            return Ok(false);
        };

        match action {
            ToolAction::Create => state.record_created(path),
            ToolAction::Modify => state.record_modified(path),
        };
        state.touch();

        if state.status_of(state.current_stage) == StageStatus::Pending {
            state.set_status(state.current_stage, StageStatus::InProgress);
        }

        // Artifact presence marks the early stages done without advancing.
        if self.layout.requirements_file().exists() {
            state.set_status(Stage::RequirementsAnalysis, StageStatus::Completed);
        }
        let plan_file = self.layout.plan_file();
        if plan_file.exists() {
            state.set_status(Stage::PlanGeneration, StageStatus::Completed);
        }

        match load_json::<ImplementationPlan>(&plan_file) {
            Ok(Some(plan)) => {
                let planned = plan.planned_paths();
                if !planned.is_empty() {
                    let coverage = FileCoverage::compute(&planned, state.touched_files());
                    state.progress_percent = coverage.percent_floor();
                }
            }
            Ok(None) => {}
            Err(e) => tracing::debug!(error = %e, "Plan unreadable, progress unchanged"),
        }

        self.store.save(&state)?;
        tracing::debug!(path, progress = state.progress_percent, "Tracked file action");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::workflow::state::WorkflowState;
    use crate::workflow::store::MemoryStateStore;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ProjectLayout, MemoryStateStore) {
        let dir = TempDir::new().unwrap();
        let layout = ProjectLayout::new(dir.path());
        fs::create_dir_all(&layout.state_dir).unwrap();
        let store = MemoryStateStore::with_state(WorkflowState::new("prd.md"));
        (dir, layout, store)
    }

    #[test]
    fn test_tool_actions() {
        assert_eq!(ToolAction::from_tool("Write"), Some(ToolAction::Create));
        assert_eq!(ToolAction::from_tool("Edit"), Some(ToolAction::Modify));
        assert_eq!(ToolAction::from_tool("MultiEdit"), Some(ToolAction::Modify));
        assert_eq!(ToolAction::from_tool("Read"), None);
        assert_eq!(ToolAction::from_tool("write"), None);
    }

    #[test]
    fn test_parse_accepts_camel_case_path() {
        let event = ToolEvent::parse(r#"{"tool_name": "Edit", "tool_input": {"filePath": "src/a.rs"}}"#)
            .unwrap();
        assert_eq!(event.file_path(), Some("src/a.rs"));

        let event = ToolEvent::parse(r#"{"tool_name": "Edit", "tool_input": {"file_path": ""}}"#)
            .unwrap();
        assert_eq!(event.file_path(), None);
    }

    #[test]
    fn test_write_twice_records_once() {
        let (_dir, layout, store) = setup();
        let tracker = ProgressTracker::new(&store, &layout);

        assert!(tracker.track(&ToolEvent::file("Write", "src/main.rs")));
        assert!(tracker.track(&ToolEvent::file("Write", "src/main.rs")));

        let state = store.snapshot().unwrap();
        assert_eq!(state.files_created, vec!["src/main.rs"]);
        assert!(state.files_modified.is_empty());
    }

    #[test]
    fn test_ignored_events() {
        let (_dir, layout, store) = setup();
        let tracker = ProgressTracker::new(&store, &layout);

        assert!(!tracker.track(&ToolEvent::file("Read", "src/main.rs")));
        assert!(!tracker.track(&ToolEvent::file("Write", "")));
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn test_progress_from_plan() {
        let (_dir, layout, store) = setup();
        fs::write(
            layout.plan_file(),
            r#"{"tasks": [], "file_structure": {"files": ["src/a.rs", {"path": "src/b.rs"}, "src/c.rs"]}}"#,
        )
        .unwrap();
        let tracker = ProgressTracker::new(&store, &layout);

        tracker.track(&ToolEvent::file("Write", "/work/project/src/a.rs"));
        assert_eq!(store.snapshot().unwrap().progress_percent, 33);

        tracker.track(&ToolEvent::file("Edit", "src/b.rs"));
        tracker.track(&ToolEvent::file("Write", "src/c.rs"));
        assert_eq!(store.snapshot().unwrap().progress_percent, 100);
    }

    #[test]
    fn test_artifacts_complete_early_stages_without_advancing() {
        let (_dir, layout, store) = setup();
        fs::write(layout.requirements_file(), r#"{"features": ["a"]}"#).unwrap();
        fs::write(layout.plan_file(), r#"{"tasks": ["t"]}"#).unwrap();

        ProgressTracker::new(&store, &layout).track(&ToolEvent::file("Write", "notes.md"));

        let state = store.snapshot().unwrap();
        assert_eq!(state.current_stage, Stage::RequirementsAnalysis);
        assert_eq!(state.status_of(Stage::RequirementsAnalysis), StageStatus::Completed);
        assert_eq!(state.status_of(Stage::PlanGeneration), StageStatus::Completed);
        assert_eq!(state.progress_percent, 0);
    }

    #[test]
    fn test_pending_current_stage_becomes_in_progress() {
        let (_dir, layout, _) = setup();
        let mut state = WorkflowState::new("prd.md");
        state.current_stage = Stage::Implementation;
        let store = MemoryStateStore::with_state(state);

        ProgressTracker::new(&store, &layout).track(&ToolEvent::file("Write", "src/lib.rs"));

        let state = store.snapshot().unwrap();
        assert_eq!(state.status_of(Stage::Implementation), StageStatus::InProgress);
    }

    #[test]
    fn test_no_run_and_store_failure_are_silent() {
        let (_dir, layout, store) = setup();
        let empty = MemoryStateStore::new();
        assert!(!ProgressTracker::new(&empty, &layout).track(&ToolEvent::file("Write", "a.rs")));
        assert!(empty.snapshot().is_none());

        store.set_read_only(true);
        assert!(!ProgressTracker::new(&store, &layout).track(&ToolEvent::file("Write", "a.rs")));
        assert!(store.snapshot().unwrap().files_created.is_empty());
    }
}

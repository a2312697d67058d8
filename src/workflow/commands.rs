//! User-facing workflow commands: start, status and resume.
//!
//! Commands arrive either typed (from the CLI) or as free text from a
//! prompt. Text recognition is deliberately conservative: anything that is
//! not clearly a workflow command produces no action.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::artifacts::ProjectLayout;
use super::checkpoint::{CheckpointManager, ResumePoint};
use super::error::WorkflowResult;
use super::stage::{Stage, StageStatus};
use super::state::{Blocker, WorkflowState};
use super::store::StateStore;

/// Prompt prefix of the autonomous-loop entry point.
const LOOP_PREFIX: &str = "/ralph-loop";

const LOOP_USAGE: &str = "No PRD path detected after /ralph-loop. \
    Use '/ralph-loop Start autonomous workflow with PRD at <path>'.";

/// A recognized workflow command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start { document: String },
    Status,
    Resume,

    /// Addressed to the workflow but unusable; reported back as-is.
    Invalid { error: String },
}

impl Command {
    /// Recognize a command in free text.
    ///
    /// A `/ralph-loop` prompt always yields a command: a start when a
    /// document can be found, [`Command::Invalid`] otherwise. Exact forms
    /// (`workflow start <doc>`, `workflow status`, `workflow resume`) are
    /// tried next, then a keyword fallback for prompts that mention
    /// `workflow` together with a command word.
    pub fn parse(prompt: &str) -> Option<Self> {
        let raw = prompt.trim();
        // ASCII lowering keeps byte offsets valid for slicing `raw`
        let lower = raw.to_ascii_lowercase();

        if lower.starts_with(LOOP_PREFIX) {
            return Some(match loop_document(raw, &lower) {
                Some(document) => Self::Start { document },
                None => Self::Invalid { error: LOOP_USAGE.to_string() },
            });
        }
        if lower.starts_with("workflow start ") {
            let document = strip_quotes(&raw["workflow start ".len()..]);
            return (!document.is_empty()).then(|| Self::Start { document });
        }
        if lower == "workflow status" {
            return Some(Self::Status);
        }
        if lower == "workflow resume" {
            return Some(Self::Resume);
        }

        if !lower.contains("workflow") {
            return None;
        }
        if lower.contains("start") {
            extract_document(raw, &lower).map(|document| Self::Start { document })
        } else if lower.contains("status") {
            Some(Self::Status)
        } else if lower.contains("resume") {
            Some(Self::Resume)
        } else {
            None
        }
    }
}

/// Remove one pair of wrapping quotes and surrounding whitespace.
pub fn strip_quotes(value: &str) -> String {
    let value = value.trim();
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|q| value.strip_prefix(*q).and_then(|v| v.strip_suffix(*q)))
        .unwrap_or(value);
    unquoted.trim().to_string()
}

/// Non-empty text following the first occurrence of `marker`.
fn text_after(raw: &str, lower: &str, marker: &str) -> Option<String> {
    let idx = lower.find(marker)?;
    let rest = raw[idx + marker.len()..].trim_matches(|c| c == ' ' || c == ':');
    Some(strip_quotes(rest)).filter(|d| !d.is_empty())
}

fn loop_document(raw: &str, lower: &str) -> Option<String> {
    ["with prd at", "prd at", "with prd"]
        .iter()
        .find_map(|marker| text_after(raw, lower, marker))
        .or_else(|| {
            raw.split_once(char::is_whitespace)
                .map(|(_, rest)| strip_quotes(rest))
                .filter(|d| !d.is_empty())
        })
}

fn extract_document(raw: &str, lower: &str) -> Option<String> {
    if let Some(doc) = text_after(raw, lower, "workflow start") {
        return Some(doc);
    }
    if let Some(doc) = text_after(raw, lower, "prd at") {
        return Some(doc);
    }

    let parts: Vec<&str> = raw.split_whitespace().collect();
    parts
        .iter()
        .position(|p| p.eq_ignore_ascii_case("start"))
        .filter(|i| i + 1 < parts.len())
        .map(|i| strip_quotes(&parts[i + 1..].join(" ")))
        .filter(|d| !d.is_empty())
}

/// Outcome of a command, serialized for the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CommandReport {
    Start {
        run_id: String,
        source_document: String,
        current_stage: Stage,
        next_step: String,
        message: String,
    },
    Status(StatusReport),
    Resume(ResumeReport),

    /// The command could not be carried out; nothing was written.
    None { error: String },
}

/// Result of `status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatusReport {
    Active(Box<RunSummary>),
    NoActiveWorkflow { message: String },
}

/// Snapshot of a live run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub source_document: String,
    pub current_stage: Stage,
    pub stage_status: BTreeMap<Stage, StageStatus>,

    /// Completed working stages out of six, floored
    pub progress_percent: u8,

    /// Planned-file progress as tracked from file actions
    pub file_progress_percent: u8,
    pub current_task: Option<String>,
    pub files_created: usize,
    pub files_modified: usize,
    pub blockers: Vec<Blocker>,
    pub last_activity: DateTime<Utc>,
    pub can_resume: bool,
    pub workflow_complete: bool,
}

impl From<&WorkflowState> for RunSummary {
    fn from(state: &WorkflowState) -> Self {
        Self {
            run_id: state.run_id.clone(),
            source_document: state.source_document.clone(),
            current_stage: state.current_stage,
            stage_status: state.stage_status.clone(),
            progress_percent: state.stage_progress_percent(),
            file_progress_percent: state.progress_percent,
            current_task: state.current_task.clone(),
            files_created: state.files_created.len(),
            files_modified: state.files_modified.len(),
            blockers: state.blockers.clone(),
            last_activity: state.last_activity,
            can_resume: state.can_resume,
            workflow_complete: state.workflow_complete,
        }
    }
}

/// Result of `resume`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResumeReport {
    Resumed {
        #[serde(flatten)]
        point: ResumePoint,
        message: String,
    },
    NoWorkflowToResume { message: String },
}

const START_HINT: &str = "Use 'workflow start <document>' to begin.";

/// Executes workflow commands against a store.
pub struct CommandHandler<'a, S: StateStore> {
    store: &'a S,
    layout: &'a ProjectLayout,
}

impl<'a, S: StateStore> CommandHandler<'a, S> {
    pub fn new(store: &'a S, layout: &'a ProjectLayout) -> Self {
        Self { store, layout }
    }

    pub fn execute(&self, command: &Command) -> WorkflowResult<CommandReport> {
        match command {
            Command::Start { document } => self.start(document),
            Command::Status => self.status(),
            Command::Resume => self.resume(),
            Command::Invalid { error } => Ok(CommandReport::None { error: error.clone() }),
        }
    }

    /// Begin a new run. Any previous live state is replaced.
    pub fn start(&self, document: &str) -> WorkflowResult<CommandReport> {
        let resolved = self.layout.resolve(document);
        if !resolved.exists() {
            tracing::info!(path = ?resolved, "Requirements document not found");
            return Ok(CommandReport::None {
                error: format!("Requirements document not found: {document}"),
            });
        }

        if let Some(previous) = self.store.load().ok().flatten() {
            tracing::info!(run_id = %previous.run_id, "Replacing existing run");
        }

        let state = WorkflowState::new(document);
        self.store.save(&state)?;
        tracing::info!(run_id = %state.run_id, document, "Workflow started");

        let next = state.current_stage.agents_display();
        Ok(CommandReport::Start {
            run_id: state.run_id,
            source_document: document.to_string(),
            current_stage: state.current_stage,
            next_step: format!("Invoke {next} agent to analyze: {document}"),
            message: format!("Workflow started. Beginning requirements analysis of {document}"),
        })
    }

    /// Report on the live run.
    pub fn status(&self) -> WorkflowResult<CommandReport> {
        let report = match self.store.load()? {
            Some(state) => StatusReport::Active(Box::new(RunSummary::from(&state))),
            None => StatusReport::NoActiveWorkflow {
                message: format!("No active workflow. {START_HINT}"),
            },
        };
        Ok(CommandReport::Status(report))
    }

    /// Resume the live run or the latest checkpoint.
    pub fn resume(&self) -> WorkflowResult<CommandReport> {
        let report = match CheckpointManager::new(self.store, self.layout).resume()? {
            Some(point) => {
                let message = format!("Resuming workflow at stage: {}", point.current_stage);
                ResumeReport::Resumed { point, message }
            }
            None => ResumeReport::NoWorkflowToResume {
                message: format!("No workflow to resume. {START_HINT}"),
            },
        };
        Ok(CommandReport::Resume(report))
    }
}

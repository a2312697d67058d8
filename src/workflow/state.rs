//! Persistent run state.
//!
//! A [`WorkflowState`] is the single source of truth for one run. It is
//! read and written wholesale through a [`StateStore`](super::StateStore).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stage::{Stage, StageStatus};

/// State of a single workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    /// Run identifier
    pub run_id: String,

    /// Requirements document the run was started with
    pub source_document: String,

    /// Stage currently being worked
    pub current_stage: Stage,

    /// Status of each stage
    #[serde(default)]
    pub stage_status: BTreeMap<Stage, StageStatus>,

    /// Derived completion percentage of planned files
    #[serde(default)]
    pub progress_percent: u8,

    /// Task currently being worked, if an agent reported one
    #[serde(default)]
    pub current_task: Option<String>,

    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,

    #[serde(default)]
    pub files_created: Vec<String>,

    #[serde(default)]
    pub files_modified: Vec<String>,

    /// Latest result per agent
    #[serde(default)]
    pub agent_results: BTreeMap<String, AgentResult>,

    #[serde(default)]
    pub failed_agents: Vec<FailedAgent>,

    #[serde(default)]
    pub gate_failures: Vec<GateLogEntry>,

    #[serde(default)]
    pub gate_warnings: Vec<GateLogEntry>,

    #[serde(default)]
    pub stage_transitions: Vec<StageTransition>,

    #[serde(default)]
    pub blockers: Vec<Blocker>,

    #[serde(default)]
    pub escalations: Vec<EscalationNote>,

    /// Path of the latest checkpoint snapshot
    #[serde(default)]
    pub last_checkpoint: Option<String>,

    #[serde(default)]
    pub checkpoint_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub can_resume: bool,

    #[serde(default)]
    pub workflow_complete: bool,

    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Recorded outcome of an agent run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentResult {
    pub completed_at: DateTime<Utc>,
    pub success: bool,
}

/// Audit entry for a failed agent run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedAgent {
    pub agent: String,
    pub at: DateTime<Utc>,

    /// Raw result payload as reported by the agent
    #[serde(default)]
    pub result: serde_json::Value,
}

/// Audit entry for a gate that failed (strict) or warned (warn).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateLogEntry {
    pub from: Stage,
    pub to: Stage,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// Audit entry for a committed stage transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTransition {
    pub from: Stage,
    pub to: Stage,
    pub at: DateTime<Utc>,
    pub gate_passed: bool,
    pub gate_reason: String,
}

/// Something that needs human attention before the run can continue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blocker {
    #[serde(default)]
    pub escalation_id: Option<usize>,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// Escalation raised while this run was live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationNote {
    pub escalation_id: usize,
    pub level: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl WorkflowState {
    /// Fresh state for a new run, positioned at requirements analysis.
    pub fn new(source_document: impl Into<String>) -> Self {
        let now = Utc::now();
        let stage_status = Stage::PIPELINE
            .into_iter()
            .map(|stage| {
                let status = if stage == Stage::RequirementsAnalysis {
                    StageStatus::InProgress
                } else {
                    StageStatus::Pending
                };
                (stage, status)
            })
            .collect();

        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            source_document: source_document.into(),
            current_stage: Stage::RequirementsAnalysis,
            stage_status,
            progress_percent: 0,
            current_task: None,
            started_at: now,
            last_activity: now,
            files_created: Vec::new(),
            files_modified: Vec::new(),
            agent_results: BTreeMap::new(),
            failed_agents: Vec::new(),
            gate_failures: Vec::new(),
            gate_warnings: Vec::new(),
            stage_transitions: Vec::new(),
            blockers: Vec::new(),
            escalations: Vec::new(),
            last_checkpoint: None,
            checkpoint_at: None,
            can_resume: true,
            workflow_complete: false,
            completed_at: None,
        }
    }

    /// Status of a stage, `Pending` when never recorded.
    pub fn status_of(&self, stage: Stage) -> StageStatus {
        self.stage_status.get(&stage).copied().unwrap_or_default()
    }

    /// Set a stage's status. A completed stage never regresses.
    ///
    /// Returns whether the status changed.
    pub fn set_status(&mut self, stage: Stage, status: StageStatus) -> bool {
        let current = self.status_of(stage);
        if current == status || current == StageStatus::Completed {
            return false;
        }
        self.stage_status.insert(stage, status);
        true
    }

    /// Whether an agent's latest recorded result is a success.
    pub fn agent_succeeded(&self, agent: &str) -> bool {
        self.agent_results.get(agent).is_some_and(|r| r.success)
    }

    /// Record an agent result, replacing any earlier one.
    pub fn record_agent_result(&mut self, agent: &str, success: bool) {
        self.agent_results
            .insert(agent.to_string(), AgentResult { completed_at: Utc::now(), success });
    }

    /// Record a created file. Returns false if it was already recorded.
    pub fn record_created(&mut self, path: &str) -> bool {
        push_unique(&mut self.files_created, path)
    }

    /// Record a modified file. Returns false if it was already recorded.
    pub fn record_modified(&mut self, path: &str) -> bool {
        push_unique(&mut self.files_modified, path)
    }

    /// All touched files, created first.
    pub fn touched_files(&self) -> impl Iterator<Item = &str> {
        self.files_created.iter().chain(&self.files_modified).map(String::as_str)
    }

    /// Number of working stages marked completed.
    pub fn completed_stage_count(&self) -> usize {
        Stage::PIPELINE
            .into_iter()
            .filter(|stage| self.status_of(*stage) == StageStatus::Completed)
            .count()
    }

    /// Aggregate progress by completed stages, floored to an integer percent.
    pub fn stage_progress_percent(&self) -> u8 {
        (self.completed_stage_count() * 100 / Stage::PIPELINE.len()) as u8
    }

    /// Bump the activity timestamp.
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}

fn push_unique(list: &mut Vec<String>, path: &str) -> bool {
    if list.iter().any(|p| p == path) {
        return false;
    }
    list.push(path.to_string());
    true
}

//! Stage-gated delivery workflow.
//!
//! A run moves through six ordered stages, each worked by one or more
//! agents. Transitions are guarded by gates that read the artifacts agents
//! produce.
//!
//! ## Files
//!
//! All files live in the project's state directory (`.workflow/` by default):
//!
//! - `workflow-state.json` - Live run state
//! - `requirements.json` - Extracted requirements (read-only)
//! - `implementation-plan.json` - Tasks and planned files (read-only)
//! - `validation-report.json` - Test and coverage results (read-only)
//! - `checkpoints/` - Immutable snapshots taken at session boundaries
//! - `escalations.json` - Escalation log
//!
//! ## Components
//!
//! - [`gates::evaluate`] - Decides whether a transition may happen
//! - [`ResultProcessor`] - Records agent results and drives transitions
//! - [`ProgressTracker`] - Records touched files and derived progress
//! - [`CheckpointManager`] - Snapshots and resume
//! - [`CommandHandler`] - `start`, `status` and `resume`

mod artifacts;
mod checkpoint;
mod commands;
mod error;
mod escalation;
pub mod gates;
mod paths;
mod processor;
mod progress;
mod router;
mod stage;
mod state;
mod store;

pub use artifacts::{
    load_json, Artifacts, FileStructure, ImplementationPlan, PlannedFile, ProjectLayout,
    RequirementsDoc, ValidationReport, DEFAULT_STATE_DIR,
};
pub use checkpoint::{Checkpoint, CheckpointManager, ResumePoint, StopEvent, DEFAULT_STOP_REASON};
pub use commands::{
    strip_quotes, Command, CommandHandler, CommandReport, ResumeReport, RunSummary, StatusReport,
};
pub use error::{ArtifactError, StoreError, WorkflowError, WorkflowResult};
pub use escalation::{Escalation, EscalationEvent, EscalationLevel, EscalationLog};
pub use gates::{GateContext, GateMode, GateVerdict, ModeSource, GATE_MODE_ENV};
pub use paths::{normalize_path, path_matches, FileCoverage};
pub use processor::{AgentEvent, ProcessOutcome, ResultProcessor};
pub use progress::{ProgressTracker, ToolAction, ToolEvent, ToolInput};
pub use router::{detect_stage, route, Route};
pub use stage::{agents, Stage, StageStatus, UnknownStage};
pub use state::{
    AgentResult, Blocker, EscalationNote, FailedAgent, GateLogEntry, StageTransition,
    WorkflowState,
};
pub use store::{FileStateStore, MemoryStateStore, StateStore};

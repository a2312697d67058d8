//! # Shipflow
//!
//! Stage-gated orchestration for multi-agent software delivery.
//!
//! A run takes a requirements document through six ordered stages, from
//! requirements analysis to completion. Agents report results as they
//! finish, and each stage transition is guarded by a gate that inspects the
//! artifacts those agents produced.
//!
//! ## Features
//!
//! - **Gates**: Requirements, plan, review, file coverage and test checks
//! - **Strict or warn**: Block failed transitions or just log them
//! - **Progress**: Tracks touched files against the implementation plan
//! - **Checkpoints**: Immutable snapshots for resuming across sessions
//! - **Guards**: Refuses dangerous shell commands and protected file edits
//!
//! ## Quick Start
//!
//! ```bash
//! # Begin a run
//! shipflow start docs/prd.md
//!
//! # Where are we?
//! shipflow status
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

pub mod core;
pub mod security;
pub mod workflow;

// Re-export commonly used types
pub use core::Config;
pub use security::{check_tool_event, Decision};
pub use workflow::{
    AgentEvent, CheckpointManager, Command, CommandHandler, CommandReport, FileStateStore,
    GateMode, GateVerdict, ProcessOutcome, ProgressTracker, ProjectLayout, ResultProcessor, Stage,
    StageStatus, StateStore, WorkflowError, WorkflowState,
};

/// Application name
pub const APP_NAME: &str = "shipflow";

//! Agent result processing.
//!
//! Consumes agent completion events, records them, and drives stage
//! transitions through the gates.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::artifacts::{Artifacts, ProjectLayout};
use super::error::WorkflowResult;
use super::gates::{self, GateContext, GateMode, GateVerdict, ModeSource};
use super::stage::{Stage, StageStatus};
use super::state::{FailedAgent, GateLogEntry, StageTransition, WorkflowState};
use super::store::StateStore;

/// An agent completion event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEvent {
    pub agent_name: String,

    /// Raw result payload; only a literal `success: true` counts as success
    #[serde(default)]
    pub result: serde_json::Value,
}

impl AgentEvent {
    /// Event with an explicit success flag.
    pub fn new(agent_name: impl Into<String>, success: bool) -> Self {
        Self { agent_name: agent_name.into(), result: serde_json::json!({ "success": success }) }
    }

    /// Parse an event from JSON. Malformed or nameless events yield `None`.
    pub fn parse(input: &str) -> Option<Self> {
        let event: Self = serde_json::from_str(input).ok()?;
        if event.agent_name.trim().is_empty() {
            return None;
        }
        Some(event)
    }

    /// Whether the agent reported success. Anything but `true` is failure.
    pub fn succeeded(&self) -> bool {
        self.result.get("success").and_then(serde_json::Value::as_bool).unwrap_or(false)
    }
}

/// What processing an event did to the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// No live run; nothing was recorded.
    NoActiveRun,

    /// Result recorded; no transition was attempted.
    Recorded { stage: Stage },

    /// Result recorded; the stage still waits on other approvers.
    AwaitingApprovers { stage: Stage, missing: Vec<String> },

    /// The gate refused the transition in strict mode.
    Blocked { from: Stage, to: Stage, verdict: GateVerdict },

    /// The transition was committed. `warned` is set when the gate failed
    /// but warn mode let it through.
    Advanced { from: Stage, to: Stage, verdict: GateVerdict, warned: bool },
}

/// Applies agent results to the run state.
pub struct ResultProcessor<'a, S: StateStore> {
    store: &'a S,
    layout: &'a ProjectLayout,
    mode: ModeSource,
}

impl<'a, S: StateStore> ResultProcessor<'a, S> {
    /// Create a processor reading the mode from the environment (default strict).
    pub fn new(store: &'a S, layout: &'a ProjectLayout) -> Self {
        Self { store, layout, mode: ModeSource::default() }
    }

    /// Use a specific mode source.
    pub fn with_mode(mut self, mode: ModeSource) -> Self {
        self.mode = mode;
        self
    }

    /// Process one agent completion event.
    ///
    /// The result is persisted before the gate runs, so an interruption
    /// during evaluation loses at most the transition, never the result.
    pub fn process(&self, event: &AgentEvent) -> WorkflowResult<ProcessOutcome> {
        let Some(mut state) = self.store.load()? else {
            tracing::debug!(agent = %event.agent_name, "No active run, ignoring agent result");
            return Ok(ProcessOutcome::NoActiveRun);
        };

        let agent = event.agent_name.as_str();
        let success = event.succeeded();

        state.record_agent_result(agent, success);
        if !success {
            tracing::info!(agent, "Agent reported failure");
            state.failed_agents.push(FailedAgent {
                agent: agent.to_string(),
                at: Utc::now(),
                result: event.result.clone(),
            });
        }
        state.touch();
        self.store.save(&state)?;

        let outcome = match Stage::for_agent(agent) {
            Some(from) if success && state.current_stage == from => self.advance(&mut state, from),
            _ => ProcessOutcome::Recorded { stage: state.current_stage },
        };

        normalize_current_stage(&mut state);
        self.store.save(&state)?;

        Ok(outcome)
    }

    fn advance(&self, state: &mut WorkflowState, from: Stage) -> ProcessOutcome {
        let Some(to) = from.next() else {
            return ProcessOutcome::Recorded { stage: from };
        };

        let missing: Vec<String> = from
            .joint_approvers()
            .iter()
            .filter(|agent| !state.agent_succeeded(agent))
            .map(|agent| (*agent).to_string())
            .collect();
        if !missing.is_empty() {
            tracing::debug!(stage = %from, ?missing, "Waiting on remaining approvers");
            return ProcessOutcome::AwaitingApprovers { stage: from, missing };
        }

        let artifacts = Artifacts::load(self.layout);
        let verdict = gates::evaluate(from, to, &GateContext::new(&artifacts, state));
        let mut warned = false;

        if !verdict.allowed {
            let entry = GateLogEntry { from, to, reason: verdict.reason.clone(), at: Utc::now() };
            match self.mode.resolve() {
                GateMode::Strict => {
                    tracing::warn!(%from, %to, reason = %verdict.reason, "Gate blocked transition");
                    state.gate_failures.push(entry);
                    return ProcessOutcome::Blocked { from, to, verdict };
                }
                GateMode::Warn => {
                    tracing::warn!(%from, %to, reason = %verdict.reason, "Gate failed, continuing in warn mode");
                    state.gate_warnings.push(entry);
                    warned = true;
                }
            }
        }

        state.set_status(from, StageStatus::Completed);
        state.current_stage = to;
        state.stage_transitions.push(StageTransition {
            from,
            to,
            at: Utc::now(),
            gate_passed: verdict.allowed,
            gate_reason: verdict.reason.clone(),
        });
        tracing::info!(%from, %to, "Stage transition committed");

        ProcessOutcome::Advanced { from, to, verdict, warned }
    }
}

/// Bring the current stage's status in line with `current_stage`.
fn normalize_current_stage(state: &mut WorkflowState) {
    if state.current_stage == Stage::Done {
        state.set_status(Stage::Completion, StageStatus::Completed);
        state.workflow_complete = true;
        if state.completed_at.is_none() {
            state.completed_at = Some(Utc::now());
        }
    } else {
        state.set_status(state.current_stage, StageStatus::InProgress);
    }
}

//! Escalations that need human attention.
//!
//! Every escalation is appended to `escalations.json`. When a run is live it
//! is also noted in the run state, and critical ones become blockers.

use std::fmt;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::artifacts::{load_json, ProjectLayout};
use super::error::{WorkflowError, WorkflowResult};
use super::state::{Blocker, EscalationNote};
use super::store::StateStore;

/// Phrases that raise an escalation above `info`.
const TRIGGERS: &[&str] = &[
    "critical_security",
    "legal_block",
    "test_failures",
    "acceptance_block",
    "budget_exceeded",
    "human_required",
    "ambiguous_requirement",
];

const SECURITY_WORDS: &[&str] = &["vulnerability", "exploit", "injection", "xss"];
const LEGAL_WORDS: &[&str] = &["license", "gdpr", "compliance", "legal"];

/// Escalation severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscalationLevel {
    Info,
    Warning,
    Critical,
}

impl EscalationLevel {
    /// Classify a message.
    ///
    /// The first trigger phrase found sets `critical` or `warning`. Security
    /// words then force `critical`, and legal words after that force
    /// `warning`.
    pub fn classify(message: &str) -> Self {
        let message = message.to_lowercase();
        let trigger = TRIGGERS
            .iter()
            .copied()
            .find(|t| message.contains(t) || message.contains(&t.replace('_', " ")));
        let mut level = match trigger {
            Some(t) if t.contains("critical") || t.contains("block") => Self::Critical,
            Some(_) => Self::Warning,
            None => Self::Info,
        };

        if SECURITY_WORDS.iter().any(|w| message.contains(w)) {
            level = Self::Critical;
        }
        if LEGAL_WORDS.iter().any(|w| message.contains(w)) {
            level = Self::Warning;
        }
        level
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for EscalationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Escalation notification from the host.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EscalationEvent {
    #[serde(default, rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub message: String,
}

impl EscalationEvent {
    /// Parse an event; `None` when malformed.
    pub fn parse(input: &str) -> Option<Self> {
        serde_json::from_str(input).ok()
    }
}

/// Entry in the escalation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Escalation {
    pub id: usize,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub level: EscalationLevel,
    #[serde(default)]
    pub resolved: bool,
}

/// Appends escalations and mirrors them into the live run.
pub struct EscalationLog<'a, S: StateStore> {
    store: &'a S,
    layout: &'a ProjectLayout,
}

impl<'a, S: StateStore> EscalationLog<'a, S> {
    pub fn new(store: &'a S, layout: &'a ProjectLayout) -> Self {
        Self { store, layout }
    }

    /// All recorded escalations. An unreadable log reads as empty.
    pub fn entries(&self) -> Vec<Escalation> {
        let path = self.layout.escalations_file();
        match load_json(&path) {
            Ok(entries) => entries.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "Escalation log unreadable, starting a new one");
                Vec::new()
            }
        }
    }

    /// Record an escalation.
    pub fn raise(&self, event: &EscalationEvent) -> WorkflowResult<Escalation> {
        let mut entries = self.entries();
        let escalation = Escalation {
            id: entries.len(),
            timestamp: Utc::now(),
            kind: event.kind.clone(),
            message: event.message.clone(),
            level: EscalationLevel::classify(&event.message),
            resolved: false,
        };
        entries.push(escalation.clone());
        write_log(&self.layout.escalations_file(), &entries)?;

        tracing::info!(id = escalation.id, level = %escalation.level, "Escalation recorded");

        if let Some(mut state) = self.store.load()? {
            state.escalations.push(EscalationNote {
                escalation_id: escalation.id,
                level: escalation.level.to_string(),
                message: escalation.message.clone(),
                at: escalation.timestamp,
            });
            if escalation.level == EscalationLevel::Critical {
                state.blockers.push(Blocker {
                    escalation_id: Some(escalation.id),
                    reason: escalation.message.clone(),
                    at: escalation.timestamp,
                });
            }
            state.touch();
            self.store.save(&state)?;
        }

        Ok(escalation)
    }
}

fn write_log(path: &Path, entries: &[Escalation]) -> WorkflowResult<()> {
    let log_err =
        |source: std::io::Error| WorkflowError::EscalationLog { path: path.to_path_buf(), source };

    let content = serde_json::to_string_pretty(entries).map_err(|e| log_err(e.into()))?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(log_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(log_err)?;
    tmp.write_all(content.as_bytes()).map_err(log_err)?;
    tmp.persist(path).map_err(|e| log_err(e.error))?;
    Ok(())
}

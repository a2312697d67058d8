//! Pipeline stages and the agents that work them.
//!
//! Stages form a strict total order. The only way forward is
//! [`Stage::next`], which is what keeps transitions from skipping or
//! going backward.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Well-known agent names.
pub mod agents {
    pub const PRD_ANALYZER: &str = "prd-analyzer";
    pub const PLAN_ARCHITECT: &str = "plan-architect";
    pub const SECURITY_AUDITOR: &str = "security-auditor";
    pub const LEGAL_REVIEWER: &str = "legal-reviewer";
    pub const CODE_IMPLEMENTER: &str = "code-implementer";
    pub const ASSET_BUILDER: &str = "asset-builder";
    pub const TEST_RUNNER: &str = "test-runner-fixer";
    pub const ACCEPTANCE_VALIDATOR: &str = "acceptance-validator";
    pub const DOC_WRITER: &str = "doc-writer";
}

/// A pipeline stage.
///
/// Declaration order is pipeline order, so the derived `Ord` is the
/// stage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    RequirementsAnalysis,
    PlanGeneration,
    SecurityLegalReview,
    Implementation,
    Testing,
    Completion,
    /// Terminal sentinel, reached from `Completion`.
    Done,
}

impl Stage {
    /// The six working stages, in order. `Done` is not a working stage.
    pub const PIPELINE: [Self; 6] = [
        Self::RequirementsAnalysis,
        Self::PlanGeneration,
        Self::SecurityLegalReview,
        Self::Implementation,
        Self::Testing,
        Self::Completion,
    ];

    /// The stage that follows this one, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::RequirementsAnalysis => Some(Self::PlanGeneration),
            Self::PlanGeneration => Some(Self::SecurityLegalReview),
            Self::SecurityLegalReview => Some(Self::Implementation),
            Self::Implementation => Some(Self::Testing),
            Self::Testing => Some(Self::Completion),
            Self::Completion => Some(Self::Done),
            Self::Done => None,
        }
    }

    /// Snake-case name used on disk and in reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RequirementsAnalysis => "requirements_analysis",
            Self::PlanGeneration => "plan_generation",
            Self::SecurityLegalReview => "security_legal_review",
            Self::Implementation => "implementation",
            Self::Testing => "testing",
            Self::Completion => "completion",
            Self::Done => "done",
        }
    }

    /// Agents expected to run during this stage.
    pub fn agents(self) -> &'static [&'static str] {
        use self::agents::*;
        match self {
            Self::RequirementsAnalysis => &[PRD_ANALYZER],
            Self::PlanGeneration => &[PLAN_ARCHITECT],
            Self::SecurityLegalReview => &[SECURITY_AUDITOR, LEGAL_REVIEWER],
            Self::Implementation => &[CODE_IMPLEMENTER, ASSET_BUILDER],
            Self::Testing => &[TEST_RUNNER, ACCEPTANCE_VALIDATOR],
            Self::Completion => &[DOC_WRITER],
            Self::Done => &[],
        }
    }

    /// Agents that must all have succeeded before this stage may be left.
    ///
    /// Empty means any single mapped agent's success is enough.
    pub fn joint_approvers(self) -> &'static [&'static str] {
        use self::agents::*;
        match self {
            Self::SecurityLegalReview => &[SECURITY_AUDITOR, LEGAL_REVIEWER],
            Self::Testing => &[TEST_RUNNER, ACCEPTANCE_VALIDATOR],
            _ => &[],
        }
    }

    /// The stage whose exit edge an agent's success drives.
    pub fn for_agent(agent: &str) -> Option<Self> {
        Self::PIPELINE.into_iter().find(|stage| stage.agents().iter().any(|a| *a == agent))
    }

    /// Human-readable description of the next agents, e.g. for resume prompts.
    pub fn agents_display(self) -> String {
        match self.agents() {
            [] => "none".to_string(),
            // Implementation is normally driven by the code implementer alone.
            [first, ..] if self == Self::Implementation => (*first).to_string(),
            names => names.join(" and "),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown stage name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown stage: {0}")]
pub struct UnknownStage(pub String);

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "requirements_analysis" | "requirements" | "prd_analysis" => {
                Ok(Self::RequirementsAnalysis)
            }
            "plan_generation" | "plan" => Ok(Self::PlanGeneration),
            "security_legal_review" | "review" => Ok(Self::SecurityLegalReview),
            "implementation" => Ok(Self::Implementation),
            "testing" => Ok(Self::Testing),
            "completion" => Ok(Self::Completion),
            "done" => Ok(Self::Done),
            _ => Err(UnknownStage(s.to_string())),
        }
    }
}

/// Status of a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    InProgress,
    Completed,
}

impl Default for StageStatus {
    fn default() -> Self {
        Self::Pending
    }
}

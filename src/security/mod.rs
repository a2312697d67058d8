//! Pre-tool guards.
//!
//! Checks a tool invocation before it runs:
//! - Shell commands against blocked and confirm-first patterns
//! - File paths against protected files and path traversal
//! - File writes against the implementation plan
//!
//! Each check yields a [`Decision`]. The most severe decision wins.

mod bash;
mod files;

pub use bash::check_command;
pub use files::{check_plan_compliance, check_protected_path};

use crate::workflow::{ImplementationPlan, ToolAction, ToolEvent};

/// Outcome of a guard check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Let the tool run
    Allow,
    /// Ask the user before running
    Ask(String),
    /// Refuse to run
    Block(String),
}

impl Decision {
    fn rank(&self) -> u8 {
        match self {
            Self::Allow => 0,
            Self::Ask(_) => 1,
            Self::Block(_) => 2,
        }
    }

    /// Keep the more severe of two decisions; ties keep `self`.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }

    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn is_block(&self) -> bool {
        matches!(self, Self::Block(_))
    }
}

/// Run every applicable guard for a tool event.
///
/// `plan` is the current implementation plan, if one exists.
pub fn check_tool_event(event: &ToolEvent, plan: Option<&ImplementationPlan>) -> Decision {
    if event.tool_name == "Bash" {
        return event.tool_input.command.as_deref().map_or(Decision::Allow, check_command);
    }

    let Some(path) = event.file_path() else {
        return Decision::Allow;
    };

    let decision = check_protected_path(path);
    if decision.is_block() || ToolAction::from_tool(&event.tool_name).is_none() {
        return decision;
    }

    match plan {
        Some(plan) => decision.or(check_plan_compliance(path, plan)),
        None => decision,
    }
}

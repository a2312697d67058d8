//! Prompt routing to stages and agents.

use serde::Serialize;

use super::stage::Stage;

/// Keywords that point a prompt at a stage.
fn keywords(stage: Stage) -> &'static [&'static str] {
    match stage {
        Stage::RequirementsAnalysis => &["prd", "requirements", "spec", "analyze", "extract"],
        Stage::PlanGeneration => &["plan", "architect", "design", "structure"],
        Stage::SecurityLegalReview => &["security", "legal", "review", "audit", "compliance"],
        Stage::Implementation => &["implement", "build", "code", "create", "develop"],
        Stage::Testing => &["test", "validate", "verify", "check"],
        Stage::Completion => &["document", "finish", "complete", "deploy", "handoff"],
        Stage::Done => &[],
    }
}

/// Routing suggestion for a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    pub current_stage: Stage,
    pub detected_stage: Option<Stage>,
    pub suggested_agents: Vec<&'static str>,
}

/// First stage, in pipeline order, with a keyword contained in the prompt.
pub fn detect_stage(prompt: &str) -> Option<Stage> {
    let prompt = prompt.to_lowercase();
    Stage::PIPELINE.into_iter().find(|stage| keywords(*stage).iter().any(|kw| prompt.contains(kw)))
}

/// Suggest agents for a prompt given the run's current stage.
pub fn route(prompt: &str, current_stage: Option<Stage>) -> Route {
    let current_stage = current_stage.unwrap_or(Stage::RequirementsAnalysis);
    let detected_stage = detect_stage(prompt);
    let suggested_agents = detected_stage.unwrap_or(current_stage).agents().to_vec();

    Route { current_stage, detected_stage, suggested_agents }
}

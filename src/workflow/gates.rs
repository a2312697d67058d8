//! Stage gates.
//!
//! Each gate is a pure predicate over a [`GateContext`]. A gate is defined
//! for the five forward edges between working stages; any other pair is
//! open.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::artifacts::{Artifacts, ImplementationPlan, RequirementsDoc, ValidationReport};
use super::paths::FileCoverage;
use super::stage::{agents, Stage};
use super::state::WorkflowState;

/// Environment variable overriding the configured gate mode.
pub const GATE_MODE_ENV: &str = "WORKFLOW_GATE_MODE";

/// Minimum coverage required to leave testing.
pub const MIN_COVERAGE_PERCENT: f64 = 80.0;

/// How a failed gate is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum GateMode {
    /// Failed gates block the transition
    #[default]
    Strict,
    /// Failed gates are logged and the transition proceeds
    Warn,
}

impl GateMode {
    /// Parse a mode name. Anything unrecognized is `Strict`.
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or(Self::Strict)
    }

    /// Mode set through the environment, if any.
    pub fn from_env() -> Option<Self> {
        std::env::var(GATE_MODE_ENV).ok().map(|v| Self::parse_lenient(&v))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Warn => "warn",
        }
    }
}

impl FromStr for GateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "warn" => Ok(Self::Warn),
            other => Err(format!("unknown gate mode: {other}")),
        }
    }
}

impl From<String> for GateMode {
    fn from(value: String) -> Self {
        Self::parse_lenient(&value)
    }
}

impl fmt::Display for GateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the enforcement mode comes from on each transition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeSource {
    /// Always this mode
    Fixed(GateMode),
    /// [`GATE_MODE_ENV`] when set, otherwise the fallback
    Environment { fallback: GateMode },
}

impl ModeSource {
    /// Resolve the mode now.
    pub fn resolve(self) -> GateMode {
        match self {
            Self::Fixed(mode) => mode,
            Self::Environment { fallback } => GateMode::from_env().unwrap_or(fallback),
        }
    }
}

impl Default for ModeSource {
    fn default() -> Self {
        Self::Environment { fallback: GateMode::Strict }
    }
}

/// Outcome of a gate check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateVerdict {
    pub allowed: bool,
    pub reason: String,
}

impl GateVerdict {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self { allowed: true, reason: reason.into() }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self { allowed: false, reason: reason.into() }
    }
}

/// Everything a gate may look at.
#[derive(Debug, Clone, Copy)]
pub struct GateContext<'a> {
    pub requirements: Option<&'a RequirementsDoc>,
    pub plan: Option<&'a ImplementationPlan>,
    pub state: &'a WorkflowState,
    pub report: Option<&'a ValidationReport>,
}

impl<'a> GateContext<'a> {
    pub fn new(artifacts: &'a Artifacts, state: &'a WorkflowState) -> Self {
        Self {
            requirements: artifacts.requirements.as_ref(),
            plan: artifacts.plan.as_ref(),
            state,
            report: artifacts.report.as_ref(),
        }
    }
}

/// Evaluate the gate guarding `from -> to`.
pub fn evaluate(from: Stage, to: Stage, ctx: &GateContext<'_>) -> GateVerdict {
    match (from, to) {
        (Stage::RequirementsAnalysis, Stage::PlanGeneration) => requirements_to_plan(ctx),
        (Stage::PlanGeneration, Stage::SecurityLegalReview) => plan_to_review(ctx),
        (Stage::SecurityLegalReview, Stage::Implementation) => review_to_implementation(ctx),
        (Stage::Implementation, Stage::Testing) => implementation_to_testing(ctx),
        (Stage::Testing, Stage::Completion) => testing_to_completion(ctx),
        _ => GateVerdict::allow(format!("No gate defined for {from} -> {to}")),
    }
}

fn requirements_to_plan(ctx: &GateContext<'_>) -> GateVerdict {
    let features = ctx.requirements.map_or(0, |r| r.features.len());
    if features == 0 {
        return GateVerdict::deny("requirements.json missing or has no features");
    }
    GateVerdict::allow(format!("Requirements analysis complete: {features} features extracted"))
}

fn plan_to_review(ctx: &GateContext<'_>) -> GateVerdict {
    match ctx.plan {
        Some(plan) if !plan.is_empty() => GateVerdict::allow(format!(
            "Plan complete: {} tasks, {} files planned",
            plan.tasks.len(),
            plan.file_structure.files.len()
        )),
        _ => GateVerdict::deny("implementation-plan.json missing or has no tasks/files"),
    }
}

fn review_to_implementation(ctx: &GateContext<'_>) -> GateVerdict {
    if !ctx.state.agent_succeeded(agents::SECURITY_AUDITOR) {
        return GateVerdict::deny(format!("{} has not approved", agents::SECURITY_AUDITOR));
    }
    if !ctx.state.agent_succeeded(agents::LEGAL_REVIEWER) {
        return GateVerdict::deny(format!("{} has not approved", agents::LEGAL_REVIEWER));
    }
    GateVerdict::allow("Security and legal review passed")
}

fn implementation_to_testing(ctx: &GateContext<'_>) -> GateVerdict {
    let planned = match ctx.plan {
        Some(plan) if !plan.file_structure.files.is_empty() => plan.planned_paths(),
        _ => return GateVerdict::allow("No file plan to validate against"),
    };
    if planned.is_empty() {
        return GateVerdict::allow("No specific files in plan");
    }

    let coverage = FileCoverage::compute(&planned, ctx.state.touched_files());
    let percent = coverage.percent_rounded();

    if !coverage.is_complete() {
        return GateVerdict::deny(format!(
            "Only {percent}% of planned files completed ({}/{})",
            coverage.matched, coverage.total
        ));
    }
    GateVerdict::allow(format!(
        "{percent}% of planned files completed ({} created/modified)",
        coverage.matched
    ))
}

fn testing_to_completion(ctx: &GateContext<'_>) -> GateVerdict {
    if !ctx.state.agent_succeeded(agents::TEST_RUNNER) {
        return GateVerdict::deny(format!("{} has not succeeded", agents::TEST_RUNNER));
    }
    if !ctx.state.agent_succeeded(agents::ACCEPTANCE_VALIDATOR) {
        return GateVerdict::deny(format!("{} has not succeeded", agents::ACCEPTANCE_VALIDATOR));
    }

    let Some(report) = ctx.report.filter(|r| !r.is_empty()) else {
        return GateVerdict::deny(format!(
            "validation-report.json missing - cannot verify {MIN_COVERAGE_PERCENT}% coverage requirement"
        ));
    };

    let passed = report.tests_passed.unwrap_or(0.0);
    let total = report.tests_total.unwrap_or(0.0);
    if total > 0.0 && passed < total {
        let rate = (passed / total * 100.0).round();
        return GateVerdict::deny(format!("Only {rate}% of tests passing ({passed}/{total})"));
    }

    let coverage = report.coverage_percent.unwrap_or(0.0);
    if coverage < MIN_COVERAGE_PERCENT {
        return GateVerdict::deny(format!(
            "Coverage {coverage}% is below {MIN_COVERAGE_PERCENT}% threshold"
        ));
    }

    GateVerdict::allow(format!("Tests pass: {passed}/{total}, coverage: {coverage}%"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::artifacts::{FileStructure, PlannedFile};

    fn plan_with_files(files: &[&str]) -> ImplementationPlan {
        ImplementationPlan {
            tasks: Vec::new(),
            file_structure: FileStructure {
                files: files.iter().map(|f| PlannedFile::Path((*f).to_string())).collect(),
            },
        }
    }

    fn report(passed: f64, total: f64, coverage: f64) -> ValidationReport {
        ValidationReport {
            tests_passed: Some(passed),
            tests_total: Some(total),
            coverage_percent: Some(coverage),
        }
    }

    fn ctx<'a>(artifacts: &'a Artifacts, state: &'a WorkflowState) -> GateContext<'a> {
        GateContext::new(artifacts, state)
    }

    fn check(from: Stage, artifacts: &Artifacts, state: &WorkflowState) -> GateVerdict {
        let to = from.next().unwrap();
        evaluate(from, to, &ctx(artifacts, state))
    }

    #[test]
    fn test_undefined_pairs_are_open() {
        let artifacts = Artifacts::default();
        let state = WorkflowState::new("prd.md");
        let c = ctx(&artifacts, &state);

        let defined = [
            (Stage::RequirementsAnalysis, Stage::PlanGeneration),
            (Stage::PlanGeneration, Stage::SecurityLegalReview),
            (Stage::SecurityLegalReview, Stage::Implementation),
            (Stage::Implementation, Stage::Testing),
            (Stage::Testing, Stage::Completion),
        ];
        let mut all = Stage::PIPELINE.to_vec();
        all.push(Stage::Done);

        for from in &all {
            for to in &all {
                if defined.contains(&(*from, *to)) {
                    continue;
                }
                let verdict = evaluate(*from, *to, &c);
                assert!(verdict.allowed, "{from} -> {to} should be open");
                assert!(verdict.reason.starts_with("No gate defined"));
            }
        }
    }

    #[test]
    fn test_requirements_gate() {
        let state = WorkflowState::new("prd.md");
        let mut artifacts = Artifacts::default();

        let verdict = check(Stage::RequirementsAnalysis, &artifacts, &state);
        assert!(!verdict.allowed);
        assert_eq!(verdict.reason, "requirements.json missing or has no features");

        artifacts.requirements =
            Some(RequirementsDoc { features: vec![serde_json::json!("login")] });
        let verdict = check(Stage::RequirementsAnalysis, &artifacts, &state);
        assert!(verdict.allowed);
        assert!(verdict.reason.contains("1 features"));
    }

    #[test]
    fn test_plan_gate_accepts_tasks_or_files() {
        let state = WorkflowState::new("prd.md");
        let mut artifacts =
            Artifacts { plan: Some(ImplementationPlan::default()), ..Default::default() };

        let verdict = check(Stage::PlanGeneration, &artifacts, &state);
        assert!(!verdict.allowed);
        assert_eq!(verdict.reason, "implementation-plan.json missing or has no tasks/files");

        artifacts.plan = Some(plan_with_files(&["src/main.rs"]));
        let verdict = check(Stage::PlanGeneration, &artifacts, &state);
        assert!(verdict.allowed);

        artifacts.plan = Some(ImplementationPlan {
            tasks: vec![serde_json::json!({"id": 1})],
            ..Default::default()
        });
        let verdict = check(Stage::PlanGeneration, &artifacts, &state);
        assert!(verdict.allowed);
    }

    #[test]
    fn test_review_gate_names_missing_approver() {
        let artifacts = Artifacts::default();
        let mut state = WorkflowState::new("prd.md");

        let verdict = check(Stage::SecurityLegalReview, &artifacts, &state);
        assert_eq!(verdict.reason, "security-auditor has not approved");

        state.record_agent_result(agents::SECURITY_AUDITOR, true);
        let verdict = check(Stage::SecurityLegalReview, &artifacts, &state);
        assert_eq!(verdict.reason, "legal-reviewer has not approved");

        state.record_agent_result(agents::LEGAL_REVIEWER, false);
        let verdict = check(Stage::SecurityLegalReview, &artifacts, &state);
        assert!(!verdict.allowed);

        state.record_agent_result(agents::LEGAL_REVIEWER, true);
        let verdict = check(Stage::SecurityLegalReview, &artifacts, &state);
        assert!(verdict.allowed);
    }

    #[test]
    fn test_implementation_gate_requires_all_planned_files() {
        let artifacts = Artifacts {
            plan: Some(plan_with_files(&["src/a.py", "src/b.py"])),
            ..Default::default()
        };
        let mut state = WorkflowState::new("prd.md");
        state.record_created("src/a.py");

        let verdict = check(Stage::Implementation, &artifacts, &state);
        assert!(!verdict.allowed);
        assert_eq!(verdict.reason, "Only 50% of planned files completed (1/2)");

        state.record_modified("/home/dev/app/src/b.py");
        let verdict = check(Stage::Implementation, &artifacts, &state);
        assert!(verdict.allowed);
        assert!(verdict.reason.starts_with("100%"));
    }

    #[test]
    fn test_implementation_gate_vacuous_without_files() {
        let state = WorkflowState::new("prd.md");

        let no_plan = Artifacts::default();
        assert!(evaluate(Stage::Implementation, Stage::Testing, &ctx(&no_plan, &state)).allowed);

        let blank_paths = Artifacts { plan: Some(plan_with_files(&[""])), ..Default::default() };
        let verdict = evaluate(Stage::Implementation, Stage::Testing, &ctx(&blank_paths, &state));
        assert!(verdict.allowed);
        assert_eq!(verdict.reason, "No specific files in plan");
    }

    #[test]
    fn test_testing_gate_conditions_in_order() {
        let mut state = WorkflowState::new("prd.md");
        let mut artifacts = Artifacts::default();
        let testing = |a: &Artifacts, s: &WorkflowState| check(Stage::Testing, a, s);

        assert_eq!(testing(&artifacts, &state).reason, "test-runner-fixer has not succeeded");

        state.record_agent_result(agents::TEST_RUNNER, true);
        assert_eq!(testing(&artifacts, &state).reason, "acceptance-validator has not succeeded");

        state.record_agent_result(agents::ACCEPTANCE_VALIDATOR, true);
        assert!(testing(&artifacts, &state).reason.starts_with("validation-report.json missing"));

        artifacts.report = Some(report(9.0, 10.0, 95.0));
        assert_eq!(testing(&artifacts, &state).reason, "Only 90% of tests passing (9/10)");

        artifacts.report = Some(report(10.0, 10.0, 79.0));
        let verdict = testing(&artifacts, &state);
        assert!(!verdict.allowed);
        assert_eq!(verdict.reason, "Coverage 79% is below 80% threshold");

        artifacts.report = Some(report(10.0, 10.0, 82.0));
        let verdict = testing(&artifacts, &state);
        assert!(verdict.allowed);
        assert_eq!(verdict.reason, "Tests pass: 10/10, coverage: 82%");
    }

    #[test]
    fn test_testing_gate_with_no_reported_tests_checks_coverage_only() {
        let mut state = WorkflowState::new("prd.md");
        state.record_agent_result(agents::TEST_RUNNER, true);
        state.record_agent_result(agents::ACCEPTANCE_VALIDATOR, true);
        let artifacts = Artifacts { report: Some(report(0.0, 0.0, 80.0)), ..Default::default() };

        assert!(check(Stage::Testing, &artifacts, &state).allowed);
    }

    #[test]
    fn test_testing_gate_treats_empty_report_as_missing() {
        let mut state = WorkflowState::new("prd.md");
        state.record_agent_result(agents::TEST_RUNNER, true);
        state.record_agent_result(agents::ACCEPTANCE_VALIDATOR, true);
        let empty: ValidationReport = serde_json::from_str("{}").unwrap();
        let artifacts = Artifacts { report: Some(empty), ..Default::default() };

        let verdict = check(Stage::Testing, &artifacts, &state);
        assert!(!verdict.allowed);
        assert_eq!(
            verdict.reason,
            "validation-report.json missing - cannot verify 80% coverage requirement"
        );
    }

    #[test]
    fn test_testing_gate_accepts_float_counts() {
        let mut state = WorkflowState::new("prd.md");
        state.record_agent_result(agents::TEST_RUNNER, true);
        state.record_agent_result(agents::ACCEPTANCE_VALIDATOR, true);
        let parsed: ValidationReport = serde_json::from_str(
            r#"{"tests_passed": 10.0, "tests_total": 10.0, "coverage_percent": 85}"#,
        )
        .unwrap();
        let artifacts = Artifacts { report: Some(parsed), ..Default::default() };

        let verdict = check(Stage::Testing, &artifacts, &state);
        assert!(verdict.allowed);
        assert_eq!(verdict.reason, "Tests pass: 10/10, coverage: 85%");
    }

    #[test]
    fn test_gate_mode_parsing_falls_back_to_strict() {
        assert_eq!(GateMode::parse_lenient("warn"), GateMode::Warn);
        assert_eq!(GateMode::parse_lenient(" WARN "), GateMode::Warn);
        assert_eq!(GateMode::parse_lenient("strict"), GateMode::Strict);
        assert_eq!(GateMode::parse_lenient("permissive"), GateMode::Strict);
        assert_eq!(GateMode::parse_lenient(""), GateMode::Strict);

        let mode: GateMode = serde_json::from_str("\"loose\"").unwrap();
        assert_eq!(mode, GateMode::Strict);
        assert_eq!(GateMode::default(), GateMode::Strict);
    }

    #[test]
    #[serial_test::serial(gate_mode_env)]
    fn test_mode_source_reads_environment_each_time() {
        let original = std::env::var(GATE_MODE_ENV).ok();
        let source = ModeSource::Environment { fallback: GateMode::Strict };

        std::env::remove_var(GATE_MODE_ENV);
        assert_eq!(source.resolve(), GateMode::Strict);

        std::env::set_var(GATE_MODE_ENV, "warn");
        assert_eq!(source.resolve(), GateMode::Warn);
        assert_eq!(ModeSource::Fixed(GateMode::Strict).resolve(), GateMode::Strict);

        std::env::set_var(GATE_MODE_ENV, "bogus");
        assert_eq!(source.resolve(), GateMode::Strict);

        match original {
            Some(val) => std::env::set_var(GATE_MODE_ENV, val),
            None => std::env::remove_var(GATE_MODE_ENV),
        }
    }
}

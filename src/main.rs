//! Shipflow - stage-gated orchestration for multi-agent delivery.
//!
//! Subcommands drive a run directly; `hook` subcommands read a JSON event on
//! stdin and are meant to be wired into an agent runner's hook system.

#![allow(clippy::single_match_else)]

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use serde_json::json;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shipflow::core::{Config, PROJECT_DIR_ENV};
use shipflow::security::{check_tool_event, Decision};
use shipflow::APP_NAME;
use shipflow::workflow::{
    gates, load_json, route, AgentEvent, Artifacts, CheckpointManager, Command, CommandHandler,
    EscalationEvent, EscalationLog, FileStateStore, GateContext, ImplementationPlan,
    ProgressTracker, ProjectLayout, ResultProcessor, Stage, StateStore, StopEvent, ToolEvent,
    WorkflowState,
};

/// Stage-gated orchestration for multi-agent software delivery
#[derive(Parser)]
#[command(name = "shipflow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Project root holding the workflow directory
    #[arg(long, global = true, env = PROJECT_DIR_ENV, default_value = ".")]
    project_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new run from a requirements document
    Start {
        /// Requirements document, relative to the project root
        document: String,
    },

    /// Show the live run
    Status,

    /// Resume the live run or the latest checkpoint
    Resume,

    /// Evaluate the gate for a transition against current artifacts
    Gate {
        /// Stage to leave
        from: Stage,

        /// Stage to enter
        to: Stage,
    },

    /// Handle a hook event read from stdin
    Hook {
        #[command(subcommand)]
        operation: HookOperation,
    },

    /// Show configuration
    Config {
        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Hook events. Each reads one JSON document from stdin.
#[derive(Subcommand)]
enum HookOperation {
    /// User prompt: workflow commands, or stage routing otherwise
    Prompt,
    /// Agent completion result
    AgentResult,
    /// File-writing tool action
    Track,
    /// Session boundary
    Checkpoint,
    /// Escalation notification
    Escalate,
    /// Pre-tool guard; exits 2 to block
    Guard,
}

/// Everything a command needs to reach the project's workflow files.
struct Workspace {
    config: Config,
    layout: ProjectLayout,
    store: FileStateStore,
}

impl Workspace {
    fn open(project_dir: &Path) -> Result<Self> {
        let config = Config::load(project_dir)?;
        Ok(Self::with_config(project_dir, config))
    }

    /// Like `open`, but an unreadable config falls back to defaults.
    fn open_lenient(project_dir: &Path) -> Self {
        let config = Config::load(project_dir).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Invalid configuration, using defaults");
            Config::default()
        });
        Self::with_config(project_dir, config)
    }

    fn with_config(project_dir: &Path, config: Config) -> Self {
        let layout = config.layout(project_dir);
        let store = FileStateStore::new(layout.state_file());
        Self { config, layout, store }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose { EnvFilter::new("debug") } else { EnvFilter::new("warn") };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Start { document } => {
            cmd_command(&cli.project_dir, &Command::Start { document })?;
        }
        Commands::Status => {
            cmd_command(&cli.project_dir, &Command::Status)?;
        }
        Commands::Resume => {
            cmd_command(&cli.project_dir, &Command::Resume)?;
        }
        Commands::Gate { from, to } => {
            cmd_gate(&cli.project_dir, from, to)?;
        }
        Commands::Hook { operation } => {
            cmd_hook(&cli.project_dir, operation);
        }
        Commands::Config { path } => {
            cmd_config(&cli.project_dir, path)?;
        }
        Commands::Completions { shell } => {
            cmd_completions(shell);
        }
    }

    Ok(())
}

/// Run a workflow command and print its report.
fn cmd_command(project_dir: &Path, command: &Command) -> Result<()> {
    let ws = Workspace::open(project_dir)?;
    let report = CommandHandler::new(&ws.store, &ws.layout).execute(command)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Evaluate a single gate. Exits 1 when the gate denies the transition.
fn cmd_gate(project_dir: &Path, from: Stage, to: Stage) -> Result<()> {
    let ws = Workspace::open(project_dir)?;
    let state = ws.store.load()?.unwrap_or_else(|| WorkflowState::new(""));
    let artifacts = Artifacts::load(&ws.layout);

    let verdict = gates::evaluate(from, to, &GateContext::new(&artifacts, &state));
    println!("{}", serde_json::to_string_pretty(&verdict)?);

    if !verdict.allowed {
        std::process::exit(1);
    }
    Ok(())
}

/// Show configuration.
fn cmd_config(project_dir: &Path, show_path: bool) -> Result<()> {
    if show_path {
        if let Some(path) = Config::config_dir() {
            println!("{}", path.display());
        }
        return Ok(());
    }

    let config = Config::load(project_dir)?;
    let toml = toml::to_string_pretty(&config)?;
    println!("{toml}");

    Ok(())
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, APP_NAME, &mut io::stdout());
}

/// Handle a hook event.
///
/// Hooks never fail the host: malformed input and internal errors are
/// logged and the process exits 0. The guard is the exception, since its
/// exit code carries the decision.
fn cmd_hook(project_dir: &Path, operation: HookOperation) {
    let mut input = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut input) {
        tracing::warn!(error = %e, "Failed to read hook input");
        return;
    }

    let ws = Workspace::open_lenient(project_dir);
    let result = match operation {
        HookOperation::Prompt => hook_prompt(&ws, &input),
        HookOperation::AgentResult => hook_agent_result(&ws, &input),
        HookOperation::Track => hook_track(&ws, &input),
        HookOperation::Checkpoint => hook_checkpoint(&ws, &input),
        HookOperation::Escalate => hook_escalate(&ws, &input),
        HookOperation::Guard => hook_guard(&ws, &input),
    };

    if let Err(e) = result {
        tracing::warn!(error = %e, "Hook failed, ignoring");
    }
}

fn hook_prompt(ws: &Workspace, input: &str) -> Result<()> {
    let Some(prompt) = serde_json::from_str::<serde_json::Value>(input)
        .ok()
        .and_then(|v| v.get("prompt").and_then(|p| p.as_str()).map(str::to_string))
    else {
        return Ok(());
    };

    let output = match Command::parse(&prompt) {
        Some(command) => {
            let report = CommandHandler::new(&ws.store, &ws.layout).execute(&command)?;
            json!({
                "hookSpecificOutput": {
                    "hookEventName": "UserPromptSubmit",
                    "workflowCommand": report,
                }
            })
        }
        None => {
            let current = ws.store.load().ok().flatten().map(|s| s.current_stage);
            let routed = route(&prompt, current);
            json!({
                "hookSpecificOutput": {
                    "hookEventName": "UserPromptSubmit",
                    "currentStage": routed.current_stage,
                    "detectedStage": routed.detected_stage,
                    "suggestedAgents": routed.suggested_agents,
                }
            })
        }
    };

    println!("{output}");
    Ok(())
}

fn hook_agent_result(ws: &Workspace, input: &str) -> Result<()> {
    let Some(event) = AgentEvent::parse(input) else {
        tracing::debug!("Ignoring malformed agent result");
        return Ok(());
    };

    let outcome = ResultProcessor::new(&ws.store, &ws.layout)
        .with_mode(ws.config.mode_source())
        .process(&event)?;
    tracing::debug!(?outcome, "Processed agent result");
    Ok(())
}

fn hook_track(ws: &Workspace, input: &str) -> Result<()> {
    if let Some(event) = ToolEvent::parse(input) {
        ProgressTracker::new(&ws.store, &ws.layout).track(&event);
    }
    Ok(())
}

fn hook_checkpoint(ws: &Workspace, input: &str) -> Result<()> {
    let Some(event) = StopEvent::parse(input) else {
        return Ok(());
    };

    if let Some(path) = CheckpointManager::new(&ws.store, &ws.layout).create(event.reason())? {
        let output = json!({
            "hookSpecificOutput": {
                "checkpointCreated": path.display().to_string(),
                "canResume": true,
            }
        });
        println!("{output}");
    }
    Ok(())
}

fn hook_escalate(ws: &Workspace, input: &str) -> Result<()> {
    if let Some(event) = EscalationEvent::parse(input) {
        EscalationLog::new(&ws.store, &ws.layout).raise(&event)?;
    }
    Ok(())
}

fn hook_guard(ws: &Workspace, input: &str) -> Result<()> {
    let Some(event) = ToolEvent::parse(input) else {
        return Ok(());
    };

    let plan = match load_json::<ImplementationPlan>(&ws.layout.plan_file()) {
        Ok(plan) => plan,
        Err(e) => {
            tracing::debug!(error = %e, "Plan unreadable, skipping plan compliance");
            None
        }
    };

    match check_tool_event(&event, plan.as_ref()) {
        Decision::Allow => {}
        Decision::Ask(reason) => {
            let output = json!({
                "hookSpecificOutput": {
                    "hookEventName": "PreToolUse",
                    "permissionDecision": "ask",
                    "permissionDecisionReason": reason,
                }
            });
            println!("{output}");
        }
        Decision::Block(reason) => {
            eprintln!("{reason}");
            std::process::exit(2);
        }
    }
    Ok(())
}

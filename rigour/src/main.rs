//! Quality gates and governance for AI-agent code changes.
//!
//! `rigour check` runs the gate pipeline once; `rigour run` wraps an agent
//! command in the supervisor loop. The remaining commands drive the
//! checkpoint, agent-team and handoff state under `.rigour/`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::warn;

use rigour::core::drift::tail;
use rigour::core::packet::generate_fix_packet;
use rigour::exit_codes;
use rigour::governance::Governance;
use rigour::governance::checkpoint::CheckpointInput;
use rigour::io::agent::ShellAgentRunner;
use rigour::io::artifacts::{write_fix_packet, write_report};
use rigour::io::config::{CONFIG_FILE_NAME, ConfigError, PolicyConfig, load_config};
use rigour::io::git::Git;
use rigour::io::handoffs::{HandoffLog, HandoffStatus, NewHandoff};
use rigour::io::history::ScoreHistory;
use rigour::io::init::{InitOptions, init_project};
use rigour::logging;
use rigour::pipeline::GatePipeline;
use rigour::render::{render_cycle_summary, render_report_summary};
use rigour::supervisor::{SupervisorConfig, SupervisorStop, run_supervisor};

#[derive(Parser)]
#[command(
    name = "rigour",
    version,
    about = "Quality gates and governance for AI-agent code changes"
)]
struct Cli {
    /// Project root. Defaults to the current directory.
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    /// Policy file. Defaults to `<root>/rigour.toml`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Debug logging when RUST_LOG is unset.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default `rigour.toml` and create `.rigour/`.
    Init {
        /// Overwrite an existing policy file.
        #[arg(short, long)]
        force: bool,
    },
    /// Run every gate once and write the report (and fix packet on failure).
    Check {
        /// Print the report as JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },
    /// Run an agent command in a loop until the gates pass.
    Run {
        /// Overrides `supervisor.max_iterations`.
        #[arg(long)]
        iterations: Option<u32>,
        /// Stop after the first failing cycle.
        #[arg(long)]
        fail_fast: bool,
        /// Agent command, after `--`.
        #[arg(last = true, required = true, num_args = 1..)]
        agent: Vec<String>,
    },
    /// Record and close checkpoints of a long-running agent session.
    Checkpoint {
        #[command(subcommand)]
        action: CheckpointCommand,
    },
    /// Register agents and their file scopes.
    Agent {
        #[command(subcommand)]
        action: AgentCommand,
    },
    /// Hand tasks between agents.
    Handoff {
        #[command(subcommand)]
        action: HandoffCommand,
    },
    /// Show recent scores and the trend.
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum CheckpointCommand {
    Record {
        /// Progress 0-100.
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        progress: u8,
        /// Self-assessed quality 0-100.
        #[arg(long, value_parser = clap::value_parser!(u32).range(0..=100))]
        score: u32,
        #[arg(long, default_value = "")]
        summary: String,
        /// Changed file (repeatable).
        #[arg(long = "file")]
        files: Vec<String>,
        /// Also stamp this registered agent's last checkpoint.
        #[arg(long)]
        agent: Option<String>,
    },
    Complete,
    Abort {
        #[arg(long)]
        reason: String,
    },
    Status,
}

#[derive(Subcommand)]
enum AgentCommand {
    Register {
        agent_id: String,
        /// Glob the agent owns (repeatable).
        #[arg(long = "scope", required = true)]
        scope: Vec<String>,
    },
    Deregister {
        agent_id: String,
    },
    List,
}

#[derive(Subcommand)]
enum HandoffCommand {
    Create {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        task: String,
        /// File being handed over (repeatable).
        #[arg(long = "file")]
        files: Vec<String>,
        #[arg(long)]
        context: Option<String>,
    },
    Accept {
        id: String,
    },
    Reject {
        id: String,
    },
    Complete {
        id: String,
    },
    List {
        /// Only pending handoffs addressed to this agent.
        #[arg(long)]
        agent: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("rigour: {err:#}");
            exit_code_for(&err)
        }
    };
    std::process::exit(code);
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<ConfigError>().is_some() {
        exit_codes::CONFIG_ERROR
    } else {
        exit_codes::INTERNAL_ERROR
    }
}

struct Project {
    root: PathBuf,
    config_path: PathBuf,
}

impl Project {
    fn from_cli(cli: &Cli) -> Result<Self> {
        let root = match &cli.root {
            Some(root) => root.clone(),
            None => std::env::current_dir().context("resolve current directory")?,
        };
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| root.join(CONFIG_FILE_NAME));
        Ok(Self { root, config_path })
    }

    fn config(&self) -> Result<PolicyConfig> {
        load_config(&self.config_path)
    }
}

fn run(cli: Cli) -> Result<i32> {
    let project = Project::from_cli(&cli)?;
    let governance = Governance::default();
    match cli.command {
        Command::Init { force } => cmd_init(&project.root, force),
        Command::Check { json } => cmd_check(&project, &governance, json),
        Command::Run {
            iterations,
            fail_fast,
            agent,
        } => cmd_run(&project, &governance, iterations, fail_fast, agent),
        Command::Checkpoint { action } => cmd_checkpoint(&project, &governance, action),
        Command::Agent { action } => cmd_agent(&project.root, &governance, action),
        Command::Handoff { action } => cmd_handoff(&project.root, action),
        Command::History { limit } => cmd_history(&project.root, limit),
    }
}

fn cmd_init(root: &Path, force: bool) -> Result<i32> {
    let paths = init_project(root, &InitOptions { force })?;
    println!("wrote {}", paths.config_path.display());
    println!("created {}", paths.state_dir.display());
    Ok(exit_codes::PASS)
}

fn cmd_check(project: &Project, governance: &Governance, json: bool) -> Result<i32> {
    let config = project.config()?;
    let pipeline = GatePipeline::from_config(&config, governance)?;
    let report = pipeline.run(&project.root);
    write_report(&config.resolve(&project.root, &config.output.report_path), &report)?;

    let packet_path = config.resolve(&project.root, &config.output.fix_packet_path);
    if let Some(packet) = generate_fix_packet(&report, &config.packet_policy()) {
        write_fix_packet(&packet_path, &packet)?;
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("serialize report")?
        );
    } else {
        println!("{}", render_report_summary(&report)?);
        if !report.is_pass() {
            println!("Fix packet: {}", packet_path.display());
        }
    }
    Ok(if report.is_pass() {
        exit_codes::PASS
    } else {
        exit_codes::FAIL
    })
}

fn cmd_run(
    project: &Project,
    governance: &Governance,
    iterations: Option<u32>,
    fail_fast: bool,
    agent: Vec<String>,
) -> Result<i32> {
    let config = project.config()?;
    let pipeline = GatePipeline::from_config(&config, governance)?;
    let supervisor = SupervisorConfig::from_policy(&config, &project.root, iterations, fail_fast);
    let runner = ShellAgentRunner::new(agent);
    let git = Git::new(project.root.clone());

    let outcome = run_supervisor(
        &project.root,
        &pipeline,
        &runner,
        &git,
        &supervisor,
        |cycle| match render_cycle_summary(cycle) {
            Ok(text) => println!("{text}"),
            Err(err) => warn!(error = %format!("{err:#}"), "cycle summary failed to render"),
        },
    )?;

    match &outcome.stop {
        SupervisorStop::Passed => println!("All gates passed after {} cycle(s)", outcome.iterations),
        SupervisorStop::GuardTripped { changed, max } => println!(
            "Stopped: {} files changed in one cycle (max {max}), gates not run",
            changed.len()
        ),
        SupervisorStop::FailFast => println!("Stopped after first failing cycle (--fail-fast)"),
        SupervisorStop::BudgetExhausted => {
            println!("Gates still failing after {} cycle(s)", outcome.iterations);
        }
    }
    Ok(outcome.exit_code())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("serialize json")?
    );
    Ok(())
}

fn cmd_checkpoint(
    project: &Project,
    governance: &Governance,
    action: CheckpointCommand,
) -> Result<i32> {
    let root = &project.root;
    let config = project.config()?;
    let supervisor = governance.checkpoint_supervisor(&config);
    let now = Utc::now();
    match action {
        CheckpointCommand::Record {
            progress,
            score,
            summary,
            files,
            agent,
        } => {
            let outcome = supervisor.record(
                root,
                CheckpointInput {
                    progress_pct: progress,
                    files_changed: files,
                    summary,
                    quality_score: score,
                },
                now,
            )?;
            if let Some(agent) = agent {
                governance.roster().touch(root, &agent, now)?;
            }
            println!("recorded {}", outcome.entry.id);
            for warning in &outcome.entry.warnings {
                println!("warning: {warning}");
            }
            if outcome.should_continue {
                Ok(exit_codes::PASS)
            } else {
                println!("quality below threshold, stop and fix before continuing");
                Ok(exit_codes::FAIL)
            }
        }
        CheckpointCommand::Complete => {
            let session = supervisor.complete(root, now)?;
            println!(
                "session {} completed with {} checkpoint(s)",
                session.session_id,
                session.checkpoints.len()
            );
            Ok(exit_codes::PASS)
        }
        CheckpointCommand::Abort { reason } => {
            let session = supervisor.abort(root, &reason, now)?;
            println!("session {} aborted", session.session_id);
            Ok(exit_codes::PASS)
        }
        CheckpointCommand::Status => {
            match supervisor.session(root) {
                Some(session) => print_json(&session)?,
                None => println!("no checkpoint session"),
            }
            Ok(exit_codes::PASS)
        }
    }
}

fn cmd_agent(root: &Path, governance: &Governance, action: AgentCommand) -> Result<i32> {
    let roster = governance.roster();
    match action {
        AgentCommand::Register { agent_id, scope } => {
            let session = roster.register(root, &agent_id, scope, Utc::now())?;
            println!(
                "registered {agent_id} ({} agent(s) in session)",
                session.agents.len()
            );
            Ok(exit_codes::PASS)
        }
        AgentCommand::Deregister { agent_id } => {
            if roster.deregister(root, &agent_id)? {
                println!("deregistered {agent_id}");
                Ok(exit_codes::PASS)
            } else {
                println!("{agent_id} is not registered");
                Ok(exit_codes::FAIL)
            }
        }
        AgentCommand::List => {
            match roster.session(root) {
                Some(session) => print_json(&session.agents)?,
                None => println!("no agent session"),
            }
            Ok(exit_codes::PASS)
        }
    }
}

fn cmd_handoff(root: &Path, action: HandoffCommand) -> Result<i32> {
    let log = HandoffLog::new(root);
    let now = Utc::now();
    let transition = |id: &str, status: HandoffStatus| -> Result<i32> {
        let handoff = log.set_status(id, status, now)?;
        println!("{} {}", handoff.id, handoff.status.as_str());
        Ok(exit_codes::PASS)
    };
    match action {
        HandoffCommand::Create {
            from,
            to,
            task,
            files,
            context,
        } => {
            let handoff = log.initiate(
                NewHandoff {
                    from_agent: from,
                    to_agent: to,
                    task,
                    files,
                    context,
                },
                now,
            )?;
            println!("{}", handoff.id);
            Ok(exit_codes::PASS)
        }
        HandoffCommand::Accept { id } => transition(&id, HandoffStatus::Accepted),
        HandoffCommand::Reject { id } => transition(&id, HandoffStatus::Rejected),
        HandoffCommand::Complete { id } => transition(&id, HandoffStatus::Completed),
        HandoffCommand::List { agent } => {
            let handoffs = match agent {
                Some(agent) => log.pending_for(&agent)?,
                None => log.load()?,
            };
            print_json(&handoffs)?;
            Ok(exit_codes::PASS)
        }
    }
}

fn cmd_history(root: &Path, limit: usize) -> Result<i32> {
    let history = ScoreHistory::new(root);
    let entries = history.load()?;
    if entries.is_empty() {
        println!("no score history");
        return Ok(exit_codes::PASS);
    }
    let start = entries.len().saturating_sub(limit);
    for entry in &entries[start..] {
        println!(
            "{}  {:<4}  score {:>3}  ai {:>3}  structural {:>3}  failures {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.status.as_str(),
            entry.score,
            entry.ai_health_score,
            entry.structural_score,
            entry.failure_count
        );
    }
    let scores: Vec<f64> = entries.iter().map(|e| f64::from(e.score)).collect();
    let recent = tail(&scores, limit.max(1));
    let average = recent.iter().sum::<f64>() / recent.len() as f64;
    println!("average of last {}: {average:.1}", recent.len());
    if let Some(trend) = history.trend()? {
        println!(
            "trend: {} ({:+.1}, recent {:.1} vs previous {:.1})",
            trend.direction.as_str(),
            trend.delta,
            trend.recent_average,
            trend.previous_average
        );
    }
    Ok(exit_codes::PASS)
}

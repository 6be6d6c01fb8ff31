//! `crew` command-line interface.
//!
//! Runs the planner/coder/reviewer workflow against an agent CLI, replays
//! stored runs, and exposes the gated executor for one-off commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crew::agents::{CoderAgent, PlannerAgent, ReviewerAgent, TextGenerator};
use crew::engine::{Collaborators, EngineSettings, RunOptions, RunStatus, WorkflowEngine};
use crew::exit_codes;
use crew::io::agent_process::AgentProcess;
use crew::io::config::{CrewConfig, DEFAULT_CONFIG_PATH, load_config};
use crew::io::event_store::{EventHistory, JsonlEventStore};
use crew::io::executor::{CommandExecutor, ShellExecutor};
use crew::io::init::{InitOptions, init_crew};
use crew::io::search::{CommandSearch, NoSearch, SearchTool};
use crew::logging;

#[derive(Parser)]
#[command(
    name = "crew",
    version,
    about = "Plan, code, review and execute a task step by step"
)]
struct Cli {
    /// Path to the config file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// More diagnostics on stderr (-v info, -vv debug). `RUST_LOG` wins when set.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the default config file.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Run the workflow for a task and stream its events.
    Run {
        task: String,
        /// Use this run id instead of generating one.
        #[arg(long)]
        run_id: Option<String>,
    },
    /// Print the stored events of a run.
    History {
        run_id: String,
        /// One JSON record per line.
        #[arg(long)]
        json: bool,
    },
    /// Run a single command through the gated executor.
    Exec { command: String },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Run { task, run_id } => cmd_run(&cli.config, &task, run_id),
        Command::History { run_id, json } => cmd_history(&cli.config, &run_id, json),
        Command::Exec { command } => cmd_exec(&cli.config, &command),
    }
}

fn cmd_init(config_path: &Path, force: bool) -> Result<i32> {
    let paths = init_crew(config_path, &InitOptions { force })?;
    println!("wrote {}", paths.config_path.display());
    Ok(exit_codes::OK)
}

fn cmd_run(config_path: &Path, task: &str, run_id: Option<String>) -> Result<i32> {
    let cfg = load_config(config_path)?;
    let engine = build_engine(&cfg)?;
    let mut run = engine.run(
        task,
        RunOptions {
            run_id,
            ..RunOptions::default()
        },
    )?;
    println!("run id: {}", run.run_id());

    for event in run.by_ref() {
        println!("== {} ==\n{}\n", event.node_name(), event.content);
    }

    let summary = run.finish();
    if summary.sink_failures > 0 {
        eprintln!(
            "warning: {} event(s) could not be stored",
            summary.sink_failures
        );
    }
    Ok(match summary.status {
        RunStatus::Done => exit_codes::OK,
        RunStatus::Failed(_) | RunStatus::Running => exit_codes::RUN_FAILED,
    })
}

fn cmd_history(config_path: &Path, run_id: &str, json: bool) -> Result<i32> {
    let cfg = load_config(config_path)?;
    let store = JsonlEventStore::open(&cfg.workflow.events_dir)?;
    let records = store.history(run_id)?;
    for record in &records {
        if json {
            println!(
                "{}",
                serde_json::to_string(record).context("serialize event record")?
            );
        } else {
            println!(
                "[{}] {}/{}\n{}\n",
                record.timestamp.to_rfc3339(),
                record.agent_name,
                record.message_type,
                record.content
            );
        }
    }
    Ok(exit_codes::OK)
}

fn cmd_exec(config_path: &Path, command: &str) -> Result<i32> {
    let cfg = load_config(config_path)?;
    let result = ShellExecutor::new(&cfg.executor).execute(command)?;
    println!("{}", result.render());
    Ok(if result.is_success() {
        exit_codes::OK
    } else {
        exit_codes::COMMAND_FAILED
    })
}

fn build_engine(cfg: &CrewConfig) -> Result<WorkflowEngine> {
    let generator: Arc<dyn TextGenerator> = Arc::new(AgentProcess::new(&cfg.agent));
    let search: Arc<dyn SearchTool> = match CommandSearch::from_config(&cfg.search) {
        Some(search) => Arc::new(search),
        None => Arc::new(NoSearch),
    };
    let sink = JsonlEventStore::open(&cfg.workflow.events_dir)?;
    let collaborators = Collaborators {
        planner: Arc::new(
            PlannerAgent::new(Arc::clone(&generator)).with_search(Arc::clone(&search)),
        ),
        coder: Arc::new(CoderAgent::new(Arc::clone(&generator)).with_search(Arc::clone(&search))),
        reviewer: Arc::new(ReviewerAgent::new(generator).with_search(search)),
        executor: Arc::new(ShellExecutor::new(&cfg.executor)),
        sink: Arc::new(sink),
    };
    WorkflowEngine::new(collaborators, EngineSettings::from_config(cfg))
}

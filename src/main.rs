use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

mod cli;

use cli::Cli;
use cli::commands::Commands;
use steward::audit::VaultAuditSink;
use steward::config::Config;
use steward::domain::{keys, parse_history};
use steward::engine::CompletionEngine;
use steward::executor::build_executor;
use steward::intake::Intake;
use steward::policy::TierPolicy;
use steward::scheduler::{PriorityTable, Scheduler, dispatch_queue};
use steward::store::{TaskStore, VaultStore};

fn setup_logging(level: &str) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("steward")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("steward.log");

    // Setup env_logger with file output; RUST_LOG wins over the config
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// Shutdown channel fed by Ctrl-C
fn shutdown_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            let _ = tx.send(true);
        }
    });
    rx
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Init => handle_init_command(config),
        Commands::Run => handle_run_command(config).await,
        Commands::Watch => handle_watch_command(config).await,
        Commands::List { all } => handle_list_command(*all, config),
        Commands::Status { id } => handle_status_command(id, config),
    }
}

fn handle_init_command(config: &Config) -> Result<()> {
    let store = VaultStore::new(config.vault.clone());
    let intact = store.verify_layout().context("Failed to create vault layout")?;
    if intact {
        println!("{} {}", "Vault already initialized:".green(), config.vault.root.display());
    } else {
        println!("{} {}", "Vault initialized:".green(), config.vault.root.display());
    }
    for dir in config.vault.directories() {
        println!("  {}", dir.display());
    }

    let handbook = config.vault.handbook_path();
    if handbook.is_file() {
        println!("{} {}", "Handbook:".green(), handbook.display());
    } else {
        println!(
            "{} {} (the scheduler will not start without it)",
            "Handbook missing:".red(),
            handbook.display()
        );
    }
    Ok(())
}

async fn handle_run_command(config: &Config) -> Result<()> {
    let store = Arc::new(VaultStore::new(config.vault.clone()));
    let audit = Arc::new(VaultAuditSink::new(config.vault.logs_path()));
    let executor = build_executor(&config.executor).context("Failed to build executor")?;
    println!("{} {}", "Executor:".cyan(), executor.name());

    let engine = CompletionEngine::new(store, executor, audit, config);
    let mut scheduler = Scheduler::new(engine, config);

    println!("{}", "Scheduler running, Ctrl-C to stop".cyan());
    scheduler
        .run(shutdown_on_ctrl_c())
        .await
        .context("Scheduler refused to start")?;

    println!(
        "{} {} tasks completed this session",
        "Stopped:".yellow(),
        scheduler.completed_total()
    );
    Ok(())
}

async fn handle_watch_command(config: &Config) -> Result<()> {
    let store = Arc::new(VaultStore::new(config.vault.clone()));
    let audit = Arc::new(VaultAuditSink::new(config.vault.logs_path()));
    let mut intake = Intake::new(store, audit, config).context("Failed to set up intake")?;

    println!(
        "{} {}, Ctrl-C to stop",
        "Watching".cyan(),
        config.vault.inbox_path().display()
    );
    intake.run(shutdown_on_ctrl_c()).await.context("Intake failed")?;
    println!("{}", "Stopped".yellow());
    Ok(())
}

fn handle_list_command(all: bool, config: &Config) -> Result<()> {
    let store = VaultStore::new(config.vault.clone());
    let priorities = PriorityTable::new(&config.priority);
    let tiers = TierPolicy::new(&config.tiers);

    let pending = store.list_pending().context("Failed to list pending tasks")?;
    let tasks = if all {
        let mut tasks = pending;
        priorities.sort(&mut tasks);
        tasks
    } else {
        dispatch_queue(&priorities, pending)
    };

    if tasks.is_empty() {
        println!("{}", "No pending tasks".yellow());
        return Ok(());
    }

    for task in &tasks {
        let tier = tiers.classify(&task.metadata, &task.body);
        let tier_text = if tier.requires_approval() {
            tier.to_string().red()
        } else {
            tier.to_string().normal()
        };
        let kind = if task.is_escalation() { " [escalation]".magenta() } else { "".normal() };
        println!(
            "{:<4} {:<12} {:<7} {}{}",
            task.priority().unwrap_or(&config.priority.default_label),
            task.status().as_str(),
            tier_text,
            task.id,
            kind
        );
    }
    Ok(())
}

fn handle_status_command(id: &str, config: &Config) -> Result<()> {
    let store = VaultStore::new(config.vault.clone());
    let task = store.read(id).with_context(|| format!("Failed to read task {}", id))?;

    let title = task.metadata.get(keys::TITLE).unwrap_or(task.id.as_str());
    println!("{} {}", "Task:".green(), title);
    println!("  {:<18} {}", "id", task.id);
    for (key, value) in task.metadata.iter() {
        println!("  {:<18} {}", key, value);
    }

    let history = parse_history(&task.body);
    if history.is_empty() {
        println!("{}", "No transitions recorded".yellow());
    } else {
        println!("{}", "History:".green());
        for record in history {
            println!(
                "  {}  {} -> {}  {} ({})",
                record.at, record.from, record.to, record.action, record.actor
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Setup logging once the configured level is known
    let level = if cli.is_verbose() {
        "debug"
    } else {
        config.log_level.as_deref().unwrap_or("info")
    };
    setup_logging(level).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}

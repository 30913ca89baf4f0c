use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kiln_core::model::RuntimeType;
use kiln_core::{
    Criteria, EnvironmentAccess, KilnClient, KilnConfig, RuntimeAccess, SnapshotAccess,
    credits_for_duration, max_duration_for_credits,
};
use serde::Serialize;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "kiln", about = "Kiln: provision, reuse and snapshot remote compute runtimes")]
struct Cli {
    /// Config file (default: ~/.kiln/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List environments offered by the platform
    Envs {
        /// Bypass the cached catalog
        #[arg(long)]
        refresh: bool,
    },
    /// Manage runtimes
    #[command(subcommand)]
    Runtimes(RuntimesCommand),
    /// Manage snapshots
    #[command(subcommand)]
    Snapshots(SnapshotsCommand),
    /// Convert between minutes and credits offline
    #[command(subcommand)]
    Budget(BudgetCommand),
}

#[derive(Subcommand)]
enum RuntimesCommand {
    /// List every runtime
    List,
    /// Reuse, restore or create a runtime
    Ensure {
        #[arg(long)]
        env: Option<String>,
        /// Credit ceiling for reuse and creation
        #[arg(long)]
        credits: Option<f64>,
        /// Prefer an already running runtime in the environment
        #[arg(long)]
        reuse: bool,
        /// Restore from this snapshot uid
        #[arg(long)]
        snapshot: Option<String>,
        /// notebook, terminal or job
        #[arg(long = "type")]
        runtime_type: Option<RuntimeType>,
        #[arg(long)]
        name: Option<String>,
        /// Block until the runtime is running
        #[arg(long)]
        wait: bool,
    },
    /// Wait for a runtime to become ready
    Wait {
        pod_name: String,
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Delete one runtime
    Delete { pod_name: String },
    /// Delete every runtime and report each outcome
    TerminateAll,
}

#[derive(Subcommand)]
enum SnapshotsCommand {
    List,
    /// Snapshot a runtime
    Create {
        pod_name: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Stop the runtime once the snapshot is taken
        #[arg(long)]
        stop: bool,
    },
    /// Start a new runtime from a snapshot
    Restore {
        uid: String,
        /// Environment to restore into instead of the snapshot's own
        #[arg(long)]
        env: Option<String>,
        /// Runtime budget in minutes
        #[arg(long)]
        minutes: Option<u64>,
    },
    Delete { uid: String },
}

#[derive(Subcommand)]
enum BudgetCommand {
    /// Credits needed for a number of minutes
    Credits {
        #[arg(long)]
        minutes: u64,
        /// Burning rate in credits per hour
        #[arg(long)]
        rate: f64,
    },
    /// Whole minutes a number of credits buys
    Minutes {
        #[arg(long)]
        credits: u64,
        #[arg(long)]
        rate: f64,
    },
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries JSON results, so logs go to stderr
    fmt()
        .with_env_filter(EnvFilter::from_env("KILN_LOG"))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Command::Budget(cmd) = &cli.command {
        return run_budget(cmd);
    }

    let config = KilnConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    let client = config.build_client()?;
    tracing::debug!(provider = ?config.platform.provider, "Client ready");

    match cli.command {
        Command::Envs { refresh } => print_json(&client.list_environments(refresh).await?),
        Command::Runtimes(cmd) => run_runtimes(&client, &config, cmd).await,
        Command::Snapshots(cmd) => run_snapshots(&client, cmd).await,
        Command::Budget(_) => Ok(()),
    }
}

fn run_budget(cmd: &BudgetCommand) -> Result<()> {
    match *cmd {
        BudgetCommand::Credits { minutes, rate } => print_json(&serde_json::json!({
            "minutes": minutes,
            "rate": rate,
            "credits": credits_for_duration(minutes, rate),
        })),
        BudgetCommand::Minutes { credits, rate } => print_json(&serde_json::json!({
            "credits": credits,
            "rate": rate,
            "minutes": max_duration_for_credits(credits, rate),
        })),
    }
}

async fn run_runtimes(client: &KilnClient, config: &KilnConfig, cmd: RuntimesCommand) -> Result<()> {
    match cmd {
        RuntimesCommand::List => {
            let records = client
                .list_runtimes()
                .await?
                .into_iter()
                .map(|h| h.into_record())
                .collect::<Result<Vec<_>, _>>()?;
            print_json(&records)
        }
        RuntimesCommand::Ensure {
            env,
            credits,
            reuse,
            snapshot,
            runtime_type,
            name,
            wait,
        } => {
            let criteria = Criteria {
                environment_name: env.or_else(|| config.defaults.environment.clone()),
                credits_limit: credits,
                reuse_existing: reuse || config.defaults.reuse_existing,
                snapshot_id: snapshot,
                runtime_type,
                given_name: name,
                wait_until_ready: wait,
            };
            let handle = client.ensure(&criteria).await?;
            print_json(handle.record()?)
        }
        RuntimesCommand::Wait {
            pod_name,
            timeout_ms,
        } => {
            let mut handle = client.get_runtime(&pod_name).await?;
            let record = client
                .wait_until_ready(&mut handle, timeout_ms.map(Duration::from_millis))
                .await?;
            print_json(record)
        }
        RuntimesCommand::Delete { pod_name } => {
            let mut handle = client.get_runtime(&pod_name).await?;
            handle.delete().await?;
            print_json(&serde_json::json!({ "deleted": pod_name }))
        }
        RuntimesCommand::TerminateAll => {
            let results = client.terminate_all().await?;
            let failed = results.iter().filter(|t| !t.outcome.is_success()).count();
            print_json(&results)?;
            if failed > 0 {
                anyhow::bail!("{failed} of {} runtime(s) could not be terminated", results.len());
            }
            Ok(())
        }
    }
}

async fn run_snapshots(client: &KilnClient, cmd: SnapshotsCommand) -> Result<()> {
    match cmd {
        SnapshotsCommand::List => {
            let handles = client.list_snapshots().await?;
            let records = handles
                .iter()
                .map(|h| h.record())
                .collect::<Result<Vec<_>, _>>()?;
            print_json(&records)
        }
        SnapshotsCommand::Create {
            pod_name,
            name,
            description,
            stop,
        } => {
            let handle = client
                .create_snapshot(&pod_name, &name, &description, stop)
                .await?;
            print_json(handle.record()?)
        }
        SnapshotsCommand::Restore { uid, env, minutes } => {
            let handle = client
                .restore_from_snapshot(uid.as_str().into(), env.as_deref(), minutes)
                .await?;
            print_json(handle.record()?)
        }
        SnapshotsCommand::Delete { uid } => {
            let mut handle = client.get_snapshot(&uid).await?;
            handle.delete().await?;
            print_json(&serde_json::json!({ "deleted": uid }))
        }
    }
}

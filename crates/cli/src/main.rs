// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! e2epool CLI: controller/worker/scheduler processes, the runner-side
//! agent daemon, and the checkpoint commands that talk to it.

mod commands;
mod exit_error;

use clap::{Parser, Subcommand, ValueEnum};
use exit_error::ExitError;

#[derive(Parser)]
#[command(name = "e2epool", version, about = "CI runner pool with checkpointed environments")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StatusArg {
    Success,
    Failure,
    Canceled,
}

impl StatusArg {
    fn as_str(self) -> &'static str {
        match self {
            StatusArg::Success => "success",
            StatusArg::Failure => "failure",
            StatusArg::Canceled => "canceled",
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Run the controller (HTTP/WebSocket surface)
    Controller,

    /// Run a finalize worker
    Worker,

    /// Run the periodic scheduler (GC, poller, reconciler)
    Scheduler,

    /// Start the e2epool agent daemon (foreground)
    Agent {
        /// Path to agent config YAML
        #[arg(long)]
        config: Option<String>,
    },

    /// Create a checkpoint via the local agent
    Create {
        /// CI job identifier
        #[arg(long)]
        job_id: String,
        /// Agent IPC socket path
        #[arg(long)]
        socket: Option<String>,
    },

    /// Finalize a checkpoint via the local agent
    Finalize {
        /// Checkpoint name
        #[arg(long)]
        checkpoint: String,
        /// Job outcome
        #[arg(long, value_enum)]
        status: StatusArg,
        /// Agent IPC socket path
        #[arg(long)]
        socket: Option<String>,
    },

    /// Query checkpoint status via the local agent
    Status {
        /// Checkpoint name
        #[arg(long)]
        checkpoint: String,
        /// Agent IPC socket path
        #[arg(long)]
        socket: Option<String>,
    },

    /// Import a YAML inventory file into the runner registry
    ImportInventory {
        /// Path to the inventory file
        #[arg(long)]
        path: String,
        /// Validate and report without writing
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli.command).await {
        eprintln!("Error: {e}");
        std::process::exit(e.code);
    }
}

async fn run(command: Command) -> Result<(), ExitError> {
    match command {
        Command::Controller => commands::serve::controller().await,
        Command::Worker => commands::serve::worker().await,
        Command::Scheduler => commands::serve::scheduler().await,
        Command::Agent { config } => commands::agent::run(config.as_deref()).await,
        Command::Create { job_id, socket } => {
            commands::checkpoint::create(&job_id, socket.as_deref()).await
        }
        Command::Finalize {
            checkpoint,
            status,
            socket,
        } => commands::checkpoint::finalize(&checkpoint, status.as_str(), socket.as_deref()).await,
        Command::Status { checkpoint, socket } => {
            commands::checkpoint::status(&checkpoint, socket.as_deref()).await
        }
        Command::ImportInventory { path, dry_run } => {
            commands::inventory::import(&path, dry_run).await
        }
    }
}

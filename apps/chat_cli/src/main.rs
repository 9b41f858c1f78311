use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{ClientController, PollOutcome, UploadFile, UploadOutcome};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod render;

use commands::{parse_command, ReplCommand, HELP};
use config::{load_settings, Settings};

/// Upload a model to a chat backend, wait for it to start, then talk to it.
#[derive(Parser, Debug)]
#[command(name = "chat_cli", version)]
struct Args {
    /// Config file; defaults to ./chat_cli.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    server_url: Option<String>,
    /// Model file to upload before chatting.
    #[arg(long)]
    file: Option<PathBuf>,
    #[arg(long)]
    max_attempts: Option<u32>,
    #[arg(long)]
    interval_ms: Option<u64>,
    #[arg(long, default_value = "info")]
    log_filter: String,
}

impl Args {
    fn apply(&self, settings: &mut Settings) {
        if let Some(v) = &self.server_url {
            settings.server_url = v.clone();
        }
        if let Some(v) = self.max_attempts {
            settings.poll_max_attempts = v;
        }
        if let Some(v) = self.interval_ms {
            settings.poll_interval_ms = v;
        }
    }
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_filter);

    let mut settings = load_settings(args.config.as_deref())?;
    args.apply(&mut settings);
    let backend = settings.backend()?;
    info!(server_url = backend.server_url(), "chat_cli starting");

    let controller = ClientController::with_config(Arc::new(backend), settings.controller_config());
    let renderer = tokio::spawn(render::run(controller.subscribe(), std::io::stdout()));

    match &args.file {
        Some(path) => {
            let file = UploadFile::from_path(path)
                .await
                .with_context(|| format!("cannot read model file '{}'", path.display()))?;
            match controller.upload_model(Some(file)).await {
                UploadOutcome::Completed {
                    poll: PollOutcome::Ready { .. },
                    ..
                } => {}
                outcome => info!(?outcome, "upload did not reach a ready model"),
            }
        }
        None => {
            let outcome = controller.poll_ready().await;
            info!(?outcome, "readiness check finished");
        }
    }

    run_prompt(&controller).await?;

    drop(controller);
    let _ = renderer.await;
    Ok(())
}

async fn run_prompt(controller: &Arc<ClientController>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        match parse_command(&line) {
            ReplCommand::Send(text) => {
                controller.send_text(text).await;
            }
            ReplCommand::Clear => controller.clear().await,
            ReplCommand::Reload => {
                controller.reload().await;
                println!("state discarded; use /restart or run again with --file to load a model");
            }
            ReplCommand::Restart => {
                let outcome = controller.restart_model().await;
                info!(?outcome, "restart finished");
            }
            ReplCommand::Status => {
                let state = controller.snapshot().await;
                println!(
                    "status: {} | panel: {:?} | phase: {:?} | messages: {}",
                    state.status_text,
                    state.panel,
                    state.phase,
                    state.messages.len()
                );
            }
            ReplCommand::Help => println!("{HELP}"),
            ReplCommand::Quit => break,
            ReplCommand::Unknown(name) => println!("unknown command {name}; try /help"),
        }
    }
    Ok(())
}

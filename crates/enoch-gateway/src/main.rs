use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use enoch_agent::{ContextWindow, Dispatcher, JobQueue, Worker};
use enoch_core::EnochConfig;
use enoch_exec::{Executor, ExecutorConfig};
use enoch_memory::NotebookManager;
use enoch_telegram::{HttpBotApi, TelegramAdapter, TelegramSink, UpdateHandler};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod logging;

/// Relay Telegram messages to a local agent CLI and send back its output.
#[derive(Parser)]
#[command(name = "enoch", version)]
struct Cli {
    /// TOML config file (default: ./enoch.toml)
    #[arg(long, short, env = "ENOCH_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = EnochConfig::load(cli.config.as_deref()).context("invalid configuration")?;
    logging::init(&config.log)?;

    let exec_config = ExecutorConfig::from(&config.agent);
    info!(
        command = %exec_config.command,
        args = ?exec_config.args,
        prompt_mode = ?exec_config.prompt_mode,
        timeout_secs = exec_config.timeout.as_secs_f64(),
        use_tty = exec_config.use_tty,
        workdir = %exec_config.workdir,
        "agent configured"
    );
    if config.telegram.allowed_chat_id.trim().is_empty() {
        warn!("telegram.allowed_chat_id is empty: every chat can use this bot");
    }

    let context = Arc::new(ContextWindow::new(config.telegram.context_size));
    let (queue, rx) = JobQueue::new(config.telegram.queue_capacity);
    let queue = Arc::new(queue);
    let memory = Arc::new(NotebookManager::new(&config.memory.root));
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&queue),
        Arc::clone(&context),
        memory,
    ));

    let api = Arc::new(HttpBotApi::new(&config.telegram).context("telegram client")?);
    let sink = Arc::new(TelegramSink::new(
        Arc::clone(&api),
        config.telegram.typing_interval(),
        config.agent.progress_interval(),
    ));

    let shutdown = CancellationToken::new();
    let worker = Worker::new(
        Arc::clone(&queue),
        rx,
        context,
        Arc::new(Executor::new(exec_config)),
        sink,
    )
    .spawn(shutdown.clone());

    let handler = UpdateHandler::new(
        Arc::clone(&api),
        Arc::clone(&queue),
        dispatcher,
        config.telegram.allowed_chat_id.clone(),
    );
    let poller = tokio::spawn(TelegramAdapter::new(api, handler, &config.telegram).run(shutdown.clone()));

    info!(
        queue_capacity = config.telegram.queue_capacity,
        context_size = config.telegram.context_size,
        "enoch started"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("shutdown requested");
    shutdown.cancel();

    if let Err(e) = poller.await {
        warn!(error = %e, "poller task ended abnormally");
    }
    // Abandon any in-flight job; dropping the executor future kills the child.
    worker.abort();
    let _ = worker.await;
    info!("enoch stopped");
    Ok(())
}

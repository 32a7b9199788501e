//! The single background worker draining the job queue.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use enoch_core::{ChatId, Job, Role, TraceId};
use enoch_exec::{ExecError, Executor};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::context::ContextWindow;
use crate::queue::{JobQueue, JobReceiver};

/// Sent instead of the raw error when the agent fails.
pub const FAILURE_REPLY: &str = "Processing failed, please try again later.";

/// Runs the agent for one prompt.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn run(&self, prompt: &str) -> Result<String, ExecError>;
}

#[async_trait]
impl AgentRunner for Executor {
    async fn run(&self, prompt: &str) -> Result<String, ExecError> {
        Executor::run(self, prompt).await
    }
}

/// Outbound side of the worker.
#[async_trait]
pub trait ReplySink: Send + Sync {
    /// Dropping the handle stops every liveness signal it started.
    type Liveness: Send;
    type Error: Display + Send;

    fn start_liveness(&self, chat: ChatId, trace: &TraceId) -> Self::Liveness;

    async fn send_reply(&self, chat: ChatId, text: &str, trace: &TraceId)
        -> Result<(), Self::Error>;
}

/// Sole consumer of the job queue. At most one agent process runs at a time.
pub struct Worker<R, S> {
    queue: Arc<JobQueue>,
    rx: JobReceiver,
    context: Arc<ContextWindow>,
    runner: Arc<R>,
    sink: Arc<S>,
}

impl<R, S> Worker<R, S>
where
    R: AgentRunner + 'static,
    S: ReplySink + 'static,
{
    pub fn new(
        queue: Arc<JobQueue>,
        rx: JobReceiver,
        context: Arc<ContextWindow>,
        runner: Arc<R>,
        sink: Arc<S>,
    ) -> Self {
        Self {
            queue,
            rx,
            context,
            runner,
            sink,
        }
    }

    pub fn spawn(self, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Drain jobs in FIFO order until `shutdown` fires.
    ///
    /// While paused the worker holds off between jobs; an in-flight job is
    /// never interrupted.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("worker started");
        loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => None,
                job = self.next_job() => job,
            };
            match next {
                Some(job) => self.process(job).await,
                None => {
                    info!("worker stopped");
                    return;
                }
            }
        }
    }

    async fn next_job(&mut self) -> Option<Job> {
        self.queue.wait_until_resumed().await;
        let job = self.rx.recv().await?;
        // A pause may have arrived while we were parked on recv.
        self.queue.wait_until_resumed().await;
        Some(job)
    }

    async fn process(&self, job: Job) {
        let _running = self.queue.mark_running(&job.trace);
        let trace = &job.trace;

        let liveness = self.sink.start_liveness(job.chat_id, trace);
        let started = Instant::now();
        info!(trace = %trace, "agent start");

        let prompt = self.context.build_prompt(job.chat_id, &job.text);
        let result = self.runner.run(&prompt).await;
        drop(liveness);

        let duration_ms = started.elapsed().as_millis() as u64;
        let (reply, succeeded) = match result {
            Ok(reply) => {
                info!(trace = %trace, duration_ms, bytes = reply.len(), "agent ok");
                (reply, true)
            }
            Err(e) => {
                error!(trace = %trace, duration_ms, error = %e, "agent failed");
                (FAILURE_REPLY.to_string(), false)
            }
        };

        if reply.trim().is_empty() {
            warn!(trace = %trace, duration_ms, "agent returned an empty reply");
            return;
        }

        if let Err(e) = self.sink.send_reply(job.chat_id, &reply, trace).await {
            error!(trace = %trace, error = %e, "reply delivery failed");
            return;
        }

        if succeeded {
            self.context.append(job.chat_id, Role::User, &job.text);
            self.context.append(job.chat_id, Role::Assistant, &reply);
        }
        info!(trace = %trace, chat_id = %job.chat_id, bytes = reply.len(), "reply sent");
    }
}

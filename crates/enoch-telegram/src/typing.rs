//! Liveness signals shown while the agent runs.
//!
//! Two independent tickers per job: the typing indicator (sent immediately,
//! then every `typing` interval, since Telegram expires it after ~5s) and a
//! coarser "still working" message. Dropping the handle aborts both.

use std::sync::Arc;
use std::time::Duration;

use enoch_core::{ChatId, TraceId};
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::api::BotApi;

pub const PROGRESS_MESSAGE: &str = "Still working on it...";

/// Handle to the background liveness tasks of one job.
#[must_use = "liveness stops as soon as the handle is dropped"]
pub struct LivenessHandle(Vec<JoinHandle<()>>);

impl LivenessHandle {
    /// Spawn the tickers that are enabled (`Some`).
    pub fn start<A: BotApi + 'static>(
        api: Arc<A>,
        chat: ChatId,
        trace: TraceId,
        typing: Option<Duration>,
        progress: Option<Duration>,
    ) -> Self {
        let mut tasks = Vec::with_capacity(2);
        if let Some(every) = typing {
            tasks.push(tokio::spawn(typing_loop(
                Arc::clone(&api),
                chat,
                trace.clone(),
                every,
            )));
        }
        if let Some(every) = progress {
            tasks.push(tokio::spawn(progress_loop(api, chat, trace, every)));
        }
        LivenessHandle(tasks)
    }

    /// Abort every ticker now.
    pub fn stop(self) {}
}

impl Drop for LivenessHandle {
    fn drop(&mut self) {
        for task in &self.0 {
            task.abort();
        }
    }
}

async fn typing_loop<A: BotApi>(api: Arc<A>, chat: ChatId, trace: TraceId, every: Duration) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        match api.send_typing(chat).await {
            Ok(()) => debug!(trace = %trace, "typing sent"),
            Err(e) => warn!(trace = %trace, error = %e, "sendChatAction failed"),
        }
    }
}

async fn progress_loop<A: BotApi>(api: Arc<A>, chat: ChatId, trace: TraceId, every: Duration) {
    let mut ticker = interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        match api.send_message(chat, PROGRESS_MESSAGE).await {
            Ok(()) => debug!(trace = %trace, "progress update sent"),
            Err(e) => warn!(trace = %trace, error = %e, "progress update failed"),
        }
    }
}

//! Telegram channel adapter.
//!
//! Drives the `getUpdates` long-poll loop until shutdown. Transport errors
//! back off exponentially (doubling, capped at 60s); a successful poll resets
//! the backoff to the configured poll interval.

use std::sync::Arc;
use std::time::Duration;

use enoch_core::config::TelegramConfig;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::api::BotApi;
use crate::error::Result;
use crate::handler::UpdateHandler;

/// Upper bound for the error backoff.
pub const BACKOFF_CEILING: Duration = Duration::from_secs(60);

/// Double `current`, capped at `ceiling`. A zero backoff jumps straight to the cap.
pub fn next_backoff(current: Duration, ceiling: Duration) -> Duration {
    if current.is_zero() {
        return ceiling;
    }
    current.saturating_mul(2).min(ceiling)
}

pub struct TelegramAdapter<A> {
    api: Arc<A>,
    handler: UpdateHandler<A>,
    poll_interval: Duration,
    poll_timeout_secs: u64,
    /// Next `update_id` to ask for. `None` until the first update arrives.
    offset: Option<i64>,
}

impl<A: BotApi> TelegramAdapter<A> {
    pub fn new(api: Arc<A>, handler: UpdateHandler<A>, config: &TelegramConfig) -> Self {
        Self {
            api,
            handler,
            poll_interval: config.poll_interval(),
            poll_timeout_secs: config.poll_timeout_secs,
            offset: None,
        }
    }

    pub fn offset(&self) -> Option<i64> {
        self.offset
    }

    /// Fetch one batch and handle every update in order.
    ///
    /// The cursor moves past each update before it is handled, so an update
    /// is never fetched twice even when it is ignored.
    pub async fn poll_once(&mut self) -> Result<usize> {
        let updates = self
            .api
            .get_updates(self.offset, self.poll_timeout_secs)
            .await?;
        debug!(count = updates.len(), "getUpdates ok");
        for update in &updates {
            self.offset = Some(update.update_id + 1);
            self.handler.handle(update).await;
        }
        Ok(updates.len())
    }

    /// Poll until `shutdown` is cancelled.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            poll_timeout_secs = self.poll_timeout_secs,
            "telegram poller started"
        );
        let mut backoff = self.poll_interval;
        loop {
            let result = tokio::select! {
                _ = shutdown.cancelled() => break,
                result = self.poll_once() => result,
            };
            let pause = match result {
                Ok(_) => {
                    backoff = self.poll_interval;
                    self.poll_interval
                }
                Err(e) => {
                    error!(error = %e, retry_in_ms = backoff.as_millis() as u64, "getUpdates failed");
                    let wait = backoff;
                    backoff = next_backoff(backoff, BACKOFF_CEILING);
                    wait
                }
            };
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }
        info!("telegram poller stopped");
    }
}

#[cfg(test)]
mod tests {
    use enoch_agent::{ContextWindow, Dispatcher, JobQueue};
    use enoch_memory::NotebookManager;

    use crate::handler::ACK_QUEUED;
    use crate::testing::{text_update, transport_error, RecordingApi};

    use super::*;

    #[test]
    fn backoff_doubles_up_to_the_ceiling() {
        let ceiling = Duration::from_secs(60);
        let mut b = Duration::from_secs(2);
        let mut seen = Vec::new();
        for _ in 0..7 {
            b = next_backoff(b, ceiling);
            seen.push(b.as_secs());
        }
        assert_eq!(seen, vec![4, 8, 16, 32, 60, 60, 60]);
        assert_eq!(next_backoff(Duration::ZERO, ceiling), ceiling);
    }

    struct Rig {
        adapter: TelegramAdapter<RecordingApi>,
        api: Arc<RecordingApi>,
        queue: Arc<JobQueue>,
        _rx: enoch_agent::JobReceiver,
        _dir: tempfile::TempDir,
    }

    fn rig() -> Rig {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(RecordingApi::default());
        let (queue, rx) = JobQueue::new(8);
        let queue = Arc::new(queue);
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&queue),
            Arc::new(ContextWindow::new(0)),
            Arc::new(NotebookManager::new(dir.path())),
        ));
        let handler = UpdateHandler::new(Arc::clone(&api), Arc::clone(&queue), dispatcher, "");
        let config = TelegramConfig {
            poll_interval_secs: 1.0,
            ..TelegramConfig::default()
        };
        Rig {
            adapter: TelegramAdapter::new(Arc::clone(&api), handler, &config),
            api,
            queue,
            _rx: rx,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn cursor_advances_past_every_update() {
        let mut r = rig();
        r.api.push_poll(Ok(vec![
            text_update(40, 1, "a"),
            crate::api::Update { update_id: 41, message: None, edited_message: None },
            text_update(42, 1, ""),
        ]));
        r.api.push_poll(Ok(Vec::new()));

        assert_eq!(r.adapter.poll_once().await.unwrap(), 3);
        assert_eq!(r.adapter.offset(), Some(43));
        r.adapter.poll_once().await.unwrap();

        assert_eq!(r.api.offsets(), vec![None, Some(43)]);
        assert_eq!(r.queue.depth(), 1);
    }

    #[tokio::test]
    async fn failed_poll_keeps_the_cursor() {
        let mut r = rig();
        r.api.push_poll(Ok(vec![text_update(7, 1, "a")]));
        r.api.push_poll(Err(transport_error()));

        r.adapter.poll_once().await.unwrap();
        assert!(r.adapter.poll_once().await.is_err());
        assert_eq!(r.adapter.offset(), Some(8));
    }

    #[tokio::test(start_paused = true)]
    async fn run_retries_after_errors_and_stops_on_shutdown() {
        let r = rig();
        r.api.push_poll(Err(transport_error()));
        r.api.push_poll(Err(transport_error()));
        r.api.push_poll(Ok(vec![text_update(100, 9, "hello")]));

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(r.adapter.run(shutdown.clone()));

        // Two failures back off 1s then 2s; the third poll succeeds.
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        let offsets = r.api.offsets();
        assert_eq!(offsets[..3], [None::<i64>; 3]);
        assert_eq!(r.api.texts(), vec![ACK_QUEUED]);

        shutdown.cancel();
        task.await.unwrap();
        assert!(r.api.offsets().iter().skip(3).all(|o| *o == Some(101)));
    }

    #[tokio::test(start_paused = true)]
    async fn successful_poll_resets_the_backoff() {
        let r = rig();
        r.api.push_poll(Err(transport_error()));
        r.api.push_poll(Ok(vec![text_update(100, 9, "hello")]));
        r.api.push_poll(Err(transport_error()));

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(r.adapter.run(shutdown.clone()));

        // Polls at 0s (fail), 1s (ok), 2s (fail), then 3s: the second
        // failure waits the base 1s again instead of the doubled 2s.
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(r.api.offsets(), vec![None, None, Some(101), Some(101)]);

        shutdown.cancel();
        task.await.unwrap();
    }
}

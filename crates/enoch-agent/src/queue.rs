//! Bounded job hand-off between the poller (producer) and the worker (sole consumer).

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use enoch_core::{Job, TraceId};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::EnqueueError;

/// How often a paused worker re-checks the pause flag.
pub const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Accepted by [`JobQueue::try_enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueAck {
    Queued,
    /// Accepted, but the worker will not start it until resumed.
    QueuedWhilePaused,
}

#[derive(Debug, Default)]
struct WorkerState {
    paused: bool,
    running: bool,
    current_trace: Option<TraceId>,
}

/// Point-in-time view for the status command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerStatus {
    pub paused: bool,
    pub running: bool,
    pub current_trace: Option<TraceId>,
    pub queue_depth: usize,
    pub capacity: usize,
}

/// Receiving half, owned by the single worker.
pub struct JobReceiver(mpsc::Receiver<Job>);

impl JobReceiver {
    pub(crate) async fn recv(&mut self) -> Option<Job> {
        self.0.recv().await
    }
}

/// Producer half plus the worker state shared with the status command.
pub struct JobQueue {
    tx: mpsc::Sender<Job>,
    state: Mutex<WorkerState>,
    pause_poll: Duration,
}

impl JobQueue {
    pub fn new(capacity: usize) -> (Self, JobReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let queue = Self {
            tx,
            state: Mutex::new(WorkerState::default()),
            pause_poll: PAUSE_POLL_INTERVAL,
        };
        (queue, JobReceiver(rx))
    }

    pub fn with_pause_poll(mut self, every: Duration) -> Self {
        self.pause_poll = every;
        self
    }

    fn state(&self) -> MutexGuard<'_, WorkerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Hand a job to the worker without blocking.
    pub fn try_enqueue(&self, job: Job) -> Result<EnqueueAck, EnqueueError> {
        let trace = job.trace.clone();
        match self.tx.try_send(job) {
            Ok(()) => {
                debug!(trace = %trace, depth = self.depth(), "job queued");
                if self.is_paused() {
                    Ok(EnqueueAck::QueuedWhilePaused)
                } else {
                    Ok(EnqueueAck::Queued)
                }
            }
            Err(mpsc::error::TrySendError::Full(_)) => Err(EnqueueError::QueueFull),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(EnqueueError::Closed),
        }
    }

    pub fn pause(&self) {
        self.state().paused = true;
    }

    pub fn resume(&self) {
        self.state().paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.state().paused
    }

    /// Jobs waiting in the queue (the in-flight job is not counted).
    pub fn depth(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn status(&self) -> WorkerStatus {
        let state = self.state();
        WorkerStatus {
            paused: state.paused,
            running: state.running,
            current_trace: state.current_trace.clone(),
            queue_depth: self.depth(),
            capacity: self.tx.max_capacity(),
        }
    }

    /// Block (by polling) until the pause flag is clear.
    pub(crate) async fn wait_until_resumed(&self) {
        while self.is_paused() {
            tokio::time::sleep(self.pause_poll).await;
        }
    }

    /// Mark `trace` as running until the returned guard drops.
    pub(crate) fn mark_running(&self, trace: &TraceId) -> RunningGuard<'_> {
        let mut state = self.state();
        state.running = true;
        state.current_trace = Some(trace.clone());
        RunningGuard(self)
    }
}

/// Clears the running flag and trace on drop, whatever the job outcome.
pub(crate) struct RunningGuard<'a>(&'a JobQueue);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.0.state();
        state.running = false;
        state.current_trace = None;
    }
}

#[cfg(test)]
mod tests {
    use enoch_core::ChatId;

    use super::*;

    fn job(n: i64) -> Job {
        Job::new(ChatId(1), format!("job {n}"), TraceId::from_update(n))
    }

    #[test]
    fn capacity_two_rejects_third_enqueue() {
        let (queue, _rx) = JobQueue::new(2);
        assert_eq!(queue.try_enqueue(job(1)), Ok(EnqueueAck::Queued));
        assert_eq!(queue.try_enqueue(job(2)), Ok(EnqueueAck::Queued));
        assert_eq!(queue.try_enqueue(job(3)), Err(EnqueueError::QueueFull));
        assert_eq!(queue.depth(), 2);
    }

    #[test]
    fn ack_reflects_pause() {
        let (queue, _rx) = JobQueue::new(4);
        queue.pause();
        assert_eq!(queue.try_enqueue(job(1)), Ok(EnqueueAck::QueuedWhilePaused));
        queue.resume();
        assert_eq!(queue.try_enqueue(job(2)), Ok(EnqueueAck::Queued));
    }

    #[test]
    fn closed_receiver_is_reported() {
        let (queue, rx) = JobQueue::new(4);
        drop(rx);
        assert_eq!(queue.try_enqueue(job(1)), Err(EnqueueError::Closed));
    }

    #[test]
    fn running_guard_always_clears_state() {
        let (queue, _rx) = JobQueue::new(4);
        {
            let _guard = queue.mark_running(&TraceId::from("update_id=9"));
            let status = queue.status();
            assert!(status.running);
            assert_eq!(status.current_trace, Some(TraceId::from("update_id=9")));
        }
        let status = queue.status();
        assert!(!status.running);
        assert_eq!(status.current_trace, None);
    }

    #[tokio::test]
    async fn depth_drops_as_worker_receives() {
        let (queue, mut rx) = JobQueue::new(4);
        queue.try_enqueue(job(1)).unwrap();
        queue.try_enqueue(job(2)).unwrap();
        assert_eq!(rx.recv().await.map(|j| j.text), Some("job 1".to_string()));
        assert_eq!(queue.depth(), 1);
    }
}

use thiserror::Error;

/// Why a job could not be handed to the worker.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum EnqueueError {
    #[error("queue full")]
    QueueFull,

    #[error("worker stopped")]
    Closed,
}

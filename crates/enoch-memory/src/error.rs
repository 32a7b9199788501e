use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0} is empty")]
    EmptyInput(&'static str),

    #[error("summary section not found in {file}")]
    MissingSummary { file: String },
}

//! Flat-file Markdown memory notebook: one `memory/YYYY-MM-DD.md` per day.

pub mod error;
pub mod manager;
pub mod types;

pub use error::MemoryError;
pub use manager::NotebookManager;
pub use types::SearchMatch;

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use tracing::debug;

use crate::error::MemoryError;
use crate::types::SearchMatch;

const DEFAULT_TEMPLATE: &str = "# {{date}}\n\n## Summary\n- \n\n## Decisions\n- \n\n## TODOs\n- \n\n## Context\n- \n\n## Prompts/Rules\n- \n";
const TEMPLATE_START: &str = "<!-- TEMPLATE START -->";
const TEMPLATE_END: &str = "<!-- TEMPLATE END -->";
const CONTEXT_HEADER: &str = "## Context";
const SUMMARY_HEADER: &str = "## Summary";
/// Matched lines longer than this are cut with a `...` suffix.
const MAX_MATCH_CHARS: usize = 200;

type Clock = Box<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Reads and writes the daily notebook files under `<root>/memory`.
///
/// Single writer per call; no locking beyond what the file system gives.
pub struct NotebookManager {
    memory_dir: PathBuf,
    template_path: PathBuf,
    clock: Clock,
}

impl NotebookManager {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let root = if root.as_os_str().is_empty() {
            Path::new(".")
        } else {
            root
        };
        Self {
            memory_dir: root.join("memory"),
            template_path: root.join("skills").join("memory").join("MEMORY_TEMPLATE.md"),
            clock: Box::new(|| Local::now().naive_local()),
        }
    }

    /// Replace the wall clock (tests pin the date).
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> NaiveDateTime + Send + Sync + 'static,
    {
        self.clock = Box::new(clock);
        self
    }

    pub fn memory_dir(&self) -> &Path {
        &self.memory_dir
    }

    pub fn today_date(&self) -> String {
        (self.clock)().format("%Y-%m-%d").to_string()
    }

    pub fn today_file_path(&self) -> PathBuf {
        self.memory_dir.join(format!("{}.md", self.today_date()))
    }

    /// Create today's file from the template when it does not exist yet.
    pub fn ensure_today_file(&self) -> Result<PathBuf, MemoryError> {
        std::fs::create_dir_all(&self.memory_dir)?;
        let path = self.today_file_path();
        if path.exists() {
            return Ok(path);
        }
        let template = self.load_template()?;
        let content = template.replace("{{date}}", &self.today_date());
        let content = format!("{}\n", content.trim_end_matches('\n'));
        std::fs::write(&path, content)?;
        debug!(path = %path.display(), "created memory file");
        Ok(path)
    }

    /// Append `- [HH:MM] message` under the `## Context` heading of today's file.
    ///
    /// Returns the path of the file written.
    pub fn add_entry(&self, message: &str) -> Result<PathBuf, MemoryError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(MemoryError::EmptyInput("message"));
        }
        let path = self.ensure_today_file()?;
        let content = std::fs::read_to_string(&path)?;
        let entry = format!("- [{}] {}", (self.clock)().format("%H:%M"), message);
        std::fs::write(&path, insert_into_context(&content, &entry))?;
        Ok(path)
    }

    /// Case-insensitive line search over every `*.md` file, in file-name order.
    ///
    /// Stops after `limit` hits (0 = unlimited). Unreadable files are skipped.
    pub fn search(&self, keyword: &str, limit: usize) -> Result<Vec<SearchMatch>, MemoryError> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(MemoryError::EmptyInput("keyword"));
        }

        let mut files: Vec<PathBuf> = match std::fs::read_dir(&self.memory_dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.extension().is_some_and(|ext| ext == "md"))
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        files.sort();

        let needle = keyword.to_lowercase();
        let mut matches = Vec::new();
        for path in files {
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            let file = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            for (idx, line) in content.split('\n').enumerate() {
                if !line.to_lowercase().contains(&needle) {
                    continue;
                }
                matches.push(SearchMatch {
                    file: file.clone(),
                    line: idx + 1,
                    text: truncate_line(line.trim(), MAX_MATCH_CHARS),
                });
                if limit > 0 && matches.len() >= limit {
                    return Ok(matches);
                }
            }
        }
        Ok(matches)
    }

    /// Non-empty lines of today's `## Summary` section, at most `max_lines` (0 = all).
    pub fn today_summary_lines(&self, max_lines: usize) -> Result<Vec<String>, MemoryError> {
        let path = self.today_file_path();
        let content = std::fs::read_to_string(&path)?;

        let mut summary = Vec::new();
        let mut in_summary = false;
        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with("## ") {
                if in_summary {
                    break;
                }
                in_summary = trimmed == SUMMARY_HEADER;
                continue;
            }
            if !in_summary || trimmed.is_empty() {
                continue;
            }
            summary.push(trimmed.to_string());
            if max_lines > 0 && summary.len() >= max_lines {
                break;
            }
        }

        if !in_summary {
            return Err(MemoryError::MissingSummary {
                file: path.display().to_string(),
            });
        }
        Ok(summary)
    }

    fn load_template(&self) -> Result<String, MemoryError> {
        let text = match std::fs::read_to_string(&self.template_path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(DEFAULT_TEMPLATE.to_string())
            }
            Err(e) => return Err(e.into()),
        };
        Ok(extract_template(&text)
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TEMPLATE.to_string()))
    }
}

/// Body between the template markers, surrounding newlines trimmed.
fn extract_template(text: &str) -> Option<String> {
    let start = text.find(TEMPLATE_START)? + TEMPLATE_START.len();
    let end = text[start..].find(TEMPLATE_END)?;
    Some(text[start..start + end].trim_matches('\n').to_string())
}

/// Insert `entry` after the `## Context` heading, past any blank lines.
/// Without that heading the entry is appended at the end.
fn insert_into_context(text: &str, entry: &str) -> String {
    let mut lines: Vec<&str> = text.split('\n').collect();
    if let Some(header) = lines.iter().position(|l| l.trim() == CONTEXT_HEADER) {
        let mut at = header + 1;
        while at < lines.len() && lines[at].trim().is_empty() {
            at += 1;
        }
        lines.insert(at, entry);
        return format!("{}\n", lines.join("\n").trim_end_matches('\n'));
    }
    format!("{}\n\n{}\n", text.trim_end_matches('\n'), entry)
}

fn truncate_line(text: &str, limit: usize) -> String {
    if limit == 0 || text.chars().count() <= limit {
        return text.to_string();
    }
    let cut: String = text.chars().take(limit).collect();
    format!("{cut}...")
}

/// One line of a notebook file that matched a search keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
    /// File name only, e.g. `2026-10-18.md`.
    pub file: String,
    /// 1-based line number.
    pub line: usize,
    /// Trimmed line text, cut to 200 chars.
    pub text: String,
}

impl std::fmt::Display for SearchMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.file, self.line, self.text)
    }
}

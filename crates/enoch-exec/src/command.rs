//! Invocation shaping: prompt injection, shell quoting and `script` arguments.

use enoch_core::config::{PromptMode, PROMPT_PLACEHOLDER};

/// Signatures printed by agents that insist on an interactive terminal.
const TERMINAL_UNAVAILABLE_SIGNATURES: &[&str] = &[
    "stdin is not a terminal",
    "cursor position could not be read",
];

/// Characters that force an argument to be quoted for `sh -c`.
const SHELL_SPECIALS: &str = "'\"`$|&;<>*?()[]{}!\\#~";

/// Build the agent argument list for `prompt`.
///
/// In `Arg` mode every `{prompt}` occurrence is substituted; when the
/// template has no placeholder the prompt is appended as the last argument.
/// In `Stdin` mode the template is returned untouched.
pub fn render_args(template: &[String], prompt: &str, mode: PromptMode) -> Vec<String> {
    if mode == PromptMode::Stdin {
        return template.to_vec();
    }

    let mut used = false;
    let mut args: Vec<String> = template
        .iter()
        .map(|arg| {
            if arg.contains(PROMPT_PLACEHOLDER) {
                used = true;
                arg.replace(PROMPT_PLACEHOLDER, prompt)
            } else {
                arg.clone()
            }
        })
        .collect();

    if !used {
        args.push(prompt.to_string());
    }
    args
}

/// Quote one argument for a POSIX shell.
///
/// Safe words are returned verbatim. Everything else is wrapped in single
/// quotes with embedded single quotes written as `'\''`.
pub fn shell_quote(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }
    let needs_quote = arg
        .chars()
        .any(|c| c.is_whitespace() || SHELL_SPECIALS.contains(c));
    if !needs_quote {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}

/// Quote and join a full command line.
pub fn shell_join<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(|p| shell_quote(p.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Which `script(1)` implementation is on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptFlavor {
    /// BSD/macOS: `script -q /dev/null cmd args...`
    Bsd,
    /// util-linux: `script -q -c "<cmdline>" /dev/null`
    UtilLinux,
}

impl ScriptFlavor {
    pub fn native() -> Self {
        if cfg!(any(
            target_os = "macos",
            target_os = "freebsd",
            target_os = "openbsd",
            target_os = "netbsd"
        )) {
            ScriptFlavor::Bsd
        } else {
            ScriptFlavor::UtilLinux
        }
    }
}

/// Arguments for the `script` helper wrapping `command args...`.
pub fn script_args(flavor: ScriptFlavor, command: &str, args: &[String]) -> Vec<String> {
    match flavor {
        ScriptFlavor::Bsd => {
            let mut out = vec!["-q".to_string(), "/dev/null".to_string(), command.to_string()];
            out.extend(args.iter().cloned());
            out
        }
        ScriptFlavor::UtilLinux => {
            let mut parts = Vec::with_capacity(args.len() + 1);
            parts.push(command.to_string());
            parts.extend(args.iter().cloned());
            vec![
                "-q".to_string(),
                "-c".to_string(),
                shell_join(&parts),
                "/dev/null".to_string(),
            ]
        }
    }
}

/// `true` when `text` carries one of the known no-terminal signatures.
pub fn is_terminal_unavailable(text: &str) -> bool {
    let lower = text.to_lowercase();
    TERMINAL_UNAVAILABLE_SIGNATURES
        .iter()
        .any(|sig| lower.contains(sig))
}

/// Pick the most useful failure detail: stderr, then stdout, then the exit status.
pub fn failure_detail(stdout: &str, stderr: &str, status: &str) -> String {
    if !stderr.is_empty() {
        stderr.to_string()
    } else if !stdout.is_empty() {
        stdout.to_string()
    } else {
        status.to_string()
    }
}

/// Single-line preview of a prompt, cut to `limit` chars with a `...` suffix.
pub fn preview(text: &str, limit: usize) -> String {
    let flat = text.replace(['\r', '\n'], " ");
    let flat = flat.trim();
    if limit == 0 || flat.chars().count() <= limit {
        return flat.to_string();
    }
    let cut: String = flat.chars().take(limit).collect();
    format!("{cut}...")
}

/// Clean output captured through a pseudo-terminal.
pub fn clean_terminal_output(raw: &[u8]) -> String {
    let stripped = strip_ansi_escapes::strip(raw);
    String::from_utf8_lossy(&stripped).replace('\r', "")
}

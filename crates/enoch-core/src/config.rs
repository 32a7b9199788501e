use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::args::split_args;
use crate::error::{EnochError, Result};

pub const DEFAULT_CONFIG_FILE: &str = "enoch.toml";
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";
/// Token replaced by the prompt inside the agent argument template.
pub const PROMPT_PLACEHOLDER: &str = "{prompt}";
/// Progress messages are never sent more often than this.
pub const MIN_PROGRESS_INTERVAL_SECS: f64 = 30.0;

/// Top-level settings (enoch.toml + ENOCH_* env overrides + legacy flat env vars).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnochConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Only this chat may talk to the bot. Empty = every chat.
    #[serde(default, deserialize_with = "string_or_number")]
    pub allowed_chat_id: String,
    /// Sleep between polls, and the base of the error backoff.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: f64,
    /// Long-poll timeout passed to getUpdates.
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
    /// Typing indicator refresh. 0 disables it.
    #[serde(default = "default_typing_interval")]
    pub typing_interval_secs: f64,
    /// Maximum context entries kept per chat. 0 disables the context window.
    #[serde(default)]
    pub context_size: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            allowed_chat_id: String::new(),
            poll_interval_secs: default_poll_interval(),
            poll_timeout_secs: default_poll_timeout(),
            typing_interval_secs: default_typing_interval(),
            context_size: 0,
            queue_capacity: default_queue_capacity(),
            api_base: default_api_base(),
            http_timeout_secs: default_http_timeout(),
        }
    }
}

impl TelegramConfig {
    pub fn poll_interval(&self) -> Duration {
        if self.poll_interval_secs > 0.0 {
            Duration::from_secs_f64(self.poll_interval_secs)
        } else {
            Duration::from_secs_f64(default_poll_interval())
        }
    }

    pub fn typing_interval(&self) -> Option<Duration> {
        positive_secs(self.typing_interval_secs)
    }
}

/// How the prompt reaches the agent process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptMode {
    /// Substitute `{prompt}` in the args, or append the prompt as the last arg.
    #[default]
    Arg,
    /// Write the prompt to the child's stdin.
    Stdin,
}

impl FromStr for PromptMode {
    type Err = EnochError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "arg" => Ok(PromptMode::Arg),
            "stdin" => Ok(PromptMode::Stdin),
            other => Err(EnochError::Config(format!(
                "prompt mode must be stdin or arg, got '{other}'"
            ))),
        }
    }
}

/// Agent argument template. Accepts a TOML list or one shell-like string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawArgs", into = "Vec<String>")]
pub struct AgentArgs(pub Vec<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawArgs {
    List(Vec<String>),
    Line(String),
}

impl TryFrom<RawArgs> for AgentArgs {
    type Error = EnochError;

    fn try_from(raw: RawArgs) -> Result<Self> {
        match raw {
            RawArgs::List(list) => Ok(AgentArgs(list)),
            RawArgs::Line(line) => split_args(&line)
                .map(AgentArgs)
                .map_err(|e| EnochError::Config(format!("invalid agent args: {e}"))),
        }
    }
}

impl From<AgentArgs> for Vec<String> {
    fn from(args: AgentArgs) -> Self {
        args.0
    }
}

impl Default for AgentArgs {
    fn default() -> Self {
        // Non-interactive exec mode avoids the terminal requirement by default.
        AgentArgs(vec!["exec".to_string(), PROMPT_PLACEHOLDER.to_string()])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_command")]
    pub command: String,
    #[serde(default)]
    pub args: AgentArgs,
    #[serde(default)]
    pub prompt_mode: PromptMode,
    #[serde(default = "default_agent_timeout")]
    pub timeout_secs: f64,
    #[serde(default = "default_workdir")]
    pub workdir: String,
    /// Run the agent through the `script` terminal helper.
    #[serde(default)]
    pub use_tty: bool,
    /// Inject `PROMPT_TOOLKIT_NO_CPR=1` into the child environment.
    #[serde(default = "bool_true")]
    pub disable_cpr: bool,
    #[serde(default = "default_tty_helper")]
    pub tty_helper: String,
    /// Progress message cadence. 0 disables it.
    #[serde(default = "default_progress_interval")]
    pub progress_interval_secs: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: AgentArgs::default(),
            prompt_mode: PromptMode::default(),
            timeout_secs: default_agent_timeout(),
            workdir: default_workdir(),
            use_tty: false,
            disable_cpr: true,
            tty_helper: default_tty_helper(),
            progress_interval_secs: default_progress_interval(),
        }
    }
}

impl AgentConfig {
    pub fn timeout(&self) -> Duration {
        positive_secs(self.timeout_secs)
            .unwrap_or_else(|| Duration::from_secs_f64(default_agent_timeout()))
    }

    /// Cadence of chat progress messages, clamped to the 30 s floor.
    pub fn progress_interval(&self) -> Option<Duration> {
        positive_secs(self.progress_interval_secs)
            .map(|d| d.max(Duration::from_secs_f64(MIN_PROGRESS_INTERVAL_SECS)))
    }

    /// Cadence of the executor heartbeat (unclamped).
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        positive_secs(self.progress_interval_secs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = EnochError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(EnochError::Config(format!(
                "log level must be debug|info|warn|error, got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub level: LogLevel,
    /// Append plain-text log lines to this file as well.
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "bool_true")]
    pub console: bool,
    #[serde(default = "bool_true")]
    pub color: bool,
    /// strftime format for timestamps.
    #[serde(default = "default_time_format")]
    pub time_format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            file: None,
            console: true,
            color: true,
            time_format: default_time_format(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Directory holding `memory/` and `skills/memory/MEMORY_TEMPLATE.md`.
    #[serde(default = "default_memory_root")]
    pub root: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            root: default_memory_root(),
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_poll_interval() -> f64 {
    2.0
}
fn default_poll_timeout() -> u64 {
    30
}
fn default_typing_interval() -> f64 {
    4.0
}
fn default_queue_capacity() -> usize {
    64
}
fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}
fn default_http_timeout() -> u64 {
    70
}
fn default_command() -> String {
    "codex".to_string()
}
fn default_agent_timeout() -> f64 {
    120.0
}
fn default_workdir() -> String {
    ".".to_string()
}
fn default_tty_helper() -> String {
    "script".to_string()
}
fn default_progress_interval() -> f64 {
    10.0
}
fn default_time_format() -> String {
    "%Y-%m-%d %H:%M:%S".to_string()
}
fn default_memory_root() -> String {
    ".".to_string()
}

/// Chat ids are written bare in TOML and env, so accept either form.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
    })
}

fn positive_secs(secs: f64) -> Option<Duration> {
    (secs.is_finite() && secs > 0.0).then(|| Duration::from_secs_f64(secs))
}

impl EnochConfig {
    /// Load settings once at startup.
    ///
    /// Layers, lowest first: built-in defaults, the TOML file (explicit path or
    /// `./enoch.toml`), `ENOCH_*` env vars (`__` separates sections), then the
    /// legacy flat variables (`TELEGRAM_BOT_TOKEN`, `CODEX_ARGS`, ...).
    /// A `.env` file in the working directory is read first and never
    /// overrides variables already set.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        check_dotenv(dotenvy::dotenv())?;

        let path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut config: EnochConfig = Figment::from(Serialized::defaults(EnochConfig::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed("ENOCH_").split("__"))
            .extract()
            .map_err(|e| EnochError::Config(e.to_string()))?;

        config.apply_legacy_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay the flat variable names of earlier deployments.
    pub fn apply_legacy_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = get("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = v;
        }
        if let Some(v) = get("TELEGRAM_ALLOWED_CHAT_ID") {
            self.telegram.allowed_chat_id = v;
        }
        if let Some(v) = get("TELEGRAM_POLL_INTERVAL") {
            self.telegram.poll_interval_secs = parse_seconds("TELEGRAM_POLL_INTERVAL", &v)?;
        }
        if let Some(v) = get("TELEGRAM_TYPING_INTERVAL") {
            self.telegram.typing_interval_secs = parse_seconds("TELEGRAM_TYPING_INTERVAL", &v)?;
        }
        if let Some(v) = get("TELEGRAM_CONTEXT_SIZE") {
            self.telegram.context_size = v.parse::<usize>().map_err(|_| {
                EnochError::Config("TELEGRAM_CONTEXT_SIZE must be an integer >= 0".to_string())
            })?;
        }

        if let Some(v) = get("CODEX_COMMAND") {
            self.agent.command = v;
        }
        if let Some(v) = get("CODEX_ARGS") {
            let args = split_args(&v)
                .map_err(|e| EnochError::Config(format!("invalid CODEX_ARGS: {e}")))?;
            self.agent.args = AgentArgs(args);
        }
        if let Some(v) = get("CODEX_PROMPT_MODE") {
            self.agent.prompt_mode = v.parse()?;
        }
        if let Some(v) = get("CODEX_TIMEOUT") {
            self.agent.timeout_secs = parse_seconds("CODEX_TIMEOUT", &v)?;
        }
        if let Some(v) = get("CODEX_WORKDIR") {
            self.agent.workdir = v;
        }
        if let Some(v) = get("CODEX_DISABLE_CPR") {
            self.agent.disable_cpr = parse_bool(&v, self.agent.disable_cpr);
        }
        if let Some(v) = get("CODEX_USE_TTY") {
            self.agent.use_tty = parse_bool(&v, self.agent.use_tty);
        }
        if let Some(v) = get("CODEX_PROGRESS_INTERVAL") {
            self.agent.progress_interval_secs = parse_seconds("CODEX_PROGRESS_INTERVAL", &v)?;
        }

        if let Some(v) = get("LOG_LEVEL") {
            self.log.level = v.parse()?;
        }
        if let Some(v) = get("LOG_FILE") {
            self.log.file = Some(v);
        }
        if let Some(v) = get("LOG_CONSOLE") {
            self.log.console = parse_bool(&v, self.log.console);
        }
        if let Some(v) = get("LOG_COLOR") {
            self.log.color = parse_bool(&v, self.log.color);
        }
        if let Some(v) = get("LOG_TIME_FORMAT") {
            self.log.time_format = v;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            return Err(EnochError::Config(
                "telegram bot token is required (TELEGRAM_BOT_TOKEN)".to_string(),
            ));
        }
        if self.agent.command.trim().is_empty() {
            return Err(EnochError::Config("agent command is empty".to_string()));
        }
        if self.telegram.queue_capacity == 0 {
            return Err(EnochError::Config("queue capacity must be > 0".to_string()));
        }
        for (key, secs) in [
            ("telegram.poll_interval_secs", self.telegram.poll_interval_secs),
            ("telegram.typing_interval_secs", self.telegram.typing_interval_secs),
            ("agent.timeout_secs", self.agent.timeout_secs),
            ("agent.progress_interval_secs", self.agent.progress_interval_secs),
        ] {
            if !secs.is_finite() || secs < 0.0 {
                return Err(EnochError::Config(format!(
                    "{key} must be a number >= 0, got {secs}"
                )));
            }
        }
        // A long poll must finish before the HTTP client gives up on it.
        if self.telegram.poll_timeout_secs >= self.telegram.http_timeout_secs {
            return Err(EnochError::Config(format!(
                "telegram.poll_timeout_secs ({}) must be below telegram.http_timeout_secs ({})",
                self.telegram.poll_timeout_secs, self.telegram.http_timeout_secs
            )));
        }
        Ok(())
    }
}

/// A missing `.env` is fine; an unreadable or malformed one is fatal.
fn check_dotenv<T>(result: std::result::Result<T, dotenvy::Error>) -> Result<()> {
    match result {
        Err(e) if !e.not_found() => Err(EnochError::Config(format!(
            "failed to read .env file: {e}"
        ))),
        _ => Ok(()),
    }
}

/// Lenient boolean parsing; unknown values keep `default`.
pub fn parse_bool(value: &str, default: bool) -> bool {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => true,
        "0" | "false" | "no" | "n" | "off" => false,
        _ => default,
    }
}

/// Seconds as a float. Range checks happen in [`EnochConfig::validate`].
fn parse_seconds(key: &str, value: &str) -> Result<f64> {
    value
        .parse()
        .map_err(|_| EnochError::Config(format!("{key} must be a number (seconds)")))
}

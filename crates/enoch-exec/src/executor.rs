//! `Executor`: runs the agent CLI once per prompt with a hard deadline.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use enoch_core::config::{AgentConfig, PromptMode};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::command::{self, ScriptFlavor};
use crate::error::{ExecError, Result};

/// Environment variable that stops prompt_toolkit from querying the cursor position.
const NO_CPR_ENV: &str = "PROMPT_TOOLKIT_NO_CPR";
const PREVIEW_CHARS: usize = 60;

/// How the child process is launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Through the `script` helper so the agent sees a terminal.
    Terminal,
    /// Plain child process.
    Direct,
}

/// Periodic liveness notice emitted while the agent runs.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    pub elapsed: Duration,
    pub preview: String,
}

type HeartbeatFn = Arc<dyn Fn(Heartbeat) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub command: String,
    pub args: Vec<String>,
    pub prompt_mode: PromptMode,
    pub timeout: Duration,
    pub workdir: String,
    pub use_tty: bool,
    pub disable_cpr: bool,
    pub tty_helper: String,
    pub script_flavor: ScriptFlavor,
    /// Heartbeat cadence. `None` disables it.
    pub heartbeat: Option<Duration>,
}

impl From<&AgentConfig> for ExecutorConfig {
    fn from(cfg: &AgentConfig) -> Self {
        Self {
            command: cfg.command.clone(),
            args: cfg.args.0.clone(),
            prompt_mode: cfg.prompt_mode,
            timeout: cfg.timeout(),
            workdir: cfg.workdir.clone(),
            use_tty: cfg.use_tty,
            disable_cpr: cfg.disable_cpr,
            tty_helper: cfg.tty_helper.clone(),
            script_flavor: ScriptFlavor::native(),
            heartbeat: cfg.heartbeat_interval(),
        }
    }
}

/// Aborts the heartbeat task when dropped, on every exit path.
struct HeartbeatGuard(JoinHandle<()>);

impl HeartbeatGuard {
    fn spawn(every: Duration, preview: String, on_beat: HeartbeatFn) -> Self {
        let started = Instant::now();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(started + every, every);
            loop {
                ticker.tick().await;
                on_beat(Heartbeat {
                    elapsed: started.elapsed(),
                    preview: preview.clone(),
                });
            }
        });
        HeartbeatGuard(handle)
    }
}

impl Drop for HeartbeatGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Runs the external agent for one prompt at a time.
pub struct Executor {
    config: ExecutorConfig,
}

impl Executor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// Run the agent, logging a heartbeat line at the configured interval.
    pub async fn run(&self, prompt: &str) -> Result<String> {
        self.run_with_heartbeat(prompt, |beat: Heartbeat| {
            info!(
                elapsed_secs = beat.elapsed.as_secs(),
                prompt = %beat.preview,
                "agent still running"
            );
        })
        .await
    }

    /// Run the agent, calling `on_beat` at the configured interval until it exits.
    ///
    /// The heartbeat runs on its own task and never delays exit detection.
    pub async fn run_with_heartbeat<F>(&self, prompt: &str, on_beat: F) -> Result<String>
    where
        F: Fn(Heartbeat) + Send + Sync + 'static,
    {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            error!("agent prompt is empty");
            return Err(ExecError::EmptyPrompt);
        }

        let args = command::render_args(&self.config.args, prompt, self.config.prompt_mode);
        let deadline = Instant::now() + self.config.timeout;

        let _heartbeat = self.config.heartbeat.map(|every| {
            HeartbeatGuard::spawn(every, command::preview(prompt, PREVIEW_CHARS), Arc::new(on_beat))
        });

        if !self.config.use_tty {
            return self.run_strategy(Strategy::Direct, prompt, &args, deadline).await;
        }

        match self.run_strategy(Strategy::Terminal, prompt, &args, deadline).await {
            Err(ExecError::TerminalUnavailable(detail)) => {
                warn!(detail = %detail, "agent needs a terminal the helper could not provide, retrying without tty");
                self.run_strategy(Strategy::Direct, prompt, &args, deadline).await
            }
            other => other,
        }
    }

    fn build_command(&self, strategy: Strategy, args: &[String]) -> Result<Command> {
        let mut cmd = match strategy {
            Strategy::Direct => {
                let mut cmd = Command::new(&self.config.command);
                cmd.args(args);
                cmd
            }
            Strategy::Terminal => {
                let helper = which::which(&self.config.tty_helper).map_err(|e| {
                    ExecError::Spawn(format!(
                        "terminal helper '{}' not found ({e}); install util-linux or bsdutils",
                        self.config.tty_helper
                    ))
                })?;
                let mut cmd = Command::new(helper);
                cmd.args(command::script_args(
                    self.config.script_flavor,
                    &self.config.command,
                    args,
                ));
                cmd
            }
        };

        cmd.current_dir(&self.config.workdir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if self.config.disable_cpr {
            cmd.env(NO_CPR_ENV, "1");
        }
        cmd.stdin(match self.config.prompt_mode {
            PromptMode::Stdin => Stdio::piped(),
            PromptMode::Arg => Stdio::null(),
        });

        Ok(cmd)
    }

    async fn run_strategy(
        &self,
        strategy: Strategy,
        prompt: &str,
        args: &[String],
        deadline: Instant,
    ) -> Result<String> {
        let mut cmd = self.build_command(strategy, args)?;

        debug!(
            command = %self.config.command,
            ?strategy,
            args = args.len(),
            prompt_len = prompt.len(),
            "spawning agent"
        );

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ExecError::Spawn(format!("agent command '{}' not found", self.config.command))
            } else {
                ExecError::Spawn(format!("failed to spawn agent: {e}"))
            }
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            let mut input = prompt.to_string();
            if strategy == Strategy::Terminal {
                // Line-buffered terminals only submit on newline.
                input.push('\n');
            }
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(input.as_bytes()).await {
                    warn!(error = %e, "failed to write prompt to agent stdin");
                }
            });
        }

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout_at(deadline, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_elapsed) => {
                let secs = self.config.timeout.as_secs_f64();
                error!(timeout_secs = secs, ?strategy, "agent timed out");
                return Err(ExecError::Timeout { secs });
            }
        };

        let (stdout, stderr) = match strategy {
            Strategy::Terminal => (
                command::clean_terminal_output(&output.stdout),
                command::clean_terminal_output(&output.stderr),
            ),
            Strategy::Direct => (
                String::from_utf8_lossy(&output.stdout).into_owned(),
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ),
        };
        let stdout = stdout.trim();
        let stderr = stderr.trim();

        if !output.status.success() {
            let detail = command::failure_detail(stdout, stderr, &output.status.to_string());
            if strategy == Strategy::Terminal
                && (command::is_terminal_unavailable(stdout)
                    || command::is_terminal_unavailable(stderr))
            {
                return Err(ExecError::TerminalUnavailable(detail));
            }
            error!(
                status = %output.status,
                stdout = %stdout,
                stderr = %stderr,
                "agent exited with failure"
            );
            return Err(ExecError::Command { detail });
        }

        if stdout.is_empty() && !stderr.is_empty() {
            return Ok(stderr.to_string());
        }
        Ok(stdout.to_string())
    }
}

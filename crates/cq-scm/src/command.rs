//! External command execution abstraction

use async_trait::async_trait;
use cq_core::{Result, ScmError, ScriptError};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::process::{Output, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Output signature that marks a commit as having raced another commit
const OUT_OF_DATE_SIGNATURE: &str = "resource out of date";

/// A single external command: argv, working directory and optional stdin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub input: Option<Vec<u8>>,
}

impl Invocation {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            input: None,
        }
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn input(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// The argv joined with spaces
    pub fn command_line(&self) -> String {
        self.args.join(" ")
    }
}

/// Output from an external command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// stdout followed by stderr, as shown to a user in a terminal
    pub fn combined_text(&self) -> String {
        let mut text = self.stdout_text();
        text.push_str(&self.stderr);
        text
    }
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        }
    }
}

/// Trait for executing external commands (allows mocking in tests)
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run the command to completion and capture its output
    ///
    /// A non-zero exit is not an error at this level; only failing to start
    /// the process is.
    async fn exec(&self, invocation: &Invocation) -> Result<CommandOutput>;
}

/// Real executor backed by `tokio::process`
#[derive(Debug, Clone, Default)]
pub struct SystemExecutor;

#[async_trait]
impl CommandExecutor for SystemExecutor {
    #[instrument(skip(self, invocation), fields(command = %invocation.command_line()))]
    async fn exec(&self, invocation: &Invocation) -> Result<CommandOutput> {
        let spawn_failure = |e: std::io::Error| {
            ScmError::ScriptFailed(ScriptError::new(
                invocation.args.clone(),
                -1,
                e.to_string(),
                invocation.cwd.clone(),
            ))
        };

        let (program, args) = invocation
            .args
            .split_first()
            .ok_or_else(|| ScmError::Usage("cannot run an empty command".to_string()))?;

        let mut command = Command::new(program);
        command
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if invocation.input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });
        if let Some(cwd) = &invocation.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(spawn_failure)?;
        let stdin = child.stdin.take();
        let feed_stdin = async move {
            let (Some(mut stdin), Some(input)) = (stdin, invocation.input.as_deref()) else {
                return Ok(());
            };
            // A child may exit without reading everything; its exit status decides
            match stdin.write_all(input).await {
                Err(e) if e.kind() != ErrorKind::BrokenPipe => Err(e),
                _ => Ok(()),
            }
        };

        let (written, output) = tokio::join!(feed_stdin, child.wait_with_output());
        let output = CommandOutput::from(output.map_err(spawn_failure)?);
        if !output.success() {
            debug!("Command exited with {}: {}", output.exit_code, output.stderr);
            return Ok(output);
        }
        written.map_err(spawn_failure)?;
        Ok(output)
    }
}

/// Mock executor for testing
///
/// Responses are keyed by the space-joined argv. Every invocation is
/// recorded so tests can assert on what was (or was not) run.
#[derive(Debug, Default)]
pub struct MockExecutor {
    responses: HashMap<String, CommandOutput>,
    calls: Mutex<Vec<Invocation>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, command: &str, output: CommandOutput) -> Self {
        self.responses.insert(command.to_string(), output);
        self
    }

    /// Successful run printing `stdout`
    pub fn with_output(self, command: &str, stdout: &str) -> Self {
        self.with_response(
            command,
            CommandOutput {
                stdout: stdout.as_bytes().to_vec(),
                ..Default::default()
            },
        )
    }

    /// Failed run with the given exit code and stderr
    pub fn with_failure(self, command: &str, exit_code: i32, stderr: &str) -> Self {
        self.with_response(
            command,
            CommandOutput {
                stdout: Vec::new(),
                stderr: stderr.to_string(),
                exit_code,
            },
        )
    }

    /// Every invocation seen so far, in order
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether a command with exactly this argv was run
    pub fn was_run(&self, command: &str) -> bool {
        self.calls().iter().any(|call| call.command_line() == command)
    }
}

#[async_trait]
impl CommandExecutor for MockExecutor {
    async fn exec(&self, invocation: &Invocation) -> Result<CommandOutput> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(invocation.clone());

        let key = invocation.command_line();
        self.responses.get(&key).cloned().ok_or_else(|| {
            ScmError::ScriptFailed(ScriptError::new(
                invocation.args.clone(),
                -1,
                format!("No mock response for: {}", key),
                invocation.cwd.clone(),
            ))
        })
    }
}

/// How a non-zero exit status is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Fail with [`ScmError::ScriptFailed`]
    Raise,
    /// Return whatever was printed; used for best-effort probes
    Ignore,
    /// Like `Raise`, but an out-of-date failure becomes
    /// [`ScmError::CheckoutNeedsUpdate`]
    Commit,
}

/// Runs commands through a [`CommandExecutor`] and applies an [`ErrorPolicy`]
#[derive(Clone)]
pub struct Executive {
    executor: Arc<dyn CommandExecutor>,
}

impl std::fmt::Debug for Executive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executive")
            .field("executor", &"<CommandExecutor>")
            .finish()
    }
}

impl Default for Executive {
    fn default() -> Self {
        Self::system()
    }
}

impl Executive {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    /// Executive that spawns real processes
    pub fn system() -> Self {
        Self::new(Arc::new(SystemExecutor))
    }

    /// Run a command and return its stdout as text
    pub async fn run_command(&self, invocation: Invocation, policy: ErrorPolicy) -> Result<String> {
        let output = self.run(invocation, policy).await?;
        Ok(output.stdout_text())
    }

    /// Run a command and return its raw stdout, for diffs and file contents
    pub async fn run_command_bytes(
        &self,
        invocation: Invocation,
        policy: ErrorPolicy,
    ) -> Result<Vec<u8>> {
        let output = self.run(invocation, policy).await?;
        Ok(output.stdout)
    }

    /// Run a command and only report its exit code
    pub async fn run_exit_code(&self, invocation: Invocation) -> Result<i32> {
        let output = self.run(invocation, ErrorPolicy::Ignore).await?;
        Ok(output.exit_code)
    }

    async fn run(&self, invocation: Invocation, policy: ErrorPolicy) -> Result<CommandOutput> {
        debug!("Running {}", invocation.command_line());
        let output = self.executor.exec(&invocation).await?;
        if output.success() || policy == ErrorPolicy::Ignore {
            return Ok(output);
        }

        let error = ScriptError::new(
            invocation.args,
            output.exit_code,
            output.combined_text(),
            invocation.cwd,
        );
        if policy == ErrorPolicy::Commit && error.output.contains(OUT_OF_DATE_SIGNATURE) {
            return Err(ScmError::CheckoutNeedsUpdate(error));
        }
        Err(ScmError::ScriptFailed(error))
    }
}

/// `path` rendered as a single command-line argument
pub(crate) fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// `path` made absolute against the process cwd, with `.` and `..` resolved
pub(crate) fn absolute_path(path: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    Ok(normalized)
}

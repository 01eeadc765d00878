//! Unified error types for the SCM layer

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::Revision;

/// Context captured from a failed external command
///
/// Carries everything a caller needs to log or retry without re-running the
/// tool: the argv, the exit code, the combined output and the directory the
/// command ran in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptError {
    pub script_args: Vec<String>,
    pub exit_code: i32,
    pub output: String,
    pub cwd: Option<PathBuf>,
}

impl ScriptError {
    pub fn new(
        script_args: Vec<String>,
        exit_code: i32,
        output: impl Into<String>,
        cwd: Option<PathBuf>,
    ) -> Self {
        Self {
            script_args,
            exit_code,
            output: output.into(),
            cwd,
        }
    }

    /// The command line as a single printable string
    pub fn command_name(&self) -> String {
        self.script_args.join(" ")
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Failed to run \"{}\" exit_code: {}",
            self.command_name(),
            self.exit_code
        )?;
        if let Some(cwd) = &self.cwd {
            write!(f, " cwd: {}", cwd.display())?;
        }
        if !self.output.is_empty() {
            write!(f, "\n\n{}", self.output.trim_end())?;
        }
        Ok(())
    }
}

/// Unified error type for all SCM operations
#[derive(Error, Debug)]
pub enum ScmError {
    // Caller errors
    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Invalid revision: {0}")]
    InvalidRevision(String),

    // Tool invocation errors
    #[error("{0}")]
    ScriptFailed(ScriptError),

    /// The commit raced another commit; resynchronize and retry the sequence
    #[error("Checkout needs update: {0}")]
    CheckoutNeedsUpdate(ScriptError),

    #[error("Failed to find git commit for revision {0}, your checkout likely needs an update.")]
    CheckoutOutOfSync(Revision),

    #[error("Unable to parse tool output: {0}")]
    Parse(String),

    // Capability errors
    #[error("{0}")]
    Unsupported(String),

    #[error("You need to specify the username on {0} to perform the commit as.")]
    MissingCredentials(String),

    // Working copy state errors
    #[error("Working directory has modifications, pass --force-clean or --no-clean to continue.")]
    DirtyWorkingDirectory,

    #[error("Working directory has {0} local commit(s), pass --force-clean to continue.")]
    LocalCommits(usize),

    #[error("Failed to apply reverse diff for revision {revision} because of the following conflicts:\n{}", paths.join("\n"))]
    Conflicts { revision: String, paths: Vec<String> },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl ScmError {
    /// Whether the caller should resynchronize the checkout and retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::CheckoutNeedsUpdate(_))
    }

    /// The underlying command failure, if this error came from one
    pub fn script_error(&self) -> Option<&ScriptError> {
        match self {
            Self::ScriptFailed(err) | Self::CheckoutNeedsUpdate(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type alias using ScmError
pub type Result<T> = std::result::Result<T, ScmError>;

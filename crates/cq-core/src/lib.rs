//! # cq-core
//!
//! Core types for the commit-queue SCM layer.
//!
//! The commit queue drives Subversion and git-svn checkouts as subprocesses.
//! This crate holds what every backend shares:
//!
//! - The error taxonomy, including the retryable stale-checkout failure
//! - Revisions in the shared linear revision space
//! - Status entries and patches
//! - Commit message parsing
//! - Retrying after commit races
//! - Repository configuration

mod commit_message;
mod config;
mod error;
pub mod retry;
mod types;

pub use commit_message::CommitMessage;
pub use config::{ChangeLogConfig, CqConfig, ScriptsConfig, SvnServerConfig};
pub use error::{Result, ScmError, ScriptError};
pub use types::*;

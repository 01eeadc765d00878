//! Source control abstraction for the commit queue.
//!
//! One [`Scm`] interface over two very different tools: Subversion, and git
//! bridged to the same linear revision space with `git svn`. Every operation
//! shells out through a [`CommandExecutor`], so tests can swap in a
//! [`MockExecutor`].
//!
//! ```no_run
//! # async fn run() -> cq_scm::Result<()> {
//! use cq_scm::{detect_scm_system, ScmContext, ScmExt};
//!
//! let ctx = ScmContext::system();
//! let Some(scm) = detect_scm_system(&ctx, std::path::Path::new(".")).await? else {
//!     return Ok(());
//! };
//! scm.ensure_clean_working_directory(false).await?;
//! let message = scm.commit_message_for_this_commit().await?;
//! let output = scm.commit_with_message(&message.message(), None).await?;
//! println!("{:?}", scm.svn_revision_from_commit_text(&output));
//! # Ok(())
//! # }
//! ```

mod backend;
mod build_config;
mod changelog;
mod command;
mod detect;
mod git;
mod status;
mod svn;
mod user;
mod workflow;

pub use backend::{LocalCommits, Scm, ScmContext};
pub use build_config::{BuildConfig, Configuration};
pub use changelog::{is_path_to_changelog, latest_entry, ChangeLogEntry};
pub use command::{
    CommandExecutor, CommandOutput, ErrorPolicy, Executive, Invocation, MockExecutor,
    SystemExecutor,
};
pub use detect::{detect_scm_system, in_working_directory, open_backend, PROBE_ORDER};
pub use git::GitScm;
pub use status::{StatusDialect, StatusGrammar};
pub use svn::SvnScm;
pub use user::{prompt_until_answered, FixedAnswer, NonInteractive, TerminalPrompt, UserPrompt};
pub use workflow::ScmExt;

pub use cq_core::{BackendKind, CommitMessage, Patch, Result, Revision, ScmError, ScriptError};

//! SCM capability interface shared by every backend.

use async_trait::async_trait;
use cq_core::{BackendKind, CommitMessage, CqConfig, Patch, Result, Revision};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::command::Executive;
use crate::user::{TerminalPrompt, UserPrompt};

/// Everything a backend needs besides its checkout
#[derive(Clone)]
pub struct ScmContext {
    pub executive: Executive,
    pub config: Arc<CqConfig>,
    pub prompt: Arc<dyn UserPrompt>,
}

impl std::fmt::Debug for ScmContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScmContext")
            .field("executive", &self.executive)
            .field("config", &self.config)
            .field("prompt", &"<UserPrompt>")
            .finish()
    }
}

impl ScmContext {
    pub fn new(executive: Executive, config: CqConfig) -> Self {
        Self {
            executive,
            config: Arc::new(config),
            prompt: Arc::new(TerminalPrompt),
        }
    }

    /// Real processes, default configuration, terminal prompts
    pub fn system() -> Self {
        Self::new(Executive::system(), CqConfig::default())
    }

    pub fn with_prompt(mut self, prompt: Arc<dyn UserPrompt>) -> Self {
        self.prompt = prompt;
        self
    }
}

/// Trait defining the operations every SCM backend must implement.
///
/// All returned paths are relative to [`Scm::checkout_root`], whatever
/// directory the backend was opened from.
#[async_trait]
pub trait Scm: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> BackendKind;

    /// Short tool name, e.g. `svn`
    fn display_name(&self) -> &'static str;

    /// The path the backend was opened from
    fn cwd(&self) -> &Path;

    /// Top of the tracked tree
    fn checkout_root(&self) -> &Path;

    /// Absolute form of a path returned by this backend
    fn absolute_path(&self, repository_relative_path: &str) -> PathBuf;

    fn context(&self) -> &ScmContext;

    fn dry_run(&self) -> bool;

    /// In dry-run mode commits never reach the server
    fn set_dry_run(&mut self, dry_run: bool);

    /// Pattern matching a successful commit, with an `svn_revision` group
    fn commit_success_regexp(&self) -> &'static Regex;

    /// Command whose output lists the working copy status
    fn status_command(&self) -> Vec<String>;

    /// True iff a full-tree diff against the last sync point is empty
    async fn working_directory_is_clean(&self) -> Result<bool>;

    /// Discard every local modification, including added files
    async fn clean_working_directory(&self) -> Result<()>;

    async fn add(&self, path: &str) -> Result<()>;

    async fn changed_files(&self) -> Result<Vec<String>>;

    async fn changed_files_for_revision(&self, revision: Revision) -> Result<Vec<String>>;

    async fn added_files(&self) -> Result<Vec<String>>;

    async fn conflicted_files(&self) -> Result<Vec<String>>;

    /// Diff of the whole tree against the last sync point, binary included
    async fn create_patch(&self) -> Result<Patch>;

    /// Diff introduced by exactly one revision
    async fn diff_for_revision(&self, revision: Revision) -> Result<Patch>;

    async fn contents_at_revision(&self, path: &str, revision: Revision) -> Result<Vec<u8>>;

    async fn committer_email_for_revision(&self, revision: Revision) -> Result<String>;

    /// Apply the inverse of `revision` to the working copy, uncommitted
    ///
    /// Fails with [`cq_core::ScmError::Conflicts`] if any path is left
    /// unmerged.
    async fn apply_reverse_diff(&self, revision: Revision) -> Result<()>;

    async fn revert_files(&self, file_paths: &[String]) -> Result<()>;

    /// Commit and publish; returns the tool output
    ///
    /// A [`cq_core::ScmError::CheckoutNeedsUpdate`] failure means the caller
    /// should update the checkout and retry the whole sequence.
    async fn commit_with_message(&self, message: &str, username: Option<&str>) -> Result<String>;

    async fn svn_commit_log(&self, svn_revision: &str) -> Result<String>;

    async fn last_svn_commit_log(&self) -> Result<String>;

    fn supports_local_commits(&self) -> bool;

    /// The local-commit capability, when this backend has one
    fn local_commits_support(&self) -> Option<&dyn LocalCommits>;
}

/// Optional capability for backends with commits that exist only locally
#[async_trait]
pub trait LocalCommits: Send + Sync {
    /// One line per commit not yet on the remote-tracking branch
    async fn local_commits(&self) -> Result<Vec<String>>;

    /// Hard-reset to the remote-tracking branch
    async fn discard_local_commits(&self) -> Result<()>;

    async fn commit_locally_with_message(&self, message: &str) -> Result<()>;

    async fn create_patch_from_local_commit(&self, commit_id: &str) -> Result<Patch>;

    async fn create_patch_since_local_commit(&self, commit_id: &str) -> Result<Patch>;

    /// Resolve refs and `A..B` ranges to commit ids, oldest first within a range
    async fn commit_ids_from_commitish_arguments(&self, args: &[String]) -> Result<Vec<String>>;

    async fn commit_message_for_local_commit(&self, commit_id: &str) -> Result<CommitMessage>;

    async fn files_changed_summary_for_commit(&self, commit_id: &str) -> Result<String>;

    /// Remote-tracking branch the bridge fetches into
    async fn svn_branch_name(&self) -> Result<String>;

    async fn svn_merge_base(&self) -> Result<String>;

    async fn delete_branch(&self, branch: &str) -> Result<()>;

    fn rebase_in_progress(&self) -> bool;
}

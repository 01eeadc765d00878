//! Workflows shared by every backend
//!
//! Built only from [`Scm`] operations, so each backend gets them for free.

use async_trait::async_trait;
use cq_core::{CommitMessage, Patch, Result, Revision, ScmError};
use tracing::{info, instrument, warn};

use crate::backend::{LocalCommits, Scm};
use crate::changelog::{is_path_to_changelog, latest_entry};
use crate::command::{path_arg, ErrorPolicy, Invocation};
use crate::status::StatusGrammar;

/// Multi-step workflows layered on top of [`Scm`]
#[async_trait]
pub trait ScmExt: Scm {
    /// Fail on local modifications unless `force_clean`, then clean
    async fn ensure_clean_working_directory(&self, force_clean: bool) -> Result<()>;

    /// Fail on local commits unless `force`, then discard them
    async fn ensure_no_local_commits(&self, force: bool) -> Result<()>;

    /// The local-commit capability, or a user-facing error
    fn require_local_commits(&self) -> Result<&dyn LocalCommits>;

    /// Run a status-like command from the checkout root and keep the
    /// filenames matching `grammar`, in output order
    async fn run_status_and_extract_filenames(
        &self,
        status_command: Vec<String>,
        grammar: &StatusGrammar,
    ) -> Result<Vec<String>>;

    /// The revision a successful commit reported, if any
    fn svn_revision_from_commit_text(&self, commit_text: &str) -> Option<Revision>;

    /// Changed paths that are ChangeLog files
    async fn modified_changelogs(&self) -> Result<Vec<String>>;

    /// Commit message assembled from the latest entry of every modified ChangeLog
    async fn commit_message_for_this_commit(&self) -> Result<CommitMessage>;

    /// Apply a patch to the working copy with the checkout's apply script
    async fn apply_patch(&self, patch: &Patch, force: bool) -> Result<()>;
}

#[async_trait]
impl<T: Scm + ?Sized> ScmExt for T {
    #[instrument(skip(self))]
    async fn ensure_clean_working_directory(&self, force_clean: bool) -> Result<()> {
        if !force_clean && !self.working_directory_is_clean().await? {
            let status = self
                .context()
                .executive
                .run_command(
                    Invocation::new(self.status_command()).cwd(self.checkout_root()),
                    ErrorPolicy::Ignore,
                )
                .await?;
            warn!("Working directory is not clean:\n{}", status);
            return Err(ScmError::DirtyWorkingDirectory);
        }

        info!("Cleaning working directory");
        self.clean_working_directory().await
    }

    #[instrument(skip(self))]
    async fn ensure_no_local_commits(&self, force: bool) -> Result<()> {
        let Some(local) = self.local_commits_support() else {
            return Ok(());
        };

        let commits = local.local_commits().await?;
        if commits.is_empty() {
            return Ok(());
        }
        if !force {
            return Err(ScmError::LocalCommits(commits.len()));
        }

        info!("Discarding {} local commit(s)", commits.len());
        local.discard_local_commits().await
    }

    fn require_local_commits(&self) -> Result<&dyn LocalCommits> {
        self.local_commits_support().ok_or_else(|| {
            ScmError::Unsupported(format!(
                "Your source control manager ({}) does not support local commits.",
                self.display_name()
            ))
        })
    }

    async fn run_status_and_extract_filenames(
        &self,
        status_command: Vec<String>,
        grammar: &StatusGrammar,
    ) -> Result<Vec<String>> {
        let output = self
            .context()
            .executive
            .run_command(
                Invocation::new(status_command).cwd(self.checkout_root()),
                ErrorPolicy::Raise,
            )
            .await?;
        Ok(grammar.filenames(&output))
    }

    fn svn_revision_from_commit_text(&self, commit_text: &str) -> Option<Revision> {
        self.commit_success_regexp()
            .captures(commit_text)?
            .name("svn_revision")?
            .as_str()
            .parse::<u64>()
            .ok()
            .map(Revision::new)
    }

    async fn modified_changelogs(&self) -> Result<Vec<String>> {
        let file_name = &self.context().config.changelog.file_name;
        Ok(self
            .changed_files()
            .await?
            .into_iter()
            .filter(|path| is_path_to_changelog(path, file_name))
            .collect())
    }

    #[instrument(skip(self))]
    async fn commit_message_for_this_commit(&self) -> Result<CommitMessage> {
        let changelog_paths = self.modified_changelogs().await?;
        if changelog_paths.is_empty() {
            return Err(ScmError::Parse(
                "Found no modified ChangeLogs, cannot create a commit message.\n\
                 All changes require a ChangeLog."
                    .to_string(),
            ));
        }

        let mut messages = String::new();
        for changelog_path in &changelog_paths {
            info!("Parsing ChangeLog: {}", changelog_path);
            let absolute = self.absolute_path(changelog_path);
            let text = tokio::fs::read_to_string(&absolute).await?;
            let entry = latest_entry(&text).ok_or_else(|| {
                ScmError::Parse(format!("Failed to parse ChangeLog: {}", absolute.display()))
            })?;
            messages.push_str(entry.contents());
        }

        Ok(CommitMessage::from_text(&messages))
    }

    #[instrument(skip(self, patch), fields(bytes = patch.data.len()))]
    async fn apply_patch(&self, patch: &Patch, force: bool) -> Result<()> {
        let config = &self.context().config;
        let script = config.script_path(self.checkout_root(), &config.scripts.apply_patch);

        let mut args = vec![path_arg(&script)];
        if let Some(reviewer) = &patch.reviewer {
            args.push("--reviewer".to_string());
            args.push(reviewer.clone());
        }
        if force {
            args.push("--force".to_string());
        }

        self.context()
            .executive
            .run_command(
                Invocation::new(args)
                    .cwd(self.checkout_root())
                    .input(patch.data.clone()),
                ErrorPolicy::Raise,
            )
            .await?;
        Ok(())
    }
}

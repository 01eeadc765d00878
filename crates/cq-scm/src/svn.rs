//! Subversion backend
//!
//! Drives the `svn` command line client. Revisions are native here, so no
//! translation is needed and there are no local commits.

use async_trait::async_trait;
use cq_core::{strip_r_from_svn_revision, BackendKind, Patch, Result, Revision, ScmError};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use crate::backend::{LocalCommits, Scm, ScmContext};
use crate::command::{absolute_path, path_arg, ErrorPolicy, Executive, Invocation};
use crate::status::StatusGrammar;
use crate::user::prompt_until_answered;
use crate::workflow::ScmExt;

static COMMIT_SUCCESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^Committed revision (?P<svn_revision>\d+)\.$").expect("static regex")
});

/// Output returned instead of committing in dry-run mode
pub const DRY_RUN_COMMIT_OUTPUT: &str = "Dry run, no commit.\nCommitted revision 0.";

const LOGIN_ATTEMPTS: usize = 5;

/// Subversion working copy
#[derive(Debug)]
pub struct SvnScm {
    cwd: PathBuf,
    checkout_root: PathBuf,
    ctx: ScmContext,
    dry_run: bool,
    cached_version: OnceCell<String>,
}

impl SvnScm {
    /// Open the working copy containing `cwd`
    pub async fn open(ctx: ScmContext, cwd: impl Into<PathBuf>) -> Result<Self> {
        let cwd: PathBuf = cwd.into();
        let cwd = absolute_path(&cwd)?;
        let checkout_root = Self::find_checkout_root(&ctx.executive, &cwd)
            .await?
            .ok_or_else(|| {
                ScmError::Usage(format!(
                    "Unable to find the root of the svn checkout containing {}",
                    cwd.display()
                ))
            })?;
        Ok(Self::new(ctx, cwd, checkout_root))
    }

    /// Use a known checkout root without probing
    pub fn new(ctx: ScmContext, cwd: impl Into<PathBuf>, checkout_root: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            checkout_root: checkout_root.into(),
            ctx,
            dry_run: false,
            cached_version: OnceCell::new(),
        }
    }

    /// Whether `path` is inside an svn working copy
    pub fn in_working_directory(path: &Path) -> bool {
        path.join(".svn").is_dir()
    }

    /// Walk up from `path` while the repository UUID stays the same
    ///
    /// Returns `path` itself when it is not in a working copy, and `None` when
    /// the walk reaches the filesystem root without the UUID changing. The
    /// result is always absolute.
    pub async fn find_checkout_root(executive: &Executive, path: &Path) -> Result<Option<PathBuf>> {
        let path = absolute_path(path)?;
        let Some(uuid) = Self::find_uuid(executive, &path).await? else {
            return Ok(Some(path));
        };

        let mut current = path;
        let mut last_path = None;
        loop {
            if Self::find_uuid(executive, &current).await?.as_deref() != Some(uuid.as_str()) {
                return Ok(last_path);
            }
            let parent = current.parent().map(Path::to_path_buf);
            last_path = Some(current);
            match parent {
                Some(parent) => current = parent,
                None => return Ok(None),
            }
        }
    }

    async fn find_uuid(executive: &Executive, path: &Path) -> Result<Option<String>> {
        if !Self::in_working_directory(path) {
            return Ok(None);
        }
        Self::value_from_svn_info(executive, path, "Repository UUID")
            .await
            .map(Some)
    }

    /// One `Field: value` line of `svn info`
    pub async fn value_from_svn_info(
        executive: &Executive,
        path: &Path,
        field_name: &str,
    ) -> Result<String> {
        let output = executive
            .run_command(
                Invocation::new(["svn".to_string(), "info".to_string(), path_arg(path)]),
                ErrorPolicy::Raise,
            )
            .await?;

        let pattern = Regex::new(&format!(r"(?m)^{}: (?P<value>.+)$", regex::escape(field_name)))?;
        pattern
            .captures(output.trim_end())
            .and_then(|captures| captures.name("value"))
            .map(|value| value.as_str().to_string())
            .ok_or_else(|| ScmError::Parse(format!("svn info did not contain a {}.", field_name)))
    }

    /// `svn --version --quiet`, fetched once per instance
    pub async fn svn_version(&self) -> Result<&str> {
        let version = self
            .cached_version
            .get_or_try_init(|| async {
                self.ctx
                    .executive
                    .run_command(Invocation::new(["svn", "--version", "--quiet"]), ErrorPolicy::Raise)
                    .await
            })
            .await?;
        Ok(version.as_str())
    }

    /// Forget the cached tool version
    pub fn clear_cached_version(&mut self) {
        self.cached_version.take();
    }

    /// Whether cached credentials exist for the configured realm
    #[instrument(skip(self))]
    pub async fn has_authorization_for_realm(&self) -> Result<bool> {
        let Some(home) = self.ctx.config.home_dir.clone().or_else(dirs::home_dir) else {
            return Ok(false);
        };
        if !home.join(".subversion").is_dir() {
            return Ok(false);
        }

        let realm = &self.ctx.config.svn.server_realm;
        let search = self
            .ctx
            .executive
            .run_command(
                Invocation::new([
                    "find",
                    ".subversion",
                    "-type",
                    "f",
                    "-exec",
                    "grep",
                    "-q",
                    realm.as_str(),
                    "{}",
                    ";",
                    "-print",
                ])
                .cwd(&home),
                ErrorPolicy::Ignore,
            )
            .await;
        // Only a failure to start `find` gets here; treat it as nothing cached
        let output = match search {
            Ok(output) => output,
            Err(e) => {
                debug!("Could not search for cached credentials: {}", e);
                return Ok(false);
            }
        };

        Ok(output
            .lines()
            .next()
            .is_some_and(|found| !found.is_empty() && home.join(found).is_file()))
    }

    async fn status_grammar(&self, expected_types: &str) -> Result<StatusGrammar> {
        StatusGrammar::svn(expected_types, self.svn_version().await?)
    }

    async fn repository_url(&self) -> Result<String> {
        Self::value_from_svn_info(&self.ctx.executive, &self.checkout_root, "URL").await
    }

    async fn run<I, S>(&self, args: I, policy: ErrorPolicy) -> Result<String>
    where
        I: IntoIterator<Item = S> + Send,
        S: Into<String>,
    {
        self.ctx
            .executive
            .run_command(Invocation::new(args).cwd(&self.checkout_root), policy)
            .await
    }

    async fn run_bytes<I, S>(&self, args: I) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = S> + Send,
        S: Into<String>,
    {
        self.ctx
            .executive
            .run_command_bytes(Invocation::new(args).cwd(&self.checkout_root), ErrorPolicy::Raise)
            .await
    }
}

#[async_trait]
impl Scm for SvnScm {
    fn kind(&self) -> BackendKind {
        BackendKind::Svn
    }

    fn display_name(&self) -> &'static str {
        "svn"
    }

    fn cwd(&self) -> &Path {
        &self.cwd
    }

    fn checkout_root(&self) -> &Path {
        &self.checkout_root
    }

    fn absolute_path(&self, repository_relative_path: &str) -> PathBuf {
        self.checkout_root.join(repository_relative_path)
    }

    fn context(&self) -> &ScmContext {
        &self.ctx
    }

    fn dry_run(&self) -> bool {
        self.dry_run
    }

    fn set_dry_run(&mut self, dry_run: bool) {
        self.dry_run = dry_run;
    }

    fn commit_success_regexp(&self) -> &'static Regex {
        &COMMIT_SUCCESS
    }

    fn status_command(&self) -> Vec<String> {
        vec!["svn".to_string(), "status".to_string()]
    }

    async fn working_directory_is_clean(&self) -> Result<bool> {
        Ok(self.run(["svn", "diff"], ErrorPolicy::Raise).await?.is_empty())
    }

    #[instrument(skip(self))]
    async fn clean_working_directory(&self) -> Result<()> {
        // `svn revert` leaves added files behind; remove them like `git reset --hard`
        let mut added_files = self.added_files().await?;
        added_files.sort_unstable_by(|a, b| b.cmp(a));

        self.run(["svn", "revert", "-R", "."], ErrorPolicy::Raise).await?;
        for path in added_files {
            let absolute_path = self.absolute_path(&path);
            debug!("Removing added path {}", absolute_path.display());
            if absolute_path.is_dir() {
                tokio::fs::remove_dir(&absolute_path).await?;
            } else {
                tokio::fs::remove_file(&absolute_path).await?;
            }
        }
        Ok(())
    }

    async fn add(&self, path: &str) -> Result<()> {
        self.run(["svn", "add", path], ErrorPolicy::Raise).await?;
        Ok(())
    }

    async fn changed_files(&self) -> Result<Vec<String>> {
        let grammar = self.status_grammar("ACDMR").await?;
        self.run_status_and_extract_filenames(self.status_command(), &grammar)
            .await
    }

    async fn changed_files_for_revision(&self, revision: Revision) -> Result<Vec<String>> {
        // `svn diff --summarize` prints the same columns as `svn status`
        let grammar = self.status_grammar("ACDMR").await?;
        let command = vec![
            "svn".to_string(),
            "diff".to_string(),
            "--summarize".to_string(),
            "-c".to_string(),
            revision.to_string(),
        ];
        self.run_status_and_extract_filenames(command, &grammar).await
    }

    async fn added_files(&self) -> Result<Vec<String>> {
        let grammar = self.status_grammar("A").await?;
        self.run_status_and_extract_filenames(self.status_command(), &grammar)
            .await
    }

    async fn conflicted_files(&self) -> Result<Vec<String>> {
        let grammar = self.status_grammar("C").await?;
        self.run_status_and_extract_filenames(self.status_command(), &grammar)
            .await
    }

    async fn create_patch(&self) -> Result<Patch> {
        let config = &self.ctx.config;
        let script = config.script_path(&self.checkout_root, &config.scripts.create_patch);
        Ok(Patch::new(self.run_bytes([path_arg(&script)]).await?))
    }

    async fn diff_for_revision(&self, revision: Revision) -> Result<Patch> {
        let data = self
            .run_bytes(["svn".to_string(), "diff".to_string(), "-c".to_string(), revision.to_string()])
            .await?;
        Ok(Patch::new(data))
    }

    async fn contents_at_revision(&self, path: &str, revision: Revision) -> Result<Vec<u8>> {
        let remote_path = format!("{}/{}", self.repository_url().await?, path);
        self.run_bytes(["svn".to_string(), "cat".to_string(), "-r".to_string(), revision.to_string(), remote_path])
            .await
    }

    async fn committer_email_for_revision(&self, revision: Revision) -> Result<String> {
        let output = self
            .run(
                [
                    "svn".to_string(),
                    "propget".to_string(),
                    "svn:author".to_string(),
                    "--revprop".to_string(),
                    "-r".to_string(),
                    revision.to_string(),
                ],
                ErrorPolicy::Raise,
            )
            .await?;
        Ok(output.trim_end().to_string())
    }

    #[instrument(skip(self))]
    async fn apply_reverse_diff(&self, revision: Revision) -> Result<()> {
        // `-c -N` merges the inverse of revision N
        let args = vec![
            "svn".to_string(),
            "merge".to_string(),
            "--non-interactive".to_string(),
            "-c".to_string(),
            format!("-{}", revision),
            self.repository_url().await?,
        ];
        warn!("svn merge has been known to take more than 10 minutes to complete. It is recommended you use git for rollouts.");
        info!("Running '{}'", args.join(" "));
        self.run(args, ErrorPolicy::Raise).await?;

        let conflicts = self.conflicted_files().await?;
        if !conflicts.is_empty() {
            return Err(ScmError::Conflicts {
                revision: revision.to_string(),
                paths: conflicts,
            });
        }
        Ok(())
    }

    async fn revert_files(&self, file_paths: &[String]) -> Result<()> {
        if file_paths.is_empty() {
            return Ok(());
        }
        let mut args = vec!["svn".to_string(), "revert".to_string()];
        args.extend(file_paths.iter().cloned());
        self.run(args, ErrorPolicy::Raise).await?;
        Ok(())
    }

    #[instrument(skip(self, message))]
    async fn commit_with_message(&self, message: &str, username: Option<&str>) -> Result<String> {
        if self.dry_run {
            // Looks like a real commit so output parsers behave the same
            return Ok(DRY_RUN_COMMIT_OUTPUT.to_string());
        }

        let mut username = username.map(str::to_string);
        if username.is_none() && !self.has_authorization_for_realm().await? {
            let host = &self.ctx.config.svn.server_host;
            username = prompt_until_answered(
                self.ctx.prompt.as_ref(),
                &format!("{} login: ", host),
                LOGIN_ATTEMPTS,
            );
            if username.is_none() {
                return Err(ScmError::MissingCredentials(host.clone()));
            }
        }

        let mut args = vec!["svn".to_string(), "commit".to_string()];
        if let Some(username) = username {
            args.push("--username".to_string());
            args.push(username);
        }
        args.push("-m".to_string());
        args.push(message.to_string());
        self.run(args, ErrorPolicy::Commit).await
    }

    async fn svn_commit_log(&self, svn_revision: &str) -> Result<String> {
        let svn_revision = strip_r_from_svn_revision(svn_revision);
        self.run(
            ["svn", "log", "--non-interactive", "--revision", svn_revision],
            ErrorPolicy::Raise,
        )
        .await
    }

    async fn last_svn_commit_log(&self) -> Result<String> {
        // BASE is the checkout revision, HEAD the repository's
        self.svn_commit_log("BASE").await
    }

    fn supports_local_commits(&self) -> bool {
        false
    }

    fn local_commits_support(&self) -> Option<&dyn LocalCommits> {
        None
    }
}

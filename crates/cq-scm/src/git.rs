//! Git backend bridged to Subversion with `git svn`
//!
//! Revisions live in the Subversion space and are translated to commit ids
//! with `git svn find-rev`. Commits are made locally and published with
//! `git svn dcommit`.

use async_trait::async_trait;
use cq_core::{
    strip_r_from_svn_revision, BackendKind, CommitMessage, Patch, Result, Revision, ScmError,
};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info, instrument};

use crate::backend::{LocalCommits, Scm, ScmContext};
use crate::command::{absolute_path, path_arg, ErrorPolicy, Executive, Invocation};
use crate::status::StatusGrammar;
use crate::workflow::ScmExt;

static COMMIT_SUCCESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^Committed r(?P<svn_revision>\d+)$").expect("static regex")
});

/// Appended to `git svn dcommit --dry-run` output
pub const DRY_RUN_COMMIT_SUFFIX: &str = "\nCommitted r0";

/// git-svn working tree
#[derive(Debug)]
pub struct GitScm {
    cwd: PathBuf,
    checkout_root: PathBuf,
    ctx: ScmContext,
    dry_run: bool,
}

impl GitScm {
    /// Open the work tree containing `cwd`
    pub async fn open(ctx: ScmContext, cwd: impl Into<PathBuf>) -> Result<Self> {
        let cwd: PathBuf = cwd.into();
        let cwd = absolute_path(&cwd)?;
        let checkout_root = Self::find_checkout_root(&ctx.executive, &cwd).await?;
        Ok(Self::new(ctx, cwd, checkout_root))
    }

    /// Use a known checkout root without probing
    pub fn new(ctx: ScmContext, cwd: impl Into<PathBuf>, checkout_root: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            checkout_root: checkout_root.into(),
            ctx,
            dry_run: false,
        }
    }

    /// Whether `path` is inside a git work tree; any failure counts as no
    pub async fn in_working_directory(executive: &Executive, path: &Path) -> bool {
        executive
            .run_command(
                Invocation::new(["git", "rev-parse", "--is-inside-work-tree"]).cwd(path),
                ErrorPolicy::Ignore,
            )
            .await
            .is_ok_and(|output| output.trim_end() == "true")
    }

    /// Parent of the metadata directory reported by `git rev-parse --git-dir`,
    /// always absolute
    pub async fn find_checkout_root(executive: &Executive, path: &Path) -> Result<PathBuf> {
        let path = absolute_path(path)?;
        let output = executive
            .run_command(
                Invocation::new(["git", "rev-parse", "--git-dir"]).cwd(&path),
                ErrorPolicy::Raise,
            )
            .await?;

        // Relative answers (`.git`, `../.git`) are relative to where git ran
        let git_dir = absolute_path(&path.join(output.trim_end()))?;
        git_dir
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| ScmError::Parse(format!("git reported {} as its git dir", git_dir.display())))
    }

    /// Value of a `git config` key, empty when unset
    pub async fn read_git_config(&self, key: &str) -> Result<String> {
        let output = self.run(["git", "config", key], ErrorPolicy::Ignore).await?;
        Ok(output.trim_end_matches('\n').to_string())
    }

    /// Local commit id for a Subversion revision
    #[instrument(skip(self))]
    pub async fn git_commit_from_svn_revision(&self, revision: Revision) -> Result<String> {
        // find-rev exits 0 even when nothing is found
        let output = self
            .run(["git".to_string(), "svn".to_string(), "find-rev".to_string(), format!("r{}", revision)], ErrorPolicy::Raise)
            .await?;
        let git_commit = output.trim_end();
        if git_commit.is_empty() {
            return Err(ScmError::CheckoutOutOfSync(revision));
        }
        debug!("r{} is {}", revision, git_commit);
        Ok(git_commit.to_string())
    }

    /// Publish local commits with `git svn dcommit`
    #[instrument(skip(self))]
    pub async fn push_local_commits_to_server(&self) -> Result<String> {
        let mut args = vec!["git", "svn", "dcommit"];
        if self.dry_run {
            args.push("--dry-run");
        }
        let mut output = self.run(args, ErrorPolicy::Commit).await?;
        if self.dry_run {
            output.push_str(DRY_RUN_COMMIT_SUFFIX);
        }
        Ok(output)
    }

    async fn changed_files_for_commit(&self, git_commit: &str) -> Result<Vec<String>> {
        // --pretty=format: prints a blank line where the header would be
        let output = self
            .run(["git", "show", "--pretty=format:", "--name-only", git_commit], ErrorPolicy::Raise)
            .await?;
        Ok(output
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect())
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
impl Scm for GitScm {
    fn kind(&self) -> BackendKind {
        BackendKind::Git
    }

    fn display_name(&self) -> &'static str {
        "git"
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
        // `git status` exits non-zero when there are changes
        ["git", "diff", "--name-status", "HEAD"]
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    async fn working_directory_is_clean(&self) -> Result<bool> {
        Ok(self
            .run(["git", "diff", "HEAD", "--name-only"], ErrorPolicy::Raise)
            .await?
            .is_empty())
    }

    #[instrument(skip(self))]
    async fn clean_working_directory(&self) -> Result<()> {
        self.run(["git", "reset", "--hard", "HEAD"], ErrorPolicy::Raise).await?;
        // Not reflected in working_directory_is_clean
        if self.rebase_in_progress() {
            info!("Aborting rebase in progress");
            self.run(["git", "rebase", "--abort"], ErrorPolicy::Raise).await?;
        }
        Ok(())
    }

    async fn add(&self, path: &str) -> Result<()> {
        self.run(["git", "add", path], ErrorPolicy::Raise).await?;
        Ok(())
    }

    async fn changed_files(&self) -> Result<Vec<String>> {
        let command = ["git", "diff", "-r", "--name-status", "-C", "-M", "HEAD"]
            .into_iter()
            .map(str::to_string)
            .collect();
        self.run_status_and_extract_filenames(command, &StatusGrammar::git("ADM")?)
            .await
    }

    async fn changed_files_for_revision(&self, revision: Revision) -> Result<Vec<String>> {
        let commit_id = self.git_commit_from_svn_revision(revision).await?;
        self.changed_files_for_commit(&commit_id).await
    }

    async fn added_files(&self) -> Result<Vec<String>> {
        self.run_status_and_extract_filenames(self.status_command(), &StatusGrammar::git("A")?)
            .await
    }

    async fn conflicted_files(&self) -> Result<Vec<String>> {
        let command = ["git", "diff", "--name-status", "-C", "-M", "--diff-filter=U"]
            .into_iter()
            .map(str::to_string)
            .collect();
        self.run_status_and_extract_filenames(command, &StatusGrammar::git("U")?)
            .await
    }

    async fn create_patch(&self) -> Result<Patch> {
        Ok(Patch::new(self.run_bytes(["git", "diff", "--binary", "HEAD"]).await?))
    }

    async fn diff_for_revision(&self, revision: Revision) -> Result<Patch> {
        let commit_id = self.git_commit_from_svn_revision(revision).await?;
        self.create_patch_from_local_commit(&commit_id).await
    }

    async fn contents_at_revision(&self, path: &str, revision: Revision) -> Result<Vec<u8>> {
        let commit_id = self.git_commit_from_svn_revision(revision).await?;
        self.run_bytes(["git".to_string(), "show".to_string(), format!("{}:{}", commit_id, path)])
            .await
    }

    async fn committer_email_for_revision(&self, revision: Revision) -> Result<String> {
        let commit_id = self.git_commit_from_svn_revision(revision).await?;
        let email = self
            .run(["git", "log", "-1", "--pretty=format:%ce", commit_id.as_str()], ErrorPolicy::Raise)
            .await?;
        // git-svn appends @<repository uuid> to every committer email
        Ok(match email.rsplit_once('@') {
            Some((committer, _)) => committer.to_string(),
            None => email,
        })
    }

    #[instrument(skip(self))]
    async fn apply_reverse_diff(&self, revision: Revision) -> Result<()> {
        let commit_id = self.git_commit_from_svn_revision(revision).await?;
        // Usually conflicts in ChangeLogs; those get resolved below
        self.run(["git", "revert", "--no-commit", commit_id.as_str()], ErrorPolicy::Ignore)
            .await?;

        let changelog_paths = self.modified_changelogs().await?;
        if !changelog_paths.is_empty() {
            let config = &self.ctx.config;
            let script = config.script_path(&self.checkout_root, &config.scripts.resolve_changelogs);
            let mut args = vec![path_arg(&script)];
            args.extend(changelog_paths);
            self.run(args, ErrorPolicy::Raise).await?;
        }

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
        let mut args = vec!["git".to_string(), "checkout".to_string(), "HEAD".to_string()];
        args.extend(file_paths.iter().cloned());
        self.run(args, ErrorPolicy::Raise).await?;
        Ok(())
    }

    /// `username` is ignored; git-svn uses its own credentials
    #[instrument(skip(self, message))]
    async fn commit_with_message(&self, message: &str, _username: Option<&str>) -> Result<String> {
        self.commit_locally_with_message(message).await?;
        self.push_local_commits_to_server().await
    }

    async fn svn_commit_log(&self, svn_revision: &str) -> Result<String> {
        let svn_revision = strip_r_from_svn_revision(svn_revision);
        self.run(["git", "svn", "log", "-r", svn_revision], ErrorPolicy::Raise)
            .await
    }

    async fn last_svn_commit_log(&self) -> Result<String> {
        self.run(["git", "svn", "log", "--limit=1"], ErrorPolicy::Raise)
            .await
    }

    fn supports_local_commits(&self) -> bool {
        true
    }

    fn local_commits_support(&self) -> Option<&dyn LocalCommits> {
        Some(self as &dyn LocalCommits)
    }
}

#[async_trait]
impl LocalCommits for GitScm {
    async fn local_commits(&self) -> Result<Vec<String>> {
        let range = format!("HEAD...{}", self.svn_branch_name().await?);
        let output = self
            .run(["git", "log", "--pretty=oneline", range.as_str()], ErrorPolicy::Raise)
            .await?;
        Ok(output.lines().map(str::to_string).collect())
    }

    #[instrument(skip(self))]
    async fn discard_local_commits(&self) -> Result<()> {
        let branch = self.svn_branch_name().await?;
        self.run(["git", "reset", "--hard", branch.as_str()], ErrorPolicy::Raise)
            .await?;
        Ok(())
    }

    async fn commit_locally_with_message(&self, message: &str) -> Result<()> {
        self.ctx
            .executive
            .run_command(
                Invocation::new(["git", "commit", "--all", "-F", "-"])
                    .cwd(&self.checkout_root)
                    .input(message.as_bytes()),
                ErrorPolicy::Raise,
            )
            .await?;
        Ok(())
    }

    async fn create_patch_from_local_commit(&self, commit_id: &str) -> Result<Patch> {
        let range = format!("{0}^..{0}", commit_id);
        Ok(Patch::new(self.run_bytes(["git", "diff", "--binary", range.as_str()]).await?))
    }

    async fn create_patch_since_local_commit(&self, commit_id: &str) -> Result<Patch> {
        Ok(Patch::new(self.run_bytes(["git", "diff", "--binary", commit_id]).await?))
    }

    /// No arguments means every commit since the svn branch. `A B` yields
    /// both commits rather than the range between them.
    async fn commit_ids_from_commitish_arguments(&self, args: &[String]) -> Result<Vec<String>> {
        let args = if args.is_empty() {
            vec![format!("{}..HEAD", self.svn_branch_name().await?)]
        } else {
            args.to_vec()
        };

        let mut commit_ids = Vec::new();
        for commitish in &args {
            if commitish.contains("...") {
                return Err(ScmError::Usage(format!(
                    "'...' is not supported (found in '{}'). Did you mean '..'?",
                    commitish
                )));
            } else if commitish.contains("..") {
                let output = self
                    .run(["git", "rev-list", commitish.as_str()], ErrorPolicy::Raise)
                    .await?;
                commit_ids.extend(output.lines().rev().map(str::to_string));
            } else {
                // Branch and tag names resolve to commit ids too
                let output = self
                    .run(["git", "rev-parse", "--revs-only", commitish.as_str()], ErrorPolicy::Raise)
                    .await?;
                commit_ids.extend(output.lines().map(str::to_string));
            }
        }
        Ok(commit_ids)
    }

    async fn commit_message_for_local_commit(&self, commit_id: &str) -> Result<CommitMessage> {
        let output = self
            .run(["git", "cat-file", "commit", commit_id], ErrorPolicy::Raise)
            .await?;
        // Headers end at the first blank line
        let message_lines = output.lines().skip_while(|line| !line.is_empty()).skip(1);
        Ok(CommitMessage::new(message_lines))
    }

    async fn files_changed_summary_for_commit(&self, commit_id: &str) -> Result<String> {
        self.run(["git", "diff-tree", "--shortstat", "--no-commit-id", commit_id], ErrorPolicy::Raise)
            .await
    }

    async fn svn_branch_name(&self) -> Result<String> {
        let fetch = self.read_git_config("svn-remote.svn.fetch").await?;
        fetch
            .split(':')
            .nth(1)
            .filter(|branch| !branch.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                ScmError::Config(format!(
                    "svn-remote.svn.fetch is not set in {}; is this a git svn checkout?",
                    self.checkout_root.display()
                ))
            })
    }

    async fn svn_merge_base(&self) -> Result<String> {
        let branch = self.svn_branch_name().await?;
        let output = self
            .run(["git", "merge-base", branch.as_str(), "HEAD"], ErrorPolicy::Raise)
            .await?;
        Ok(output.trim().to_string())
    }

    async fn delete_branch(&self, branch: &str) -> Result<()> {
        let reference = format!("refs/heads/{}", branch);
        let exists = self
            .ctx
            .executive
            .run_exit_code(
                Invocation::new(["git", "show-ref", "--quiet", "--verify", reference.as_str()])
                    .cwd(&self.checkout_root),
            )
            .await?
            == 0;
        if exists {
            self.run(["git", "branch", "-D", branch], ErrorPolicy::Raise).await?;
        }
        Ok(())
    }

    fn rebase_in_progress(&self) -> bool {
        self.checkout_root.join(".git").join("rebase-apply").exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandOutput, MockExecutor};
    use cq_core::CqConfig;
    use std::sync::Arc;
    use tempfile::TempDir;

    const ROOT: &str = "/mock/checkout";
    const SVN_FETCH: &str = "trunk:refs/remotes/trunk\n";

    fn git_at(mock: MockExecutor, root: &Path) -> (GitScm, Arc<MockExecutor>) {
        let mock = Arc::new(mock);
        let ctx = ScmContext::new(Executive::new(mock.clone()), CqConfig::default());
        (GitScm::new(ctx, root, root), mock)
    }

    fn git(mock: MockExecutor) -> (GitScm, Arc<MockExecutor>) {
        git_at(mock.with_output("git config svn-remote.svn.fetch", SVN_FETCH), Path::new(ROOT))
    }

    #[tokio::test]
    async fn test_in_working_directory_is_false_on_failure() {
        let executive = Executive::new(Arc::new(
            MockExecutor::new().with_failure(
                "git rev-parse --is-inside-work-tree",
                128,
                "fatal: not a git repository (or any of the parent directories): .git",
            ),
        ));
        assert!(!GitScm::in_working_directory(&executive, Path::new("/tmp")).await);

        // No response at all behaves the same
        let executive = Executive::new(Arc::new(MockExecutor::new()));
        assert!(!GitScm::in_working_directory(&executive, Path::new("/tmp")).await);
    }

    #[tokio::test]
    async fn test_checkout_root_from_git_dir() {
        let executive = Executive::new(Arc::new(
            MockExecutor::new().with_output("git rev-parse --git-dir", ".git\n"),
        ));
        assert_eq!(
            GitScm::find_checkout_root(&executive, Path::new(ROOT)).await.unwrap(),
            PathBuf::from(ROOT)
        );

        let executive = Executive::new(Arc::new(
            MockExecutor::new().with_output("git rev-parse --git-dir", "/mock/checkout/.git\n"),
        ));
        assert_eq!(
            GitScm::find_checkout_root(&executive, Path::new("/mock/checkout/WebCore/dom"))
                .await
                .unwrap(),
            PathBuf::from(ROOT)
        );

        let executive = Executive::new(Arc::new(
            MockExecutor::new().with_output("git rev-parse --git-dir", "../.git\n"),
        ));
        assert_eq!(
            GitScm::find_checkout_root(&executive, Path::new("/mock/checkout/WebCore"))
                .await
                .unwrap(),
            PathBuf::from(ROOT)
        );
    }

    #[tokio::test]
    async fn test_open_from_relative_path_is_absolute() {
        let mock = Arc::new(MockExecutor::new().with_output("git rev-parse --git-dir", ".git\n"));
        let ctx = ScmContext::new(Executive::new(mock.clone()), CqConfig::default());
        let cwd = std::env::current_dir().unwrap();

        let scm = GitScm::open(ctx, ".").await.unwrap();

        assert_eq!(scm.checkout_root(), cwd.as_path());
        assert_eq!(scm.cwd(), cwd.as_path());
        assert!(scm.absolute_path("WebCore/ChangeLog").is_absolute());
        assert_eq!(mock.calls()[0].cwd.as_deref(), Some(cwd.as_path()));
    }

    #[tokio::test]
    async fn test_revert_files() {
        let (scm, mock) = git(MockExecutor::new().with_output("git checkout HEAD WebCore/ChangeLog", ""));

        scm.revert_files(&["WebCore/ChangeLog".to_string()]).await.unwrap();

        let call = mock.calls().pop().unwrap();
        assert_eq!(call.args, vec!["git", "checkout", "HEAD", "WebCore/ChangeLog"]);
        assert_eq!(call.cwd.as_deref(), Some(Path::new(ROOT)));
    }

    #[tokio::test]
    async fn test_contents_at_revision_shows_blob() {
        let (scm, mock) = git(
            MockExecutor::new()
                .with_output("git svn find-rev r47345", "a1b2c3\n")
                .with_response(
                    "git show a1b2c3:WebCore/image.png",
                    CommandOutput {
                        stdout: vec![0x89, b'P', b'N', b'G', 0],
                        ..Default::default()
                    },
                ),
        );

        let contents = scm
            .contents_at_revision("WebCore/image.png", Revision::new(47345))
            .await
            .unwrap();

        assert_eq!(contents, vec![0x89, b'P', b'N', b'G', 0]);
        let call = mock.calls().pop().unwrap();
        assert_eq!(call.args, vec!["git", "show", "a1b2c3:WebCore/image.png"]);
        assert_eq!(call.cwd.as_deref(), Some(Path::new(ROOT)));
    }

    #[tokio::test]
    async fn test_svn_commit_logs() {
        let (scm, mock) = git(
            MockExecutor::new()
                .with_output("git svn log -r 1234", "r1234 | eric\n")
                .with_output("git svn log --limit=1", "r47345 | mjs\n"),
        );

        assert_eq!(scm.svn_commit_log("r1234").await.unwrap(), "r1234 | eric\n");
        assert_eq!(scm.last_svn_commit_log().await.unwrap(), "r47345 | mjs\n");
        assert!(mock.calls().iter().all(|c| c.cwd.as_deref() == Some(Path::new(ROOT))));
    }

    #[tokio::test]
    async fn test_merge_base_and_patch_since_commit() {
        let (scm, mock) = git(
            MockExecutor::new()
                .with_output("git merge-base refs/remotes/trunk HEAD", "5f4e3d\n")
                .with_output("git diff --binary 5f4e3d", "diff --git a/WebCore/ChangeLog b/WebCore/ChangeLog\n"),
        );

        let merge_base = scm.svn_merge_base().await.unwrap();
        assert_eq!(merge_base, "5f4e3d");

        let patch = scm.create_patch_since_local_commit(&merge_base).await.unwrap();
        assert_eq!(
            patch.to_text_lossy(),
            "diff --git a/WebCore/ChangeLog b/WebCore/ChangeLog\n"
        );
        assert!(mock.was_run("git merge-base refs/remotes/trunk HEAD"));
        assert!(mock.calls().iter().all(|c| c.cwd.as_deref() == Some(Path::new(ROOT))));
    }

    #[tokio::test]
    async fn test_unknown_revision_means_checkout_out_of_sync() {
        let (scm, _) = git(MockExecutor::new().with_output("git svn find-rev r9999999", "\n"));
        let err = scm.diff_for_revision(Revision::new(9999999)).await.unwrap_err();
        assert!(matches!(err, ScmError::CheckoutOutOfSync(rev) if rev.number() == 9999999));
        assert!(err.to_string().contains("needs an update"));
    }

    #[tokio::test]
    async fn test_changed_files_for_revision_skips_blank_lines() {
        let (scm, _) = git(
            MockExecutor::new()
                .with_output("git svn find-rev r47345", "a1b2c3\n")
                .with_output(
                    "git show --pretty=format: --name-only a1b2c3",
                    "\nWebCore/ChangeLog\nWebCore/dom/Node.cpp\n",
                ),
        );
        assert_eq!(
            scm.changed_files_for_revision(Revision::new(47345)).await.unwrap(),
            vec!["WebCore/ChangeLog", "WebCore/dom/Node.cpp"]
        );
    }

    #[tokio::test]
    async fn test_committer_email_drops_repository_suffix() {
        let (scm, _) = git(
            MockExecutor::new()
                .with_output("git svn find-rev r3", "c0ffee\n")
                .with_output(
                    "git log -1 --pretty=format:%ce c0ffee",
                    "mjs@apple.com@268f45cc-cd09-0410-ab3c-d52691b4dbfc",
                ),
        );
        assert_eq!(
            scm.committer_email_for_revision(Revision::new(3)).await.unwrap(),
            "mjs@apple.com"
        );
    }

    #[tokio::test]
    async fn test_dry_run_commit_uses_dcommit_dry_run() {
        let (mut scm, mock) = git(
            MockExecutor::new()
                .with_output("git commit --all -F -", "[master 1234567] Fix the build\n")
                .with_output("git svn dcommit --dry-run", "Committing to http://svn.webkit.org/repository/webkit/trunk ...\n"),
        );
        scm.set_dry_run(true);

        let output = scm.commit_with_message("Fix the build", None).await.unwrap();

        assert!(output.ends_with("\nCommitted r0"));
        assert_eq!(scm.svn_revision_from_commit_text(&output), Some(Revision::new(0)));
        assert!(!mock.was_run("git svn dcommit"));

        let commit = mock
            .calls()
            .into_iter()
            .find(|call| call.command_line() == "git commit --all -F -")
            .unwrap();
        assert_eq!(commit.input.as_deref(), Some(b"Fix the build".as_slice()));
    }

    #[tokio::test]
    async fn test_stale_dcommit_is_retryable() {
        let (scm, _) = git(
            MockExecutor::new()
                .with_output("git commit --all -F -", "")
                .with_response(
                    "git svn dcommit",
                    CommandOutput {
                        stdout: b"Committing to http://svn.webkit.org/repository/webkit/trunk ...\n".to_vec(),
                        stderr: "Transaction is out of date: File '/trunk/ChangeLog' is out of date at /usr/libexec/git-core/git-svn line 570\nresource out of date; try updating\n".to_string(),
                        exit_code: 1,
                    },
                ),
        );

        let err = scm.commit_with_message("msg", None).await.unwrap_err();
        assert!(matches!(err, ScmError::CheckoutNeedsUpdate(_)));
        assert_eq!(err.script_error().unwrap().command_name(), "git svn dcommit");
    }

    #[tokio::test]
    async fn test_commitish_arguments() {
        let (scm, _) = git(
            MockExecutor::new()
                .with_output("git rev-list refs/remotes/trunk..HEAD", "ccc\nbbb\naaa\n")
                .with_output("git rev-list aaa..ccc", "ccc\nbbb\n")
                .with_output("git rev-parse --revs-only my-branch", "ddd\n"),
        );

        assert_eq!(
            scm.commit_ids_from_commitish_arguments(&[]).await.unwrap(),
            vec!["aaa", "bbb", "ccc"]
        );
        assert_eq!(
            scm.commit_ids_from_commitish_arguments(&["aaa..ccc".to_string(), "my-branch".to_string()])
                .await
                .unwrap(),
            vec!["bbb", "ccc", "ddd"]
        );

        let err = scm
            .commit_ids_from_commitish_arguments(&["aaa...ccc".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, ScmError::Usage(ref msg) if msg.contains("aaa...ccc")));
    }

    #[tokio::test]
    async fn test_commit_message_skips_headers() {
        let (scm, _) = git(MockExecutor::new().with_output(
            "git cat-file commit abc123",
            "tree 8e2f\nparent 77aa\nauthor Eric <eric@webkit.org> 1250000000 -0700\ncommitter Eric <eric@webkit.org> 1250000000 -0700\n\nFix the build\n\n        Reviewed by Adam.\n",
        ));

        let message = scm.commit_message_for_local_commit("abc123").await.unwrap();
        assert_eq!(message.description(false, false), "Fix the build");
        assert_eq!(message.body(true), "Reviewed by Adam.\n");
    }

    #[tokio::test]
    async fn test_local_commits_and_discard() {
        let (scm, mock) = git(
            MockExecutor::new()
                .with_output(
                    "git log --pretty=oneline HEAD...refs/remotes/trunk",
                    "abc123 Fix the build\ndef456 Add a test\n",
                )
                .with_output("git reset --hard refs/remotes/trunk", ""),
        );

        assert_eq!(scm.local_commits().await.unwrap().len(), 2);
        let err = scm.ensure_no_local_commits(false).await.unwrap_err();
        assert!(matches!(err, ScmError::LocalCommits(2)));
        assert!(!mock.was_run("git reset --hard refs/remotes/trunk"));

        scm.ensure_no_local_commits(true).await.unwrap();
        assert!(mock.was_run("git reset --hard refs/remotes/trunk"));
    }

    #[tokio::test]
    async fn test_missing_svn_remote_is_config_error() {
        let (scm, _) = git_at(
            MockExecutor::new().with_failure("git config svn-remote.svn.fetch", 1, ""),
            Path::new(ROOT),
        );
        assert!(matches!(scm.svn_branch_name().await, Err(ScmError::Config(_))));
    }

    #[tokio::test]
    async fn test_delete_branch_only_when_present() {
        let (scm, mock) = git(
            MockExecutor::new()
                .with_output("git show-ref --quiet --verify refs/heads/bugzilla-tool", "")
                .with_output("git branch -D bugzilla-tool", "Deleted branch bugzilla-tool\n")
                .with_failure("git show-ref --quiet --verify refs/heads/missing", 1, ""),
        );

        scm.delete_branch("bugzilla-tool").await.unwrap();
        scm.delete_branch("missing").await.unwrap();

        assert!(mock.was_run("git branch -D bugzilla-tool"));
        assert!(!mock.was_run("git branch -D missing"));
    }

    #[tokio::test]
    async fn test_reverse_diff_resolves_changelogs_then_reports_conflicts() {
        let (scm, mock) = git(
            MockExecutor::new()
                .with_output("git svn find-rev r47000", "feed42\n")
                .with_failure("git revert --no-commit feed42", 1, "error: could not revert feed42")
                .with_output(
                    "git diff -r --name-status -C -M HEAD",
                    "M\tWebCore/ChangeLog\nM\tWebCore/dom/Node.cpp\n",
                )
                .with_output("/mock/checkout/WebKitTools/Scripts/resolve-ChangeLogs WebCore/ChangeLog", "")
                .with_output(
                    "git diff --name-status -C -M --diff-filter=U",
                    "U\tWebCore/dom/Node.cpp\n",
                ),
        );

        let err = scm.apply_reverse_diff(Revision::new(47000)).await.unwrap_err();
        match err {
            ScmError::Conflicts { revision, paths } => {
                assert_eq!(revision, "47000");
                assert_eq!(paths, vec!["WebCore/dom/Node.cpp"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(mock.was_run("/mock/checkout/WebKitTools/Scripts/resolve-ChangeLogs WebCore/ChangeLog"));
    }

    #[tokio::test]
    async fn test_clean_aborts_rebase_in_progress() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".git/rebase-apply")).unwrap();
        let (scm, mock) = git_at(
            MockExecutor::new()
                .with_output("git reset --hard HEAD", "")
                .with_output("git rebase --abort", ""),
            dir.path(),
        );

        assert!(scm.rebase_in_progress());
        scm.clean_working_directory().await.unwrap();
        assert!(mock.was_run("git rebase --abort"));
    }

    #[tokio::test]
    async fn test_patches_are_binary_safe() {
        let binary = vec![0u8, 159, 146, 150, b'\n'];
        let (scm, _) = git(
            MockExecutor::new()
                .with_response(
                    "git diff --binary HEAD",
                    CommandOutput {
                        stdout: binary.clone(),
                        ..Default::default()
                    },
                )
                .with_output("git diff --binary abc^..abc", "diff --git a/x b/x\n"),
        );

        assert_eq!(scm.create_patch().await.unwrap().data, binary);
        assert_eq!(
            scm.create_patch_from_local_commit("abc").await.unwrap().to_text_lossy(),
            "diff --git a/x b/x\n"
        );
    }
}

//! git::interface
//!
//! [`VersionControlBackend`] over a local mirror, using `git2` for reads.
//!
//! # Architecture
//!
//! `GitBackend` holds only the mirror path and opens the repository for
//! each call. `git2::Repository` is not `Sync`, and the engine holds the
//! backend across await points, so nothing from libgit2 outlives a single
//! method call.
//!
//! Branches are always read from the remote-tracking namespace of the
//! mirror's default remote (`origin` if present, otherwise the first
//! configured remote). Local branches of the mirror are never consulted.
//!
//! # Error Handling
//!
//! libgit2 errors are normalized through [`GitError::from_git2`] with the
//! ref or object that was being looked up as context.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Offset, Utc};

use super::backend::{
    CommitMeta, DiffSummary, FileDiff, GitError, Rev, Signature, VersionControlBackend,
};
use super::process::run_git;
use crate::core::types::{BranchName, Oid};

impl GitError {
    /// Create a GitError from a git2::Error with richer context.
    fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => {
                if context.starts_with("refs/") {
                    GitError::RefNotFound {
                        refname: context.to_string(),
                    }
                } else {
                    GitError::ObjectNotFound {
                        oid: context.to_string(),
                    }
                }
            }
            git2::ErrorCode::InvalidSpec => GitError::InvalidOid {
                oid: context.to_string(),
            },
            _ => GitError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }

    fn internal(err: git2::Error) -> Self {
        GitError::Internal {
            message: err.message().to_string(),
        }
    }
}

/// A repository mirror on local disk.
#[derive(Debug, Clone)]
pub struct GitBackend {
    path: PathBuf,
}

impl GitBackend {
    /// Backend for the mirror at `path`. The mirror need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the mirror's working directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<git2::Repository, GitError> {
        git2::Repository::open(&self.path).map_err(|_| GitError::NotARepo {
            path: self.path.clone(),
        })
    }

    /// The remote whose tracking branches are synced.
    fn default_remote(repo: &git2::Repository) -> Result<String, GitError> {
        let remotes = repo.remotes().map_err(GitError::internal)?;

        // Prefer "origin" if it exists
        if remotes.iter().flatten().any(|name| name == "origin") {
            return Ok("origin".to_string());
        }

        remotes
            .iter()
            .flatten()
            .next()
            .map(String::from)
            .ok_or(GitError::NoRemote)
    }

    fn resolve<'r>(repo: &'r git2::Repository, rev: Rev<'_>) -> Result<git2::Commit<'r>, GitError> {
        match rev {
            Rev::Branch(branch) => {
                let refname = branch.remote_ref(&Self::default_remote(repo)?);
                repo.find_reference(&refname)
                    .and_then(|r| r.peel_to_commit())
                    .map_err(|e| GitError::from_git2(e, &refname))
            }
            Rev::Commit(oid) => {
                let git_oid = git2::Oid::from_str(oid.as_str())
                    .map_err(|e| GitError::from_git2(e, oid.as_str()))?;
                repo.find_commit(git_oid)
                    .map_err(|e| GitError::from_git2(e, oid.as_str()))
            }
        }
    }

    /// Ids along the first-parent line starting at `tip`, tip first.
    fn first_parent_line(
        repo: &git2::Repository,
        tip: git2::Oid,
    ) -> Result<Vec<git2::Oid>, GitError> {
        let mut revwalk = repo.revwalk().map_err(GitError::internal)?;
        revwalk.push(tip).map_err(GitError::internal)?;
        revwalk.simplify_first_parent().map_err(GitError::internal)?;
        revwalk
            .collect::<Result<Vec<_>, _>>()
            .map_err(GitError::internal)
    }
}

fn to_oid(oid: git2::Oid) -> Result<Oid, GitError> {
    Ok(Oid::new(oid.to_string())?)
}

fn signature(sig: &git2::Signature<'_>) -> Signature {
    let when = sig.when();
    let offset = FixedOffset::east_opt(when.offset_minutes() * 60).unwrap_or_else(|| Utc.fix());
    let time = DateTime::from_timestamp(when.seconds(), 0)
        .unwrap_or(DateTime::UNIX_EPOCH)
        .with_timezone(&offset);

    Signature {
        name: String::from_utf8_lossy(sig.name_bytes()).into_owned(),
        email: String::from_utf8_lossy(sig.email_bytes()).into_owned(),
        time,
    }
}

fn commit_meta(commit: &git2::Commit<'_>) -> Result<CommitMeta, GitError> {
    let parents = commit
        .parent_ids()
        .map(to_oid)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CommitMeta {
        oid: to_oid(commit.id())?,
        parents,
        message: String::from_utf8_lossy(commit.message_bytes()).into_owned(),
        author: signature(&commit.author()),
        committer: signature(&commit.committer()),
    })
}

/// Header libgit2 omits for binary files, in the form `git diff` prints.
fn binary_patch(delta: &git2::DiffDelta<'_>) -> String {
    let old = delta.old_file().path().map(|p| p.to_string_lossy().into_owned());
    let new = delta.new_file().path().map(|p| p.to_string_lossy().into_owned());
    let a = old.clone().or_else(|| new.clone()).unwrap_or_default();
    let b = new.clone().or(old).unwrap_or_default();

    let from = match delta.status() {
        git2::Delta::Added => "/dev/null".to_string(),
        _ => format!("a/{}", a),
    };
    let to = match delta.status() {
        git2::Delta::Deleted => "/dev/null".to_string(),
        _ => format!("b/{}", b),
    };

    format!(
        "diff --git a/{} b/{}\nBinary files {} and {} differ\n",
        a, b, from, to
    )
}

#[async_trait]
impl VersionControlBackend for GitBackend {
    fn mirror_exists(&self) -> bool {
        self.path.join(".git").exists()
    }

    async fn clone_from(&self, url: &str, deadline: Duration) -> Result<(), GitError> {
        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|e| GitError::CommandFailed {
            command: "git clone".to_string(),
            message: format!("cannot create {}: {}", parent.display(), e),
        })?;

        // Leftovers from an interrupted clone would make git refuse the
        // destination.
        if self.path.exists() {
            tracing::warn!(path = %self.path.display(), "removing incomplete mirror");
            fs::remove_dir_all(&self.path).map_err(|e| GitError::CommandFailed {
                command: "git clone".to_string(),
                message: format!("cannot remove {}: {}", self.path.display(), e),
            })?;
        }

        let dest = self.path.to_string_lossy().into_owned();
        let result = run_git(
            parent,
            &["clone", "--quiet", "--no-checkout", url, &dest],
            deadline,
        )
        .await;

        if result.is_err() && self.path.exists() {
            let _ = fs::remove_dir_all(&self.path);
        }
        result
    }

    async fn fetch(&self, deadline: Duration) -> Result<(), GitError> {
        let remote = {
            let repo = self.open()?;
            Self::default_remote(&repo)?
        };
        run_git(
            &self.path,
            &["fetch", "--quiet", "--prune", &remote],
            deadline,
        )
        .await
    }

    fn remote_branches(&self) -> Result<Vec<BranchName>, GitError> {
        let repo = self.open()?;
        let remote = Self::default_remote(&repo)?;
        let prefix = format!("{}/", remote);

        let branches = repo
            .branches(Some(git2::BranchType::Remote))
            .map_err(GitError::internal)?;

        let mut names = Vec::new();
        for branch in branches {
            let (branch, _) = branch.map_err(GitError::internal)?;
            // Skip aliases such as origin/HEAD
            if branch.get().kind() == Some(git2::ReferenceType::Symbolic) {
                continue;
            }
            let Some(full) = branch.name().map_err(GitError::internal)? else {
                continue;
            };
            let Some(short) = full.strip_prefix(&prefix) else {
                continue;
            };
            match BranchName::new(short) {
                Ok(name) => names.push(name),
                Err(e) => tracing::warn!(branch = full, error = %e, "skipping branch"),
            }
        }

        names.sort();
        Ok(names)
    }

    fn branch_tip(&self, branch: &BranchName) -> Result<Option<Oid>, GitError> {
        let repo = self.open()?;
        let tip = match Self::resolve(&repo, Rev::Branch(branch)) {
            Ok(commit) => Ok(Some(to_oid(commit.id())?)),
            Err(GitError::RefNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        };
        tip
    }

    fn log_from(
        &self,
        rev: Rev<'_>,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<CommitMeta>, GitError> {
        let repo = self.open()?;
        let start = Self::resolve(&repo, rev)?.id();

        let mut revwalk = repo.revwalk().map_err(GitError::internal)?;
        revwalk
            .set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::TIME)
            .map_err(GitError::internal)?;
        revwalk.push(start).map_err(GitError::internal)?;

        let mut commits = Vec::with_capacity(limit);
        for oid in revwalk.skip(skip).take(limit) {
            let oid = oid.map_err(GitError::internal)?;
            let commit = repo
                .find_commit(oid)
                .map_err(|e| GitError::from_git2(e, &oid.to_string()))?;
            commits.push(commit_meta(&commit)?);
        }
        Ok(commits)
    }

    fn commit(&self, oid: &Oid) -> Result<CommitMeta, GitError> {
        let repo = self.open()?;
        let commit = Self::resolve(&repo, Rev::Commit(oid))?;
        commit_meta(&commit)
    }

    fn diff(&self, from: Rev<'_>, to: Rev<'_>) -> Result<DiffSummary, GitError> {
        let repo = self.open()?;
        let from_tree = Self::resolve(&repo, from)?
            .tree()
            .map_err(GitError::internal)?;
        let to_tree = Self::resolve(&repo, to)?
            .tree()
            .map_err(GitError::internal)?;

        let diff = repo
            .diff_tree_to_tree(Some(&from_tree), Some(&to_tree), None)
            .map_err(GitError::internal)?;
        let stats = diff.stats().map_err(GitError::internal)?;

        let mut files = Vec::with_capacity(diff.deltas().len());
        for idx in 0..diff.deltas().len() {
            match git2::Patch::from_diff(&diff, idx).map_err(GitError::internal)? {
                Some(mut patch) => {
                    let binary = patch.delta().flags().is_binary();
                    let buf = patch.to_buf().map_err(GitError::internal)?;
                    files.push(FileDiff {
                        patch: String::from_utf8_lossy(&buf).into_owned(),
                        binary,
                    });
                }
                None => {
                    if let Some(delta) = diff.get_delta(idx) {
                        files.push(FileDiff {
                            patch: binary_patch(&delta),
                            binary: true,
                        });
                    }
                }
            }
        }

        Ok(DiffSummary {
            insertions: stats.insertions(),
            deletions: stats.deletions(),
            files,
        })
    }

    fn merge_base(&self, a: Rev<'_>, b: Rev<'_>) -> Result<Option<Oid>, GitError> {
        let repo = self.open()?;
        let a = Self::resolve(&repo, a)?.id();
        let b = Self::resolve(&repo, b)?.id();

        match repo.merge_base(a, b) {
            Ok(oid) => Ok(Some(to_oid(oid)?)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::internal(e)),
        }
    }

    fn first_divergent_commit(
        &self,
        base: Rev<'_>,
        branch: Rev<'_>,
    ) -> Result<Option<Oid>, GitError> {
        let repo = self.open()?;
        let base_tip = Self::resolve(&repo, base)?.id();
        let branch_tip = Self::resolve(&repo, branch)?.id();

        let base_line: HashSet<git2::Oid> =
            Self::first_parent_line(&repo, base_tip)?.into_iter().collect();

        let mut divergent = None;
        for oid in Self::first_parent_line(&repo, branch_tip)? {
            if base_line.contains(&oid) {
                break;
            }
            divergent = Some(oid);
        }

        divergent.map(to_oid).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use tempfile::TempDir;

    fn run_git(dir: &Path, args: &[&str]) -> String {
        let output = Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .expect("failed to run git");
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    /// An upstream repository plus a clone of it.
    struct Fixture {
        _dir: TempDir,
        upstream: PathBuf,
        mirror: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let upstream = dir.path().join("upstream");
            fs::create_dir(&upstream).unwrap();
            run_git(&upstream, &["init", "--quiet", "-b", "master"]);
            run_git(&upstream, &["config", "user.email", "dev@example.com"]);
            run_git(&upstream, &["config", "user.name", "Dev"]);
            let mirror = dir.path().join("mirror");
            Self {
                _dir: dir,
                upstream,
                mirror,
            }
        }

        fn commit(&self, file: &str, contents: &str, message: &str) -> String {
            fs::write(self.upstream.join(file), contents).unwrap();
            run_git(&self.upstream, &["add", file]);
            run_git(&self.upstream, &["commit", "--quiet", "-m", message]);
            run_git(&self.upstream, &["rev-parse", "HEAD"])
        }

        fn clone_mirror(&self) -> GitBackend {
            let root = self.mirror.parent().unwrap();
            run_git(
                root,
                &[
                    "clone",
                    "--quiet",
                    self.upstream.to_str().unwrap(),
                    self.mirror.to_str().unwrap(),
                ],
            );
            GitBackend::new(&self.mirror)
        }
    }

    fn branch(name: &str) -> BranchName {
        BranchName::new(name).unwrap()
    }

    #[test]
    fn missing_mirror_is_not_a_repo() {
        let dir = TempDir::new().unwrap();
        let backend = GitBackend::new(dir.path().join("absent"));
        assert!(!backend.mirror_exists());
        assert!(matches!(
            backend.remote_branches(),
            Err(GitError::NotARepo { .. })
        ));
    }

    #[test]
    fn remote_branches_exclude_symbolic_head() {
        let fx = Fixture::new();
        fx.commit("a.txt", "a\n", "first");
        run_git(&fx.upstream, &["branch", "feature"]);
        let backend = fx.clone_mirror();

        assert!(backend.mirror_exists());
        assert_eq!(
            backend.remote_branches().unwrap(),
            vec![branch("feature"), branch("master")]
        );
    }

    #[test]
    fn branch_tip_of_missing_branch_is_none() {
        let fx = Fixture::new();
        let tip = fx.commit("a.txt", "a\n", "first");
        let backend = fx.clone_mirror();

        assert_eq!(
            backend.branch_tip(&branch("master")).unwrap().unwrap().as_str(),
            tip
        );
        assert_eq!(backend.branch_tip(&branch("nope")).unwrap(), None);
    }

    #[test]
    fn log_pages_newest_first() {
        let fx = Fixture::new();
        let first = fx.commit("a.txt", "1\n", "one");
        let second = fx.commit("a.txt", "2\n", "two");
        let third = fx.commit("a.txt", "3\n", "three");
        let backend = fx.clone_mirror();
        let master = branch("master");

        let page = backend.log_from(Rev::Branch(&master), 0, 2).unwrap();
        let ids: Vec<_> = page.iter().map(|c| c.oid.as_str().to_string()).collect();
        assert_eq!(ids, vec![third.clone(), second.clone()]);

        let rest = backend.log_from(Rev::Branch(&master), 2, 2).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].oid.as_str(), first);
        assert!(rest[0].parents.is_empty());
        assert_eq!(rest[0].author.email, "dev@example.com");
        assert_eq!(rest[0].message.trim(), "one");
    }

    #[test]
    fn diff_counts_lines() {
        let fx = Fixture::new();
        let first = fx.commit("a.txt", "1\n2\n", "one");
        let second = fx.commit("a.txt", "1\nchanged\nadded\n", "two");
        let backend = fx.clone_mirror();
        let from = Oid::new(first).unwrap();
        let to = Oid::new(second).unwrap();

        let diff = backend.diff(Rev::Commit(&from), Rev::Commit(&to)).unwrap();
        assert_eq!(diff.insertions, 2);
        assert_eq!(diff.deletions, 1);
        assert_eq!(diff.files.len(), 1);
        assert!(!diff.files[0].binary);
        assert!(diff.files[0].patch.starts_with("diff --git a/a.txt b/a.txt"));
        assert!(diff.files[0].patch.contains("+added"));
    }

    #[test]
    fn binary_file_is_flagged() {
        let fx = Fixture::new();
        let first = fx.commit("a.txt", "a\n", "one");
        fs::write(fx.upstream.join("blob.bin"), [0u8, 159, 146, 150, 0, 1]).unwrap();
        run_git(&fx.upstream, &["add", "blob.bin"]);
        run_git(&fx.upstream, &["commit", "--quiet", "-m", "binary"]);
        let second = run_git(&fx.upstream, &["rev-parse", "HEAD"]);
        let backend = fx.clone_mirror();
        let from = Oid::new(first).unwrap();
        let to = Oid::new(second).unwrap();

        let diff = backend.diff(Rev::Commit(&from), Rev::Commit(&to)).unwrap();
        assert_eq!(diff.files.len(), 1);
        assert!(diff.files[0].binary);
        assert!(diff.files[0].patch.contains("blob.bin"));
    }

    #[test]
    fn identical_trees_have_empty_diff() {
        let fx = Fixture::new();
        fx.commit("a.txt", "a\n", "one");
        run_git(&fx.upstream, &["branch", "feature"]);
        let backend = fx.clone_mirror();
        let master = branch("master");
        let feature = branch("feature");

        let diff = backend
            .diff(Rev::Branch(&master), Rev::Branch(&feature))
            .unwrap();
        assert!(diff.is_empty());
        assert_eq!(diff.insertions, 0);
    }

    #[test]
    fn merge_base_and_divergence() {
        let fx = Fixture::new();
        let fork = fx.commit("a.txt", "a\n", "base");
        run_git(&fx.upstream, &["checkout", "--quiet", "-b", "feature"]);
        let f1 = fx.commit("f.txt", "1\n", "feature one");
        fx.commit("f.txt", "2\n", "feature two");
        run_git(&fx.upstream, &["checkout", "--quiet", "master"]);
        fx.commit("m.txt", "m\n", "master moves");
        let backend = fx.clone_mirror();
        let master = branch("master");
        let feature = branch("feature");

        let base = backend
            .merge_base(Rev::Branch(&master), Rev::Branch(&feature))
            .unwrap()
            .unwrap();
        assert_eq!(base.as_str(), fork);

        let divergent = backend
            .first_divergent_commit(Rev::Branch(&master), Rev::Branch(&feature))
            .unwrap()
            .unwrap();
        assert_eq!(divergent.as_str(), f1);
    }

    #[test]
    fn branch_on_base_line_has_no_divergence() {
        let fx = Fixture::new();
        fx.commit("a.txt", "a\n", "one");
        run_git(&fx.upstream, &["branch", "old"]);
        fx.commit("a.txt", "b\n", "two");
        let backend = fx.clone_mirror();
        let master = branch("master");
        let old = branch("old");

        assert_eq!(
            backend
                .first_divergent_commit(Rev::Branch(&master), Rev::Branch(&old))
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn clone_and_fetch_through_git() {
        let fx = Fixture::new();
        fx.commit("a.txt", "a\n", "one");
        let backend = GitBackend::new(&fx.mirror);

        backend
            .clone_from(fx.upstream.to_str().unwrap(), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(backend.mirror_exists());

        let newer = fx.commit("a.txt", "b\n", "two");
        backend.fetch(Duration::from_secs(60)).await.unwrap();
        assert_eq!(
            backend.branch_tip(&branch("master")).unwrap().unwrap().as_str(),
            newer
        );
    }

    #[tokio::test]
    async fn failed_clone_leaves_no_mirror() {
        let dir = TempDir::new().unwrap();
        let backend = GitBackend::new(dir.path().join("mirror"));

        let err = backend
            .clone_from(
                dir.path().join("does-not-exist").to_str().unwrap(),
                Duration::from_secs(60),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GitError::CommandFailed { .. }));
        assert!(!backend.mirror_exists());
    }
}

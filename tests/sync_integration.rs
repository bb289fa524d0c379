//! End-to-end sync attempts against real git repositories.
//!
//! Each test builds an upstream repository with the `git` CLI, lets the
//! driver clone it into a data directory and delivers to an in-memory
//! uplink, so the whole chain from clone to cache persistence runs.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use naforo_agent::core::cache::SyncCache;
use naforo_agent::core::types::{BranchName, Oid};
use naforo_agent::engine::{MirrorAction, SyncDriver, SyncError, SyncOptions, SyncState};
use naforo_agent::git::GitBackend;
use naforo_agent::uplink::mock::MockUplink;
use naforo_agent::uplink::UplinkError;
use tempfile::TempDir;

fn git(dir: &Path, args: &[&str]) -> String {
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

fn oid(sha: &str) -> Oid {
    Oid::new(sha).unwrap()
}

fn branch(name: &str) -> BranchName {
    BranchName::new(name).unwrap()
}

/// Upstream repository plus the data directory the agent works in.
struct Setup {
    _dir: TempDir,
    upstream: PathBuf,
    mirror: PathBuf,
    cache: PathBuf,
}

impl Setup {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let upstream = dir.path().join("upstream");
        fs::create_dir(&upstream).unwrap();
        git(&upstream, &["init", "--quiet", "-b", "master"]);
        git(&upstream, &["config", "user.email", "dev@example.com"]);
        git(&upstream, &["config", "user.name", "Dev"]);

        let data = dir.path().join("data");
        fs::create_dir(&data).unwrap();
        Self {
            mirror: data.join("repository"),
            cache: data.join("repository.json"),
            upstream,
            _dir: dir,
        }
    }

    fn commit(&self, file: &str, contents: &str, message: &str) -> Oid {
        fs::write(self.upstream.join(file), contents).unwrap();
        git(&self.upstream, &["add", file]);
        git(&self.upstream, &["commit", "--quiet", "-m", message]);
        oid(&git(&self.upstream, &["rev-parse", "HEAD"]))
    }

    fn checkout(&self, args: &[&str]) {
        let mut full = vec!["checkout", "--quiet"];
        full.extend_from_slice(args);
        git(&self.upstream, &full);
    }

    fn url(&self) -> String {
        self.upstream.to_string_lossy().to_string()
    }

    fn backend(&self) -> GitBackend {
        GitBackend::new(&self.mirror)
    }

    /// master: c1 - c2 - c3, feature: c1 - f1 - f2
    fn forked(&self) -> Forked {
        let c1 = self.commit("readme.md", "hello\n", "c1");
        let c2 = self.commit("readme.md", "hello\nworld\n", "c2");
        let c3 = self.commit("main.rs", "fn main() {}\n", "c3");
        self.checkout(&["-b", "feature", c1.as_str()]);
        let f1 = self.commit("feature.rs", "one\n", "f1");
        let f2 = self.commit("feature.rs", "one\ntwo\n", "f2");
        self.checkout(&["master"]);
        Forked { c1, c2, c3, f1, f2 }
    }
}

struct Forked {
    c1: Oid,
    c2: Oid,
    c3: Oid,
    f1: Oid,
    f2: Oid,
}

fn options() -> SyncOptions {
    SyncOptions::new(branch("master"))
}

#[tokio::test]
async fn first_sync_reports_both_branches() {
    let setup = Setup::new();
    let fx = setup.forked();
    let backend = setup.backend();
    let uplink = MockUplink::new();
    let options = options();

    let url = setup.url();
    let report = SyncDriver::new(&backend, &uplink, &options)
        .run(Some(&url), &setup.cache)
        .await
        .unwrap();

    assert_eq!(report.mirror, MirrorAction::Cloned);
    assert_eq!(report.cap, 10);
    assert_eq!(report.branches, 2);

    let payload = &uplink.deliveries()[0];
    let master: Vec<Oid> = payload.commits[&branch("master")]
        .iter()
        .map(|r| r.sha.clone())
        .collect();
    assert_eq!(master, vec![fx.c3.clone(), fx.c2.clone()]);

    let feature: Vec<Oid> = payload.commits[&branch("feature")]
        .iter()
        .map(|r| r.sha.clone())
        .collect();
    assert_eq!(feature, vec![fx.f2.clone(), fx.f1.clone()]);

    let summary = &payload.branch_diffs[&branch("feature")];
    assert_eq!(summary.base_branch_sha, fx.c1);
    assert_eq!(summary.branch_sha, fx.f2);
    assert_eq!(summary.additions, 2);
    assert!(summary.divergence.is_some());
    assert!(!payload.branch_diffs.contains_key(&branch("master")));

    let cache = SyncCache::load(&setup.cache).unwrap();
    assert_eq!(cache.get(&branch("master")), Some(&fx.c3));
    assert_eq!(cache.get(&branch("feature")), Some(&fx.f2));
}

#[tokio::test]
async fn root_commit_never_reported() {
    let setup = Setup::new();
    let fx = setup.forked();
    let backend = setup.backend();
    let uplink = MockUplink::new();
    let options = options();

    let url = setup.url();
    SyncDriver::new(&backend, &uplink, &options)
        .run(Some(&url), &setup.cache)
        .await
        .unwrap();

    let payload = &uplink.deliveries()[0];
    assert!(payload
        .commits
        .values()
        .flatten()
        .all(|record| record.sha != fx.c1));
}

#[tokio::test]
async fn unchanged_repository_delivers_empty_payload() {
    let setup = Setup::new();
    setup.forked();
    let backend = setup.backend();
    let uplink = MockUplink::new();
    let options = options();
    let url = setup.url();

    SyncDriver::new(&backend, &uplink, &options)
        .run(Some(&url), &setup.cache)
        .await
        .unwrap();
    let cache_before = fs::read(&setup.cache).unwrap();

    let report = SyncDriver::new(&backend, &uplink, &options)
        .run(None, &setup.cache)
        .await
        .unwrap();

    assert_eq!(report.mirror, MirrorAction::Fetched);
    assert_eq!(report.cap, 50);
    let second = &uplink.deliveries()[1];
    assert!(second.is_empty());
    assert_eq!(fs::read(&setup.cache).unwrap(), cache_before);
}

#[tokio::test]
async fn new_commits_reported_once() {
    let setup = Setup::new();
    setup.forked();
    let backend = setup.backend();
    let uplink = MockUplink::new();
    let options = options();
    let url = setup.url();

    SyncDriver::new(&backend, &uplink, &options)
        .run(Some(&url), &setup.cache)
        .await
        .unwrap();

    let c4 = setup.commit("main.rs", "fn main() { run() }\n", "c4");
    SyncDriver::new(&backend, &uplink, &options)
        .run(None, &setup.cache)
        .await
        .unwrap();

    let second = &uplink.deliveries()[1];
    let master: Vec<Oid> = second.commits[&branch("master")]
        .iter()
        .map(|r| r.sha.clone())
        .collect();
    assert_eq!(master, vec![c4.clone()]);
    assert!(!second.commits.contains_key(&branch("feature")));

    let cache = SyncCache::load(&setup.cache).unwrap();
    assert_eq!(cache.get(&branch("master")), Some(&c4));
}

#[tokio::test]
async fn merged_branch_drops_its_summary() {
    let setup = Setup::new();
    let fx = setup.forked();
    let backend = setup.backend();
    let uplink = MockUplink::new();
    let options = options();
    let url = setup.url();

    SyncDriver::new(&backend, &uplink, &options)
        .run(Some(&url), &setup.cache)
        .await
        .unwrap();

    git(
        &setup.upstream,
        &["merge", "--quiet", "--no-ff", "-m", "merge feature", "feature"],
    );
    let merge = oid(&git(&setup.upstream, &["rev-parse", "HEAD"]));

    SyncDriver::new(&backend, &uplink, &options)
        .run(None, &setup.cache)
        .await
        .unwrap();

    let second = &uplink.deliveries()[1];
    assert!(second.branch_diffs.is_empty());
    let master = &second.commits[&branch("master")];
    assert_eq!(master[0].sha, merge);
    assert_eq!(master[0].parents_sha, vec![fx.c3.clone(), fx.f2.clone()]);
}

#[tokio::test]
async fn failed_delivery_keeps_cache() {
    let setup = Setup::new();
    setup.forked();
    let backend = setup.backend();
    let options = options();
    let url = setup.url();

    let uplink = MockUplink::new().fail_with(UplinkError::Transport("connection reset".into()));
    let mut driver = SyncDriver::new(&backend, &uplink, &options);
    let err = driver.run(Some(&url), &setup.cache).await.unwrap_err();
    assert!(matches!(err, SyncError::Delivery(_)));
    assert_eq!(driver.state(), SyncState::Failed);
    assert!(!setup.cache.exists());

    // the mirror survives, so the retry fetches and reports everything again
    uplink.clear_failure();
    let report = SyncDriver::new(&backend, &uplink, &options)
        .run(None, &setup.cache)
        .await
        .unwrap();
    assert_eq!(report.mirror, MirrorAction::Fetched);
    assert_eq!(report.commits, 4);
    let cache_before = fs::read(&setup.cache).unwrap();

    setup.commit("late.txt", "late\n", "c4");
    let uplink = MockUplink::new().fail_with(UplinkError::Timeout);
    SyncDriver::new(&backend, &uplink, &options)
        .run(None, &setup.cache)
        .await
        .unwrap_err();
    assert_eq!(fs::read(&setup.cache).unwrap(), cache_before);
}

#[tokio::test]
async fn unreachable_upstream_fails_clone() {
    let setup = Setup::new();
    let backend = GitBackend::new(&setup.mirror);
    let uplink = MockUplink::new();
    let options = options();

    let missing = setup.upstream.join("missing");
    let url = missing.to_string_lossy().to_string();
    let err = SyncDriver::new(&backend, &uplink, &options)
        .run(Some(&url), &setup.cache)
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Clone(_)));
    assert_eq!(uplink.attempts(), 0);
    assert!(!setup.mirror.exists());
}

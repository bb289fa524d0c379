//! engine::payload
//!
//! Records produced by a sync attempt and the document delivered upstream.
//!
//! Field names are the wire format and must not change. Timestamps
//! serialize as RFC 3339 strings in the signer's own UTC offset.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::core::types::{BranchName, Oid};
use crate::git::{CommitMeta, DiffSummary, FileDiff, Signature};

/// Version string sent with every delivery.
pub const CLIENT_VERSION: &str = "1.0alpha";

/// Diff of one file, as delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub patch: String,
    pub binary: bool,
}

impl From<FileDiff> for DiffEntry {
    fn from(diff: FileDiff) -> Self {
        Self {
            patch: diff.patch,
            binary: diff.binary,
        }
    }
}

/// A single commit and its diff against its first parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub sha: Oid,
    pub parents_sha: Vec<Oid>,
    pub message: String,
    pub authored_date: DateTime<FixedOffset>,
    pub author_name: String,
    pub author_email: String,
    pub committed_date: DateTime<FixedOffset>,
    pub committer_name: String,
    pub committer_email: String,
    pub additions: usize,
    pub deletions: usize,
    pub diffs: Vec<DiffEntry>,
}

impl CommitRecord {
    /// Combine commit metadata with its first-parent diff.
    pub fn new(meta: CommitMeta, diff: DiffSummary) -> Self {
        let CommitMeta {
            oid,
            parents,
            message,
            author,
            committer,
        } = meta;

        Self {
            sha: oid,
            parents_sha: parents,
            message,
            authored_date: author.time,
            author_name: author.name,
            author_email: author.email,
            committed_date: committer.time,
            committer_name: committer.name,
            committer_email: committer.email,
            additions: diff.insertions,
            deletions: diff.deletions,
            diffs: diff.files.into_iter().map(DiffEntry::from).collect(),
        }
    }
}

/// Who started a branch, and when.
///
/// Flattened into [`BranchDiffSummary`]; when it cannot be determined the
/// keys are left out of the document entirely rather than sent as null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DivergencePoint {
    pub author_name: String,
    pub author_email: String,
    pub branched_at: DateTime<FixedOffset>,
}

impl From<Signature> for DivergencePoint {
    fn from(author: Signature) -> Self {
        Self {
            author_name: author.name,
            author_email: author.email,
            branched_at: author.time,
        }
    }
}

/// Everything a branch changed since it left the base branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchDiffSummary {
    #[serde(flatten)]
    pub divergence: Option<DivergencePoint>,
    pub base_branch: BranchName,
    /// Merge point the diff starts from
    pub base_branch_sha: Oid,
    pub branch: BranchName,
    /// Branch tip the diff ends at
    pub branch_sha: Oid,
    pub additions: usize,
    pub deletions: usize,
    pub diffs: Vec<DiffEntry>,
}

/// Changes collected during one sync attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPayload {
    /// New commits per branch, newest first
    pub commits: BTreeMap<BranchName, Vec<CommitRecord>>,
    pub branch_diffs: BTreeMap<BranchName, BranchDiffSummary>,
}

impl SyncPayload {
    /// Create an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the commits walked on `branch`. Branches without new commits
    /// get no key.
    pub fn add_commits(&mut self, branch: BranchName, records: Vec<CommitRecord>) {
        if !records.is_empty() {
            self.commits.insert(branch, records);
        }
    }

    /// Record the divergence summary of a branch.
    pub fn add_branch_diff(&mut self, summary: BranchDiffSummary) {
        self.branch_diffs.insert(summary.branch.clone(), summary);
    }

    /// Total number of commit records across branches.
    pub fn commit_count(&self) -> usize {
        self.commits.values().map(Vec::len).sum()
    }

    /// Whether the attempt found nothing to report.
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty() && self.branch_diffs.is_empty()
    }
}

/// The JSON document posted to the endpoint.
#[derive(Serialize)]
pub struct DeliveryDocument<'a> {
    #[serde(flatten)]
    pub payload: &'a SyncPayload,
    pub client_version: &'static str,
    pub access_token: &'a str,
}

impl<'a> DeliveryDocument<'a> {
    pub fn new(payload: &'a SyncPayload, access_token: &'a str) -> Self {
        Self {
            payload,
            client_version: CLIENT_VERSION,
            access_token,
        }
    }
}

// Custom Debug to avoid exposing access_token
impl std::fmt::Debug for DeliveryDocument<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryDocument")
            .field("payload", &self.payload)
            .field("client_version", &self.client_version)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

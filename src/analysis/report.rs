//! Per-commit and per-push tallies.

use super::classifier::Bucket;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// Line counts per bucket.
///
/// `removed_only` is not a bucket: it counts how many of the rewrite,
/// refactor and unresolved lines were pure deletions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationCounts {
    pub new_feature: u64,
    pub rewrite: u64,
    pub refactor: u64,
    pub unresolved: u64,
    pub removed_only: u64,
}

impl ClassificationCounts {
    pub fn record(&mut self, bucket: Bucket) {
        match bucket {
            Bucket::NewFeature => self.new_feature += 1,
            Bucket::Rewrite => self.rewrite += 1,
            Bucket::Refactor => self.refactor += 1,
            Bucket::Unresolved => self.unresolved += 1,
        }
    }

    /// Every classified line, each counted once.
    pub fn total(&self) -> u64 {
        self.new_feature + self.rewrite + self.refactor + self.unresolved
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl AddAssign for ClassificationCounts {
    fn add_assign(&mut self, other: Self) {
        self.new_feature += other.new_feature;
        self.rewrite += other.rewrite;
        self.refactor += other.refactor;
        self.unresolved += other.unresolved;
        self.removed_only += other.removed_only;
    }
}

/// Counts for one file of one commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub path: String,
    pub counts: ClassificationCounts,
}

/// The analysis of a single commit. Built once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitReport {
    pub commit: String,
    pub parent: Option<String>,
    pub summary: String,
    pub author: String,
    pub committed_at: DateTime<Utc>,
    pub counts: ClassificationCounts,
    pub files: Vec<FileReport>,
    pub files_skipped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub commits: usize,
    pub totals: ClassificationCounts,
}

/// Sum counts across commit reports. Empty input gives an all-zero summary.
pub fn aggregate(reports: &[CommitReport]) -> Summary {
    reports.iter().fold(Summary::default(), |mut summary, report| {
        summary.commits += 1;
        summary.totals += report.counts;
        summary
    })
}

/// Everything sent to the reporting endpoint for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    pub base: Option<String>,
    pub head: String,
    pub threshold_secs: u64,
    pub summary: Summary,
    pub commits: Vec<CommitReport>,
}

#[cfg(test)]
pub(crate) fn sample_commit(commit: &str, counts: ClassificationCounts) -> CommitReport {
    use chrono::TimeZone;
    CommitReport {
        commit: commit.to_string(),
        parent: None,
        summary: format!("commit {}", commit),
        author: "Test".to_string(),
        committed_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        counts,
        files: Vec::new(),
        files_skipped: 0,
        repository_id: None,
        organization_id: None,
    }
}

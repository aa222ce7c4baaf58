use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::{Branch, CommitRecord, FileStat};

/// A branch as listed by the host, before its tip commit has been looked at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRef {
    pub name: String,
    pub tip_sha: String,
}

/// Read-only view of a source-control host that activity is aggregated from.
///
/// Every method is an independent network round trip and may fail on its own;
/// callers decide how much of a run a failure is allowed to take down.
#[async_trait]
pub trait HostingApi: Send + Sync {
    /// Name used in log lines
    fn display_name(&self) -> &'static str;

    /// Check that `repo` exists and is readable with the configured credentials.
    async fn resolve_repository(&self, repo: &str) -> Result<()>;

    /// List every branch of the repository.
    async fn list_branches(&self, repo: &str) -> Result<Vec<BranchRef>>;

    /// Look up the tip commit of one branch to learn its author date.
    async fn branch_tip(&self, repo: &str, branch: &BranchRef) -> Result<Branch>;

    /// Commits reachable from `starting_at` whose author date is within `[since, until]`.
    async fn list_commits(
        &self,
        repo: &str,
        starting_at: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<CommitRecord>>;

    /// Per-file diff stats for a single commit.
    async fn list_changed_files(&self, repo: &str, sha: &str) -> Result<Vec<FileStat>>;
}

#[cfg(test)]
pub mod fake;

//! Scripted in-memory host used by the aggregation tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use super::{BranchRef, HostingApi};
use crate::types::{AuthorIdentity, Branch, CommitRecord, FileStat};

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
}

pub fn commit(sha: &str, author: Option<&str>, authored_at: DateTime<Utc>) -> CommitRecord {
    CommitRecord {
        sha: sha.to_string(),
        author: AuthorIdentity::from_login(author.map(str::to_string)),
        authored_at,
    }
}

pub fn file(name: &str, additions: u64, deletions: u64) -> FileStat {
    FileStat {
        filename: name.to_string(),
        additions: Some(additions),
        deletions: Some(deletions),
    }
}

#[derive(Default)]
pub struct ScriptedApi {
    branches: Vec<Branch>,
    broken_tips: HashSet<String>,
    commits: HashMap<String, Vec<CommitRecord>>,
    broken_histories: HashSet<String>,
    panicking_histories: HashSet<String>,
    files: HashMap<String, Vec<FileStat>>,
    broken_files: HashSet<String>,
    fail_branch_listing: bool,
    missing_repository: bool,
    /// Yield to the scheduler between calls so concurrent branches interleave.
    pub yield_between_calls: bool,
    pub file_requests: AtomicUsize,
    histories_in_flight: AtomicUsize,
    /// Most `list_commits` calls ever suspended at the same time.
    pub peak_histories_in_flight: AtomicUsize,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a branch whose history (newest first) is `commits`.
    pub fn branch(self, name: &str, commits: Vec<CommitRecord>) -> Self {
        let tip_date = commits
            .iter()
            .map(|c| c.authored_at)
            .max()
            .unwrap_or_else(|| at(2000, 1, 1, 0, 0, 0));
        self.branch_with_tip(name, tip_date, commits)
    }

    pub fn branch_with_tip(
        mut self,
        name: &str,
        tip_date: DateTime<Utc>,
        commits: Vec<CommitRecord>,
    ) -> Self {
        let tip_sha = format!("tip-{name}");
        self.commits.insert(tip_sha.clone(), commits);
        self.branches.push(Branch {
            name: name.to_string(),
            tip_sha,
            tip_date,
        });
        self
    }

    pub fn broken_tip(mut self, name: &str) -> Self {
        self.broken_tips.insert(name.to_string());
        self
    }

    pub fn broken_history(mut self, name: &str) -> Self {
        self.broken_histories.insert(format!("tip-{name}"));
        self
    }

    pub fn panicking_history(mut self, name: &str) -> Self {
        self.panicking_histories.insert(format!("tip-{name}"));
        self
    }

    pub fn files(mut self, sha: &str, files: Vec<FileStat>) -> Self {
        self.files.insert(sha.to_string(), files);
        self
    }

    pub fn broken_files(mut self, sha: &str) -> Self {
        self.broken_files.insert(sha.to_string());
        self
    }

    pub fn failing_branch_listing(mut self) -> Self {
        self.fail_branch_listing = true;
        self
    }

    pub fn missing_repository(mut self) -> Self {
        self.missing_repository = true;
        self
    }

    pub fn interleaved(mut self) -> Self {
        self.yield_between_calls = true;
        self
    }

    async fn pause(&self) {
        if self.yield_between_calls {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl HostingApi for ScriptedApi {
    fn display_name(&self) -> &'static str {
        "scripted"
    }

    async fn resolve_repository(&self, repo: &str) -> Result<()> {
        if self.missing_repository {
            anyhow::bail!("repository {repo} not found");
        }
        Ok(())
    }

    async fn list_branches(&self, _repo: &str) -> Result<Vec<BranchRef>> {
        self.pause().await;
        if self.fail_branch_listing {
            anyhow::bail!("branch listing unavailable");
        }
        Ok(self
            .branches
            .iter()
            .map(|b| BranchRef {
                name: b.name.clone(),
                tip_sha: b.tip_sha.clone(),
            })
            .collect())
    }

    async fn branch_tip(&self, _repo: &str, branch: &BranchRef) -> Result<Branch> {
        self.pause().await;
        if self.broken_tips.contains(&branch.name) {
            anyhow::bail!("tip of {} could not be resolved", branch.name);
        }
        self.branches
            .iter()
            .find(|b| b.name == branch.name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown branch {}", branch.name))
    }

    async fn list_commits(
        &self,
        _repo: &str,
        starting_at: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<CommitRecord>> {
        let now = self.histories_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_histories_in_flight.fetch_max(now, Ordering::SeqCst);
        self.pause().await;
        self.histories_in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.broken_histories.contains(starting_at) {
            anyhow::bail!("history of {starting_at} unavailable");
        }
        if self.panicking_histories.contains(starting_at) {
            panic!("history of {starting_at} is corrupt");
        }
        Ok(self
            .commits
            .get(starting_at)
            .map(|commits| {
                commits
                    .iter()
                    .filter(|c| c.authored_at >= since && c.authored_at <= until)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_changed_files(&self, _repo: &str, sha: &str) -> Result<Vec<FileStat>> {
        self.file_requests.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.broken_files.contains(sha) {
            anyhow::bail!("diff for {sha} unavailable");
        }
        Ok(self.files.get(sha).cloned().unwrap_or_default())
    }
}

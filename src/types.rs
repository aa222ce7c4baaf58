use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel shown for commits whose author could not be resolved to an account.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Who a commit is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AuthorIdentity {
    Resolved(String),
    Unknown,
}

impl AuthorIdentity {
    pub fn from_login(login: Option<String>) -> Self {
        match login {
            Some(login) if !login.is_empty() => AuthorIdentity::Resolved(login),
            _ => AuthorIdentity::Unknown,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            AuthorIdentity::Resolved(login) => login,
            AuthorIdentity::Unknown => UNKNOWN_AUTHOR,
        }
    }
}

impl fmt::Display for AuthorIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A branch reference together with its tip commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub name: String,
    pub tip_sha: String,
    pub tip_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub sha: String,
    pub author: AuthorIdentity,
    pub authored_at: DateTime<Utc>,
}

impl CommitRecord {
    /// Calendar day the commit counts towards.
    pub fn coding_day(&self) -> NaiveDate {
        self.authored_at.date_naive()
    }
}

/// Diff stats for one file touched by a commit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileStat {
    pub filename: String,
    #[serde(default)]
    pub additions: Option<u64>,
    #[serde(default)]
    pub deletions: Option<u64>,
}

/// Inclusive `[start, end]` range of author timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        *instant >= self.start && *instant <= self.end
    }
}

/// Everything counted for one author.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserActivity {
    pub commits: u64,
    pub files_changed: HashSet<String>,
    pub lines_added: u64,
    pub lines_removed: u64,
    pub coding_days: HashSet<NaiveDate>,
    pub commits_per_day: BTreeMap<NaiveDate, u64>,
}

impl UserActivity {
    /// Record the commit itself, independent of any file data.
    pub fn record_commit(&mut self, day: NaiveDate) {
        self.commits += 1;
        self.coding_days.insert(day);
        *self.commits_per_day.entry(day).or_insert(0) += 1;
    }

    pub fn record_files(&mut self, files: Vec<FileStat>) {
        for file in files {
            self.lines_added += file.additions.unwrap_or(0);
            self.lines_removed += file.deletions.unwrap_or(0);
            self.files_changed.insert(file.filename);
        }
    }

    /// Fold another partial result for the same author into this one.
    pub fn merge(&mut self, other: UserActivity) {
        self.commits += other.commits;
        self.files_changed.extend(other.files_changed);
        self.lines_added += other.lines_added;
        self.lines_removed += other.lines_removed;
        self.coding_days.extend(other.coding_days);
        for (day, count) in other.commits_per_day {
            *self.commits_per_day.entry(day).or_insert(0) += count;
        }
    }
}

pub type ActivityMap = HashMap<AuthorIdentity, UserActivity>;

/// One row of the overall summary table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OverallRow {
    #[serde(rename = "User")]
    pub user: String,
    #[serde(rename = "Total Coding Days")]
    pub total_coding_days: u64,
    #[serde(rename = "Total Commits")]
    pub total_commits: u64,
    #[serde(rename = "Files Changed")]
    pub files_changed: u64,
    #[serde(rename = "Lines Added")]
    pub lines_added: u64,
    #[serde(rename = "Lines Removed")]
    pub lines_removed: u64,
}

/// One row of the per-day breakdown table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DailyRow {
    #[serde(rename = "User")]
    pub user: String,
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Commits")]
    pub commits: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsTables {
    pub overall: Vec<OverallRow>,
    pub daily: Vec<DailyRow>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn activity(days: &[u32], files: &[(&str, u64, u64)]) -> UserActivity {
        let mut a = UserActivity::default();
        for d in days {
            a.record_commit(day(*d));
        }
        a.record_files(
            files
                .iter()
                .map(|(name, add, del)| FileStat {
                    filename: name.to_string(),
                    additions: Some(*add),
                    deletions: Some(*del),
                })
                .collect(),
        );
        a
    }

    #[test]
    fn author_identity_falls_back_to_unknown() {
        assert_eq!(AuthorIdentity::from_login(None), AuthorIdentity::Unknown);
        assert_eq!(
            AuthorIdentity::from_login(Some(String::new())),
            AuthorIdentity::Unknown
        );
        assert_eq!(
            AuthorIdentity::from_login(Some("alice".into())).display_name(),
            "alice"
        );
        assert_eq!(AuthorIdentity::Unknown.to_string(), UNKNOWN_AUTHOR);
    }

    #[test]
    fn record_commit_keeps_days_and_counts_in_step() {
        let a = activity(&[1, 1, 3], &[]);
        assert_eq!(a.commits, 3);
        assert_eq!(a.commits_per_day.values().sum::<u64>(), a.commits);
        assert_eq!(a.coding_days.len(), a.commits_per_day.len());
        assert_eq!(a.commits_per_day[&day(1)], 2);
    }

    #[test]
    fn missing_line_counts_are_zero() {
        let mut a = UserActivity::default();
        a.record_files(vec![FileStat {
            filename: "README.md".into(),
            additions: None,
            deletions: Some(4),
        }]);
        assert_eq!(a.lines_added, 0);
        assert_eq!(a.lines_removed, 4);
        assert!(a.files_changed.contains("README.md"));
    }

    #[test]
    fn merge_is_order_independent() {
        let a = activity(&[1, 2], &[("src/lib.rs", 10, 2)]);
        let b = activity(&[2, 5], &[("src/lib.rs", 1, 1), ("Cargo.toml", 3, 0)]);
        let c = activity(&[7], &[]);

        let mut left = a.clone();
        left.merge(b.clone());
        left.merge(c.clone());

        let mut right = c;
        let mut bc = b;
        bc.merge(a);
        right.merge(bc);

        assert_eq!(left, right);
        assert_eq!(left.commits, 5);
        assert_eq!(left.commits_per_day[&day(2)], 2);
        assert_eq!(left.files_changed.len(), 2);
        assert_eq!(left.lines_added, 14);
        assert_eq!(left.coding_days.len(), left.commits_per_day.len());
    }

    #[test]
    fn window_is_inclusive_at_both_ends() {
        let start = chrono::TimeZone::with_ymd_and_hms(&Utc, 2024, 1, 1, 0, 0, 0).unwrap();
        let end = chrono::TimeZone::with_ymd_and_hms(&Utc, 2024, 1, 31, 23, 59, 59).unwrap();
        let window = DateWindow::new(start, end);
        assert!(window.contains(&start));
        assert!(window.contains(&end));
        assert!(!window.contains(&(end + chrono::Duration::seconds(1))));
        assert!(!window.contains(&(start - chrono::Duration::seconds(1))));
    }
}

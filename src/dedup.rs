use dashmap::DashSet;

/// Commits already attributed during the current run.
///
/// Shared by every branch worker. `claim` is the only way in, and it tests and
/// inserts in one step, so two workers racing on the same sha cannot both win.
#[derive(Debug, Default)]
pub struct CommitDedupSet {
    seen: DashSet<String>,
}

impl CommitDedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if this call is the first to see `sha`.
    pub fn claim(&self, sha: &str) -> bool {
        self.seen.insert(sha.to_string())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

use tracing::{debug, warn};

use crate::dedup::CommitDedupSet;
use crate::hosting::HostingApi;
use crate::types::{ActivityMap, Branch, DateWindow};

/// Fold one branch's commits into a private activity map.
///
/// Only commits this call manages to claim from `dedup` are counted, so the
/// same commit reached from several branches lands in exactly one map. A
/// branch whose history cannot be listed contributes nothing.
pub async fn accumulate_branch(
    api: &dyn HostingApi,
    repo: &str,
    branch: &Branch,
    window: &DateWindow,
    dedup: &CommitDedupSet,
) -> ActivityMap {
    let mut activity = ActivityMap::new();

    let commits = match api
        .list_commits(repo, &branch.tip_sha, window.start, window.end)
        .await
    {
        Ok(commits) => commits,
        Err(e) => {
            warn!(branch = %branch.name, "Could not process branch: {e:#}");
            return activity;
        }
    };

    for commit in commits {
        if !dedup.claim(&commit.sha) {
            continue;
        }

        let day = commit.coding_day();
        debug!(
            sha = %commit.sha,
            author = %commit.author,
            date = %day,
            branch = %branch.name,
            "Processing commit"
        );

        let user = activity.entry(commit.author).or_default();
        user.record_commit(day);

        match api.list_changed_files(repo, &commit.sha).await {
            Ok(files) => user.record_files(files),
            Err(e) => {
                warn!(sha = %commit.sha, "Could not process files in commit: {e:#}");
            }
        }
    }

    activity
}

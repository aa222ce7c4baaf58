use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::accumulator::accumulate_branch;
use crate::dedup::CommitDedupSet;
use crate::error::MetricsError;
use crate::hosting::HostingApi;
use crate::metrics;
use crate::selector::select_branches;
use crate::types::{ActivityMap, Branch, DateWindow, MetricsTables};

/// Fold per-branch partial maps into one map keyed by author.
pub fn merge_partials(partials: impl IntoIterator<Item = ActivityMap>) -> ActivityMap {
    let mut merged = ActivityMap::new();
    for partial in partials {
        for (author, activity) in partial {
            merged.entry(author).or_default().merge(activity);
        }
    }
    merged
}

/// Accumulate every branch concurrently and merge the results.
///
/// At most `max_concurrency` branches are in flight at once. All branch tasks
/// share one dedup set; everything else they build is private until the merge,
/// which runs here after every task has finished. A task that panics counts as
/// an empty branch.
pub async fn aggregate_activity(
    api: Arc<dyn HostingApi>,
    repo: &str,
    branches: Vec<Branch>,
    window: DateWindow,
    max_concurrency: usize,
) -> ActivityMap {
    let dedup = Arc::new(CommitDedupSet::new());
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut handles = Vec::with_capacity(branches.len());

    for branch in branches {
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("branch semaphore is never closed");
        let api = api.clone();
        let dedup = dedup.clone();
        let repo = repo.to_string();
        let name = branch.name.clone();

        let handle = tokio::spawn(async move {
            let _permit = permit;
            accumulate_branch(api.as_ref(), &repo, &branch, &window, &dedup).await
        });
        handles.push((name, handle));
    }

    let mut partials = Vec::with_capacity(handles.len());
    for (name, handle) in handles {
        match handle.await {
            Ok(partial) => partials.push(partial),
            Err(e) => warn!(branch = %name, "Branch task failed: {e}"),
        }
    }

    if dedup.is_empty() {
        info!("No commits found in any selected branch");
    } else {
        info!("Counted {} distinct commits", dedup.len());
    }
    merge_partials(partials)
}

/// One full run: check the repository, pick branches, aggregate, format.
///
/// Only an inaccessible repository fails the run. Problems with individual
/// branches, commits or diffs are logged and leave gaps in the totals.
pub async fn aggregate(
    api: Arc<dyn HostingApi>,
    repo: &str,
    window: DateWindow,
    max_concurrency: usize,
) -> Result<MetricsTables> {
    let start_time = Instant::now();

    api.resolve_repository(repo)
        .await
        .map_err(|e| MetricsError::InvalidRepository(format!("{repo}: {e:#}")))?;
    info!(
        "Successfully accessed repository {} on {}",
        repo,
        api.display_name()
    );
    info!(
        "Analyzing metrics for all users from {} to {}",
        window.start.format("%Y-%m-%d"),
        window.end.format("%Y-%m-%d")
    );

    let branches = select_branches(api.as_ref(), repo, &window, max_concurrency).await;
    let activity = aggregate_activity(api, repo, branches, window, max_concurrency).await;

    let tables = MetricsTables {
        overall: metrics::overall_rows(&activity),
        daily: metrics::daily_rows(&activity),
    };

    info!(
        "Aggregated {} users in {:.2}s",
        tables.overall.len(),
        start_time.elapsed().as_secs_f64()
    );
    Ok(tables)
}

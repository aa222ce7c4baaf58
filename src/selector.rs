use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::hosting::HostingApi;
use crate::types::{Branch, DateWindow};

/// Branches whose tip commit was authored inside `window`.
///
/// Tips are looked up concurrently, at most `max_concurrency` at a time. A
/// branch whose tip can't be resolved is skipped, and if the branch list
/// itself can't be fetched the selection is empty.
pub async fn select_branches(
    api: &dyn HostingApi,
    repo: &str,
    window: &DateWindow,
    max_concurrency: usize,
) -> Vec<Branch> {
    let refs = match api.list_branches(repo).await {
        Ok(refs) => refs,
        Err(e) => {
            warn!(repo, "Could not list branches: {e:#}");
            return Vec::new();
        }
    };
    let total = refs.len();

    let selected: Vec<Branch> = stream::iter(refs)
        .map(|branch_ref| async move {
            match api.branch_tip(repo, &branch_ref).await {
                Ok(branch) => Some(branch),
                Err(e) => {
                    warn!(branch = %branch_ref.name, "Could not process branch: {e:#}");
                    None
                }
            }
        })
        .buffer_unordered(max_concurrency.max(1))
        .filter_map(|branch| async move { branch.filter(|b| window.contains(&b.tip_date)) })
        .collect()
        .await;

    info!(
        "Found {} of {} branches updated between {} and {}",
        selected.len(),
        total,
        window.start.format("%Y-%m-%d"),
        window.end.format("%Y-%m-%d %H:%M:%S")
    );
    selected
}

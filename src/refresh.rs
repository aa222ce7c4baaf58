use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::aggregator;
use crate::hosting::HostingApi;
use crate::output;
use crate::types::{DateWindow, MetricsTables};

/// Aggregate `repo` over `window` and replace the persisted tables with the result.
///
/// Files are only touched once aggregation has succeeded, so a fatal run leaves
/// the previous output in place.
pub async fn refresh_metrics(
    api: Arc<dyn HostingApi>,
    repo: &str,
    window: DateWindow,
    max_concurrency: usize,
    output_dir: &Path,
) -> Result<MetricsTables> {
    let tables = aggregator::aggregate(api, repo, window, max_concurrency).await?;
    persist_metrics(output_dir, &tables).await?;
    Ok(tables)
}

/// Replace the persisted tables on a blocking thread.
///
/// The directory is empty or partly written until this returns; callers that
/// serve reads concurrently must keep readers out for the duration.
pub async fn persist_metrics(output_dir: &Path, tables: &MetricsTables) -> Result<()> {
    let dir = output_dir.to_path_buf();
    let to_write = tables.clone();
    tokio::task::spawn_blocking(move || output::write_metrics(&dir, &to_write))
        .await
        .context("Metrics writer task failed")??;
    Ok(())
}

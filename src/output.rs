use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::info;

use crate::error::MetricsError;
use crate::types::{DailyRow, MetricsTables, OverallRow};

pub const OVERALL_METRICS_FILE: &str = "overall_metrics.csv";
pub const DAILY_METRICS_FILE: &str = "commits_per_day.csv";

const OVERALL_HEADERS: [&str; 6] = [
    "User",
    "Total Coding Days",
    "Total Commits",
    "Files Changed",
    "Lines Added",
    "Lines Removed",
];
const DAILY_HEADERS: [&str; 3] = ["User", "Date", "Commits"];

/// Which persisted table a query reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Overall,
    Daily,
}

impl Table {
    fn file_name(self) -> &'static str {
        match self {
            Table::Overall => OVERALL_METRICS_FILE,
            Table::Daily => DAILY_METRICS_FILE,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Table::Overall => "overall",
            Table::Daily => "daily",
        }
    }
}

/// Inclusive calendar-date bounds; either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.is_none_or(|from| date >= from) && self.to.is_none_or(|to| date <= to)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum QueryResult {
    Overall(Vec<OverallRow>),
    Daily(Vec<DailyRow>),
}

impl QueryResult {
    pub fn len(&self) -> usize {
        match self {
            QueryResult::Overall(rows) => rows.len(),
            QueryResult::Daily(rows) => rows.len(),
        }
    }
}

/// Remove everything a previous run left behind and recreate `dir`.
pub fn clean_output_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)
            .with_context(|| format!("Failed to clear output directory {}", dir.display()))?;
    }
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    Ok(())
}

fn write_table<T: Serialize>(path: &Path, headers: &[&str], rows: &[T]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    // Written by hand so an empty table still gets its header line.
    writer.write_record(headers)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Replace the output directory's contents with `tables`.
///
/// Rows are sorted first so identical runs produce identical files.
pub fn write_metrics(dir: &Path, tables: &MetricsTables) -> Result<(PathBuf, PathBuf)> {
    clean_output_dir(dir)?;

    let mut overall = tables.overall.clone();
    overall.sort_by(|a, b| {
        b.total_commits
            .cmp(&a.total_commits)
            .then_with(|| a.user.cmp(&b.user))
    });
    let mut daily = tables.daily.clone();
    daily.sort_by(|a, b| a.user.cmp(&b.user).then(a.date.cmp(&b.date)));

    let overall_path = dir.join(OVERALL_METRICS_FILE);
    let daily_path = dir.join(DAILY_METRICS_FILE);
    write_table(&overall_path, &OVERALL_HEADERS, &overall)?;
    write_table(&daily_path, &DAILY_HEADERS, &daily)?;

    info!("Metrics for all users have been saved to '{}'", dir.display());
    Ok((overall_path, daily_path))
}

fn read_table<T: DeserializeOwned>(dir: &Path, table: Table) -> Result<Vec<T>> {
    let path = dir.join(table.file_name());
    if !path.exists() {
        return Err(MetricsError::MetricsNotFound(path.display().to_string()).into());
    }

    let mut reader = csv::Reader::from_path(&path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    reader
        .deserialize()
        .collect::<Result<Vec<T>, csv::Error>>()
        .with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn read_overall(dir: &Path) -> Result<Vec<OverallRow>> {
    read_table(dir, Table::Overall)
}

pub fn read_daily(dir: &Path) -> Result<Vec<DailyRow>> {
    read_table(dir, Table::Daily)
}

/// Read a persisted table, keeping only rows whose `Date` lies in `range`.
///
/// The overall table has no `Date` column, so any bounded range against it is
/// rejected with [`MetricsError::DateFilterUnsupported`].
pub fn query(dir: &Path, table: Table, range: DateRange) -> Result<QueryResult> {
    match table {
        Table::Overall if !range.is_unbounded() => {
            Err(MetricsError::DateFilterUnsupported(table.label()).into())
        }
        Table::Overall => Ok(QueryResult::Overall(read_overall(dir)?)),
        Table::Daily => {
            let rows = read_daily(dir)?
                .into_iter()
                .filter(|row| range.contains(row.date))
                .collect();
            Ok(QueryResult::Daily(rows))
        }
    }
}

use std::collections::BTreeMap;

use crate::types::{ActivityMap, DailyRow, OverallRow, UserActivity};

/// Fold authors that display under the same name into one entry.
///
/// A login that is literally "Unknown" lands with the unresolved authors.
fn by_display_name(activity: &ActivityMap) -> BTreeMap<&str, UserActivity> {
    let mut grouped: BTreeMap<&str, UserActivity> = BTreeMap::new();
    for (author, user) in activity {
        grouped
            .entry(author.display_name())
            .or_default()
            .merge(user.clone());
    }
    grouped
}

/// One summary row per author.
pub fn overall_rows(activity: &ActivityMap) -> Vec<OverallRow> {
    by_display_name(activity)
        .into_iter()
        .map(|(name, user)| OverallRow {
            user: name.to_string(),
            total_coding_days: user.coding_days.len() as u64,
            total_commits: user.commits,
            files_changed: user.files_changed.len() as u64,
            lines_added: user.lines_added,
            lines_removed: user.lines_removed,
        })
        .collect()
}

/// One row per author and day with at least one commit.
pub fn daily_rows(activity: &ActivityMap) -> Vec<DailyRow> {
    by_display_name(activity)
        .into_iter()
        .flat_map(|(name, user)| {
            user.commits_per_day
                .into_iter()
                .filter(|(_, count)| *count > 0)
                .map(move |(date, commits)| DailyRow {
                    user: name.to_string(),
                    date,
                    commits,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AuthorIdentity, FileStat, UserActivity};
    use chrono::NaiveDate;
    use std::collections::HashSet;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn sample() -> ActivityMap {
        let mut alice = UserActivity::default();
        alice.record_commit(day(1));
        alice.record_commit(day(1));
        alice.record_commit(day(3));
        alice.record_files(vec![
            FileStat {
                filename: "src/main.rs".into(),
                additions: Some(12),
                deletions: Some(4),
            },
            FileStat {
                filename: "src/main.rs".into(),
                additions: Some(1),
                deletions: None,
            },
        ]);

        let mut unknown = UserActivity::default();
        unknown.record_commit(day(2));

        let mut map = ActivityMap::new();
        map.insert(AuthorIdentity::Resolved("alice".into()), alice);
        map.insert(AuthorIdentity::Unknown, unknown);
        map
    }

    #[test]
    fn overall_rows_summarise_each_author() {
        let rows: HashSet<_> = overall_rows(&sample()).into_iter().collect();

        let expected: HashSet<_> = [
            OverallRow {
                user: "alice".into(),
                total_coding_days: 2,
                total_commits: 3,
                files_changed: 1,
                lines_added: 13,
                lines_removed: 4,
            },
            OverallRow {
                user: "Unknown".into(),
                total_coding_days: 1,
                total_commits: 1,
                files_changed: 0,
                lines_added: 0,
                lines_removed: 0,
            },
        ]
        .into_iter()
        .collect();

        assert_eq!(rows, expected);
    }

    #[test]
    fn daily_rows_have_one_entry_per_author_and_day() {
        let rows: HashSet<_> = daily_rows(&sample()).into_iter().collect();

        let expected: HashSet<_> = [
            ("alice", day(1), 2),
            ("alice", day(3), 1),
            ("Unknown", day(2), 1),
        ]
        .into_iter()
        .map(|(user, date, commits)| DailyRow {
            user: user.into(),
            date,
            commits,
        })
        .collect();

        assert_eq!(rows, expected);
    }

    #[test]
    fn login_named_unknown_shares_the_unknown_rows() {
        let mut unresolved = UserActivity::default();
        unresolved.record_commit(day(1));
        unresolved.record_files(vec![FileStat {
            filename: "a.rs".into(),
            additions: Some(3),
            deletions: Some(1),
        }]);
        let mut named = UserActivity::default();
        named.record_commit(day(1));
        named.record_commit(day(2));

        let mut map = ActivityMap::new();
        map.insert(AuthorIdentity::Unknown, unresolved);
        map.insert(AuthorIdentity::Resolved("Unknown".into()), named);

        assert_eq!(
            overall_rows(&map),
            vec![OverallRow {
                user: "Unknown".into(),
                total_coding_days: 2,
                total_commits: 3,
                files_changed: 1,
                lines_added: 3,
                lines_removed: 1,
            }]
        );

        let daily: Vec<_> = daily_rows(&map)
            .into_iter()
            .map(|r| (r.user, r.date, r.commits))
            .collect();
        assert_eq!(
            daily,
            vec![
                ("Unknown".to_string(), day(1), 2),
                ("Unknown".to_string(), day(2), 1),
            ]
        );
    }

    #[test]
    fn empty_activity_formats_to_empty_tables() {
        let map = ActivityMap::new();
        assert!(overall_rows(&map).is_empty());
        assert!(daily_rows(&map).is_empty());
    }
}

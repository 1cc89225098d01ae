use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::config::{RECORD_KEY_COLUMNS, REPOSITORY_KEY_COLUMNS};
use tracing::debug;

use crate::errors::{Result, TableError};
use crate::models::{Issue, PullRequest, Repository, TableKind};

/// A row that can be grouped by a natural key.
pub trait Keyed {
    const KIND: TableKind;
    const KEY_COLUMNS: &'static [&'static str];

    /// Value of one key column; `None` when the row has no value for it.
    fn key_part(&self, column: &str) -> Option<String>;

    fn observed_at(&self) -> Option<DateTime<Utc>>;
}

impl Keyed for Repository {
    const KIND: TableKind = TableKind::Repositories;
    const KEY_COLUMNS: &'static [&'static str] = REPOSITORY_KEY_COLUMNS;

    // Hosting names are case-insensitive: "Owner/Repo" and "owner/repo" are one repository.
    fn key_part(&self, column: &str) -> Option<String> {
        match column {
            "id" => Some(self.id.clone()),
            "full_name" => Some(self.full_name.to_lowercase()),
            "name" => Some(self.name.to_lowercase()),
            _ => None,
        }
    }

    fn observed_at(&self) -> Option<DateTime<Utc>> {
        self.observed_at
    }
}

impl Keyed for Issue {
    const KIND: TableKind = TableKind::Issues;
    const KEY_COLUMNS: &'static [&'static str] = RECORD_KEY_COLUMNS;

    fn key_part(&self, column: &str) -> Option<String> {
        match column {
            "id" => Some(self.id.clone()),
            "repository" => Some(self.repository.clone()),
            "number" => self.number.map(|n| n.to_string()),
            _ => None,
        }
    }

    fn observed_at(&self) -> Option<DateTime<Utc>> {
        self.observed_at
    }
}

impl Keyed for PullRequest {
    const KIND: TableKind = TableKind::PullRequests;
    const KEY_COLUMNS: &'static [&'static str] = RECORD_KEY_COLUMNS;

    fn key_part(&self, column: &str) -> Option<String> {
        match column {
            "id" => Some(self.id.clone()),
            "repository" => Some(self.repository.clone()),
            "number" => self.number.map(|n| n.to_string()),
            _ => None,
        }
    }

    fn observed_at(&self) -> Option<DateTime<Utc>> {
        self.observed_at
    }
}

/// Keeps one row per natural key: the most recently observed one, or the
/// later one in input order when observations tie or are not tracked.
/// Surviving rows keep their relative input order.
pub fn deduplicate<T: Keyed>(rows: Vec<T>, key_columns: &[String]) -> Result<Vec<T>> {
    if let Some(column) = key_columns
        .iter()
        .find(|column| !T::KEY_COLUMNS.contains(&column.as_str()))
    {
        return Err(TableError::UnknownKeyColumn {
            table: T::KIND,
            column: column.clone(),
        });
    }

    let mut winners: HashMap<Vec<Option<String>>, usize> = HashMap::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        let key: Vec<Option<String>> = key_columns.iter().map(|c| row.key_part(c)).collect();
        winners
            .entry(key)
            .and_modify(|current| {
                // `None < Some(_)`, so an untracked observation never beats a tracked one.
                if row.observed_at() >= rows[*current].observed_at() {
                    *current = idx;
                }
            })
            .or_insert(idx);
    }

    let mut keep = vec![false; rows.len()];
    for idx in winners.values() {
        keep[*idx] = true;
    }
    let before = rows.len();
    let deduped: Vec<T> = rows
        .into_iter()
        .zip(keep)
        .filter_map(|(row, keep)| keep.then_some(row))
        .collect();
    debug!(
        table = %T::KIND,
        dropped = before - deduped.len(),
        "deduplicated table"
    );
    Ok(deduped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IssueState, MISSING_DURATION};
    use chrono::TimeZone;

    fn repo(id: &str, full_name: &str, observed_day: Option<u32>) -> Repository {
        Repository {
            id: id.into(),
            name: full_name.rsplit('/').next().unwrap_or_default().into(),
            full_name: full_name.into(),
            description: String::new(),
            stars: 0.0,
            forks: 0.0,
            open_issues: 0.0,
            created_at: None,
            updated_at: None,
            observed_at: observed_day.map(|d| Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()),
        }
    }

    fn issue(id: &str, repository: &str, number: Option<i64>) -> Issue {
        Issue {
            id: id.into(),
            repository: repository.into(),
            number,
            title: String::new(),
            state: IssueState::Open,
            user: None,
            created_at: None,
            updated_at: None,
            closed_at: None,
            resolution_time_days: MISSING_DURATION,
            observed_at: None,
        }
    }

    fn full_name_key() -> Vec<String> {
        vec!["full_name".into()]
    }

    #[test]
    fn most_recently_observed_wins() {
        let rows = vec![repo("1", "a/b", Some(2)), repo("2", "a/b", Some(5))];
        let deduped = deduplicate(rows, &full_name_key()).unwrap();
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].id, "2");
    }

    #[test]
    fn stale_later_row_does_not_replace_newer_observation() {
        let rows = vec![repo("1", "a/b", Some(9)), repo("2", "a/b", Some(3))];
        let deduped = deduplicate(rows, &full_name_key()).unwrap();
        assert_eq!(deduped[0].id, "1");
    }

    #[test]
    fn without_observations_last_row_wins() {
        let rows = vec![
            repo("1", "a/b", None),
            repo("2", "c/d", None),
            repo("3", "A/B", None),
        ];
        let deduped = deduplicate(rows, &full_name_key()).unwrap();
        let ids: Vec<_> = deduped.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3"]);
    }

    #[test]
    fn deduplication_is_idempotent() {
        let rows = vec![
            repo("1", "a/b", Some(1)),
            repo("2", "a/b", Some(4)),
            repo("3", "x/y", None),
            repo("4", "x/y", Some(2)),
        ];
        let once = deduplicate(rows, &full_name_key()).unwrap();
        let twice = deduplicate(once.clone(), &full_name_key()).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once.len(), 2);
    }

    #[test]
    fn composite_record_key() {
        let key = vec!["repository".to_string(), "number".to_string()];
        let rows = vec![
            issue("a", "1", Some(1)),
            issue("b", "2", Some(1)),
            issue("c", "1", Some(1)),
            issue("d", "1", None),
            issue("e", "1", None),
        ];
        let deduped = deduplicate(rows, &key).unwrap();
        let ids: Vec<_> = deduped.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "e"]);
    }

    #[test]
    fn unknown_key_column_is_structural_error() {
        let err = deduplicate(vec![issue("a", "1", Some(1))], &["title".to_string()]).unwrap_err();
        assert_eq!(
            err,
            TableError::UnknownKeyColumn {
                table: TableKind::Issues,
                column: "title".into(),
            }
        );
    }
}

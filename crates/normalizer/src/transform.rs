use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

use crate::errors::Result;
use crate::models::{
    Issue, IssueState, PullRequest, PullRequestState, Repository, MISSING_DURATION,
};
use crate::payloads::{RawRecord, RawTable};

pub const REPOSITORY_REQUIRED: &[&str] = &[
    "id",
    "full_name",
    "stars",
    "forks",
    "open_issues",
    "created_at",
    "updated_at",
];
pub const ISSUE_REQUIRED: &[&str] = &["repository", "number", "state", "created_at", "closed_at"];
pub const PULL_REQUEST_REQUIRED: &[&str] =
    &["repository", "number", "state", "created_at", "merged_at"];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.fZ",
];

static NULL: Value = Value::Null;

/// Typed rows plus how many present-but-unparsable values each column had.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTable<T> {
    pub rows: Vec<T>,
    pub coerced: BTreeMap<&'static str, usize>,
}

#[derive(Debug, Default)]
struct Coercions(BTreeMap<&'static str, usize>);

impl Coercions {
    fn track<T>(&mut self, column: &'static str, raw: &Value, parsed: Option<T>) -> Option<T> {
        if parsed.is_none() && !is_blank(raw) {
            *self.0.entry(column).or_insert(0) += 1;
        }
        parsed
    }
}

pub fn normalize_repositories(table: &RawTable) -> Result<NormalizedTable<Repository>> {
    table.require_columns(REPOSITORY_REQUIRED)?;
    let mut coercions = Coercions::default();
    let rows = table
        .rows()
        .iter()
        .map(|row| normalize_repository(row, &mut coercions))
        .collect();
    Ok(NormalizedTable {
        rows,
        coerced: coercions.0,
    })
}

pub fn normalize_issues(table: &RawTable) -> Result<NormalizedTable<Issue>> {
    table.require_columns(ISSUE_REQUIRED)?;
    let mut coercions = Coercions::default();
    let rows = table
        .rows()
        .iter()
        .map(|row| normalize_issue(row, &mut coercions))
        .collect();
    Ok(NormalizedTable {
        rows,
        coerced: coercions.0,
    })
}

pub fn normalize_pull_requests(table: &RawTable) -> Result<NormalizedTable<PullRequest>> {
    table.require_columns(PULL_REQUEST_REQUIRED)?;
    let mut coercions = Coercions::default();
    let rows = table
        .rows()
        .iter()
        .map(|row| normalize_pull_request(row, &mut coercions))
        .collect();
    Ok(NormalizedTable {
        rows,
        coerced: coercions.0,
    })
}

fn normalize_repository(row: &RawRecord, coercions: &mut Coercions) -> Repository {
    let full_name = parse_text(cell(row, "full_name"));
    let name = match parse_text(cell(row, "name")) {
        name if name.is_empty() => full_name.rsplit('/').next().unwrap_or("").to_string(),
        name => name,
    };
    Repository {
        id: parse_identifier(cell(row, "id")),
        name,
        full_name,
        description: parse_text(cell(row, "description")),
        stars: count(row, "stars", coercions),
        forks: count(row, "forks", coercions),
        open_issues: count(row, "open_issues", coercions),
        created_at: timestamp(row, "created_at", coercions),
        updated_at: timestamp(row, "updated_at", coercions),
        observed_at: observed_at(row),
    }
}

fn normalize_issue(row: &RawRecord, coercions: &mut Coercions) -> Issue {
    let raw_state = cell(row, "state");
    let state = coercions
        .track("state", raw_state, raw_state.as_str().and_then(IssueState::from_raw))
        .unwrap_or(IssueState::Unknown);
    Issue {
        id: parse_identifier(cell(row, "id")),
        repository: parse_identifier(cell(row, "repository")),
        number: coercions.track("number", cell(row, "number"), parse_integer(cell(row, "number"))),
        title: parse_text(cell(row, "title")),
        state,
        user: parse_user(cell(row, "user")),
        created_at: timestamp(row, "created_at", coercions),
        updated_at: timestamp(row, "updated_at", coercions),
        closed_at: timestamp(row, "closed_at", coercions),
        resolution_time_days: MISSING_DURATION,
        observed_at: observed_at(row),
    }
}

fn normalize_pull_request(row: &RawRecord, coercions: &mut Coercions) -> PullRequest {
    let raw_state = cell(row, "state");
    let merged_at = timestamp(row, "merged_at", coercions);
    let state = match coercions
        .track(
            "state",
            raw_state,
            raw_state.as_str().and_then(PullRequestState::from_raw),
        )
        .unwrap_or(PullRequestState::Unknown)
    {
        PullRequestState::Closed if merged_at.is_some() => PullRequestState::Merged,
        state => state,
    };
    PullRequest {
        id: parse_identifier(cell(row, "id")),
        repository: parse_identifier(cell(row, "repository")),
        number: coercions.track("number", cell(row, "number"), parse_integer(cell(row, "number"))),
        title: parse_text(cell(row, "title")),
        state,
        user: parse_user(cell(row, "user")),
        created_at: timestamp(row, "created_at", coercions),
        updated_at: timestamp(row, "updated_at", coercions),
        closed_at: timestamp(row, "closed_at", coercions),
        merged_at,
        merge_time_days: MISSING_DURATION,
        close_time_days: MISSING_DURATION,
        observed_at: observed_at(row),
    }
}

fn cell<'a>(row: &'a RawRecord, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&NULL)
}

fn count(row: &RawRecord, column: &'static str, coercions: &mut Coercions) -> f64 {
    let raw = cell(row, column);
    coercions.track(column, raw, parse_number(raw)).unwrap_or(0.0)
}

fn timestamp(
    row: &RawRecord,
    column: &'static str,
    coercions: &mut Coercions,
) -> Option<DateTime<Utc>> {
    let raw = cell(row, column);
    coercions.track(column, raw, parse_timestamp(raw))
}

// `updated` is the store's own record-modification stamp.
fn observed_at(row: &RawRecord) -> Option<DateTime<Utc>> {
    parse_timestamp(cell(row, "observed_at")).or_else(|| parse_timestamp(cell(row, "updated")))
}

/// Null, empty and the usual "no value" spellings are missing, not malformed.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed.is_empty()
                || ["nan", "nat", "null", "none"]
                    .iter()
                    .any(|marker| trimmed.eq_ignore_ascii_case(marker))
        }
        _ => false,
    }
}

/// Parses a timestamp into UTC. Naive inputs are taken to already be UTC.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let raw = value.as_str()?.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(ts.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

pub fn parse_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

pub fn parse_integer(value: &Value) -> Option<i64> {
    if let Some(int) = value.as_i64() {
        return Some(int);
    }
    let number = parse_number(value)?;
    (number.fract() == 0.0 && number.abs() < i64::MAX as f64).then_some(number as i64)
}

pub fn parse_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Identifiers arrive as strings or as numbers depending on the collection.
pub fn parse_identifier(value: &Value) -> String {
    match value {
        Value::Number(n) => match (n.as_i64(), n.as_u64()) {
            (Some(int), _) => int.to_string(),
            (None, Some(uint)) => uint.to_string(),
            _ => match n.as_f64() {
                Some(f) if f.fract() == 0.0 => format!("{f:.0}"),
                _ => n.to_string(),
            },
        },
        other => parse_text(other).trim().to_string(),
    }
}

/// Accepts either a bare login or an embedded user object with a `login` field.
pub fn parse_user(value: &Value) -> Option<String> {
    let login = match value {
        Value::String(s) => s.trim(),
        Value::Object(map) => map.get("login")?.as_str()?.trim(),
        _ => return None,
    };
    (!login.is_empty()).then(|| login.to_string())
}

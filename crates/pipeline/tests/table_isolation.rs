use chrono::{TimeZone, Utc};
use common::config::PipelineConfig;
use normalizer::{RawTable, TableError, TableKind};
use pipeline::{Pipeline, RawTables};
use serde_json::json;

fn tables(issues: serde_json::Value) -> RawTables {
    RawTables {
        repositories: Some(RawTable::from_rows(
            TableKind::Repositories,
            vec![json!({
                "id": "1", "full_name": "acme/tool", "stars": 10, "forks": 0, "open_issues": 2,
                "created_at": "2024-01-01T00:00:00Z", "updated_at": "2024-01-01T00:00:00Z"
            })],
        )),
        issues: Some(RawTable::from_document(TableKind::Issues, issues).unwrap()),
        pull_requests: Some(RawTable::from_rows(
            TableKind::PullRequests,
            vec![json!({
                "repository": "1", "number": 9, "state": "closed", "user": "zed",
                "created_at": "2024-02-01T00:00:00Z", "merged_at": "2024-02-03T00:00:00Z"
            })],
        )),
        ..RawTables::default()
    }
}

#[test]
fn missing_issue_column_fails_only_issues() {
    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    // `closed_at` absent from every row
    let report = pipeline.run_at(
        &tables(json!([{"repository": "1", "number": 1, "state": "open",
                        "created_at": "2024-01-02T00:00:00Z"}])),
        now,
    );

    assert_eq!(
        report.issues.error(),
        Some(&TableError::MissingColumn {
            table: TableKind::Issues,
            column: "closed_at".into(),
        })
    );
    assert_eq!(report.failures().len(), 1);
    assert!(report.issues.rows().is_empty());

    let repo = &report.repositories.rows()[0];
    assert_eq!(repo.activity.issues.issue_count, 0);
    assert_eq!(repo.activity.issues.avg_issue_resolution_days, -1.0);
    assert_eq!(repo.activity.contributors.issue_contributors, 0);
    assert_eq!(repo.activity.contributors.pr_contributors, 1);
    // closed with a merge timestamp counts as merged
    assert_eq!(repo.activity.pull_requests.merge_rate, 1.0);
    assert_eq!(repo.activity.pull_requests.avg_pr_close_days, 2.0);
    assert_eq!(report.pull_requests.rows()[0].merge_time_days, 2.0);
}

#[test]
fn empty_issue_table_needs_no_columns() {
    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    let report = pipeline.run_at(&tables(json!({"items": []})), Utc::now());
    assert!(report.failures().is_empty());
    assert!(report.issues.stats.present);
    assert_eq!(report.issues.stats.rows_out, 0);
}

#[test]
fn malformed_values_are_recovered() {
    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let report = pipeline.run_at(
        &tables(json!([
            {"repository": "1", "number": "seven", "state": "reopened",
             "created_at": "yesterday", "closed_at": "2024-01-05T00:00:00Z"}
        ])),
        now,
    );

    assert!(report.failures().is_empty());
    let issue = &report.issues.rows()[0];
    assert_eq!(issue.number, None);
    assert_eq!(issue.state, normalizer::IssueState::Unknown);
    assert_eq!(issue.created_at, None);
    assert_eq!(issue.resolution_time_days, -1.0);

    let coerced = &report.issues.stats.coerced;
    assert_eq!(coerced.get("number"), Some(&1));
    assert_eq!(coerced.get("state"), Some(&1));
    assert_eq!(coerced.get("created_at"), Some(&1));
    assert_eq!(coerced.get("closed_at"), None);
}

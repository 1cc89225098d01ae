use std::sync::Arc;
use std::thread;

use chrono::{TimeZone, Utc};
use common::config::PipelineConfig;
use normalizer::{RawTable, TableKind};
use pipeline::{Pipeline, RawTables};
use serde_json::json;

fn snapshot(seed: u32) -> RawTables {
    let repositories = (0..20)
        .map(|i| {
            json!({
                "id": format!("r{i}"),
                "full_name": format!("org/p{}", i % 15),
                "stars": (i * 37 + seed) % 900,
                "forks": i % 4,
                "open_issues": i,
                "created_at": "2023-01-01T00:00:00Z",
                "updated_at": "2024-04-01T00:00:00Z",
            })
        })
        .collect::<Vec<_>>();
    let issues = (0..60)
        .map(|n| {
            json!({
                "repository": format!("r{}", n % 22),
                "number": n,
                "state": if n % 3 == 0 { "open" } else { "closed" },
                "user": format!("u{}", n % 5),
                "created_at": "2024-01-01T00:00:00Z",
                "closed_at": "2024-01-03T00:00:00Z",
            })
        })
        .collect::<Vec<_>>();
    RawTables {
        repositories: Some(RawTable::from_rows(TableKind::Repositories, repositories)),
        issues: Some(RawTable::from_rows(TableKind::Issues, issues)),
        ..RawTables::default()
    }
}

#[test]
fn concurrent_runs_match_sequential_runs() {
    let pipeline = Arc::new(Pipeline::new(PipelineConfig::default()).unwrap());
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

    let expected: Vec<_> = (0..8)
        .map(|seed| pipeline.run_at(&snapshot(seed), now))
        .collect();

    let handles: Vec<_> = (0..8)
        .map(|seed| {
            let pipeline = Arc::clone(&pipeline);
            thread::spawn(move || pipeline.run_at(&snapshot(seed), now))
        })
        .collect();

    for (handle, expected) in handles.into_iter().zip(expected) {
        let report = handle.join().expect("pipeline thread panicked");
        assert_eq!(report.repositories.rows(), expected.repositories.rows());
        assert_eq!(report.issues.rows(), expected.issues.rows());
        assert_eq!(report.issues.stats, expected.issues.stats);
        assert_eq!(report.summary, expected.summary);
    }
}

use std::path::PathBuf;

use anyhow::Result;
use common::config::PipelineConfig;
use normalizer::{TableError, TableKind};
use pipeline::{
    load_all, JsonDirSink, JsonDirSource, Pipeline, ReportSink, RetryPolicy, SnapshotSource,
};
use serde_json::{json, Value};
use uuid::Uuid;

struct ScratchDir(PathBuf);

impl ScratchDir {
    async fn new() -> Result<Self> {
        let path = std::env::temp_dir()
            .join(format!("oss_pulse_test_{}", Uuid::new_v4().simple()));
        tokio::fs::create_dir_all(&path).await?;
        Ok(Self(path))
    }

    async fn write_json(&self, file: &str, value: &Value) -> Result<()> {
        tokio::fs::write(self.0.join(file), serde_json::to_vec(value)?).await?;
        Ok(())
    }

    async fn read_json(&self, file: &str) -> Result<Value> {
        Ok(serde_json::from_slice(&tokio::fs::read(self.0.join(file)).await?)?)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

fn source(dir: &ScratchDir) -> JsonDirSource {
    JsonDirSource::new(&dir.0, RetryPolicy::default())
}

#[tokio::test]
async fn round_trips_through_directories() -> Result<()> {
    let input = ScratchDir::new().await?;
    let output = ScratchDir::new().await?;
    input
        .write_json(
            "repositories.json",
            &json!({"items": [
                {"id": "1", "full_name": "acme/tool", "stars": 12, "forks": 3, "open_issues": 1,
                 "created_at": "2023-01-01T00:00:00Z", "updated_at": "2023-02-01T00:00:00Z",
                 "updated": "2023-02-01 10:00:00.000Z"},
                {"id": "1", "full_name": "acme/tool", "stars": 14, "forks": 3, "open_issues": 1,
                 "created_at": "2023-01-01T00:00:00Z", "updated_at": "2023-03-01T00:00:00Z",
                 "updated": "2023-03-01 10:00:00.000Z"}
            ]}),
        )
        .await?;
    input
        .write_json(
            "issues.json",
            &json!([
                {"repository": "acme/tool", "number": 1, "state": "closed", "user": "ann",
                 "created_at": "2023-01-10T00:00:00Z", "closed_at": "2023-01-12T00:00:00Z"}
            ]),
        )
        .await?;

    let tables = load_all(&source(&input)).await?;
    assert!(tables.repositories.is_some());
    assert!(tables.issues.is_some());
    assert!(tables.pull_requests.is_none());

    let report = Pipeline::new(PipelineConfig::default())?.run(&tables);
    JsonDirSink::new(&output.0, "metrics.prom")
        .write_report(&report)
        .await?;

    let repos = output.read_json("repositories.json").await?;
    let repos = repos.as_array().expect("repository array");
    assert_eq!(repos.len(), 1);
    assert_eq!(repos[0]["stars"], 14.0);
    assert_eq!(repos[0]["issue_count"], 1);

    let issues = output.read_json("issues.json").await?;
    assert_eq!(issues[0]["repository"], "1");
    assert_eq!(issues[0]["resolution_time_days"], 2.0);

    let prs = output.read_json("pull_requests.json").await?;
    assert_eq!(prs, json!([]));

    let summary = output.read_json("summary.json").await?;
    assert_eq!(summary["run_id"], report.run_id.to_string());
    assert_eq!(summary["summary"]["total_repositories"], 1);
    assert_eq!(summary["tables"]["repositories"]["duplicates"], 1);
    assert_eq!(summary["tables"]["pull_requests"]["present"], false);
    assert_eq!(summary["tables"]["issues"]["error"], Value::Null);

    let metrics = tokio::fs::read_to_string(output.0.join("metrics.prom")).await?;
    assert!(metrics.contains("pipeline_runs_total"));
    assert!(metrics.contains("pipeline_rows_in_total"));
    Ok(())
}

#[tokio::test]
async fn missing_file_is_an_absent_table() -> Result<()> {
    let input = ScratchDir::new().await?;
    assert!(source(&input).load_table(TableKind::Issues).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn corrupt_file_is_rejected_per_table() -> Result<()> {
    let input = ScratchDir::new().await?;
    tokio::fs::write(input.0.join("issues.json"), b"{not json").await?;
    let err = match source(&input).load_table(TableKind::Issues).await? {
        Some(Err(err)) => err,
        other => panic!("expected a rejected table, got {other:?}"),
    };
    assert_eq!(err.table(), TableKind::Issues);
    assert!(err.to_string().contains("issues.json"), "{err}");

    input.write_json("issues.json", &json!({"rows": []})).await?;
    assert!(matches!(
        source(&input).load_table(TableKind::Issues).await?,
        Some(Err(TableError::InvalidDocument { .. }))
    ));
    Ok(())
}

#[tokio::test]
async fn corrupt_file_does_not_stop_other_tables() -> Result<()> {
    let input = ScratchDir::new().await?;
    let output = ScratchDir::new().await?;
    input
        .write_json(
            "repositories.json",
            &json!([{"id": "1", "full_name": "a/b", "stars": 3, "forks": 1, "open_issues": 0,
                     "created_at": "2024-01-01T00:00:00Z", "updated_at": "2024-01-02T00:00:00Z"}]),
        )
        .await?;
    tokio::fs::write(input.0.join("issues.json"), b"{ not json").await?;

    let tables = load_all(&source(&input)).await?;
    assert!(tables.repositories.is_some());
    assert!(tables.rejected.contains_key(&TableKind::Issues));

    let report = Pipeline::new(PipelineConfig::default())?.run(&tables);
    assert_eq!(report.failures().len(), 1);
    assert_eq!(report.repositories.rows().len(), 1);
    assert!(report.pull_requests.is_ok());

    JsonDirSink::new(&output.0, "metrics.prom")
        .write_report(&report)
        .await?;
    assert!(output.0.join("repositories.json").exists());
    assert!(!output.0.join("issues.json").exists());
    let summary = output.read_json("summary.json").await?;
    assert_eq!(summary["tables"]["issues"]["present"], true);
    assert!(summary["tables"]["issues"]["error"].is_string());
    Ok(())
}

#[tokio::test]
async fn failed_table_is_reported_not_written() -> Result<()> {
    let input = ScratchDir::new().await?;
    let output = ScratchDir::new().await?;
    input
        .write_json(
            "repositories.json",
            &json!([{"id": "1", "full_name": "a/b", "forks": 0, "open_issues": 0,
                     "created_at": null, "updated_at": null}]),
        )
        .await?;

    let tables = load_all(&source(&input)).await?;
    let report = Pipeline::new(PipelineConfig::default())?.run(&tables);
    JsonDirSink::new(&output.0, "metrics.prom")
        .write_report(&report)
        .await?;

    assert!(!output.0.join("repositories.json").exists());
    let summary = output.read_json("summary.json").await?;
    let error = summary["tables"]["repositories"]["error"]
        .as_str()
        .unwrap_or_default();
    assert!(error.contains("stars"), "{error}");
    Ok(())
}

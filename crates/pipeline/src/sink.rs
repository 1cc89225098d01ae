use std::collections::BTreeMap;
use std::path::PathBuf;

use analysis::RunSummary;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use normalizer::TableKind;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::metrics;
use crate::service::{PipelineReport, TableReport, TableStats};
use crate::source::table_file_name;

pub const SUMMARY_FILE: &str = "summary.json";

/// Where a finished run's tables and summary go.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn write_report(&self, report: &PipelineReport) -> Result<()>;
}

#[derive(Debug, Serialize)]
pub struct TableDigest<'a> {
    #[serde(flatten)]
    pub stats: &'a TableStats,
    pub error: Option<String>,
}

/// Contents of `summary.json`.
#[derive(Debug, Serialize)]
pub struct RunDigest<'a> {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub summary: &'a RunSummary,
    pub tables: BTreeMap<TableKind, TableDigest<'a>>,
}

impl<'a> RunDigest<'a> {
    pub fn new(report: &'a PipelineReport) -> Self {
        let mut tables = BTreeMap::new();
        tables.insert(TableKind::Repositories, digest(&report.repositories));
        tables.insert(TableKind::Issues, digest(&report.issues));
        tables.insert(TableKind::PullRequests, digest(&report.pull_requests));
        Self {
            run_id: report.run_id,
            generated_at: report.now,
            summary: &report.summary,
            tables,
        }
    }
}

fn digest<T>(table: &TableReport<T>) -> TableDigest<'_> {
    TableDigest {
        stats: &table.stats,
        error: table.error().map(ToString::to_string),
    }
}

/// Writes one JSON file per table plus `summary.json` and the metrics
/// exposition into a directory.
#[derive(Debug, Clone)]
pub struct JsonDirSink {
    dir: PathBuf,
    metrics_file: String,
}

impl JsonDirSink {
    pub fn new(dir: impl Into<PathBuf>, metrics_file: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            metrics_file: metrics_file.into(),
        }
    }

    async fn write_json<T: Serialize + ?Sized>(&self, file: &str, value: &T) -> Result<()> {
        let path = self.dir.join(file);
        let body = serde_json::to_vec_pretty(value)
            .with_context(|| format!("serializing {}", path.display()))?;
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("writing {}", path.display()))
    }

    async fn write_table<T: Serialize>(&self, table: &TableReport<T>) -> Result<()> {
        match &table.rows {
            Ok(rows) => self.write_json(&table_file_name(table.kind), rows).await,
            Err(err) => {
                warn!(table = %table.kind, error = %err, "not writing failed table");
                Ok(())
            }
        }
    }
}

#[async_trait]
impl ReportSink for JsonDirSink {
    async fn write_report(&self, report: &PipelineReport) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating {}", self.dir.display()))?;

        self.write_table(&report.repositories).await?;
        self.write_table(&report.issues).await?;
        self.write_table(&report.pull_requests).await?;
        self.write_json(SUMMARY_FILE, &RunDigest::new(report)).await?;

        let exposition = metrics::render()?;
        let metrics_path = self.dir.join(&self.metrics_file);
        tokio::fs::write(&metrics_path, exposition)
            .await
            .with_context(|| format!("writing {}", metrics_path.display()))?;

        info!(dir = %self.dir.display(), run_id = %report.run_id, "wrote run output");
        Ok(())
    }
}

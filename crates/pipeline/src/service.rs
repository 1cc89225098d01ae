use std::collections::BTreeMap;

use analysis::{
    apply_outlier_rules, enrich_repositories, with_merge_times, with_resolution_times,
    EnrichedRepository, RunSummary,
};
use chrono::{DateTime, Utc};
use common::config::PipelineConfig;
use normalizer::{
    deduplicate, normalize_issues, normalize_pull_requests, normalize_repositories, Issue, Keyed,
    NormalizedTable, PullRequest, RawTable, Repository, TableError, TableKind,
};
use serde::Serialize;
use tracing::{field, info, instrument, warn, Span};
use uuid::Uuid;

use crate::gate::RepositoryIndex;
use crate::metrics;

/// The three raw tables of one snapshot. `None` means the table was not
/// supplied; a table whose document could not be read lands in `rejected`.
#[derive(Debug, Clone, Default)]
pub struct RawTables {
    pub repositories: Option<RawTable>,
    pub issues: Option<RawTable>,
    pub pull_requests: Option<RawTable>,
    pub rejected: BTreeMap<TableKind, TableError>,
}

impl RawTables {
    /// A rejected table reports its error even if rows were also set.
    pub fn get(&self, kind: TableKind) -> Result<Option<&RawTable>, TableError> {
        if let Some(err) = self.rejected.get(&kind) {
            return Err(err.clone());
        }
        Ok(match kind {
            TableKind::Repositories => self.repositories.as_ref(),
            TableKind::Issues => self.issues.as_ref(),
            TableKind::PullRequests => self.pull_requests.as_ref(),
        })
    }

    pub fn set(&mut self, table: RawTable) {
        match table.kind() {
            TableKind::Repositories => self.repositories = Some(table),
            TableKind::Issues => self.issues = Some(table),
            TableKind::PullRequests => self.pull_requests = Some(table),
        }
    }

    pub fn reject(&mut self, err: TableError) {
        self.rejected.insert(err.table(), err);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableStats {
    pub present: bool,
    pub rows_in: usize,
    pub duplicates: usize,
    pub orphans: usize,
    pub rows_out: usize,
    pub coerced: BTreeMap<String, usize>,
}

#[derive(Debug, Clone)]
pub struct TableReport<T> {
    pub kind: TableKind,
    pub rows: Result<Vec<T>, TableError>,
    pub stats: TableStats,
}

impl<T> TableReport<T> {
    /// Output rows; a failed table yields none.
    pub fn rows(&self) -> &[T] {
        self.rows.as_deref().unwrap_or_default()
    }

    pub fn error(&self) -> Option<&TableError> {
        self.rows.as_ref().err()
    }

    pub fn is_ok(&self) -> bool {
        self.rows.is_ok()
    }

    fn map_rows<U>(self, f: impl FnOnce(Vec<T>) -> Vec<U>) -> TableReport<U> {
        let rows = self.rows.map(f);
        let mut stats = self.stats;
        stats.rows_out = rows.as_ref().map_or(0, Vec::len);
        TableReport {
            kind: self.kind,
            rows,
            stats,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub now: DateTime<Utc>,
    pub repositories: TableReport<EnrichedRepository>,
    pub issues: TableReport<Issue>,
    pub pull_requests: TableReport<PullRequest>,
    pub summary: RunSummary,
}

impl PipelineReport {
    pub fn failures(&self) -> Vec<&TableError> {
        [
            self.repositories.error(),
            self.issues.error(),
            self.pull_requests.error(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    pub fn stats(&self) -> BTreeMap<TableKind, &TableStats> {
        BTreeMap::from([
            (TableKind::Repositories, &self.repositories.stats),
            (TableKind::Issues, &self.issues.stats),
            (TableKind::PullRequests, &self.pull_requests.stats),
        ])
    }
}

/// Runs the cleaning and metric stages over in-memory snapshots.
///
/// Holds only validated configuration, so one instance can serve concurrent
/// runs from several threads.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> common::Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn run(&self, tables: &RawTables) -> PipelineReport {
        self.run_at(tables, Utc::now())
    }

    /// Same as [`Pipeline::run`] with an explicit reference time, so results
    /// are reproducible.
    #[instrument(skip(self, tables), fields(run_id = field::Empty))]
    pub fn run_at(&self, tables: &RawTables, now: DateTime<Utc>) -> PipelineReport {
        let run_id = Uuid::new_v4();
        Span::current().record("run_id", field::display(run_id));
        metrics::RUNS_TOTAL.inc();
        metrics::LAST_RUN_TIMESTAMP.set(now.timestamp());
        let _timer = metrics::RUN_DURATION.start_timer();

        let repositories = stage(
            TableKind::Repositories,
            tables.get(TableKind::Repositories),
            normalize_repositories,
            |rows| (rows, 0),
            &self.config.dedup.repositories,
        )
        .map_rows(|rows| apply_outlier_rules(rows, &self.config.outliers));

        let index = RepositoryIndex::new(repositories.rows());
        if index.is_empty() {
            warn!("no repositories survived; every issue and pull request is an orphan");
        }

        let issues = stage(
            TableKind::Issues,
            tables.get(TableKind::Issues),
            normalize_issues,
            |rows| index.retain_known(rows),
            &self.config.dedup.issues,
        )
        .map_rows(with_resolution_times);

        let pull_requests = stage(
            TableKind::PullRequests,
            tables.get(TableKind::PullRequests),
            normalize_pull_requests,
            |rows| index.retain_known(rows),
            &self.config.dedup.pull_requests,
        )
        .map_rows(with_merge_times);

        let issue_rows = issues.rows.as_deref().ok();
        let pr_rows = pull_requests.rows.as_deref().ok();
        let repositories = repositories
            .map_rows(|rows| enrich_repositories(rows, issue_rows, pr_rows, &self.config, now));

        let summary = RunSummary::compute(
            repositories.rows(),
            issues.rows(),
            pull_requests.rows(),
            now,
        );

        let report = PipelineReport {
            run_id,
            now,
            repositories,
            issues,
            pull_requests,
            summary,
        };
        for (kind, stats) in report.stats() {
            metrics::record_table(kind, stats);
        }
        let failures = report.failures();
        for err in &failures {
            metrics::TABLE_FAILURES_TOTAL
                .with_label_values(&[err.table().as_str()])
                .inc();
        }
        if !failures.is_empty() {
            metrics::RUN_DEGRADED_TOTAL.inc();
        }
        info!(
            %run_id,
            repositories = report.repositories.stats.rows_out,
            issues = report.issues.stats.rows_out,
            pull_requests = report.pull_requests.stats.rows_out,
            failed_tables = failures.len(),
            "pipeline run finished"
        );
        report
    }
}

/// Normalize, gate and deduplicate one table. A structural error stops this
/// table only.
fn stage<T, N, G>(
    kind: TableKind,
    raw: Result<Option<&RawTable>, TableError>,
    normalize: N,
    gate: G,
    key_columns: &[String],
) -> TableReport<T>
where
    T: Keyed,
    N: FnOnce(&RawTable) -> Result<NormalizedTable<T>, TableError>,
    G: FnOnce(Vec<T>) -> (Vec<T>, usize),
{
    let mut stats = TableStats::default();
    let raw = match raw {
        Ok(raw) => raw,
        Err(err) => {
            warn!(table = %kind, error = %err, "table failed");
            stats.present = true;
            return TableReport {
                kind,
                rows: Err(err),
                stats,
            };
        }
    };
    let Some(raw) = raw else {
        info!(table = %kind, "table not supplied");
        return TableReport {
            kind,
            rows: Ok(Vec::new()),
            stats,
        };
    };
    stats.present = true;
    stats.rows_in = raw.len();

    let rows = normalize(raw).and_then(|normalized| {
        stats.coerced = normalized
            .coerced
            .iter()
            .map(|(column, count)| ((*column).to_string(), *count))
            .collect();
        let (gated, orphans) = gate(normalized.rows);
        stats.orphans = orphans;
        let before = gated.len();
        let deduped = deduplicate(gated, key_columns)?;
        stats.duplicates = before - deduped.len();
        Ok(deduped)
    });

    match &rows {
        Ok(rows) => {
            stats.rows_out = rows.len();
            info!(
                table = %kind,
                rows_in = stats.rows_in,
                rows_out = stats.rows_out,
                duplicates = stats.duplicates,
                orphans = stats.orphans,
                coerced = stats.coerced.values().sum::<usize>(),
                "table cleaned"
            );
        }
        Err(err) => warn!(table = %kind, error = %err, "table failed"),
    }
    TableReport { kind, rows, stats }
}

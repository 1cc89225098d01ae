use normalizer::TableKind;
use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

use crate::service::TableStats;

pub static RUNS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "pipeline_runs_total",
        "Total number of pipeline runs attempted"
    )
    .expect("pipeline runs total")
});

pub static RUN_DEGRADED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "pipeline_run_degraded_total",
        "Pipeline runs in which at least one table failed"
    )
    .expect("pipeline degraded runs")
});

pub static LAST_RUN_TIMESTAMP: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "pipeline_last_run_timestamp_seconds",
        "Reference time (unix seconds) of the most recent pipeline run"
    )
    .expect("pipeline last run timestamp")
});

pub static RUN_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "pipeline_run_duration_seconds",
        "Wall-clock duration of pipeline runs in seconds",
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]
    )
    .expect("pipeline run duration histogram")
});

pub static ROWS_IN_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "pipeline_rows_in_total",
        "Raw rows handed to the pipeline per table",
        &["table"]
    )
    .expect("pipeline rows in")
});

pub static ROWS_OUT_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "pipeline_rows_out_total",
        "Rows emitted by the pipeline per table",
        &["table"]
    )
    .expect("pipeline rows out")
});

pub static DUPLICATES_DROPPED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "pipeline_duplicates_dropped_total",
        "Rows filtered by natural-key deduplication per table",
        &["table"]
    )
    .expect("pipeline duplicates dropped")
});

pub static ORPHANS_DROPPED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "pipeline_orphans_dropped_total",
        "Issue and pull request rows dropped for referencing an unknown repository",
        &["table"]
    )
    .expect("pipeline orphans dropped")
});

pub static VALUES_COERCED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "pipeline_values_coerced_total",
        "Malformed values replaced by a missing value, default or unknown state",
        &["table", "column"]
    )
    .expect("pipeline values coerced")
});

pub static TABLE_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "pipeline_table_failures_total",
        "Tables that failed a structural precondition",
        &["table"]
    )
    .expect("pipeline table failures")
});

pub fn record_table(kind: TableKind, stats: &TableStats) {
    let table = kind.as_str();
    ROWS_IN_TOTAL
        .with_label_values(&[table])
        .inc_by(stats.rows_in as u64);
    ROWS_OUT_TOTAL
        .with_label_values(&[table])
        .inc_by(stats.rows_out as u64);
    DUPLICATES_DROPPED_TOTAL
        .with_label_values(&[table])
        .inc_by(stats.duplicates as u64);
    ORPHANS_DROPPED_TOTAL
        .with_label_values(&[table])
        .inc_by(stats.orphans as u64);
    for (column, count) in &stats.coerced {
        VALUES_COERCED_TOTAL
            .with_label_values(&[table, column.as_str()])
            .inc_by(*count as u64);
    }
}

/// Text exposition of every metric registered in the default registry.
pub fn render() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

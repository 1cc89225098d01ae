use anyhow::Result;
use common::{config::AppConfig, logging};
use pipeline::{load_all, JsonDirSink, JsonDirSource, Pipeline, ReportSink, RetryPolicy};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    logging::init_logging(&config.observability.log_level);

    let pipeline = Pipeline::new(config.pipeline.clone())?;
    let source = JsonDirSource::new(&config.io.input_dir, RetryPolicy::from(&config.retry));
    let tables = load_all(&source).await?;

    let report = pipeline.run(&tables);
    for failure in report.failures() {
        warn!(table = %failure.table(), error = %failure, "table skipped");
    }

    let sink = JsonDirSink::new(&config.io.output_dir, &config.observability.metrics_file);
    sink.write_report(&report).await?;
    info!(
        run_id = %report.run_id,
        repositories = report.summary.total_repositories,
        issues = report.summary.total_issues,
        pull_requests = report.summary.total_pull_requests,
        "pipeline finished"
    );
    Ok(())
}

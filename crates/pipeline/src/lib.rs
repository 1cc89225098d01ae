pub mod backoff;
pub mod gate;
pub mod metrics;
pub mod service;
pub mod sink;
pub mod source;

pub use backoff::RetryPolicy;
pub use gate::RepositoryIndex;
pub use service::{Pipeline, PipelineReport, RawTables, TableReport, TableStats};
pub use sink::{JsonDirSink, ReportSink, RunDigest};
pub use source::{load_all, JsonDirSource, LoadedTable, SnapshotSource};

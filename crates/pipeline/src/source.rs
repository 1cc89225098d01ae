use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use normalizer::{RawTable, TableError, TableKind};
use tracing::{debug, info, warn};

use crate::backoff::RetryPolicy;
use crate::service::RawTables;

/// A table that was read but may not hold a list of records.
pub type LoadedTable = std::result::Result<RawTable, TableError>;

/// Where raw snapshot tables come from.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// `Ok(None)` when the snapshot has no such table. The outer error is
    /// reserved for I/O that kept failing after retries.
    async fn load_table(&self, kind: TableKind) -> Result<Option<LoadedTable>>;
}

pub fn table_file_name(kind: TableKind) -> String {
    format!("{}.json", kind.as_str())
}

/// Reads `<dir>/<table>.json`, each a JSON array of records or an export
/// object with an `items` array.
#[derive(Debug, Clone)]
pub struct JsonDirSource {
    dir: PathBuf,
    retry: RetryPolicy,
}

impl JsonDirSource {
    pub fn new(dir: impl Into<PathBuf>, retry: RetryPolicy) -> Self {
        Self {
            dir: dir.into(),
            retry,
        }
    }

    async fn read(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        let label = path.display().to_string();
        self.retry
            .retry(&label, move || async move {
                match tokio::fs::read(path).await {
                    Ok(bytes) => Ok(Some(bytes)),
                    Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
                    Err(err) => Err(err),
                }
            })
            .await
            .with_context(|| format!("reading {label}"))
    }
}

#[async_trait]
impl SnapshotSource for JsonDirSource {
    async fn load_table(&self, kind: TableKind) -> Result<Option<LoadedTable>> {
        let path = self.dir.join(table_file_name(kind));
        let Some(bytes) = self.read(&path).await? else {
            debug!(table = %kind, path = %path.display(), "snapshot file missing");
            return Ok(None);
        };
        let table = serde_json::from_slice(&bytes)
            .map_err(|err| TableError::InvalidDocument {
                table: kind,
                reason: format!("{}: {err}", path.display()),
            })
            .and_then(|document| RawTable::from_document(kind, document));
        Ok(Some(table))
    }
}

pub async fn load_all(source: &dyn SnapshotSource) -> Result<RawTables> {
    let mut tables = RawTables::default();
    for kind in TableKind::ALL {
        match source.load_table(kind).await? {
            Some(Ok(table)) => {
                info!(table = %kind, rows = table.len(), "loaded snapshot table");
                tables.set(table);
            }
            Some(Err(err)) => {
                warn!(table = %kind, error = %err, "snapshot table rejected");
                tables.reject(err);
            }
            None => {}
        }
    }
    Ok(tables)
}

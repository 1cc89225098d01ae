use crate::models::TableKind;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TableError {
    #[error("{table} table is missing required column `{column}`")]
    MissingColumn { table: TableKind, column: String },
    #[error("`{column}` is not a key column of the {table} table")]
    UnknownKeyColumn { table: TableKind, column: String },
    #[error("{table} snapshot is not a list of records: {reason}")]
    InvalidDocument { table: TableKind, reason: String },
}

impl TableError {
    pub fn table(&self) -> TableKind {
        match self {
            Self::MissingColumn { table, .. }
            | Self::UnknownKeyColumn { table, .. }
            | Self::InvalidDocument { table, .. } => *table,
        }
    }
}

pub type Result<T> = std::result::Result<T, TableError>;

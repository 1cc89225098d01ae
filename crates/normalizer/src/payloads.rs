use serde_json::{Map, Value};

use crate::errors::{Result, TableError};
use crate::models::TableKind;

pub type RawRecord = Map<String, Value>;

/// Rows exactly as the fetch step stored them, one JSON object per record.
///
/// A column "exists" when at least one row carries the key, which mirrors how
/// the document store exports collections with sparse fields.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    kind: TableKind,
    rows: Vec<RawRecord>,
}

impl RawTable {
    pub fn new(kind: TableKind, rows: Vec<RawRecord>) -> Self {
        Self { kind, rows }
    }

    pub fn empty(kind: TableKind) -> Self {
        Self::new(kind, Vec::new())
    }

    /// Builds a table from loose JSON values; anything that is not an object is skipped.
    pub fn from_rows(kind: TableKind, rows: impl IntoIterator<Item = Value>) -> Self {
        let rows = rows
            .into_iter()
            .filter_map(|row| match row {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect();
        Self::new(kind, rows)
    }

    /// Accepts either a bare array of records or a store export shaped like
    /// `{"items": [...]}`.
    pub fn from_document(kind: TableKind, document: Value) -> Result<Self> {
        let rows = match document {
            Value::Array(rows) => rows,
            Value::Object(mut map) => match map.remove("items") {
                Some(Value::Array(rows)) => rows,
                _ => {
                    return Err(TableError::InvalidDocument {
                        table: kind,
                        reason: "object without an `items` array".into(),
                    })
                }
            },
            other => {
                return Err(TableError::InvalidDocument {
                    table: kind,
                    reason: format!("unexpected top-level {}", json_type(&other)),
                })
            }
        };
        Ok(Self::from_rows(kind, rows))
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn rows(&self) -> &[RawRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.rows.iter().any(|row| row.contains_key(column))
    }

    /// An empty table trivially satisfies every column requirement.
    pub fn require_columns(&self, columns: &[&str]) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        match columns.iter().find(|column| !self.has_column(column)) {
            Some(column) => Err(TableError::MissingColumn {
                table: self.kind,
                column: (*column).to_string(),
            }),
            None => Ok(()),
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

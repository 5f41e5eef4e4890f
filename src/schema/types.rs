// src/schema/types.rs

use serde::{Deserialize, Serialize};

/// The closed set of value classifiers a column can be typed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    Integer,
    Float,
    Temporal,
    ShortText,
    LongText,
}

impl SqlType {
    /// DDL spelling for the destination store.
    pub fn ddl(&self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::Float => "REAL",
            SqlType::Temporal => "DATETIME",
            SqlType::ShortText => "VARCHAR(255)",
            SqlType::LongText => "TEXT",
        }
    }
}

/// A single column definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub ty: SqlType,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: SqlType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// An ordered, collision-free column list for one target table. The surrogate
/// `id` and the `batch_tag` column are not part of the schema; the
/// materializer adds them ahead of these columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub columns: Vec<Column>,
}

impl TableSchema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

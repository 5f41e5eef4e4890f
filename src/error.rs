use thiserror::Error;

/// Convenience result type for ingestion operations.
pub type IngestResult<T> = Result<T, IngestError>;

/// Error type shared across the ingestion pipeline.
///
/// The variants map onto the pipeline's propagation policy: `Decode`,
/// `SchemaConflict` and `RowInsert` abort only the owning file, `Ddl` poisons
/// the file class for the rest of the run, `Connectivity` aborts the
/// remainder of the run, and `Extraction` aborts the owning archive.
#[derive(Debug, Error)]
pub enum IngestError {
    /// No encoding in the fallback chain could interpret the bytes, or the
    /// decoded text carried no usable rows.
    #[error("decode failed: {0}")]
    Decode(String),

    /// CSV record parsing failed after a successful text decode.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// A cleaned/remapped column name collides with another column or with
    /// one of the reserved `id` / `batch_tag` columns.
    #[error("schema conflict in `{table}`: column `{column}`")]
    SchemaConflict { table: String, column: String },

    /// Table creation failed for a reason other than already-exists.
    #[error("ddl failed for table `{table}`: {source}")]
    Ddl {
        table: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A single row failed type coercion or a store-level constraint, or the
    /// insert statement itself was rejected (schema drift against an
    /// existing table). `row` is 1-based within the file's data rows; 0
    /// means the statement never got as far as a row.
    #[error("insert failed in table `{table}`: {message}")]
    RowInsert {
        table: String,
        row: usize,
        message: String,
    },

    /// The destination store is unreachable or dropped mid-transaction.
    #[error("destination store unavailable: {0}")]
    Connectivity(#[source] rusqlite::Error),

    /// The archive is corrupt or unreadable.
    #[error("extraction failed for `{archive}`: {message}")]
    Extraction { archive: String, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

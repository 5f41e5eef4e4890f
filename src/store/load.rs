use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use tracing::debug;

use crate::error::{IngestError, IngestResult};
use crate::schema::{SqlType, TableSchema};
use crate::store::{is_connectivity, quote_ident};

/// Insert every transformed row of one file inside a single transaction.
///
/// Rows execute one at a time so a failure is attributable to its row; the
/// first failure rolls the whole transaction back and nothing from the file
/// becomes visible. `batch_tag` is stamped on every row, or omitted from the
/// statement entirely when `None` (the non-tagged deployment variant).
/// Returns the number of committed rows, which equals `rows.len()` on
/// success and is never partial.
pub fn load(
    conn: &mut Connection,
    class: &str,
    schema: &TableSchema,
    batch_tag: Option<&str>,
    rows: &[Vec<Option<String>>],
) -> IngestResult<usize> {
    if rows.is_empty() {
        return Ok(0);
    }

    let mut columns: Vec<String> = Vec::with_capacity(schema.len() + 1);
    if batch_tag.is_some() {
        columns.push("batch_tag".to_string());
    }
    columns.extend(schema.columns.iter().map(|col| quote_ident(&col.name)));
    let placeholders = vec!["?"; columns.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(class),
        columns.join(", "),
        placeholders
    );

    let tx = conn.transaction().map_err(IngestError::Connectivity)?;
    {
        // Fails here when a previously created table is missing a column
        // this file's schema carries (schema drift is never reconciled).
        let mut stmt = tx.prepare(&sql).map_err(|e| {
            if is_connectivity(&e) {
                IngestError::Connectivity(e)
            } else {
                IngestError::RowInsert {
                    table: class.to_string(),
                    row: 0,
                    message: format!("insert statement rejected: {e}"),
                }
            }
        })?;
        for (i, row) in rows.iter().enumerate() {
            let mut values: Vec<Value> = Vec::with_capacity(columns.len());
            if let Some(tag) = batch_tag {
                values.push(Value::Text(tag.to_string()));
            }
            for (cell, col) in row.iter().zip(&schema.columns) {
                values.push(coerce(cell.as_deref(), col.ty).map_err(|message| {
                    IngestError::RowInsert {
                        table: class.to_string(),
                        row: i + 1,
                        message: format!("row {}: {}", i + 1, message),
                    }
                })?);
            }
            stmt.execute(params_from_iter(values))
                .map_err(|e| row_error(class, i + 1, e))?;
        }
        // dropping `tx` on any early return above rolls the file back
    }
    tx.commit().map_err(IngestError::Connectivity)?;

    debug!(table = class, rows = rows.len(), "committed file");
    Ok(rows.len())
}

fn row_error(class: &str, row: usize, err: rusqlite::Error) -> IngestError {
    if is_connectivity(&err) {
        IngestError::Connectivity(err)
    } else {
        IngestError::RowInsert {
            table: class.to_string(),
            row,
            message: format!("row {row}: {err}"),
        }
    }
}

/// Coerce a transformed cell to the column's storage type. The store itself
/// is dynamically typed, so numeric enforcement happens here and a mismatch
/// surfaces as a row-level failure.
fn coerce(cell: Option<&str>, ty: SqlType) -> Result<Value, String> {
    let Some(v) = cell else {
        return Ok(Value::Null);
    };
    match ty {
        SqlType::Integer => v
            .trim()
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| format!("`{}` is not an integer", v)),
        SqlType::Float => v
            .trim()
            .parse::<f64>()
            .map(Value::Real)
            .map_err(|_| format!("`{}` is not a float", v)),
        SqlType::Temporal | SqlType::ShortText | SqlType::LongText => {
            Ok(Value::Text(v.to_string()))
        }
    }
}

use std::collections::HashMap;

use rusqlite::Connection;
use tracing::debug;

use crate::error::{IngestError, IngestResult};
use crate::schema::{SqlType, TableSchema};
use crate::store::quote_ident;

/// Create the target table for `class` if it does not exist yet.
///
/// The generated definition puts the surrogate `id` first, then `batch_tag`,
/// then the schema's columns in order. Idempotent by way of `IF NOT EXISTS`;
/// an existing table is never reconciled, so a later file whose inferred
/// schema differs will fail at load time instead of altering the table.
pub fn ensure_table(conn: &Connection, class: &str, schema: &TableSchema) -> IngestResult<()> {
    if class.is_empty() || class.contains('"') {
        return Err(IngestError::SchemaConflict {
            table: class.to_string(),
            column: class.to_string(),
        });
    }

    let mut defs = vec![
        "id INTEGER PRIMARY KEY AUTOINCREMENT".to_string(),
        "batch_tag VARCHAR(10)".to_string(),
    ];
    defs.extend(
        schema
            .columns
            .iter()
            .map(|col| format!("{} {}", quote_ident(&col.name), col.ty.ddl())),
    );

    let sql = format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        quote_ident(class),
        defs.join(",\n    ")
    );
    debug!(table = class, "ensuring target table");

    conn.execute(&sql, []).map_err(|source| IngestError::Ddl {
        table: class.to_string(),
        source,
    })?;
    Ok(())
}

/// Align an inferred schema with the table as it actually exists: each
/// column keeps its name and order but takes the declared type when the
/// table already has that column. A column was typed by the first file that
/// created the table, and later files must coerce to it — a mismatch then
/// surfaces as a row-level failure, not a silent re-type.
pub fn reconcile_with_table(
    conn: &Connection,
    class: &str,
    inferred: TableSchema,
) -> IngestResult<TableSchema> {
    let declared = declared_types(conn, class)?;
    let columns = inferred
        .columns
        .into_iter()
        .map(|mut col| {
            if let Some(ty) = declared.get(&col.name) {
                col.ty = *ty;
            }
            col
        })
        .collect();
    Ok(TableSchema::new(columns))
}

/// Declared column types of an existing table, keyed by column name.
/// `id` and `batch_tag` are the materializer's own and are left out.
fn declared_types(conn: &Connection, class: &str) -> IngestResult<HashMap<String, SqlType>> {
    let sql = format!("PRAGMA table_info({})", quote_ident(class));
    let mut stmt = conn.prepare(&sql).map_err(|source| IngestError::Ddl {
        table: class.to_string(),
        source,
    })?;
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })
        .map_err(|source| IngestError::Ddl {
            table: class.to_string(),
            source,
        })?;

    let mut types = HashMap::new();
    for row in rows {
        let (name, decl) = row.map_err(|source| IngestError::Ddl {
            table: class.to_string(),
            source,
        })?;
        if name == "id" || name == "batch_tag" {
            continue;
        }
        if let Some(ty) = sql_type_from_ddl(&decl) {
            types.insert(name, ty);
        }
    }
    Ok(types)
}

fn sql_type_from_ddl(decl: &str) -> Option<SqlType> {
    match decl.to_uppercase().as_str() {
        "INTEGER" => Some(SqlType::Integer),
        "REAL" => Some(SqlType::Float),
        "DATETIME" => Some(SqlType::Temporal),
        "TEXT" => Some(SqlType::LongText),
        decl if decl.starts_with("VARCHAR") => Some(SqlType::ShortText),
        _ => None,
    }
}

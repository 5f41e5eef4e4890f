use chrono::NaiveDateTime;

use crate::config::DateMode;
use crate::decode::DecodedTable;
use crate::schema::{SqlType, TableSchema};

/// The source pattern temporal cells arrive in.
const SOURCE_TS: &str = "%Y/%m/%d %H:%M:%S";
/// Canonical pattern temporal cells are stored as in `Parsed` mode.
const CANONICAL_TS: &str = "%Y-%m-%d %H:%M:%S";

/// Normalize one decoded table into insert-ready cells.
///
/// Empty cells become `None` in every column so the loader binds a true NULL
/// rather than an empty string. Temporal columns additionally go through the
/// configured date mode: `Parsed` re-emits `YYYY/MM/DD HH:MM:SS` canonically
/// and NULLs anything unparseable, `Verbatim` forwards the trimmed text.
pub fn transform_rows(
    table: &DecodedTable,
    schema: &TableSchema,
    mode: DateMode,
) -> Vec<Vec<Option<String>>> {
    table
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .zip(&schema.columns)
                .map(|(cell, col)| transform_cell(cell, col.ty, mode))
                .collect()
        })
        .collect()
}

fn transform_cell(cell: &str, ty: SqlType, mode: DateMode) -> Option<String> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }
    if ty == SqlType::Temporal {
        return match mode {
            DateMode::Parsed => NaiveDateTime::parse_from_str(trimmed, SOURCE_TS)
                .ok()
                .map(|dt| dt.format(CANONICAL_TS).to_string()),
            DateMode::Verbatim => Some(trimmed.to_string()),
        };
    }
    Some(cell.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;

    fn fixture() -> (DecodedTable, TableSchema) {
        let table = DecodedTable {
            headers: vec!["Last_Write_Time".into(), "Name".into()],
            rows: vec![
                vec!["2024/01/02 03:04:05".into(), "svc".into()],
                vec!["".into(), "".into()],
                vec!["not a date".into(), " padded ".into()],
            ],
        };
        let schema = TableSchema::new(vec![
            Column::new("Last_Write_Time", SqlType::Temporal),
            Column::new("Name", SqlType::ShortText),
        ]);
        (table, schema)
    }

    #[test]
    fn parsed_mode_canonicalizes_and_nulls() {
        let (table, schema) = fixture();
        let rows = transform_rows(&table, &schema, DateMode::Parsed);
        assert_eq!(rows[0][0].as_deref(), Some("2024-01-02 03:04:05"));
        assert_eq!(rows[1][0], None);
        assert_eq!(rows[2][0], None);
    }

    #[test]
    fn verbatim_mode_forwards_trimmed_text() {
        let (table, schema) = fixture();
        let rows = transform_rows(&table, &schema, DateMode::Verbatim);
        assert_eq!(rows[0][0].as_deref(), Some("2024/01/02 03:04:05"));
        assert_eq!(rows[1][0], None);
        assert_eq!(rows[2][0].as_deref(), Some("not a date"));
    }

    #[test]
    fn empty_cells_become_null_everywhere() {
        let (table, schema) = fixture();
        let rows = transform_rows(&table, &schema, DateMode::Parsed);
        assert_eq!(rows[1][1], None);
        // non-temporal cells keep their original spacing
        assert_eq!(rows[2][1].as_deref(), Some(" padded "));
    }
}

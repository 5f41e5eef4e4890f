use crate::decode::DecodedTable;
use crate::schema::normalize::is_headerless;
use crate::schema::types::{Column, SqlType, TableSchema};

/// Longest value, in characters, a column may hold and still be typed as a
/// short string. Multi-byte text blows past VARCHAR limits quickly, so
/// anything at or over this goes to long text.
const SHORT_TEXT_MAX: usize = 100;

/// The fixed schema for headerless classes, mirroring the predefined table
/// definition of the export format. Everything is a short string except the
/// write timestamp and the free-text fields.
fn predefined_schema() -> TableSchema {
    const LONG_TEXT: &[&str] = &[
        "Dependencies",
        "File_Description",
        "Company",
        "Product_Name",
        "Description",
        "Last_Error",
        "Command_Line",
    ];
    let columns = super::normalize::normalized_service_columns()
        .into_iter()
        .map(|name| {
            let ty = if name == "Last_Write_Time" {
                SqlType::Temporal
            } else if LONG_TEXT.contains(&name.as_str()) {
                SqlType::LongText
            } else {
                SqlType::ShortText
            };
            Column { name, ty }
        })
        .collect();
    TableSchema::new(columns)
}

/// Derive the column types for one decoded table.
///
/// Headerless classes use the predefined schema; everything else is inferred
/// from observed value shapes, column by column in header order, so the
/// result is deterministic for a given table.
pub fn infer(class: &str, table: &DecodedTable) -> TableSchema {
    if is_headerless(class) {
        return predefined_schema();
    }

    let columns = table
        .headers
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let values = table.rows.iter().map(|row| row[idx].trim());
            Column::new(name.clone(), classify(class, name, values))
        })
        .collect();
    TableSchema::new(columns)
}

/// Classify one column from its name and non-empty values.
fn classify<'a>(class: &str, name: &str, values: impl Iterator<Item = &'a str>) -> SqlType {
    // Browser history URLs and titles routinely exceed any short-string
    // limit even when a small sample happens to be short.
    if class == "HISTORY" && (name == "URL" || name == "Title") {
        return SqlType::LongText;
    }

    let lower = name.to_lowercase();
    if lower.contains("time") || lower.contains("date") {
        return SqlType::Temporal;
    }

    let non_empty: Vec<&str> = values.filter(|v| !v.is_empty()).collect();
    if non_empty.is_empty() {
        return SqlType::ShortText;
    }
    if non_empty.iter().all(|v| is_fractional(v)) {
        return SqlType::Float;
    }
    if non_empty.iter().all(|v| v.parse::<i64>().is_ok()) {
        return SqlType::Integer;
    }

    let max_len = non_empty.iter().map(|v| v.chars().count()).max().unwrap_or(0);
    if max_len < SHORT_TEXT_MAX {
        SqlType::ShortText
    } else {
        SqlType::LongText
    }
}

/// A decimal with a fractional part, e.g. `3.14` but not `3`.
fn is_fractional(v: &str) -> bool {
    v.contains('.') && v.parse::<f64>().is_ok()
}

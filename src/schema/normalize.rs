use std::collections::HashSet;

use tracing::warn;

use crate::decode::DecodedTable;
use crate::error::{IngestError, IngestResult};

/// File classes whose exports carry no header row.
pub const HEADERLESS_CLASSES: &[&str] = &["SERVICES", "DRIVERS"];

/// The fixed header injected for headerless classes, order-significant.
pub const SERVICE_COLUMNS: [&str; 17] = [
    "Name",
    "Display Name",
    "Status",
    "Startup Type",
    "ErrorControl",
    "Group",
    "Dependencies",
    "File Description",
    "File Version",
    "Company",
    "Product Name",
    "Description",
    "Filename",
    "Last Error",
    "Last Write Time",
    "Command-Line",
    "Process ID",
];

/// Remappings applied after cleaning, in listed order. `Hub___Port` collapses
/// a triple-underscore cleaning artifact; `Group` would collide with a
/// reserved storage-engine keyword.
const REMAP: &[(&str, &str)] = &[("Hub___Port", "Hub_Port"), ("Group", "Group_Name")];

/// Extra remappings for headerless classes only.
const HEADERLESS_REMAP: &[(&str, &str)] = &[("Command-Line", "Command_Line")];

/// Column names owned by the materializer; a CSV header may not claim them.
const RESERVED: &[&str] = &["id", "batch_tag"];

/// Leading token of a CSV member's file name, e.g. `USB_HOST.csv` → `USB`.
/// Selects both the target table and any special-case handling.
pub fn file_class(file_name: &str) -> String {
    let stem = file_name.split('.').next().unwrap_or(file_name);
    stem.split('_').next().unwrap_or(stem).to_string()
}

pub fn is_headerless(class: &str) -> bool {
    HEADERLESS_CLASSES.contains(&class)
}

/// Trim and replace the characters the destination store dislikes:
/// space and `/` become `_`, parentheses are dropped.
fn clean_name(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter_map(|c| match c {
            ' ' | '/' => Some('_'),
            '(' | ')' => None,
            other => Some(other),
        })
        .collect()
}

fn remap_name(name: String, headerless: bool) -> String {
    let mut name = name;
    for (from, to) in REMAP {
        if name == *from {
            name = (*to).to_string();
        }
    }
    if headerless {
        for (from, to) in HEADERLESS_REMAP {
            if name == *from {
                name = (*to).to_string();
            }
        }
    }
    name
}

/// The cleaned and remapped form of the 17 injected names.
pub fn normalized_service_columns() -> Vec<String> {
    SERVICE_COLUMNS
        .iter()
        .map(|raw| remap_name(clean_name(raw), true))
        .collect()
}

/// Turn raw decoded records into a `DecodedTable` with a normalized header.
///
/// Headerless classes get the fixed 17-name header injected and keep every
/// raw record as data; for all other classes the first record is the header.
/// Duplicate or reserved names after cleaning are reported, never silently
/// dropped. Rows are padded or truncated to the header width so the table
/// invariant holds downstream.
pub fn normalize(class: &str, raw_rows: Vec<Vec<String>>) -> IngestResult<DecodedTable> {
    let headerless = is_headerless(class);
    let (headers, rows) = if headerless {
        (normalized_service_columns(), raw_rows)
    } else {
        let mut iter = raw_rows.into_iter();
        let raw_header = iter
            .next()
            .ok_or_else(|| IngestError::Decode("file contains no rows".into()))?;
        let headers = raw_header
            .iter()
            .map(|raw| remap_name(clean_name(raw), false))
            .collect();
        (headers, iter.collect())
    };

    let mut seen = HashSet::new();
    for name in &headers {
        let lower = name.to_lowercase();
        if RESERVED.contains(&lower.as_str()) || name.contains('"') || !seen.insert(lower) {
            return Err(IngestError::SchemaConflict {
                table: class.to_string(),
                column: name.clone(),
            });
        }
    }

    let width = headers.len();
    let mut rows = rows;
    for (i, row) in rows.iter_mut().enumerate() {
        if row.len() > width {
            warn!(
                class,
                row = i + 1,
                cells = row.len(),
                width,
                "row wider than header, truncating"
            );
            row.truncate(width);
        } else if row.len() < width {
            row.resize(width, String::new());
        }
    }

    Ok(DecodedTable { headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn file_class_takes_leading_token() {
        assert_eq!(file_class("USB_HOST.csv"), "USB");
        assert_eq!(file_class("SERVICES_DESKTOP-QTCL99K.csv"), "SERVICES");
        assert_eq!(file_class("HISTORY.csv"), "HISTORY");
    }

    #[test]
    fn headerless_class_gets_exactly_17_columns() {
        let table = normalize("SERVICES", raw(&[&["a"; 17], &["b"; 17]])).unwrap();
        assert_eq!(table.headers.len(), 17);
        assert_eq!(table.headers[0], "Name");
        assert_eq!(table.headers[1], "Display_Name");
        assert_eq!(table.headers[5], "Group_Name");
        assert_eq!(table.headers[15], "Command_Line");
        assert_eq!(table.headers[16], "Process_ID");
        // every raw record stays a data row
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn cleaning_and_remapping() {
        let table = normalize(
            "USB",
            raw(&[&["Hub / Port", "Group", "Size (bytes)"], &["1", "g", "2"]]),
        )
        .unwrap();
        assert_eq!(table.headers, vec!["Hub_Port", "Group_Name", "Size_bytes"]);
    }

    #[test]
    fn normalization_is_idempotent_for_headered_classes() {
        let once = normalize("USB", raw(&[&["Display Name", "Hub / Port"], &["x", "y"]])).unwrap();
        let mut again_rows = vec![once.headers.clone()];
        again_rows.extend(once.rows.clone());
        let twice = normalize("USB", again_rows).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn duplicate_columns_are_reported() {
        let err = normalize("USB", raw(&[&["Name", "Name"], &["a", "b"]])).unwrap_err();
        assert!(matches!(err, IngestError::SchemaConflict { .. }));
    }

    #[test]
    fn reserved_columns_are_reported() {
        let err = normalize("USB", raw(&[&["id", "Name"]])).unwrap_err();
        assert!(matches!(err, IngestError::SchemaConflict { .. }));
        let err = normalize("USB", raw(&[&["Batch_Tag"]])).unwrap_err();
        assert!(matches!(err, IngestError::SchemaConflict { .. }));
    }

    #[test]
    fn ragged_rows_are_repaired() {
        let table = normalize("USB", raw(&[&["A", "B"], &["1"], &["1", "2", "3"]])).unwrap();
        assert_eq!(table.rows[0], vec!["1", ""]);
        assert_eq!(table.rows[1], vec!["1", "2"]);
    }
}

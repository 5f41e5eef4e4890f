use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use glob::glob;
use tracing::{info, instrument};
use zip::ZipArchive;

use crate::error::{IngestError, IngestResult};

/// Leading token of the archive's file name, stamped on every imported row.
/// `220167_KF014_rp.zip` → `220167`.
pub fn batch_tag(zip_path: &Path) -> String {
    let name = zip_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    name.split('_').next().unwrap_or(name).to_string()
}

/// Extract every member of `zip_path` into `dest`, preserving relative
/// paths. Any failure is an extraction error scoped to this archive.
#[instrument(level = "info", skip_all, fields(zip = %zip_path.display()))]
pub fn extract_archive(zip_path: &Path, dest: &Path) -> IngestResult<()> {
    let archive_name = zip_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("<archive>")
        .to_string();
    let fail = |message: String| IngestError::Extraction {
        archive: archive_name.clone(),
        message,
    };

    let file = File::open(zip_path).map_err(|e| fail(e.to_string()))?;
    let mut archive = ZipArchive::new(file).map_err(|e| fail(e.to_string()))?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| fail(e.to_string()))?;
        // entries with unsafe paths (absolute, `..`) are skipped
        let Some(rel) = entry.enclosed_name() else {
            continue;
        };
        let out_path = dest.join(rel);
        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| fail(e.to_string()))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| fail(e.to_string()))?;
        }
        let mut out = File::create(&out_path).map_err(|e| fail(e.to_string()))?;
        io::copy(&mut entry, &mut out).map_err(|e| fail(e.to_string()))?;
    }

    info!(members = archive.len(), "extracted archive");
    Ok(())
}

/// Find every CSV member under `root`, recursively, in a stable order.
/// Discovery runs inside the archive's extraction workspace, so a failure
/// here is scoped to the owning archive like any other extraction problem.
pub fn discover_csvs(root: &Path) -> IngestResult<Vec<PathBuf>> {
    let pattern = format!("{}/**/*.csv", root.display());
    let mut found: Vec<PathBuf> = glob(&pattern)
        .map_err(|e| IngestError::Extraction {
            archive: root.display().to_string(),
            message: format!("bad discovery pattern: {e}"),
        })?
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .collect();
    found.sort();
    Ok(found)
}

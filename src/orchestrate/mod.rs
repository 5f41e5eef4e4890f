use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rusqlite::Connection;
use tempfile::TempDir;
use tracing::{error, info, instrument, warn};

use crate::archive::{batch_tag, discover_csvs, extract_archive};
use crate::config::ImportConfig;
use crate::decode;
use crate::error::{IngestError, IngestResult};
use crate::schema::{self, file_class};
use crate::store::{
    self,
    load::load,
    materialize::{ensure_table, reconcile_with_table},
};
use crate::transform::transform_rows;

/// Per-file result. `attempted` counts the file's data rows; `committed` is
/// either equal to it or zero, never partial.
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub file: String,
    pub class: String,
    pub attempted: usize,
    pub committed: usize,
    pub error: Option<String>,
}

/// Tally across one whole run. The run never aborts early on a single
/// archive or member failure, so every discovered file shows up here.
#[derive(Debug, Default)]
pub struct ImportSummary {
    pub archives_processed: usize,
    pub files_attempted: usize,
    pub files_committed: usize,
    pub outcomes: Vec<ImportOutcome>,
}

enum Flow {
    Continue,
    /// The destination store is gone; stop after the current file.
    AbortRun,
}

/// Drives archives end to end: extract into an ephemeral workspace, discover
/// CSV members, then run each member through
/// decode → normalize → infer → materialize → transform → load.
pub struct Importer {
    config: ImportConfig,
    conn: Connection,
    cancel: Arc<AtomicBool>,
    /// Classes whose table creation failed this run; their remaining files
    /// are skipped because the table cannot be relied upon.
    failed_classes: HashSet<String>,
}

impl Importer {
    /// Open the destination store from an explicit config. No ambient state
    /// is consulted, so importers for different destinations can coexist.
    pub fn new(config: ImportConfig) -> IngestResult<Self> {
        let conn = store::open(&config.database)?;
        Ok(Self {
            config,
            conn,
            cancel: Arc::new(AtomicBool::new(false)),
            failed_classes: HashSet::new(),
        })
    }

    /// Flag checked between files; setting it abandons the remaining queue.
    /// A file mid-transaction at that point rolls back as usual.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Process every archive, always returning a summary. Failures are
    /// recorded per file and never propagate past this boundary.
    pub fn run(&mut self, archives: &[PathBuf]) -> ImportSummary {
        let mut summary = ImportSummary::default();
        for zip_path in archives {
            if self.cancel.load(Ordering::Relaxed) {
                warn!("cancelled; abandoning remaining archives");
                break;
            }
            let flow = self.import_archive(zip_path, &mut summary);
            summary.archives_processed += 1;
            if matches!(flow, Flow::AbortRun) {
                error!("destination store lost; aborting remainder of the run");
                break;
            }
        }
        info!(
            archives = summary.archives_processed,
            attempted = summary.files_attempted,
            committed = summary.files_committed,
            "run complete"
        );
        summary
    }

    #[instrument(level = "info", skip_all, fields(zip = %zip_path.display()))]
    fn import_archive(&mut self, zip_path: &Path, summary: &mut ImportSummary) -> Flow {
        let archive_name = zip_path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("<archive>")
            .to_string();

        // Dropped on every exit path below, releasing the workspace.
        let workspace = match TempDir::new() {
            Ok(dir) => dir,
            Err(e) => {
                error!(archive = %archive_name, "cannot create workspace: {e}");
                summary.outcomes.push(archive_failure(&archive_name, e.to_string()));
                return Flow::Continue;
            }
        };

        if let Err(e) = extract_archive(zip_path, workspace.path()) {
            error!("{e}");
            summary.outcomes.push(archive_failure(&archive_name, e.to_string()));
            return Flow::Continue;
        }

        let members = match discover_csvs(workspace.path()) {
            Ok(found) => found,
            Err(e) => {
                summary.outcomes.push(archive_failure(&archive_name, e.to_string()));
                return Flow::Continue;
            }
        };
        if members.is_empty() {
            warn!(archive = %archive_name, "no CSV members found");
            return Flow::Continue;
        }

        let tag = batch_tag(zip_path);
        for member in &members {
            if self.cancel.load(Ordering::Relaxed) {
                warn!("cancelled; abandoning remaining members");
                return Flow::Continue;
            }
            let (outcome, flow) = self.import_member(member, &tag);
            summary.files_attempted += 1;
            if outcome.error.is_none() {
                summary.files_committed += 1;
            }
            summary.outcomes.push(outcome);
            if matches!(flow, Flow::AbortRun) {
                return Flow::AbortRun;
            }
        }
        Flow::Continue
    }

    fn import_member(&mut self, path: &Path, tag: &str) -> (ImportOutcome, Flow) {
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("<member>")
            .to_string();
        let class = file_class(&file_name);
        let mut outcome = ImportOutcome {
            file: file_name.clone(),
            class: class.clone(),
            attempted: 0,
            committed: 0,
            error: None,
        };

        if self.failed_classes.contains(&class) {
            outcome.error = Some(format!(
                "skipped: table `{class}` could not be created earlier in this run"
            ));
            return (outcome, Flow::Continue);
        }

        match self.import_member_inner(path, tag, &class, &mut outcome) {
            Ok(()) => {
                info!(
                    file = %file_name,
                    table = %class,
                    rows = outcome.committed,
                    "file committed"
                );
                (outcome, Flow::Continue)
            }
            Err(e) => {
                error!(file = %file_name, "{e}");
                let flow = match &e {
                    IngestError::Ddl { .. } => {
                        self.failed_classes.insert(class);
                        Flow::Continue
                    }
                    IngestError::Connectivity(_) => Flow::AbortRun,
                    _ => Flow::Continue,
                };
                outcome.committed = 0;
                outcome.error = Some(e.to_string());
                (outcome, flow)
            }
        }
    }

    fn import_member_inner(
        &mut self,
        path: &Path,
        tag: &str,
        class: &str,
        outcome: &mut ImportOutcome,
    ) -> IngestResult<()> {
        let bytes = fs::read(path)?;
        let raw = decode::decode_rows(&bytes)?;
        let table = schema::normalize(class, raw)?;
        let inferred = schema::infer(class, &table);
        ensure_table(&self.conn, class, &inferred)?;
        // the table's declared types win for columns that already exist
        let table_schema = reconcile_with_table(&self.conn, class, inferred)?;

        let rows = transform_rows(&table, &table_schema, self.config.date_mode);
        outcome.attempted = rows.len();
        let tag = self.config.tag_rows.then_some(tag);
        outcome.committed = load(&mut self.conn, class, &table_schema, tag, &rows)?;
        Ok(())
    }
}

fn archive_failure(archive: &str, message: String) -> ImportOutcome {
    ImportOutcome {
        file: archive.to_string(),
        class: String::new(),
        attempted: 0,
        committed: 0,
        error: Some(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::{ExtendedFileOptions, FileOptions};
    use zip::CompressionMethod;

    fn write_zip(path: &Path, members: &[(&str, &str)]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        for (member, content) in members {
            let options = FileOptions::<ExtendedFileOptions>::default()
                .compression_method(CompressionMethod::Stored);
            zip.start_file(*member, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn ddl_failure_poisons_the_class_but_not_its_neighbours() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("audit.db");
        {
            // an index named USB makes CREATE TABLE IF NOT EXISTS "USB" fail
            let conn = Connection::open(&db).unwrap();
            conn.execute_batch("CREATE TABLE seed (x INTEGER); CREATE INDEX USB ON seed (x);")
                .unwrap();
        }

        let zip_path = dir.path().join("100_host.zip");
        write_zip(
            &zip_path,
            &[
                ("USB_A.csv", "Description,Encrypted\na,No\n"),
                ("USB_B.csv", "Description,Encrypted\nb,No\n"),
                ("DISK_A.csv", "Label,Size\nc,10\n"),
            ],
        );

        let mut importer = Importer::new(ImportConfig::new(&db)).unwrap();
        let summary = importer.run(&[zip_path]);

        assert_eq!(summary.files_attempted, 3);
        assert_eq!(summary.files_committed, 1);
        let by_file = |name: &str| {
            summary
                .outcomes
                .iter()
                .find(|o| o.file == name)
                .unwrap()
                .error
                .as_deref()
        };
        assert!(by_file("USB_A.csv").unwrap().contains("ddl failed"));
        // the sibling of the poisoned class never touches the store
        assert!(by_file("USB_B.csv").unwrap().contains("skipped"));
        assert_eq!(by_file("DISK_A.csv"), None);

        let conn = Connection::open(&db).unwrap();
        let disk_rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM DISK", [], |r| r.get(0))
            .unwrap();
        assert_eq!(disk_rows, 1);
    }

    #[test]
    fn cancellation_abandons_the_queue() {
        let dir = TempDir::new().unwrap();
        let config = ImportConfig::new(dir.path().join("audit.db"));
        let mut importer = Importer::new(config).unwrap();
        importer.cancel_flag().store(true, Ordering::Relaxed);

        let summary = importer.run(&[dir.path().join("220167_x.zip")]);
        assert_eq!(summary.archives_processed, 0);
        assert_eq!(summary.files_attempted, 0);
    }

    #[test]
    fn missing_archive_is_scoped_to_that_archive() {
        let dir = TempDir::new().unwrap();
        let config = ImportConfig::new(dir.path().join("audit.db"));
        let mut importer = Importer::new(config).unwrap();

        let summary = importer.run(&[dir.path().join("220167_missing.zip")]);
        assert_eq!(summary.archives_processed, 1);
        assert_eq!(summary.files_committed, 0);
        assert_eq!(summary.outcomes.len(), 1);
        assert!(summary.outcomes[0].error.is_some());
    }
}

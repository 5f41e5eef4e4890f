use anyhow::Result;
use auditload::{ImportConfig, Importer};
use glob::glob;
use std::{env, path::PathBuf};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env_filter).init();
    info!("startup");

    // ─── 2) resolve data dir + config ────────────────────────────────
    let mut args = env::args().skip(1);
    let data_dir = args.next().unwrap_or_else(|| "data".to_string());
    let config = match args.next() {
        Some(path) => ImportConfig::from_yaml_file(path)?,
        None => ImportConfig::new("auditload.db"),
    };

    // ─── 3) discover ZIP archives ────────────────────────────────────
    let pattern = format!("{}/*.zip", data_dir);
    let mut archives: Vec<PathBuf> = glob(&pattern)?.filter_map(|e| e.ok()).collect();
    archives.sort();
    if archives.is_empty() {
        info!("no ZIP archives under {}; exit", data_dir);
        return Ok(());
    }
    info!("{} archives to import", archives.len());

    // ─── 4) run the pipeline ─────────────────────────────────────────
    let mut importer = Importer::new(config)?;
    let summary = importer.run(&archives);

    for outcome in &summary.outcomes {
        if let Some(err) = &outcome.error {
            error!(file = %outcome.file, "{err}");
        }
    }
    info!(
        archives = summary.archives_processed,
        attempted = summary.files_attempted,
        committed = summary.files_committed,
        "all done"
    );

    if summary.files_attempted > 0 && summary.files_committed == 0 {
        std::process::exit(1);
    }
    Ok(())
}

pub mod load;
pub mod materialize;

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;
use tracing::info;

use crate::error::{IngestError, IngestResult};

/// How long a blocked statement waits on a locked database before the call
/// surfaces as a connectivity failure instead of hanging the run.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Open the destination database, creating the file if needed.
pub fn open(path: &Path) -> IngestResult<Connection> {
    let conn = Connection::open(path).map_err(IngestError::Connectivity)?;
    conn.busy_timeout(BUSY_TIMEOUT)
        .map_err(IngestError::Connectivity)?;
    info!(database = %path.display(), "opened destination store");
    Ok(conn)
}

/// Double-quote an identifier for DDL/DML. Names containing a quote are
/// rejected upstream by the normalizer.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name)
}

/// Connection-level failure codes that should abort the remainder of the run
/// rather than just the current row.
pub(crate) fn is_connectivity(err: &rusqlite::Error) -> bool {
    use rusqlite::ErrorCode::*;
    matches!(
        err,
        rusqlite::Error::SqliteFailure(f, _)
            if matches!(
                f.code,
                DatabaseBusy | DatabaseLocked | CannotOpen | DiskFull | SystemIoFailure | NotADatabase
            )
    )
}

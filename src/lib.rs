pub mod archive;
pub mod config;
pub mod decode;
pub mod error;
pub mod orchestrate;
pub mod schema;
pub mod store;
pub mod transform;

pub use config::{DateMode, ImportConfig};
pub use error::{IngestError, IngestResult};
pub use orchestrate::{ImportOutcome, ImportSummary, Importer};

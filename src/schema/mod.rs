pub mod infer;
pub mod normalize;
pub mod types;

pub use infer::infer;
pub use normalize::{file_class, is_headerless, normalize, SERVICE_COLUMNS};
pub use types::{Column, SqlType, TableSchema};

pub mod errors;
pub mod names;

pub use errors::{StorageError, StorageResult};
pub use names::ResourceKind;

pub mod connection_string;
pub mod shared_key;
pub mod types;

pub use connection_string::{
    DEVELOPMENT_STORAGE_ACCOUNT, DEVELOPMENT_STORAGE_KEY, StorageConnectionString,
};
pub use shared_key::SharedKeySigner;
pub use types::{ServiceKind, StorageCredential};

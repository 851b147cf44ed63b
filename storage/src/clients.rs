use crate::auth::StorageConnectionString;
use crate::blob::BlobServiceClient;
use crate::common::StorageResult;
use crate::file_share::ShareServiceClient;
use crate::pipeline::ClientOptions;
use crate::queue::QueueServiceClient;
use crate::table::TableServiceClient;
use std::sync::Arc;

/// The four service clients built once from a single connection string.
///
/// Cloning is cheap; every clone shares the same underlying clients, so the
/// application holds exactly one instance of each for its whole lifetime.
#[derive(Debug, Clone)]
pub struct StorageClients {
    blob: Arc<BlobServiceClient>,
    queue: Arc<QueueServiceClient>,
    table: Arc<TableServiceClient>,
    file: Arc<ShareServiceClient>,
    account_name: Option<String>,
}

impl StorageClients {
    pub fn from_connection_string(
        connection_string: &str,
        options: &ClientOptions,
    ) -> StorageResult<Self> {
        let parsed = StorageConnectionString::parse(connection_string)?;
        Self::new(&parsed, options)
    }

    /// Builds all four clients, failing if any service cannot be addressed.
    pub fn new(
        connection_string: &StorageConnectionString,
        options: &ClientOptions,
    ) -> StorageResult<Self> {
        let clients = Self {
            blob: Arc::new(BlobServiceClient::new(connection_string, options)?),
            queue: Arc::new(QueueServiceClient::new(connection_string, options)?),
            table: Arc::new(TableServiceClient::new(connection_string, options)?),
            file: Arc::new(ShareServiceClient::new(connection_string, options)?),
            account_name: connection_string.account_name().map(str::to_string),
        };

        log::debug!(
            "Storage clients ready (account: {}, blob: {}, queue: {}, table: {}, file: {})",
            clients.account_name.as_deref().unwrap_or("<none>"),
            clients.blob.endpoint(),
            clients.queue.endpoint(),
            clients.table.endpoint(),
            clients.file.endpoint()
        );
        Ok(clients)
    }

    pub fn blob(&self) -> Arc<BlobServiceClient> {
        Arc::clone(&self.blob)
    }

    pub fn queue(&self) -> Arc<QueueServiceClient> {
        Arc::clone(&self.queue)
    }

    pub fn table(&self) -> Arc<TableServiceClient> {
        Arc::clone(&self.table)
    }

    pub fn file(&self) -> Arc<ShareServiceClient> {
        Arc::clone(&self.file)
    }

    pub fn account_name(&self) -> Option<&str> {
        self.account_name.as_deref()
    }
}

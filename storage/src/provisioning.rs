//! Startup provisioning of the storage resources the retail site relies on.
//!
//! Each resource is created if it is missing and left alone otherwise, so
//! running the plan any number of times converges on the same state.
//! Resources are handled one at a time in plan order; the first failure
//! stops the run.

use crate::blob::{BlobContainerClient, PublicAccessType};
use crate::clients::StorageClients;
use crate::common::{ResourceKind, StorageResult};
use crate::file_share::ShareClient;
use crate::queue::QueueClient;
use crate::table::TableServiceClient;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

pub const PRODUCT_IMAGES_CONTAINER: &str = "product-images";
pub const ORDER_PROCESSING_QUEUE: &str = "order-processing";
pub const INVENTORY_MANAGEMENT_QUEUE: &str = "inventory-management";
pub const CUSTOMER_PROFILES_TABLE: &str = "CustomerProfiles";
pub const CONTRACTS_SHARE: &str = "contracts";

/// One resource the application expects to exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceSpec {
    BlobContainer {
        name: String,
        access: PublicAccessType,
    },
    Queue {
        name: String,
    },
    Table {
        name: String,
    },
    FileShare {
        name: String,
    },
}

impl ResourceSpec {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceSpec::BlobContainer { .. } => ResourceKind::BlobContainer,
            ResourceSpec::Queue { .. } => ResourceKind::Queue,
            ResourceSpec::Table { .. } => ResourceKind::Table,
            ResourceSpec::FileShare { .. } => ResourceKind::FileShare,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ResourceSpec::BlobContainer { name, .. }
            | ResourceSpec::Queue { name }
            | ResourceSpec::Table { name }
            | ResourceSpec::FileShare { name } => name,
        }
    }
}

/// Ordered list of resources to ensure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningPlan {
    resources: Vec<ResourceSpec>,
}

impl ProvisioningPlan {
    pub fn new(resources: Vec<ResourceSpec>) -> Self {
        Self { resources }
    }

    /// Product images container (public blob reads), the order and
    /// inventory queues, the customer profile table and the contracts share.
    pub fn retail_defaults() -> Self {
        Self::new(vec![
            ResourceSpec::BlobContainer {
                name: PRODUCT_IMAGES_CONTAINER.to_string(),
                access: PublicAccessType::Blob,
            },
            ResourceSpec::Queue {
                name: ORDER_PROCESSING_QUEUE.to_string(),
            },
            ResourceSpec::Queue {
                name: INVENTORY_MANAGEMENT_QUEUE.to_string(),
            },
            ResourceSpec::Table {
                name: CUSTOMER_PROFILES_TABLE.to_string(),
            },
            ResourceSpec::FileShare {
                name: CONTRACTS_SHARE.to_string(),
            },
        ])
    }

    pub fn resources(&self) -> &[ResourceSpec] {
        &self.resources
    }
}

impl Default for ProvisioningPlan {
    fn default() -> Self {
        Self::retail_defaults()
    }
}

/// A resource that can be created on demand.
#[async_trait]
pub trait EnsureExists: Send + Sync {
    fn kind(&self) -> ResourceKind;

    fn name(&self) -> &str;

    /// Creates the resource if needed.
    async fn ensure_exists(&self) -> StorageResult<ProvisionOutcome>;
}

struct ContainerTarget {
    client: BlobContainerClient,
    access: PublicAccessType,
}

#[async_trait]
impl EnsureExists for ContainerTarget {
    fn kind(&self) -> ResourceKind {
        ResourceKind::BlobContainer
    }

    fn name(&self) -> &str {
        self.client.name()
    }

    async fn ensure_exists(&self) -> StorageResult<ProvisionOutcome> {
        self.client
            .create_if_not_exists(self.access)
            .await
            .map(ProvisionOutcome::from_created)
    }
}

#[async_trait]
impl EnsureExists for QueueClient {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Queue
    }

    fn name(&self) -> &str {
        QueueClient::name(self)
    }

    async fn ensure_exists(&self) -> StorageResult<ProvisionOutcome> {
        self.create_if_not_exists()
            .await
            .map(ProvisionOutcome::from_created)
    }
}

struct TableTarget {
    service: Arc<TableServiceClient>,
    name: String,
}

#[async_trait]
impl EnsureExists for TableTarget {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Table
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn ensure_exists(&self) -> StorageResult<ProvisionOutcome> {
        self.service
            .create_table_if_not_exists(&self.name)
            .await
            .map(ProvisionOutcome::from_created)
    }
}

#[async_trait]
impl EnsureExists for ShareClient {
    fn kind(&self) -> ResourceKind {
        ResourceKind::FileShare
    }

    fn name(&self) -> &str {
        ShareClient::name(self)
    }

    async fn ensure_exists(&self) -> StorageResult<ProvisionOutcome> {
        self.create_if_not_exists()
            .await
            .map(ProvisionOutcome::from_created)
    }
}

/// What an ensure call found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Created,
    AlreadyExists,
}

impl ProvisionOutcome {
    /// Maps a client's `create_if_not_exists` result.
    pub fn from_created(created: bool) -> Self {
        if created {
            ProvisionOutcome::Created
        } else {
            ProvisionOutcome::AlreadyExists
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, ProvisionOutcome::Created)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProvisionOutcome::Created => "Created",
            ProvisionOutcome::AlreadyExists => "Already existed",
        }
    }
}

impl fmt::Display for ProvisionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Result for one resource of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedResource {
    pub kind: ResourceKind,
    pub name: String,
    pub outcome: ProvisionOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    pub resources: Vec<ProvisionedResource>,
}

impl ProvisionReport {
    pub fn created_count(&self) -> usize {
        self.resources.iter().filter(|r| r.outcome.is_created()).count()
    }

    pub fn existing_count(&self) -> usize {
        self.resources.len() - self.created_count()
    }
}

/// Runs a [`ProvisioningPlan`] against the shared storage clients.
#[derive(Debug, Clone)]
pub struct Provisioner {
    clients: StorageClients,
}

impl Provisioner {
    pub fn new(clients: StorageClients) -> Self {
        Self { clients }
    }

    /// Ensures every resource of `plan`, in order.
    ///
    /// All resource names are validated before the first request is sent.
    pub async fn run(&self, plan: &ProvisioningPlan) -> StorageResult<ProvisionReport> {
        let targets = plan
            .resources()
            .iter()
            .map(|spec| self.target(spec))
            .collect::<StorageResult<Vec<_>>>()?;

        ensure_all(&targets).await
    }

    fn target(&self, spec: &ResourceSpec) -> StorageResult<Box<dyn EnsureExists>> {
        let target: Box<dyn EnsureExists> = match spec {
            ResourceSpec::BlobContainer { name, access } => Box::new(ContainerTarget {
                client: self.clients.blob().container_client(name)?,
                access: *access,
            }),
            ResourceSpec::Queue { name } => Box::new(self.clients.queue().queue_client(name)?),
            ResourceSpec::Table { name } => {
                ResourceKind::Table.validate_name(name)?;
                Box::new(TableTarget {
                    service: self.clients.table(),
                    name: name.clone(),
                })
            }
            ResourceSpec::FileShare { name } => Box::new(self.clients.file().share_client(name)?),
        };
        Ok(target)
    }
}

/// Ensures each target in turn, logging one line per resource and stopping
/// at the first error.
pub async fn ensure_all(targets: &[Box<dyn EnsureExists>]) -> StorageResult<ProvisionReport> {
    let mut report = ProvisionReport::default();

    for target in targets {
        let kind = target.kind();
        let outcome = target.ensure_exists().await.map_err(|e| {
            log::error!("Failed to ensure Azure {kind} '{}' exists: {e}", target.name());
            e
        })?;

        log::info!("Azure {kind} '{}' ensured to exist.", target.name());
        report.resources.push(ProvisionedResource {
            kind,
            name: target.name().to_string(),
            outcome,
        });
    }

    log::debug!(
        "Provisioning finished: {} created, {} already present",
        report.created_count(),
        report.existing_count()
    );
    Ok(report)
}

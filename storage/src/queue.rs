use crate::auth::{ServiceKind, StorageConnectionString};
use crate::common::{ResourceKind, StorageResult};
use crate::pipeline::{
    ClientOptions, CreateExpectation, StoragePipeline, StorageRequest, child_url, create_outcome,
};
use reqwest::{Method, StatusCode, Url};

// 204 means the queue exists with identical metadata.
const CREATE_QUEUE: CreateExpectation = CreateExpectation {
    created: &[StatusCode::CREATED],
    existing: &[StatusCode::NO_CONTENT],
    already_exists_code: "QueueAlreadyExists",
};

/// Entry point to the Queue service of one storage account.
#[derive(Debug, Clone)]
pub struct QueueServiceClient {
    endpoint: Url,
    pipeline: StoragePipeline,
}

impl QueueServiceClient {
    pub fn from_connection_string(connection_string: &str) -> StorageResult<Self> {
        let parsed = StorageConnectionString::parse(connection_string)?;
        Self::new(&parsed, &ClientOptions::default())
    }

    pub fn new(
        connection_string: &StorageConnectionString,
        options: &ClientOptions,
    ) -> StorageResult<Self> {
        let endpoint = connection_string.endpoint(ServiceKind::Queue)?;
        let pipeline =
            StoragePipeline::new(ServiceKind::Queue, connection_string.credential()?, options)?;
        Ok(Self { endpoint, pipeline })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn queue_client(&self, name: &str) -> StorageResult<QueueClient> {
        ResourceKind::Queue.validate_name(name)?;
        Ok(QueueClient {
            name: name.to_string(),
            url: child_url(&self.endpoint, name)?,
            pipeline: self.pipeline.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct QueueClient {
    name: String,
    url: Url,
    pipeline: StoragePipeline,
}

impl QueueClient {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Creates the queue unless it already exists. Returns `true` when this
    /// call created it.
    pub async fn create_if_not_exists(&self) -> StorageResult<bool> {
        let request = StorageRequest::new(Method::PUT, self.url.clone(), "create_queue");
        let response = self.pipeline.send(&request).await?;
        let created = create_outcome(response, request.operation(), &CREATE_QUEUE).await?;
        log::debug!(
            "Queue '{}' {}",
            self.name,
            if created { "created" } else { "already exists" }
        );
        Ok(created)
    }
}

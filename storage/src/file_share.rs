use crate::auth::{ServiceKind, StorageConnectionString};
use crate::common::{ResourceKind, StorageResult};
use crate::pipeline::{
    ClientOptions, CreateExpectation, StoragePipeline, StorageRequest, child_url, create_outcome,
};
use reqwest::{Method, StatusCode, Url};

const CREATE_SHARE: CreateExpectation = CreateExpectation {
    created: &[StatusCode::CREATED],
    existing: &[],
    already_exists_code: "ShareAlreadyExists",
};

/// Entry point to the File service of one storage account.
#[derive(Debug, Clone)]
pub struct ShareServiceClient {
    endpoint: Url,
    pipeline: StoragePipeline,
}

impl ShareServiceClient {
    pub fn from_connection_string(connection_string: &str) -> StorageResult<Self> {
        let parsed = StorageConnectionString::parse(connection_string)?;
        Self::new(&parsed, &ClientOptions::default())
    }

    pub fn new(
        connection_string: &StorageConnectionString,
        options: &ClientOptions,
    ) -> StorageResult<Self> {
        let endpoint = connection_string.endpoint(ServiceKind::File)?;
        let pipeline =
            StoragePipeline::new(ServiceKind::File, connection_string.credential()?, options)?;
        Ok(Self { endpoint, pipeline })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn share_client(&self, name: &str) -> StorageResult<ShareClient> {
        ResourceKind::FileShare.validate_name(name)?;
        Ok(ShareClient {
            name: name.to_string(),
            url: child_url(&self.endpoint, name)?,
            pipeline: self.pipeline.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ShareClient {
    name: String,
    url: Url,
    pipeline: StoragePipeline,
}

impl ShareClient {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Creates the share with the service default quota unless it already
    /// exists. Returns `true` when this call created it.
    pub async fn create_if_not_exists(&self) -> StorageResult<bool> {
        let mut url = self.url.clone();
        url.query_pairs_mut().append_pair("restype", "share");

        let request = StorageRequest::new(Method::PUT, url, "create_share");
        let response = self.pipeline.send(&request).await?;
        let created = create_outcome(response, request.operation(), &CREATE_SHARE).await?;
        log::debug!(
            "File share '{}' {}",
            self.name,
            if created { "created" } else { "already exists" }
        );
        Ok(created)
    }
}

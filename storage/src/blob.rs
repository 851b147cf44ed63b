use crate::auth::{ServiceKind, StorageConnectionString};
use crate::common::{ResourceKind, StorageResult};
use crate::pipeline::{
    ClientOptions, CreateExpectation, StoragePipeline, StorageRequest, child_url, create_outcome,
};
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Method, StatusCode, Url};

const BLOB_PUBLIC_ACCESS: HeaderName = HeaderName::from_static("x-ms-blob-public-access");

const CREATE_CONTAINER: CreateExpectation = CreateExpectation {
    created: &[StatusCode::CREATED],
    existing: &[],
    already_exists_code: "ContainerAlreadyExists",
};

/// Anonymous read access granted on a new container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PublicAccessType {
    /// Private container, every request must be authorized
    #[default]
    None,
    /// Anonymous reads of blobs, but not of container listings
    Blob,
    /// Anonymous reads of blobs and container listings
    Container,
}

impl PublicAccessType {
    fn header_value(&self) -> Option<HeaderValue> {
        match self {
            PublicAccessType::None => None,
            PublicAccessType::Blob => Some(HeaderValue::from_static("blob")),
            PublicAccessType::Container => Some(HeaderValue::from_static("container")),
        }
    }
}

/// Entry point to the Blob service of one storage account.
#[derive(Debug, Clone)]
pub struct BlobServiceClient {
    endpoint: Url,
    pipeline: StoragePipeline,
}

impl BlobServiceClient {
    pub fn from_connection_string(connection_string: &str) -> StorageResult<Self> {
        let parsed = StorageConnectionString::parse(connection_string)?;
        Self::new(&parsed, &ClientOptions::default())
    }

    pub fn new(
        connection_string: &StorageConnectionString,
        options: &ClientOptions,
    ) -> StorageResult<Self> {
        let endpoint = connection_string.endpoint(ServiceKind::Blob)?;
        let pipeline =
            StoragePipeline::new(ServiceKind::Blob, connection_string.credential()?, options)?;
        Ok(Self { endpoint, pipeline })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn container_client(&self, name: &str) -> StorageResult<BlobContainerClient> {
        ResourceKind::BlobContainer.validate_name(name)?;
        Ok(BlobContainerClient {
            name: name.to_string(),
            url: child_url(&self.endpoint, name)?,
            pipeline: self.pipeline.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct BlobContainerClient {
    name: String,
    url: Url,
    pipeline: StoragePipeline,
}

impl BlobContainerClient {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Creates the container unless it already exists.
    ///
    /// Returns `true` when this call created it. The access level only
    /// applies to a new container; an existing one keeps its own.
    pub async fn create_if_not_exists(&self, access: PublicAccessType) -> StorageResult<bool> {
        let mut url = self.url.clone();
        url.query_pairs_mut().append_pair("restype", "container");

        let mut request = StorageRequest::new(Method::PUT, url, "create_container");
        if let Some(value) = access.header_value() {
            request = request.header(BLOB_PUBLIC_ACCESS, value);
        }

        let response = self.pipeline.send(&request).await?;
        let created = create_outcome(response, request.operation(), &CREATE_CONTAINER).await?;
        log::debug!(
            "Blob container '{}' {}",
            self.name,
            if created { "created" } else { "already exists" }
        );
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims::assert_err;

    const CONNECTION: &str = "DefaultEndpointsProtocol=https;AccountName=abcretail;AccountKey=a2V5LWZvci11bml0LXRlc3Rz;EndpointSuffix=core.windows.net";

    #[test]
    fn container_url_is_below_the_service_endpoint() {
        let service = BlobServiceClient::from_connection_string(CONNECTION).unwrap();
        let container = service.container_client("product-images").unwrap();
        assert_eq!(
            container.url().as_str(),
            "https://abcretail.blob.core.windows.net/product-images"
        );
        assert_eq!(container.name(), "product-images");
    }

    #[test]
    fn invalid_container_names_are_rejected() {
        let service = BlobServiceClient::from_connection_string(CONNECTION).unwrap();
        assert_err!(service.container_client("Product_Images"));
    }
}

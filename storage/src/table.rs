use crate::auth::{ServiceKind, StorageConnectionString};
use crate::common::{ResourceKind, StorageResult};
use crate::pipeline::{
    ClientOptions, CreateExpectation, StoragePipeline, StorageRequest, child_url, create_outcome,
};
use reqwest::header::{ACCEPT, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode, Url};
use serde::Serialize;

const PREFER: HeaderName = HeaderName::from_static("prefer");
const DATA_SERVICE_VERSION: HeaderName = HeaderName::from_static("dataserviceversion");

// With `Prefer: return-no-content` a new table answers 204 instead of 201.
const CREATE_TABLE: CreateExpectation = CreateExpectation {
    created: &[StatusCode::CREATED, StatusCode::NO_CONTENT],
    existing: &[],
    already_exists_code: "TableAlreadyExists",
};

#[derive(Debug, Serialize)]
struct CreateTableBody<'a> {
    #[serde(rename = "TableName")]
    table_name: &'a str,
}

/// Entry point to the Table service of one storage account.
///
/// Tables are created through the service itself (`POST /Tables`), so unlike
/// the other services there is no per-resource client.
#[derive(Debug, Clone)]
pub struct TableServiceClient {
    endpoint: Url,
    pipeline: StoragePipeline,
}

impl TableServiceClient {
    pub fn from_connection_string(connection_string: &str) -> StorageResult<Self> {
        let parsed = StorageConnectionString::parse(connection_string)?;
        Self::new(&parsed, &ClientOptions::default())
    }

    pub fn new(
        connection_string: &StorageConnectionString,
        options: &ClientOptions,
    ) -> StorageResult<Self> {
        let endpoint = connection_string.endpoint(ServiceKind::Table)?;
        let pipeline =
            StoragePipeline::new(ServiceKind::Table, connection_string.credential()?, options)?;
        Ok(Self { endpoint, pipeline })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Creates table `name` unless it already exists. Returns `true` when
    /// this call created it.
    pub async fn create_table_if_not_exists(&self, name: &str) -> StorageResult<bool> {
        ResourceKind::Table.validate_name(name)?;

        let url = child_url(&self.endpoint, "Tables")?;
        let request = StorageRequest::new(Method::POST, url, "create_table")
            .json_body(&CreateTableBody { table_name: name })?
            .header(
                ACCEPT,
                HeaderValue::from_static("application/json;odata=nometadata"),
            )
            .header(PREFER, HeaderValue::from_static("return-no-content"))
            .header(DATA_SERVICE_VERSION, HeaderValue::from_static("3.0"));

        let response = self.pipeline.send(&request).await?;
        let created = create_outcome(response, request.operation(), &CREATE_TABLE).await?;
        log::debug!(
            "Table '{}' {}",
            name,
            if created { "created" } else { "already exists" }
        );
        Ok(created)
    }
}

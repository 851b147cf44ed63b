//! HTTP pipeline shared by the four service clients.
//!
//! Every request goes through [`StoragePipeline::send`], which stamps the
//! service headers (`x-ms-version`, `x-ms-date`, `x-ms-client-request-id`),
//! authorizes the request with the configured credential and applies the
//! retry policy. Requests are rebuilt and re-signed on every attempt so the
//! signed date stays fresh.

pub mod retry;

pub use retry::{RetryOptions, is_retryable_status};

use crate::auth::{ServiceKind, StorageCredential};
use crate::common::{StorageError, StorageResult};
use chrono::Utc;
use reqwest::header::{
    AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue,
};
use reqwest::{Method, StatusCode, Url};
use serde::Serialize;
use std::time::Duration;

/// Storage REST API version sent with every request
pub const STORAGE_API_VERSION: &str = "2021-08-06";

const USER_AGENT: &str = concat!("abc-retail-storage/", env!("CARGO_PKG_VERSION"));

/// Options shared by all clients created from one connection string.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub retry: RetryOptions,
    /// Timeout of a single attempt, not of the whole retried operation
    pub network_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            retry: RetryOptions::default(),
            network_timeout: Duration::from_secs(100),
        }
    }
}

/// A storage request before service headers and authorization are applied.
#[derive(Debug, Clone)]
pub struct StorageRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Vec<u8>,
    operation: String,
}

impl StorageRequest {
    pub fn new(method: Method, url: Url, operation: impl Into<String>) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: Vec::new(),
            operation: operation.into(),
        }
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn json_body<T: Serialize>(mut self, body: &T) -> StorageResult<Self> {
        self.body = serde_json::to_vec(body).map_err(|e| {
            StorageError::InternalError(format!(
                "Failed to serialize {} request body: {e}",
                self.operation
            ))
        })?;
        Ok(self.header(CONTENT_TYPE, HeaderValue::from_static("application/json")))
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[derive(Clone)]
pub struct StoragePipeline {
    client: reqwest::Client,
    service: ServiceKind,
    credential: StorageCredential,
    retry: RetryOptions,
}

impl std::fmt::Debug for StoragePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoragePipeline")
            .field("service", &self.service)
            .field("credential", &self.credential)
            .field("retry", &self.retry)
            .finish()
    }
}

impl StoragePipeline {
    pub fn new(
        service: ServiceKind,
        credential: StorageCredential,
        options: &ClientOptions,
    ) -> StorageResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(options.network_timeout)
            .build()
            .map_err(|e| {
                StorageError::ConfigurationError(format!("HTTP client creation failed: {e}"))
            })?;

        Ok(Self {
            client,
            service,
            credential,
            retry: options.retry.clone(),
        })
    }

    pub fn service(&self) -> ServiceKind {
        self.service
    }

    /// Sends `request`, retrying transient failures.
    ///
    /// Returns the final response whatever its status; callers decide which
    /// statuses are errors. Transport failures that survive every retry are
    /// returned as [`StorageError::RequestFailed`] or
    /// [`StorageError::OperationTimeout`].
    pub async fn send(&self, request: &StorageRequest) -> StorageResult<reqwest::Response> {
        let mut attempt = 0;
        loop {
            let prepared = self.prepare(request)?;
            log::debug!(
                "{} {} ({}, attempt {})",
                request.method,
                request.url,
                request.operation,
                attempt + 1
            );

            let delay = match self.client.execute(prepared).await {
                Ok(response) => {
                    let status = response.status();
                    if !is_retryable_status(status) || attempt >= self.retry.max_retries {
                        return Ok(response);
                    }
                    log::warn!(
                        "{} returned HTTP {}, retrying ({}/{})",
                        request.operation,
                        status.as_u16(),
                        attempt + 1,
                        self.retry.max_retries
                    );
                    self.retry.delay_for_response(attempt, response.headers())
                }
                Err(e) if e.is_builder() => {
                    return Err(StorageError::InternalError(format!(
                        "Failed to build {} request: {e}",
                        request.operation
                    )));
                }
                Err(e) => {
                    let error = transport_error(&request.operation, &e);
                    if attempt >= self.retry.max_retries {
                        return Err(error);
                    }
                    log::warn!(
                        "{error}, retrying ({}/{})",
                        attempt + 1,
                        self.retry.max_retries
                    );
                    self.retry.delay_for(attempt)
                }
            };

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    fn prepare(&self, request: &StorageRequest) -> StorageResult<reqwest::Request> {
        let mut url = request.url.clone();
        if let StorageCredential::SharedAccessSignature(token) = &self.credential {
            append_sas_token(&mut url, token);
        }

        let mut prepared = reqwest::Request::new(request.method.clone(), url);
        let headers = prepared.headers_mut();
        headers.extend(request.headers.clone());
        headers.insert(
            "x-ms-version",
            HeaderValue::from_static(STORAGE_API_VERSION),
        );
        headers.insert("x-ms-date", header_value(&rfc1123_now())?);
        headers.insert(
            "x-ms-client-request-id",
            header_value(&uuid::Uuid::new_v4().to_string())?,
        );
        headers.insert(CONTENT_LENGTH, HeaderValue::from(request.body.len()));

        if !request.body.is_empty() {
            *prepared.body_mut() = Some(request.body.clone().into());
        }

        if let StorageCredential::SharedKey(signer) = &self.credential {
            let authorization = signer.authorization(&prepared, self.service)?;
            prepared
                .headers_mut()
                .insert(AUTHORIZATION, header_value(&authorization)?);
        }

        Ok(prepared)
    }
}

/// Which statuses a create call maps to "created" and "already there".
pub(crate) struct CreateExpectation {
    pub created: &'static [StatusCode],
    pub existing: &'static [StatusCode],
    /// Error code of the 409 answered when the resource already exists
    pub already_exists_code: &'static str,
}

/// Turns a create response into `Ok(true)` (created), `Ok(false)` (already
/// existed) or the service error.
pub(crate) async fn create_outcome(
    response: reqwest::Response,
    operation: &str,
    expectation: &CreateExpectation,
) -> StorageResult<bool> {
    let status = response.status();
    if expectation.created.contains(&status) {
        return Ok(true);
    }
    if expectation.existing.contains(&status) {
        return Ok(false);
    }

    let error = StorageError::from_azure_response(response, operation).await;
    if status == StatusCode::CONFLICT
        && error.azure_error_code() == Some(expectation.already_exists_code)
    {
        return Ok(false);
    }
    Err(error)
}

/// `endpoint` with `name` appended as a new path segment.
pub(crate) fn child_url(endpoint: &Url, name: &str) -> StorageResult<Url> {
    let mut url = endpoint.clone();
    url.set_query(None);
    url.path_segments_mut()
        .map_err(|_| {
            StorageError::ConfigurationError(format!(
                "Endpoint '{endpoint}' cannot be used as a base URL"
            ))
        })?
        .pop_if_empty()
        .push(name);
    Ok(url)
}

fn append_sas_token(url: &mut Url, token: &str) {
    let token = token.trim_start_matches('?');
    let query = match url.query() {
        Some(existing) if !existing.is_empty() => format!("{existing}&{token}"),
        _ => token.to_string(),
    };
    url.set_query(Some(&query));
}

fn transport_error(operation: &str, error: &reqwest::Error) -> StorageError {
    if error.is_timeout() {
        StorageError::OperationTimeout(format!("{operation} timed out: {error}"))
    } else {
        StorageError::RequestFailed {
            operation: operation.to_string(),
            reason: error.to_string(),
        }
    }
}

fn rfc1123_now() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn header_value(value: &str) -> StorageResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| StorageError::InternalError(format!("Invalid header value: {e}")))
}

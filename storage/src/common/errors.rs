use super::names::ResourceKind;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Errors raised by the storage clients and the provisioning sequence.
///
/// Service-side failures keep the full Azure context (error code, HTTP
/// status, request id and the operation that failed) so startup logs point
/// straight at the offending call.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// Azure Storage answered with an error status
    #[error(
        "Azure API error during {operation}: {code} (HTTP {status_code}) - {message}{}",
        request_id_suffix(.request_id)
    )]
    AzureApiError {
        code: String,
        status_code: u16,
        message: String,
        request_id: Option<String>,
        operation: String,
    },

    /// The request never produced a response (DNS, TLS, connection reset...)
    #[error("Request failed during {operation}: {reason}")]
    RequestFailed { operation: String, reason: String },

    #[error("Operation timeout: {0}")]
    OperationTimeout(String),

    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Invalid {kind} name '{name}': {reason}")]
    InvalidResourceName {
        kind: ResourceKind,
        name: String,
        reason: String,
    },

    #[error("Internal error: {0}")]
    InternalError(String),
}

fn request_id_suffix(request_id: &Option<String>) -> String {
    request_id
        .as_deref()
        .map(|id| format!(" [Request ID: {id}]"))
        .unwrap_or_default()
}

impl StorageError {
    /// Create an Azure API error with full context
    pub fn azure_api_error(
        operation: impl Into<String>,
        code: impl Into<String>,
        status_code: u16,
        message: impl Into<String>,
    ) -> Self {
        Self::AzureApiError {
            code: code.into(),
            status_code,
            message: message.into(),
            request_id: None,
            operation: operation.into(),
        }
    }

    /// Create an Azure API error with request ID for tracing
    pub fn azure_api_error_with_request_id(
        operation: impl Into<String>,
        code: impl Into<String>,
        status_code: u16,
        message: impl Into<String>,
        request_id: impl Into<String>,
    ) -> Self {
        Self::AzureApiError {
            code: code.into(),
            status_code,
            message: message.into(),
            request_id: Some(request_id.into()),
            operation: operation.into(),
        }
    }

    /// Extract Azure error details from a storage service response.
    ///
    /// Blob, Queue and File services report errors as XML, the Table service
    /// as OData JSON. When the body carries no code the `x-ms-error-code`
    /// header is used, and finally a synthetic `HTTP_<status>` code.
    pub async fn from_azure_response(
        response: reqwest::Response,
        operation: impl Into<String>,
    ) -> Self {
        let operation = operation.into();
        let status_code = response.status().as_u16();
        let request_id = header_string(&response, "x-ms-request-id");
        let header_code = header_string(&response, "x-ms-error-code");

        let body = response.text().await.unwrap_or_default();
        let (body_code, body_message) = parse_error_body(&body);

        let code = body_code
            .or(header_code)
            .unwrap_or_else(|| format!("HTTP_{status_code}"));
        let message = body_message.unwrap_or_else(|| {
            StatusCode::from_u16(status_code)
                .ok()
                .and_then(|s| s.canonical_reason())
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP {status_code} error"))
        });

        Self::AzureApiError {
            code,
            status_code,
            message,
            request_id,
            operation,
        }
    }

    /// Check if this is an Azure API error
    pub fn is_azure_api_error(&self) -> bool {
        matches!(self, StorageError::AzureApiError { .. })
    }

    /// Get the Azure error code if this is an Azure API error
    pub fn azure_error_code(&self) -> Option<&str> {
        match self {
            StorageError::AzureApiError { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Get the Azure request ID if available
    pub fn azure_request_id(&self) -> Option<&str> {
        match self {
            StorageError::AzureApiError { request_id, .. } => request_id.as_deref(),
            _ => None,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            StorageError::AzureApiError { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// Whether the retry policy may attempt the failed call again.
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::AzureApiError { status_code, .. } => {
                StatusCode::from_u16(*status_code).is_ok_and(crate::pipeline::is_retryable_status)
            }
            StorageError::RequestFailed { .. } | StorageError::OperationTimeout(_) => true,
            _ => false,
        }
    }
}

fn header_string(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Table service error format
#[derive(Debug, Deserialize)]
struct TableErrorResponse {
    #[serde(rename = "odata.error")]
    error: TableErrorDetails,
}

#[derive(Debug, Deserialize)]
struct TableErrorDetails {
    code: String,
    message: TableErrorMessage,
}

#[derive(Debug, Deserialize)]
struct TableErrorMessage {
    value: String,
}

fn parse_error_body(body: &str) -> (Option<String>, Option<String>) {
    let trimmed = body.trim_start_matches('\u{feff}').trim();
    if trimmed.is_empty() {
        return (None, None);
    }

    if trimmed.starts_with('{') {
        return match serde_json::from_str::<TableErrorResponse>(trimmed) {
            Ok(table_error) => (
                Some(table_error.error.code),
                Some(table_error.error.message.value),
            ),
            Err(_) => (None, Some(trimmed.to_string())),
        };
    }

    let code = xml_element(trimmed, "Code");
    let message = xml_element(trimmed, "Message")
        // Service messages carry a trailing "RequestId:...\nTime:..." block
        .map(|m| m.lines().next().unwrap_or_default().trim().to_string());
    (code, message)
}

fn xml_element(body: &str, name: &str) -> Option<String> {
    let open = format!("<{name}>");
    let close = format!("</{name}>");
    let start = body.find(&open)? + open.len();
    let end = body[start..].find(&close)? + start;
    Some(body[start..end].trim().to_string())
}

/// Result type alias for convenience
pub type StorageResult<T> = Result<T, StorageError>;

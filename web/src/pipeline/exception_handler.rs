use crate::error::UnhandledError;
use crate::routing::RoutePattern;
use crate::views::Views;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Redirect, Response};
use std::any::Any;
use std::sync::Arc;

/// Path of the error page non-development clients are sent to
pub const ERROR_PATH: &str = "/Home/Error";
const ERROR_CONTROLLER: &str = "Home";
const ERROR_ACTION: &str = "Error";
const GENERIC_ERROR: &str = "An error occurred while processing your request.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionPolicy {
    /// Show error details to the client
    DeveloperPage,
    /// Redirect to [`ERROR_PATH`]
    ErrorPage,
}

#[derive(Debug, Clone)]
pub struct ExceptionHandling {
    pub policy: ExceptionPolicy,
    /// Route used to recognise requests for the error page
    pub route: RoutePattern,
    pub views: Arc<Views>,
}

impl ExceptionHandling {
    /// Whether `path` routes to `Home/Error`, whatever its casing, trailing
    /// slash or id segment.
    pub fn is_error_page(&self, path: &str) -> bool {
        self.route.match_path(path).is_some_and(|values| {
            let is = |value: Option<&str>, expected: &str| {
                value.is_some_and(|v| v.eq_ignore_ascii_case(expected))
            };
            is(values.controller(), ERROR_CONTROLLER) && is(values.action(), ERROR_ACTION)
        })
    }
}

/// Turns responses marked with [`UnhandledError`] into what the
/// environment allows the client to see.
pub async fn handle_exceptions(
    State(handling): State<ExceptionHandling>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let response = next.run(request).await;
    let Some(error) = response.extensions().get::<UnhandledError>().cloned() else {
        return response;
    };

    log::error!(
        "Unhandled error on {method} {path}{}: {}",
        request_id
            .as_deref()
            .map(|id| format!(" [Request ID: {id}]"))
            .unwrap_or_default(),
        error.message()
    );

    match handling.policy {
        ExceptionPolicy::DeveloperPage => match handling.views.developer_error(
            error.message(),
            method.as_str(),
            &path,
            request_id.as_deref(),
        ) {
            Ok(page) => (StatusCode::INTERNAL_SERVER_ERROR, Html(page)).into_response(),
            Err(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, error.message().to_string()).into_response()
            }
        },
        // The error page itself failed
        ExceptionPolicy::ErrorPage if handling.is_error_page(&path) => {
            (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_ERROR).into_response()
        }
        ExceptionPolicy::ErrorPage => Redirect::to(ERROR_PATH).into_response(),
    }
}

/// Response for a panicking handler, marked so [`handle_exceptions`] picks it up.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        "unknown panic payload".to_string()
    };

    let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
    response
        .extensions_mut()
        .insert(UnhandledError::new(format!("Handler panicked: {detail}")));
    response
}

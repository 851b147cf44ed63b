use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

/// Access policy attached to an action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthorizationPolicy {
    #[default]
    AllowAnonymous,
    RequireAuthenticatedUser,
}

/// The caller as seen by authorization.
///
/// The application registers no authentication scheme, so every caller is
/// anonymous; the type exists so policies read the same once one is added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Principal {
    name: Option<String>,
}

impl Principal {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.name.is_some()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Resolves the current principal from the request.
pub fn authenticate(_headers: &HeaderMap) -> Principal {
    Principal::anonymous()
}

/// Applies `policy` to `principal`; `Err` carries the challenge response.
pub fn authorize(policy: AuthorizationPolicy, principal: &Principal) -> Result<(), Response> {
    match policy {
        AuthorizationPolicy::AllowAnonymous => Ok(()),
        AuthorizationPolicy::RequireAuthenticatedUser if principal.is_authenticated() => Ok(()),
        AuthorizationPolicy::RequireAuthenticatedUser => {
            log::debug!("Authorization failed: an authenticated user is required");
            Err(StatusCode::UNAUTHORIZED.into_response())
        }
    }
}

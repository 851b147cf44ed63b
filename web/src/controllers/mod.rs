pub mod home;

pub use home::HomeController;

use crate::error::AppResult;
use crate::pipeline::authorization::AuthorizationPolicy;
use crate::routing::RouteValues;
use crate::state::AppState;
use async_trait::async_trait;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::Response;

/// An action a controller exposes, together with its access policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionDescriptor {
    pub name: &'static str,
    pub policy: AuthorizationPolicy,
}

impl ActionDescriptor {
    pub const fn anonymous(name: &'static str) -> Self {
        Self {
            name,
            policy: AuthorizationPolicy::AllowAnonymous,
        }
    }

    pub const fn authenticated(name: &'static str) -> Self {
        Self {
            name,
            policy: AuthorizationPolicy::RequireAuthenticatedUser,
        }
    }
}

/// Everything an action sees of the current request.
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub route: RouteValues,
    pub request_id: Option<String>,
    pub state: AppState,
}

/// A named group of actions reachable through the conventional route.
///
/// Controller and action names are matched case-insensitively; the name
/// passed to [`Controller::invoke`] is always the descriptor's own casing.
#[async_trait]
pub trait Controller: Send + Sync {
    /// Route name, e.g. `Home` for `/Home/Index`
    fn name(&self) -> &'static str;

    fn actions(&self) -> &'static [ActionDescriptor];

    async fn invoke(&self, action: &'static str, context: ActionContext) -> AppResult<Response>;

    fn action(&self, name: &str) -> Option<&'static ActionDescriptor> {
        self.actions()
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }
}

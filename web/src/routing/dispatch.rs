use super::{RoutePattern, RouteTemplateError};
use crate::controllers::{ActionContext, Controller, HomeController};
use crate::pipeline::authorization::{authenticate, authorize};
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Controllers reachable through the conventional route, keyed by
/// lowercase name.
#[derive(Clone)]
pub struct ControllerRegistry {
    route: RoutePattern,
    controllers: HashMap<String, Arc<dyn Controller>>,
}

impl fmt::Debug for ControllerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.controllers.values().map(|c| c.name()).collect();
        names.sort_unstable();
        f.debug_struct("ControllerRegistry")
            .field("route", &self.route.template())
            .field("controllers", &names)
            .finish()
    }
}

impl ControllerRegistry {
    /// An empty registry using the default `{controller=Home}/{action=Index}/{id?}` route
    pub fn new() -> Self {
        Self {
            route: RoutePattern::conventional(),
            controllers: HashMap::new(),
        }
    }

    pub fn with_route(template: &str) -> Result<Self, RouteTemplateError> {
        Ok(Self {
            route: RoutePattern::parse(template)?,
            controllers: HashMap::new(),
        })
    }

    /// The application's controllers
    pub fn with_defaults() -> Self {
        Self::new().register(Arc::new(HomeController))
    }

    pub fn register(mut self, controller: Arc<dyn Controller>) -> Self {
        self.controllers
            .insert(controller.name().to_ascii_lowercase(), controller);
        self
    }

    pub fn route(&self) -> &RoutePattern {
        &self.route
    }

    pub fn controller(&self, name: &str) -> Option<&Arc<dyn Controller>> {
        self.controllers.get(&name.to_ascii_lowercase())
    }
}

impl Default for ControllerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Endpoint for every request the static file handler did not serve:
/// route matching, then authorization, then the controller action.
pub async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    let registry = state.controllers();
    let path = request.uri().path().to_string();

    let Some(route) = registry.route().match_path(&path) else {
        log::debug!("No route matches {path}");
        return StatusCode::NOT_FOUND.into_response();
    };

    let (Some(controller_name), Some(action_name)) = (route.controller(), route.action()) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let Some(controller) = registry.controller(controller_name).cloned() else {
        log::debug!("Unknown controller '{controller_name}' for {path}");
        return StatusCode::NOT_FOUND.into_response();
    };

    let Some(action) = controller.action(action_name) else {
        log::debug!(
            "Controller '{}' has no action '{action_name}'",
            controller.name()
        );
        return StatusCode::NOT_FOUND.into_response();
    };

    let principal = authenticate(request.headers());
    if let Err(challenge) = authorize(action.policy, &principal) {
        return challenge;
    }

    let (parts, _body) = request.into_parts();
    let request_id = parts
        .headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    log::debug!("Executing {}/{}", controller.name(), action.name);
    let context = ActionContext {
        method: parts.method,
        uri: parts.uri,
        headers: parts.headers,
        route,
        request_id,
        state: state.clone(),
    };

    match controller.invoke(action.name, context).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

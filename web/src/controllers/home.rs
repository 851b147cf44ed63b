use super::{ActionContext, ActionDescriptor, Controller};
use crate::error::{AppError, AppResult};
use crate::views::IndexModel;
use async_trait::async_trait;
use axum::http::header::CACHE_CONTROL;
use axum::response::{Html, IntoResponse, Response};

const ACTIONS: &[ActionDescriptor] = &[
    ActionDescriptor::anonymous("Index"),
    ActionDescriptor::anonymous("Privacy"),
    ActionDescriptor::anonymous("Error"),
];

/// Landing, privacy and error pages.
#[derive(Debug, Clone, Copy, Default)]
pub struct HomeController;

impl HomeController {
    fn index(&self, context: &ActionContext) -> AppResult<Response> {
        let state = &context.state;
        let environment = state.environment().to_string();
        let page = state.views().index(&IndexModel {
            account_name: state.clients().account_name(),
            environment: &environment,
            provisioning: state.provisioning(),
        })?;
        Ok(Html(page).into_response())
    }

    fn privacy(&self, context: &ActionContext) -> AppResult<Response> {
        Ok(Html(context.state.views().privacy()?).into_response())
    }

    fn error(&self, context: &ActionContext) -> AppResult<Response> {
        let page = context.state.views().error(context.request_id.as_deref())?;
        Ok(([(CACHE_CONTROL, "no-store, no-cache")], Html(page)).into_response())
    }
}

#[async_trait]
impl Controller for HomeController {
    fn name(&self) -> &'static str {
        "Home"
    }

    fn actions(&self) -> &'static [ActionDescriptor] {
        ACTIONS
    }

    async fn invoke(&self, action: &'static str, context: ActionContext) -> AppResult<Response> {
        match action {
            "Index" => self.index(&context),
            "Privacy" => self.privacy(&context),
            "Error" => self.error(&context),
            other => Err(AppError::NotFound(format!("Home/{other}"))),
        }
    }
}

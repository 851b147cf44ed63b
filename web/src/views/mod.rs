//! Server-rendered HTML pages sharing one layout.
//!
//! Templates are compiled into the binary and parsed once at startup;
//! autoescaping is on for every page.

use crate::error::{AppError, AppResult};
use serde::Serialize;
use std::fmt;
use storage::ProvisionReport;
use tera::{Context, Tera};

const SITE_NAME: &str = "ABC Retail";

const TEMPLATES: [(&str, &str); 5] = [
    ("layout.html", include_str!("../../templates/layout.html")),
    ("index.html", include_str!("../../templates/index.html")),
    ("privacy.html", include_str!("../../templates/privacy.html")),
    ("error.html", include_str!("../../templates/error.html")),
    (
        "developer_error.html",
        include_str!("../../templates/developer_error.html"),
    ),
];

pub struct IndexModel<'a> {
    pub account_name: Option<&'a str>,
    pub environment: &'a str,
    pub provisioning: &'a ProvisionReport,
}

#[derive(Serialize)]
struct ResourceRow<'a> {
    kind: &'static str,
    name: &'a str,
    outcome: &'static str,
}

/// The parsed page templates.
pub struct Views {
    tera: Tera,
}

impl fmt::Debug for Views {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Views")
            .field("templates", &self.tera.get_template_names().count())
            .finish()
    }
}

impl Views {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES)?;
        Ok(Self { tera })
    }

    pub fn index(&self, model: &IndexModel<'_>) -> AppResult<String> {
        let resources: Vec<ResourceRow<'_>> = model
            .provisioning
            .resources
            .iter()
            .map(|resource| ResourceRow {
                kind: resource.kind.display_name(),
                name: &resource.name,
                outcome: resource.outcome.display_name(),
            })
            .collect();

        let mut context = page_context("Home Page");
        context.insert(
            "account_name",
            model.account_name.unwrap_or("not configured"),
        );
        context.insert("environment", model.environment);
        context.insert("resources", &resources);
        self.render("index.html", &context)
    }

    pub fn privacy(&self) -> AppResult<String> {
        self.render("privacy.html", &page_context("Privacy Policy"))
    }

    pub fn error(&self, request_id: Option<&str>) -> AppResult<String> {
        let mut context = page_context("Error");
        context.insert("request_id", &request_id);
        self.render("error.html", &context)
    }

    /// Error details for the Development environment only.
    pub fn developer_error(
        &self,
        message: &str,
        method: &str,
        path: &str,
        request_id: Option<&str>,
    ) -> AppResult<String> {
        let mut context = page_context("Internal Server Error");
        context.insert("message", message);
        context.insert("method", method);
        context.insert("path", path);
        context.insert("request_id", &request_id);
        self.render("developer_error.html", &context)
    }

    fn render(&self, template: &str, context: &Context) -> AppResult<String> {
        self.tera.render(template, context).map_err(|e| {
            log::error!("Failed to render {template}: {e:?}");
            AppError::Internal(format!("Failed to render {template}: {e}"))
        })
    }
}

fn page_context(title: &str) -> Context {
    let mut context = Context::new();
    context.insert("title", title);
    context.insert("site_name", SITE_NAME);
    context.insert("year", &chrono::Utc::now().format("%Y").to_string());
    context
}

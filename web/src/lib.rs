//! # ABC Retail Web Application
//!
//! Server-rendered storefront backed by Azure Storage. Startup registers the
//! storage clients, makes sure the storage resources exist and then serves
//! the MVC pipeline.
//!
//! ## Modules
//!
//! - [`config`] - Layered configuration from files and environment variables
//! - [`startup`] - Client registration, provisioning and serving
//! - [`pipeline`] - Middleware: exceptions, HSTS, HTTPS redirection, static files
//! - [`routing`] - Conventional route matching and controller dispatch
//! - [`controllers`] - Controllers and their actions
//! - [`views`] - HTML rendering
//! - [`logger`] - Log output setup

pub mod config;
pub mod controllers;
pub mod error;
pub mod logger;
pub mod pipeline;
pub mod routing;
pub mod startup;
pub mod state;
pub mod views;

pub use error::{AppError, AppResult, StartupError};
pub use startup::{Application, StartupOptions};
pub use state::AppState;

//! # ABC Retail Storage Library
//!
//! Azure Storage access for the ABC Retail web application. The crate
//! talks to the Blob, Queue, Table and File services over their REST APIs
//! and provisions the resources the site needs at startup.
//!
//! ## Modules
//!
//! - [`auth`] - Connection string parsing and Shared Key request signing
//! - [`pipeline`] - Signed HTTP requests with retries
//! - [`blob`], [`queue`], [`table`], [`file_share`] - Service clients
//! - [`clients`] - The shared set of service clients
//! - [`provisioning`] - Idempotent creation of the retail resources
//! - [`common`] - Errors and resource naming rules

pub mod auth;
pub mod blob;
pub mod clients;
pub mod common;
pub mod file_share;
pub mod pipeline;
pub mod provisioning;
pub mod queue;
pub mod table;

pub use clients::StorageClients;
pub use common::{ResourceKind, StorageError, StorageResult};
pub use pipeline::ClientOptions;
pub use provisioning::{ProvisionOutcome, ProvisionReport, Provisioner, ProvisioningPlan};

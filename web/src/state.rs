use crate::config::HostEnvironment;
use crate::routing::ControllerRegistry;
use crate::views::Views;
use std::sync::Arc;
use storage::{ProvisionReport, StorageClients};

/// Shared state handed to every request.
///
/// Holds the process-wide storage clients, the outcome of startup
/// provisioning and the parsed page templates. Nothing in here changes after startup.
#[derive(Debug, Clone)]
pub struct AppState {
    clients: StorageClients,
    provisioning: Arc<ProvisionReport>,
    environment: HostEnvironment,
    controllers: Arc<ControllerRegistry>,
    views: Arc<Views>,
}

impl AppState {
    pub fn new(
        clients: StorageClients,
        provisioning: ProvisionReport,
        environment: HostEnvironment,
        controllers: ControllerRegistry,
        views: Arc<Views>,
    ) -> Self {
        Self {
            clients,
            provisioning: Arc::new(provisioning),
            environment,
            controllers: Arc::new(controllers),
            views,
        }
    }

    pub fn clients(&self) -> &StorageClients {
        &self.clients
    }

    pub fn provisioning(&self) -> &ProvisionReport {
        &self.provisioning
    }

    pub fn environment(&self) -> &HostEnvironment {
        &self.environment
    }

    pub fn controllers(&self) -> &ControllerRegistry {
        &self.controllers
    }

    pub fn views(&self) -> &Arc<Views> {
        &self.views
    }
}

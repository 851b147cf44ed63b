use crate::config::AppConfig;
use crate::error::StartupError;
use crate::pipeline::{self, PipelineOptions};
use crate::routing::ControllerRegistry;
use crate::state::AppState;
use crate::views::Views;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use storage::{ProvisionReport, Provisioner, ProvisioningPlan, StorageClients};
use tokio::net::TcpListener;

#[derive(Debug, Clone, Copy, Default)]
pub struct StartupOptions {
    pub skip_provisioning: bool,
}

/// A fully initialised application, ready to serve.
///
/// Building it registers the storage clients and provisions the storage
/// resources; any failure there aborts startup.
pub struct Application {
    router: Router,
    bind_address: String,
}

impl Application {
    pub async fn build(config: &AppConfig, options: StartupOptions) -> Result<Self, StartupError> {
        let clients = register_storage_clients(config)?;

        let provisioning = if options.skip_provisioning {
            log::warn!("Storage resource provisioning skipped");
            ProvisionReport::default()
        } else {
            provision_resources(&clients, &ProvisioningPlan::retail_defaults()).await?
        };

        let views = Views::new().map_err(StartupError::Views)?;
        let state = AppState::new(
            clients,
            provisioning,
            config.environment(),
            ControllerRegistry::with_defaults(),
            Arc::new(views),
        );
        let router = pipeline::build(state, &PipelineOptions::from_config(config));

        Ok(Self {
            router,
            bind_address: config.server().bind_address(),
        })
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serves until Ctrl+C or SIGTERM, then drains in-flight requests.
    pub async fn run(self) -> Result<(), StartupError> {
        let listener = TcpListener::bind(&self.bind_address)
            .await
            .map_err(|source| StartupError::Bind {
                address: self.bind_address.clone(),
                source,
            })?;
        log::info!("Now listening on: http://{}", self.bind_address);

        // Peer addresses decide whether forwarded headers are trusted
        let service = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, service)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(StartupError::Serve)?;

        log::info!("Application is shut down");
        Ok(())
    }
}

/// Builds the four storage clients from `connection_strings.azure_storage`.
pub fn register_storage_clients(config: &AppConfig) -> Result<StorageClients, StartupError> {
    let connection_string = config.connection_strings().azure_storage().ok_or_else(|| {
        StartupError::Configuration(
            "Connection string 'AzureStorage' is not configured".to_string(),
        )
    })?;

    let clients = StorageClients::from_connection_string(
        connection_string,
        &config.storage().client_options(),
    )
    .map_err(StartupError::StorageClients)?;

    log::info!(
        "Azure Storage clients registered for account '{}'",
        clients.account_name().unwrap_or("<unnamed>")
    );
    Ok(clients)
}

/// Ensures every resource of `plan` exists, stopping at the first failure.
pub async fn provision_resources(
    clients: &StorageClients,
    plan: &ProvisioningPlan,
) -> Result<ProvisionReport, StartupError> {
    Provisioner::new(clients.clone())
        .run(plan)
        .await
        .map_err(StartupError::Provisioning)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::info!("Application is shutting down...");
}

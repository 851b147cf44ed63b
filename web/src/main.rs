use anyhow::{Context, bail};
use clap::Parser;
use std::path::PathBuf;
use web::config::{self, ConfigLoadResult};
use web::{Application, StartupOptions, logger};

/// ABC Retail storefront
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Base configuration file; `config.<environment>.toml` next to it is layered on top
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Hosting environment, e.g. Development or Production
    #[arg(long)]
    environment: Option<String>,

    /// Start without creating the storage resources
    #[arg(long)]
    skip_provisioning: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match config::load_config(&cli.config, cli.environment.as_deref()) {
        ConfigLoadResult::Success(config) => *config,
        ConfigLoadResult::LoadError(e) | ConfigLoadResult::DeserializeError(e) => {
            bail!("{e}");
        }
    };

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("{}\n", error.user_message());
        }
        bail!("Configuration validation failed with {} error(s)", errors.len());
    }

    logger::setup_logger(config.logging()).context("Failed to initialize logger")?;
    log::info!("Hosting environment: {}", config.environment());

    let options = StartupOptions {
        skip_provisioning: cli.skip_provisioning || config.storage().skip_provisioning(),
    };

    let app = match Application::build(&config, options).await {
        Ok(app) => app,
        Err(e) => {
            log::error!("Application startup failed: {e}");
            return Err(e.into());
        }
    };

    app.run().await?;
    Ok(())
}

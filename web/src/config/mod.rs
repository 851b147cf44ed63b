use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub mod app;
pub mod validation;

pub use app::{AppConfig, HostEnvironment};
pub use validation::{ConfigLoadResult, ConfigValidationError};

/// Prefix of environment variables that override file settings
pub const ENV_PREFIX: &str = "ABC_RETAIL";

/// Loads configuration from, in increasing precedence: `path`, the
/// environment-specific sibling file (`config.development.toml` next to
/// `config.toml`), `ABC_RETAIL_*` environment variables and finally the
/// explicit `environment` override.
///
/// Both files are optional so a deployment can be configured entirely from
/// the environment.
pub fn load_config(path: &Path, environment: Option<&str>) -> ConfigLoadResult {
    dotenv::dotenv().ok();

    let environment_name = environment
        .map(str::to_string)
        .or_else(|| std::env::var(format!("{ENV_PREFIX}_ENVIRONMENT")).ok())
        .unwrap_or_else(|| HostEnvironment::default().name().to_string());

    let env_source = Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true);

    let mut builder = Config::builder()
        .add_source(File::from(path.to_path_buf()).required(false))
        .add_source(File::from(environment_file(path, &environment_name)).required(false))
        .add_source(env_source); // environment entries override file values when present

    if let Some(name) = environment {
        builder = match builder.set_override("environment", name) {
            Ok(builder) => builder,
            Err(e) => {
                return ConfigLoadResult::LoadError(format!(
                    "Invalid environment override '{name}': {e}"
                ));
            }
        };
    }

    let config = match builder.build() {
        Ok(config) => config,
        Err(e) => {
            return ConfigLoadResult::LoadError(format!(
                "Configuration loading failed: {e}. Please check {} and environment variables.",
                path.display()
            ));
        }
    };

    match config.try_deserialize::<AppConfig>() {
        Ok(app_config) => ConfigLoadResult::Success(Box::new(app_config)),
        Err(e) => ConfigLoadResult::DeserializeError(format!("Failed to deserialize config: {e}")),
    }
}

/// `config.toml` + `Development` -> `config.development.toml`
fn environment_file(path: &Path, environment: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("config");
    let file_name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}.{}.{ext}", environment.to_ascii_lowercase()),
        None => format!("{stem}.{}", environment.to_ascii_lowercase()),
    };
    path.with_file_name(file_name)
}

/// Additional logging configuration
#[derive(Debug, Deserialize, Default, Clone)]
pub struct LoggingConfig {
    level: Option<String>,
    file: Option<String>,
}

impl LoggingConfig {
    pub fn level(&self) -> &str {
        self.level.as_deref().unwrap_or("info")
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn loaded(result: ConfigLoadResult) -> AppConfig {
        match result {
            ConfigLoadResult::Success(config) => *config,
            ConfigLoadResult::LoadError(e) | ConfigLoadResult::DeserializeError(e) => {
                panic!("config should load: {e}")
            }
        }
    }

    #[test]
    fn environment_file_sits_next_to_base_file() {
        assert_eq!(
            environment_file(Path::new("/etc/abc/config.toml"), "Development"),
            PathBuf::from("/etc/abc/config.development.toml")
        );
        assert_eq!(
            environment_file(Path::new("settings"), "Staging"),
            PathBuf::from("settings.staging")
        );
    }

    #[test]
    fn environment_file_overrides_base_file() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("config.toml");
        fs::write(
            &base,
            r#"
            [connection_strings]
            azure_storage = "UseDevelopmentStorage=true"

            [server]
            http_port = 8080

            [logging]
            level = "warn"
            "#,
        )
        .unwrap();
        fs::write(
            dir.path().join("config.development.toml"),
            "[logging]\nlevel = \"debug\"\n",
        )
        .unwrap();

        let config = loaded(load_config(&base, Some("Development")));
        assert!(config.environment().is_development());
        assert_eq!(config.logging().level(), "debug");
        assert_eq!(config.server().http_port(), 8080);
        assert_eq!(
            config.connection_strings().azure_storage(),
            Some("UseDevelopmentStorage=true")
        );
    }

    #[test]
    fn missing_files_yield_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = loaded(load_config(&dir.path().join("absent.toml"), Some("Production")));
        assert_eq!(config.environment(), HostEnvironment::Production);
        assert_eq!(config.server().http_port(), 5000);
    }

    #[test]
    fn malformed_file_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("config.toml");
        fs::write(&base, "[server\nhttp_port = ").unwrap();

        assert!(matches!(
            load_config(&base, Some("Production")),
            ConfigLoadResult::LoadError(_)
        ));
    }

    #[test]
    fn wrong_types_are_a_deserialize_error() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("config.toml");
        fs::write(&base, "[server]\nhttp_port = \"eighty\"\n").unwrap();

        assert!(matches!(
            load_config(&base, Some("Production")),
            ConfigLoadResult::DeserializeError(_)
        ));
    }
}

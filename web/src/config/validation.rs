use super::app::AppConfig;

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing connection_strings.azure_storage")]
    MissingConnectionString,
    #[error("Invalid connection_strings.azure_storage: {reason}")]
    InvalidConnectionString { reason: String },
    #[error("Invalid {name}: {configured}")]
    InvalidPort { name: &'static str, configured: u16 },
    #[error("Invalid logging.level: {configured}")]
    LogLevel { configured: String },
    #[error("Invalid storage.max_retries: {configured} (limit: {limit})")]
    StorageRetries { configured: u32, limit: u32 },
    #[error(
        "Invalid storage.network_timeout_secs: {configured} (min: {min_limit}, max: {max_limit})"
    )]
    NetworkTimeout {
        configured: u64,
        min_limit: u64,
        max_limit: u64,
    },
    #[error("Invalid hsts.max_age_days: {configured} (limit: {limit})")]
    HstsMaxAge { configured: u64, limit: u64 },
    #[error("Invalid server.known_proxies entry: {configured}")]
    KnownProxy { configured: String },
}

impl ConfigValidationError {
    pub fn user_message(&self) -> String {
        match self {
            ConfigValidationError::MissingConnectionString => {
                "Azure Storage connection string is missing!\n\n\
                Set connection_strings.azure_storage in config.toml or the\n\
                ABC_RETAIL_CONNECTION_STRINGS__AZURE_STORAGE environment variable."
                    .to_string()
            }
            ConfigValidationError::InvalidConnectionString { reason } => {
                format!(
                    "Azure Storage connection string is invalid!\n\n\
                    Problem: {reason}\n\n\
                    Use the connection string from the storage account's Access keys page,\n\
                    or UseDevelopmentStorage=true with explicit endpoints for local work."
                )
            }
            ConfigValidationError::InvalidPort { name, configured } => {
                format!(
                    "Port out of range!\n\nYour configured value: {configured}\n\n\
                    Please update {name} in config.toml to a value between 1 and 65535."
                )
            }
            ConfigValidationError::LogLevel { configured } => {
                format!(
                    "Unknown log level '{configured}'!\n\n\
                    Valid levels: trace, debug, info, warn, error\n\n\
                    Please update logging.level in config.toml."
                )
            }
            ConfigValidationError::StorageRetries { configured, limit } => {
                format!(
                    "Too many storage retries!\n\nYour configured value: {configured}\n\
                    Recommended maximum: {limit}\n\n\
                    Please update storage.max_retries in config.toml."
                )
            }
            ConfigValidationError::NetworkTimeout {
                configured,
                min_limit,
                max_limit,
            } => {
                format!(
                    "Storage network timeout out of range!\n\nYour configured value: {configured} seconds\n\
                    Valid range: {min_limit} - {max_limit} seconds\n\n\
                    Please update storage.network_timeout_secs in config.toml."
                )
            }
            ConfigValidationError::HstsMaxAge { configured, limit } => {
                format!(
                    "HSTS max-age too long!\n\nYour configured value: {configured} days\n\
                    Maximum: {limit} days\n\n\
                    Please update hsts.max_age_days in config.toml."
                )
            }
            ConfigValidationError::KnownProxy { configured } => {
                format!(
                    "Known proxy '{configured}' is not an IP address!\n\n\
                    List the proxy addresses, e.g. known_proxies = [\"10.0.0.4\"],\n\
                    in the [server] section of config.toml."
                )
            }
        }
    }
}

/// Configuration loading result
#[derive(Debug)]
pub enum ConfigLoadResult {
    Success(Box<AppConfig>),
    LoadError(String),
    DeserializeError(String),
}

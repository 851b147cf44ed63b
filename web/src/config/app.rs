use super::{LoggingConfig, validation::ConfigValidationError};
use serde::Deserialize;
use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;
use storage::auth::StorageConnectionString;
use storage::pipeline::{ClientOptions, RetryOptions};

pub const MAX_STORAGE_RETRIES: u32 = 10;
pub const MIN_NETWORK_TIMEOUT_SECS: u64 = 1;
pub const MAX_NETWORK_TIMEOUT_SECS: u64 = 600;
/// Two years, the longest max-age HSTS preload lists accept
pub const MAX_HSTS_MAX_AGE_DAYS: u64 = 730;
const SECONDS_PER_DAY: u64 = 24 * 60 * 60;
const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Hosting environment, compared case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HostEnvironment {
    Development,
    Staging,
    #[default]
    Production,
    Other(String),
}

impl HostEnvironment {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" => HostEnvironment::Development,
            "staging" => HostEnvironment::Staging,
            "production" | "" => HostEnvironment::Production,
            _ => HostEnvironment::Other(value.trim().to_string()),
        }
    }

    pub fn is_development(&self) -> bool {
        matches!(self, HostEnvironment::Development)
    }

    pub fn name(&self) -> &str {
        match self {
            HostEnvironment::Development => "Development",
            HostEnvironment::Staging => "Staging",
            HostEnvironment::Production => "Production",
            HostEnvironment::Other(name) => name,
        }
    }
}

impl fmt::Display for HostEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Main application configuration
#[derive(Debug, Deserialize, Default, Clone)]
pub struct AppConfig {
    environment: Option<String>,
    #[serde(default)]
    connection_strings: ConnectionStringsConfig,
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    hsts: HstsConfig,
    #[serde(default)]
    storage: StorageConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

impl AppConfig {
    /// Validate the configuration, collecting every problem at once
    pub fn validate(&self) -> Result<(), Vec<ConfigValidationError>> {
        let mut errors = Vec::new();

        match self.connection_strings.azure_storage() {
            None => errors.push(ConfigValidationError::MissingConnectionString),
            Some(value) => {
                if let Err(e) = StorageConnectionString::parse(value) {
                    errors.push(ConfigValidationError::InvalidConnectionString {
                        reason: e.to_string(),
                    });
                }
            }
        }

        for (name, port) in [
            ("server.http_port", self.server.http_port()),
            ("server.https_port", self.server.https_port()),
        ] {
            if port == 0 {
                errors.push(ConfigValidationError::InvalidPort { name, configured: port });
            }
        }

        for configured in self.server.invalid_known_proxies() {
            errors.push(ConfigValidationError::KnownProxy { configured });
        }

        let max_age_days = self.hsts.max_age_days();
        if max_age_days > MAX_HSTS_MAX_AGE_DAYS {
            errors.push(ConfigValidationError::HstsMaxAge {
                configured: max_age_days,
                limit: MAX_HSTS_MAX_AGE_DAYS,
            });
        }

        let level = self.logging.level().to_ascii_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            errors.push(ConfigValidationError::LogLevel {
                configured: self.logging.level().to_string(),
            });
        }

        if self.storage.max_retries() > MAX_STORAGE_RETRIES {
            errors.push(ConfigValidationError::StorageRetries {
                configured: self.storage.max_retries(),
                limit: MAX_STORAGE_RETRIES,
            });
        }

        let timeout = self.storage.network_timeout_secs();
        if !(MIN_NETWORK_TIMEOUT_SECS..=MAX_NETWORK_TIMEOUT_SECS).contains(&timeout) {
            errors.push(ConfigValidationError::NetworkTimeout {
                configured: timeout,
                min_limit: MIN_NETWORK_TIMEOUT_SECS,
                max_limit: MAX_NETWORK_TIMEOUT_SECS,
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn environment(&self) -> HostEnvironment {
        self.environment
            .as_deref()
            .map(HostEnvironment::parse)
            .unwrap_or_default()
    }

    pub fn connection_strings(&self) -> &ConnectionStringsConfig {
        &self.connection_strings
    }

    pub fn server(&self) -> &ServerConfig {
        &self.server
    }

    pub fn hsts(&self) -> &HstsConfig {
        &self.hsts
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    pub fn logging(&self) -> &LoggingConfig {
        &self.logging
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConnectionStringsConfig {
    azure_storage: Option<String>,
}

impl ConnectionStringsConfig {
    /// The `AzureStorage` connection string, if set and not blank
    pub fn azure_storage(&self) -> Option<&str> {
        self.azure_storage
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ServerConfig {
    host: Option<String>,
    http_port: Option<u16>,
    https_port: Option<u16>,
    https_redirection: Option<bool>,
    trust_forwarded_headers: Option<bool>,
    known_proxies: Option<Vec<String>>,
    static_root: Option<PathBuf>,
}

impl ServerConfig {
    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or("0.0.0.0")
    }

    pub fn http_port(&self) -> u16 {
        self.http_port.unwrap_or(5000)
    }

    /// Public HTTPS port clients are redirected to
    pub fn https_port(&self) -> u16 {
        self.https_port.unwrap_or(443)
    }

    pub fn https_redirection(&self) -> bool {
        self.https_redirection.unwrap_or(true)
    }

    /// Whether `X-Forwarded-Proto` / `X-Forwarded-Host` are honoured at all.
    /// Off unless the app runs behind a TLS-terminating proxy.
    pub fn trust_forwarded_headers(&self) -> bool {
        self.trust_forwarded_headers.unwrap_or(false)
    }

    /// Peers whose forwarded headers are honoured; empty means loopback only
    pub fn known_proxies(&self) -> Vec<IpAddr> {
        self.known_proxies
            .iter()
            .flatten()
            .filter_map(|p| p.trim().parse().ok())
            .collect()
    }

    fn invalid_known_proxies(&self) -> Vec<String> {
        self.known_proxies
            .iter()
            .flatten()
            .filter(|p| p.trim().parse::<IpAddr>().is_err())
            .cloned()
            .collect()
    }

    pub fn static_root(&self) -> PathBuf {
        self.static_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("wwwroot"))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host(), self.http_port())
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct HstsConfig {
    max_age_days: Option<u64>,
    include_subdomains: Option<bool>,
    preload: Option<bool>,
}

impl HstsConfig {
    pub fn max_age_days(&self) -> u64 {
        self.max_age_days.unwrap_or(30)
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_days().saturating_mul(SECONDS_PER_DAY))
    }

    pub fn include_subdomains(&self) -> bool {
        self.include_subdomains.unwrap_or(false)
    }

    pub fn preload(&self) -> bool {
        self.preload.unwrap_or(false)
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct StorageConfig {
    max_retries: Option<u32>,
    retry_delay_ms: Option<u64>,
    max_retry_delay_secs: Option<u64>,
    network_timeout_secs: Option<u64>,
    skip_provisioning: Option<bool>,
}

impl StorageConfig {
    pub fn max_retries(&self) -> u32 {
        self.max_retries.unwrap_or(3)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms.unwrap_or(800))
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_secs(self.max_retry_delay_secs.unwrap_or(60))
    }

    pub fn network_timeout_secs(&self) -> u64 {
        self.network_timeout_secs.unwrap_or(100)
    }

    pub fn skip_provisioning(&self) -> bool {
        self.skip_provisioning.unwrap_or(false)
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            retry: RetryOptions {
                max_retries: self.max_retries(),
                delay: self.retry_delay(),
                max_delay: self.max_retry_delay(),
            },
            network_timeout: Duration::from_secs(self.network_timeout_secs()),
        }
    }
}

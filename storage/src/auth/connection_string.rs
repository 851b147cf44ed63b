use super::shared_key::SharedKeySigner;
use super::types::{ServiceKind, StorageCredential};
use crate::common::{StorageError, StorageResult};
use reqwest::Url;
use std::collections::HashMap;
use std::fmt;

/// Account name of the local storage emulator (Azurite)
pub const DEVELOPMENT_STORAGE_ACCOUNT: &str = "devstoreaccount1";
/// Well-known, publicly documented key of the local storage emulator
pub const DEVELOPMENT_STORAGE_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";
const DEFAULT_PROTOCOL: &str = "https";
const DEFAULT_DEVELOPMENT_HOST: &str = "http://127.0.0.1";

/// A parsed Azure Storage connection string.
///
/// Accepts the same settings as the Azure SDKs:
///
/// ```text
/// DefaultEndpointsProtocol=https;AccountName=abcretail;AccountKey=<base64>;EndpointSuffix=core.windows.net
/// BlobEndpoint=https://cdn.example.com;SharedAccessSignature=sv=2021-08-06&sig=...
/// UseDevelopmentStorage=true
/// ```
///
/// Keys are case-insensitive and values may contain `=`; only the first `=`
/// of a segment separates key from value.
#[derive(Clone)]
pub struct StorageConnectionString {
    account_name: Option<String>,
    account_key: Option<String>,
    sas_token: Option<String>,
    protocol: String,
    endpoint_suffix: String,
    endpoints: HashMap<ServiceKind, Url>,
    development_storage: bool,
}

impl StorageConnectionString {
    pub fn parse(value: &str) -> StorageResult<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(StorageError::ConfigurationError(
                "Connection string cannot be empty".to_string(),
            ));
        }

        let mut settings: HashMap<String, String> = HashMap::new();
        for part in value.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            let (key, val) = part.split_once('=').ok_or_else(|| {
                StorageError::ConfigurationError(format!(
                    "Invalid connection string segment '{part}': expected Key=Value"
                ))
            })?;
            settings.insert(key.trim().to_ascii_lowercase(), val.trim().to_string());
        }

        let use_development_storage = settings
            .get("usedevelopmentstorage")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));
        if use_development_storage {
            return Self::development(
                settings
                    .get("developmentstorageproxyuri")
                    .map(String::as_str),
            );
        }

        let protocol = settings
            .remove("defaultendpointsprotocol")
            .map(|p| p.to_ascii_lowercase())
            .unwrap_or_else(|| DEFAULT_PROTOCOL.to_string());
        if protocol != "http" && protocol != "https" {
            return Err(StorageError::ConfigurationError(format!(
                "Unsupported DefaultEndpointsProtocol '{protocol}', expected http or https"
            )));
        }

        let mut endpoints = HashMap::new();
        for (service, key) in [
            (ServiceKind::Blob, "blobendpoint"),
            (ServiceKind::Queue, "queueendpoint"),
            (ServiceKind::Table, "tableendpoint"),
            (ServiceKind::File, "fileendpoint"),
        ] {
            if let Some(raw) = settings.get(key).filter(|v| !v.is_empty()) {
                let url = Url::parse(raw).map_err(|e| {
                    StorageError::ConfigurationError(format!(
                        "Invalid {service} endpoint '{raw}': {e}"
                    ))
                })?;
                endpoints.insert(service, url);
            }
        }

        let account_name = settings.remove("accountname").filter(|v| !v.is_empty());
        let account_key = settings.remove("accountkey").filter(|v| !v.is_empty());
        let sas_token = settings
            .remove("sharedaccesssignature")
            .filter(|v| !v.is_empty());

        if account_key.is_none() && sas_token.is_none() {
            return Err(StorageError::ConfigurationError(
                "Connection string must contain AccountKey or SharedAccessSignature".to_string(),
            ));
        }

        if let Some(key) = &account_key {
            let account = account_name.as_deref().ok_or_else(|| {
                StorageError::ConfigurationError(
                    "Missing AccountName in connection string".to_string(),
                )
            })?;
            // Rejects keys that are not valid base64
            SharedKeySigner::new(account, key)?;
        }

        if account_name.is_none() && endpoints.is_empty() {
            return Err(StorageError::ConfigurationError(
                "Connection string must contain AccountName or an explicit service endpoint"
                    .to_string(),
            ));
        }

        Ok(Self {
            account_name,
            account_key,
            sas_token,
            protocol,
            endpoint_suffix: settings
                .remove("endpointsuffix")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_ENDPOINT_SUFFIX.to_string()),
            endpoints,
            development_storage: false,
        })
    }

    /// Connection to the local storage emulator, optionally through a proxy host.
    pub fn development(proxy_uri: Option<&str>) -> StorageResult<Self> {
        let host = proxy_uri
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_DEVELOPMENT_HOST)
            .trim_end_matches('/');

        let mut endpoints = HashMap::new();
        for service in [ServiceKind::Blob, ServiceKind::Queue, ServiceKind::Table] {
            if let Some(port) = service.development_port() {
                let raw = format!("{host}:{port}/{DEVELOPMENT_STORAGE_ACCOUNT}");
                let url = Url::parse(&raw).map_err(|e| {
                    StorageError::ConfigurationError(format!(
                        "Invalid DevelopmentStorageProxyUri '{host}': {e}"
                    ))
                })?;
                endpoints.insert(service, url);
            }
        }

        Ok(Self {
            account_name: Some(DEVELOPMENT_STORAGE_ACCOUNT.to_string()),
            account_key: Some(DEVELOPMENT_STORAGE_KEY.to_string()),
            sas_token: None,
            protocol: "http".to_string(),
            endpoint_suffix: DEFAULT_ENDPOINT_SUFFIX.to_string(),
            endpoints,
            development_storage: true,
        })
    }

    pub fn account_name(&self) -> Option<&str> {
        self.account_name.as_deref()
    }

    pub fn is_development_storage(&self) -> bool {
        self.development_storage
    }

    /// Base endpoint of `service`.
    ///
    /// An explicit `<Service>Endpoint` setting wins; otherwise the endpoint is
    /// derived from protocol, account name and endpoint suffix.
    pub fn endpoint(&self, service: ServiceKind) -> StorageResult<Url> {
        if let Some(url) = self.endpoints.get(&service) {
            return Ok(url.clone());
        }

        if self.development_storage {
            return Err(StorageError::ConfigurationError(format!(
                "The storage emulator does not provide a {service} endpoint"
            )));
        }

        let account = self.account_name.as_deref().ok_or_else(|| {
            StorageError::ConfigurationError(format!(
                "No {service} endpoint configured and no AccountName to derive one from"
            ))
        })?;

        let raw = format!(
            "{}://{}.{}.{}",
            self.protocol,
            account,
            service.host_label(),
            self.endpoint_suffix
        );
        Url::parse(&raw).map_err(|e| {
            StorageError::ConfigurationError(format!("Invalid {service} endpoint '{raw}': {e}"))
        })
    }

    /// Credential used to authorize requests; Shared Key wins over SAS.
    pub fn credential(&self) -> StorageResult<StorageCredential> {
        match (&self.account_name, &self.account_key, &self.sas_token) {
            (Some(account), Some(key), _) => Ok(StorageCredential::SharedKey(
                SharedKeySigner::new(account.clone(), key)?,
            )),
            (_, _, Some(token)) => Ok(StorageCredential::SharedAccessSignature(
                token.trim_start_matches('?').to_string(),
            )),
            _ => Ok(StorageCredential::Anonymous),
        }
    }
}

impl fmt::Debug for StorageConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConnectionString")
            .field("account_name", &self.account_name)
            .field("has_account_key", &self.account_key.is_some())
            .field("has_sas_token", &self.sas_token.is_some())
            .field("protocol", &self.protocol)
            .field("endpoint_suffix", &self.endpoint_suffix)
            .field("development_storage", &self.development_storage)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims::{assert_err, assert_ok};

    const KEY: &str = "a2V5LWZvci11bml0LXRlc3Rz";

    #[test]
    fn derives_endpoints_from_account_and_suffix() {
        let cs = StorageConnectionString::parse(&format!(
            "DefaultEndpointsProtocol=https;AccountName=abcretail;AccountKey={KEY};EndpointSuffix=core.windows.net"
        ))
        .unwrap();

        assert_eq!(cs.account_name(), Some("abcretail"));
        assert_eq!(
            cs.endpoint(ServiceKind::Blob).unwrap().as_str(),
            "https://abcretail.blob.core.windows.net/"
        );
        assert_eq!(
            cs.endpoint(ServiceKind::File).unwrap().as_str(),
            "https://abcretail.file.core.windows.net/"
        );
        assert!(matches!(
            cs.credential().unwrap(),
            StorageCredential::SharedKey(_)
        ));
    }

    #[test]
    fn keys_are_case_insensitive_and_suffix_defaults() {
        let cs = StorageConnectionString::parse(&format!(
            "accountname=abcretail;ACCOUNTKEY={KEY};"
        ))
        .unwrap();
        assert_eq!(
            cs.endpoint(ServiceKind::Queue).unwrap().as_str(),
            "https://abcretail.queue.core.windows.net/"
        );
    }

    #[test]
    fn explicit_endpoint_wins() {
        let cs = StorageConnectionString::parse(
            "BlobEndpoint=https://images.example.com;SharedAccessSignature=?sv=2021-08-06&sig=abc%3D",
        )
        .unwrap();

        assert_eq!(
            cs.endpoint(ServiceKind::Blob).unwrap().as_str(),
            "https://images.example.com/"
        );
        assert_err!(cs.endpoint(ServiceKind::Queue));
        match cs.credential().unwrap() {
            StorageCredential::SharedAccessSignature(token) => {
                assert_eq!(token, "sv=2021-08-06&sig=abc%3D")
            }
            other => panic!("unexpected credential {other:?}"),
        }
    }

    #[test]
    fn development_storage_uses_emulator_endpoints() {
        let cs = StorageConnectionString::parse("UseDevelopmentStorage=true").unwrap();

        assert!(cs.is_development_storage());
        assert_eq!(cs.account_name(), Some(DEVELOPMENT_STORAGE_ACCOUNT));
        assert_eq!(
            cs.endpoint(ServiceKind::Blob).unwrap().as_str(),
            "http://127.0.0.1:10000/devstoreaccount1"
        );
        assert_eq!(
            cs.endpoint(ServiceKind::Table).unwrap().as_str(),
            "http://127.0.0.1:10002/devstoreaccount1"
        );
        assert_err!(cs.endpoint(ServiceKind::File));
    }

    #[test]
    fn development_storage_honours_proxy() {
        let cs = StorageConnectionString::parse(
            "UseDevelopmentStorage=true;DevelopmentStorageProxyUri=http://azurite/",
        )
        .unwrap();
        assert_eq!(
            cs.endpoint(ServiceKind::Queue).unwrap().as_str(),
            "http://azurite:10001/devstoreaccount1"
        );
    }

    #[test]
    fn rejects_invalid_connection_strings() {
        assert_err!(StorageConnectionString::parse(""));
        assert_err!(StorageConnectionString::parse("AccountName=abcretail"));
        assert_err!(StorageConnectionString::parse(&format!("AccountKey={KEY}")));
        assert_err!(StorageConnectionString::parse(
            "AccountName=abcretail;AccountKey=not*base64"
        ));
        assert_err!(StorageConnectionString::parse(&format!(
            "AccountName=abcretail;AccountKey={KEY};garbage"
        )));
        assert_err!(StorageConnectionString::parse(&format!(
            "DefaultEndpointsProtocol=ftp;AccountName=abcretail;AccountKey={KEY}"
        )));
    }

    #[test]
    fn values_may_contain_equals_signs() {
        assert_ok!(StorageConnectionString::parse(
            "AccountName=abcretail;AccountKey=Zm9vYg=="
        ));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let cs = StorageConnectionString::parse(&format!(
            "AccountName=abcretail;AccountKey={KEY}"
        ))
        .unwrap();
        let debug = format!("{cs:?}");
        assert!(!debug.contains(KEY));
        assert!(debug.contains("abcretail"));
    }
}

use super::types::ServiceKind;
use crate::common::{StorageError, StorageResult};
use base64::{Engine as _, engine::general_purpose};
use hmac::{Hmac, Mac};
use reqwest::header::{
    CONTENT_ENCODING, CONTENT_LANGUAGE, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, IF_MATCH,
    IF_MODIFIED_SINCE, IF_NONE_MATCH, IF_UNMODIFIED_SINCE, RANGE,
};
use reqwest::{Method, Url};
use sha2::Sha256;
use std::collections::BTreeMap;

type HmacSha256 = Hmac<Sha256>;

/// Signer for Azure Storage Shared Key authorization.
///
/// Every request to the storage services carries an `Authorization` header of
/// the form `SharedKey <account>:<signature>`, where the signature is an
/// HMAC-SHA256 of a canonical "string-to-sign" built from the request, keyed
/// with the base64-decoded account key.
///
/// # Security Notes
///
/// - The decoded key never leaves the signer and is not printed by `Debug`
/// - `x-ms-date` is part of the signed string, so signatures expire with the
///   service's 15 minute clock-skew window
/// - Requests must be re-signed on every retry
///
/// # Examples
///
/// ```no_run
/// use storage::auth::SharedKeySigner;
///
/// let signer = SharedKeySigner::new("abcretail", "base64_encoded_key")?;
/// let signature = signer.sign("PUT\n\n\n...")?;
/// ```
#[derive(Clone)]
pub struct SharedKeySigner {
    account: String,
    key: Vec<u8>,
}

impl std::fmt::Debug for SharedKeySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedKeySigner")
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}

impl SharedKeySigner {
    /// Creates a signer for `account` from its base64-encoded key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ConfigurationError`] if the key is not valid
    /// base64 or decodes to nothing.
    pub fn new(account: impl Into<String>, key: &str) -> StorageResult<Self> {
        let key = general_purpose::STANDARD.decode(key.trim()).map_err(|e| {
            StorageError::ConfigurationError(format!("AccountKey is not valid base64: {e}"))
        })?;
        if key.is_empty() {
            return Err(StorageError::ConfigurationError(
                "AccountKey cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            account: account.into(),
            key,
        })
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// Signs `string_to_sign` and returns the base64-encoded HMAC-SHA256.
    pub fn sign(&self, string_to_sign: &str) -> StorageResult<String> {
        let mut mac = HmacSha256::new_from_slice(&self.key).map_err(|e| {
            StorageError::AuthenticationError(format!("Failed to create HMAC: {e}"))
        })?;
        mac.update(string_to_sign.as_bytes());
        Ok(general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
    }

    /// Builds the `Authorization` header value for a fully prepared request.
    ///
    /// The request must already carry every header that takes part in the
    /// signature (`x-ms-date`, `x-ms-version`, `Content-Length`, `Content-Type`).
    pub fn authorization(
        &self,
        request: &reqwest::Request,
        service: ServiceKind,
    ) -> StorageResult<String> {
        let string_to_sign = match service {
            ServiceKind::Table => table_string_to_sign(
                &self.account,
                request.method(),
                request.headers(),
                request.url(),
            ),
            ServiceKind::Blob | ServiceKind::Queue | ServiceKind::File => string_to_sign(
                &self.account,
                request.method(),
                request.headers(),
                request.url(),
            ),
        };

        log::trace!("Shared Key string-to-sign: {string_to_sign:?}");
        Ok(format!("SharedKey {}:{}", self.account, self.sign(&string_to_sign)?))
    }
}

/// String-to-sign for the Blob, Queue and File services.
pub fn string_to_sign(account: &str, method: &Method, headers: &HeaderMap, url: &Url) -> String {
    let content_length = header_str(headers, CONTENT_LENGTH.as_str());
    // Since version 2015-02-21 a zero length is signed as the empty string
    let content_length = if content_length == "0" {
        ""
    } else {
        content_length
    };

    [
        method.as_str(),
        header_str(headers, CONTENT_ENCODING.as_str()),
        header_str(headers, CONTENT_LANGUAGE.as_str()),
        content_length,
        header_str(headers, "content-md5"),
        header_str(headers, CONTENT_TYPE.as_str()),
        // Date is always empty: x-ms-date is sent and signed instead
        "",
        header_str(headers, IF_MODIFIED_SINCE.as_str()),
        header_str(headers, IF_MATCH.as_str()),
        header_str(headers, IF_NONE_MATCH.as_str()),
        header_str(headers, IF_UNMODIFIED_SINCE.as_str()),
        header_str(headers, RANGE.as_str()),
    ]
    .join("\n")
        + "\n"
        + &canonicalized_headers(headers)
        + &canonicalized_resource(account, url)
}

/// String-to-sign for the Table service (Shared Key, not Shared Key Lite).
pub fn table_string_to_sign(
    account: &str,
    method: &Method,
    headers: &HeaderMap,
    url: &Url,
) -> String {
    let date = match header_str(headers, "x-ms-date") {
        "" => header_str(headers, "date"),
        date => date,
    };

    format!(
        "{}\n{}\n{}\n{}\n{}",
        method.as_str(),
        header_str(headers, "content-md5"),
        header_str(headers, CONTENT_TYPE.as_str()),
        date,
        table_canonicalized_resource(account, url)
    )
}

/// All `x-ms-` headers, lower-cased and sorted, one `name:value\n` per header.
pub fn canonicalized_headers(headers: &HeaderMap) -> String {
    let mut canonical: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        let name = name.as_str().to_ascii_lowercase();
        if !name.starts_with("x-ms-") {
            continue;
        }
        let value = value.to_str().unwrap_or_default().trim().to_string();
        canonical.entry(name).or_default().push(value);
    }

    canonical
        .into_iter()
        .map(|(name, values)| format!("{name}:{}\n", values.join(",")))
        .collect()
}

/// `/<account><path>` followed by every query parameter on its own line,
/// sorted by lower-cased name with sorted, comma-joined values.
pub fn canonicalized_resource(account: &str, url: &Url) -> String {
    let mut resource = format!("/{account}{}", url.path());

    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in url.query_pairs() {
        params
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into_owned());
    }

    for (name, mut values) in params {
        values.sort();
        resource.push('\n');
        resource.push_str(&name);
        resource.push(':');
        resource.push_str(&values.join(","));
    }
    resource
}

fn table_canonicalized_resource(account: &str, url: &Url) -> String {
    let mut resource = format!("/{account}{}", url.path());
    if let Some((_, comp)) = url.query_pairs().find(|(name, _)| name == "comp") {
        resource.push_str("?comp=");
        resource.push_str(&comp);
    }
    resource
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    const KEY: &str = "a2V5LWZvci11bml0LXRlc3Rz";

    fn storage_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-ms-version", HeaderValue::from_static("2021-08-06"));
        headers.insert(
            "x-ms-date",
            HeaderValue::from_static("Mon, 01 Jan 2024 00:00:00 GMT"),
        );
        headers.insert("x-ms-blob-public-access", HeaderValue::from_static("blob"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
        headers
    }

    #[test]
    fn canonical_headers_are_sorted_and_lowercased() {
        let mut headers = storage_headers();
        headers.insert("x-ms-client-request-id", HeaderValue::from_static(" abc "));
        headers.insert("user-agent", HeaderValue::from_static("ignored"));

        assert_eq!(
            canonicalized_headers(&headers),
            "x-ms-blob-public-access:blob\n\
             x-ms-client-request-id:abc\n\
             x-ms-date:Mon, 01 Jan 2024 00:00:00 GMT\n\
             x-ms-version:2021-08-06\n"
        );
    }

    #[test]
    fn canonical_resource_sorts_query_parameters() {
        let url = Url::parse(
            "https://abcretail.blob.core.windows.net/product-images?restype=container&Comp=list&include=metadata&include=deleted",
        )
        .unwrap();

        assert_eq!(
            canonicalized_resource("abcretail", &url),
            "/abcretail/product-images\ncomp:list\ninclude:deleted,metadata\nrestype:container"
        );
    }

    #[test]
    fn emulator_resource_repeats_account_segment() {
        let url = Url::parse("http://127.0.0.1:10001/devstoreaccount1/order-processing").unwrap();
        assert_eq!(
            canonicalized_resource("devstoreaccount1", &url),
            "/devstoreaccount1/devstoreaccount1/order-processing"
        );
    }

    #[test]
    fn blob_string_to_sign_layout() {
        let url = Url::parse("https://abcretail.blob.core.windows.net/product-images?restype=container")
            .unwrap();

        let expected = "PUT\n\n\n\n\n\n\n\n\n\n\n\n\
            x-ms-blob-public-access:blob\n\
            x-ms-date:Mon, 01 Jan 2024 00:00:00 GMT\n\
            x-ms-version:2021-08-06\n\
            /abcretail/product-images\nrestype:container";
        assert_eq!(
            string_to_sign("abcretail", &Method::PUT, &storage_headers(), &url),
            expected
        );
    }

    #[test]
    fn non_zero_content_length_is_signed() {
        let mut headers = storage_headers();
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("27"));
        let url = Url::parse("https://abcretail.queue.core.windows.net/order-processing").unwrap();

        let signed = string_to_sign("abcretail", &Method::PUT, &headers, &url);
        assert!(signed.starts_with("PUT\n\n\n27\n"));
    }

    #[test]
    fn table_string_to_sign_layout() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-ms-date",
            HeaderValue::from_static("Mon, 01 Jan 2024 00:00:00 GMT"),
        );
        let url = Url::parse("https://abcretail.table.core.windows.net/Tables").unwrap();

        assert_eq!(
            table_string_to_sign("abcretail", &Method::POST, &headers, &url),
            "POST\n\napplication/json\nMon, 01 Jan 2024 00:00:00 GMT\n/abcretail/Tables"
        );
    }

    #[test]
    fn table_resource_keeps_only_comp() {
        let url = Url::parse("https://abcretail.table.core.windows.net/?comp=properties&restype=service")
            .unwrap();
        assert_eq!(
            table_canonicalized_resource("abcretail", &url),
            "/abcretail/?comp=properties"
        );
    }

    #[test]
    fn signature_is_deterministic_sha256() {
        let signer = SharedKeySigner::new("abcretail", KEY).unwrap();
        let first = signer.sign("PUT\n").unwrap();
        let second = signer.sign("PUT\n").unwrap();
        assert_eq!(first, second);
        assert_ne!(first, signer.sign("GET\n").unwrap());

        let raw = general_purpose::STANDARD.decode(&first).unwrap();
        assert_eq!(raw.len(), 32);
    }

    #[test]
    fn authorization_header_names_account() {
        let signer = SharedKeySigner::new("abcretail", KEY).unwrap();
        let request = reqwest::Request::new(
            Method::PUT,
            Url::parse("https://abcretail.file.core.windows.net/contracts?restype=share").unwrap(),
        );

        let header = signer.authorization(&request, ServiceKind::File).unwrap();
        assert!(header.starts_with("SharedKey abcretail:"));
    }

    #[test]
    fn rejects_invalid_keys() {
        assert!(SharedKeySigner::new("abcretail", "%%%").is_err());
        assert!(SharedKeySigner::new("abcretail", "").is_err());
    }

    #[test]
    fn debug_hides_key() {
        let signer = SharedKeySigner::new("abcretail", KEY).unwrap();
        let debug = format!("{signer:?}");
        assert!(debug.contains("abcretail"));
        assert!(!debug.contains(KEY));
    }
}

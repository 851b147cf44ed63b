use super::{ForwardedHeadersOptions, RequestOrigin, is_loopback_host};
use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::http::header::STRICT_TRANSPORT_SECURITY;
use axum::middleware::Next;
use axum::response::Response;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HstsOptions {
    pub max_age: Duration,
    pub include_subdomains: bool,
    pub preload: bool,
    pub forwarded: ForwardedHeadersOptions,
}

impl Default for HstsOptions {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(30 * 24 * 60 * 60),
            include_subdomains: false,
            preload: false,
            forwarded: ForwardedHeadersOptions::default(),
        }
    }
}

impl HstsOptions {
    pub fn header_value(&self) -> HeaderValue {
        let mut value = format!("max-age={}", self.max_age.as_secs());
        if self.include_subdomains {
            value.push_str("; includeSubDomains");
        }
        if self.preload {
            value.push_str("; preload");
        }
        // Digits and ASCII directives only
        HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("max-age=0"))
    }
}

/// Adds `Strict-Transport-Security` to HTTPS responses, except for
/// loopback hosts.
pub async fn apply_hsts(
    State(options): State<HstsOptions>,
    request: Request,
    next: Next,
) -> Response {
    let origin = RequestOrigin::of(&request, &options.forwarded);
    let mut response = next.run(request).await;

    let loopback = origin.host.as_deref().is_some_and(is_loopback_host);
    if origin.is_https && !loopback {
        response
            .headers_mut()
            .insert(STRICT_TRANSPORT_SECURITY, options.header_value());
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_value_lists_enabled_directives() {
        let options = HstsOptions::default();
        assert_eq!(options.header_value(), "max-age=2592000");

        let options = HstsOptions {
            max_age: Duration::from_secs(31_536_000),
            include_subdomains: true,
            preload: true,
            ..HstsOptions::default()
        };
        assert_eq!(
            options.header_value(),
            "max-age=31536000; includeSubDomains; preload"
        );
    }
}

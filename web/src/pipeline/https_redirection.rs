use super::{ForwardedHeadersOptions, RequestOrigin};
use axum::extract::{Request, State};
use axum::http::header::LOCATION;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

#[derive(Debug, Clone)]
pub struct HttpsRedirectionOptions {
    /// Port of the public HTTPS endpoint
    pub https_port: u16,
    pub forwarded: ForwardedHeadersOptions,
}

impl Default for HttpsRedirectionOptions {
    fn default() -> Self {
        Self {
            https_port: 443,
            forwarded: ForwardedHeadersOptions::default(),
        }
    }
}

/// Redirects plain HTTP requests to the same URL on HTTPS with
/// `307 Temporary Redirect`.
///
/// Requests without a usable host pass through unchanged.
pub async fn redirect_to_https(
    State(options): State<HttpsRedirectionOptions>,
    request: Request,
    next: Next,
) -> Response {
    let origin = RequestOrigin::of(&request, &options.forwarded);
    if origin.is_https {
        return next.run(request).await;
    }

    let Some(host) = origin.host.as_deref() else {
        log::warn!("Cannot redirect to HTTPS: request has no host");
        return next.run(request).await;
    };

    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let location = https_location(host, options.https_port, path_and_query);

    match HeaderValue::from_str(&location) {
        Ok(value) => (StatusCode::TEMPORARY_REDIRECT, [(LOCATION, value)]).into_response(),
        Err(_) => {
            log::warn!("Cannot redirect to HTTPS: invalid location {location:?}");
            next.run(request).await
        }
    }
}

/// `https://host[:port]/path?query`, omitting the default port.
pub fn https_location(host: &str, port: u16, path_and_query: &str) -> String {
    let host = strip_port(host);
    if port == 443 {
        format!("https://{host}{path_and_query}")
    } else {
        format!("https://{host}:{port}{path_and_query}")
    }
}

fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        // [::1]:5000
        return match rest.find(']') {
            Some(end) => &host[..end + 2],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_omits_default_port() {
        assert_eq!(
            https_location("shop.example.com", 443, "/Home/Index?x=1"),
            "https://shop.example.com/Home/Index?x=1"
        );
        assert_eq!(
            https_location("shop.example.com:5000", 5001, "/"),
            "https://shop.example.com:5001/"
        );
    }

    #[test]
    fn ipv6_hosts_keep_their_brackets() {
        assert_eq!(
            https_location("[::1]:5000", 443, "/Privacy"),
            "https://[::1]/Privacy"
        );
        assert_eq!(strip_port("[::1]"), "[::1]");
    }
}

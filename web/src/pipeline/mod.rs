//! The HTTP request pipeline.
//!
//! Middleware runs outer to inner in this order:
//!
//! 1. request id and request tracing
//! 2. exception handling (with panics caught just inside it)
//! 3. HSTS, outside development
//! 4. HTTPS redirection
//! 5. static files from the web root
//! 6. routing, authorization and the controller action

pub mod authorization;
pub mod exception_handler;
pub mod hsts;
pub mod https_redirection;

use crate::config::{AppConfig, HostEnvironment};
use crate::routing::dispatch;
use crate::state::AppState;
use axum::Router;
use axum::extract::{ConnectInfo, Request};
use axum::http::header::HOST;
use axum::middleware;
use exception_handler::{ExceptionHandling, ExceptionPolicy};
use hsts::HstsOptions;
use https_redirection::HttpsRedirectionOptions;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

const LOOPBACK_HOSTS: [&str; 3] = ["localhost", "127.0.0.1", "[::1]"];

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub environment: HostEnvironment,
    pub static_root: PathBuf,
    pub https_redirection: Option<HttpsRedirectionOptions>,
    pub hsts: HstsOptions,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            environment: HostEnvironment::default(),
            static_root: PathBuf::from("wwwroot"),
            https_redirection: Some(HttpsRedirectionOptions::default()),
            hsts: HstsOptions::default(),
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        let server = config.server();
        let forwarded = ForwardedHeadersOptions {
            enabled: server.trust_forwarded_headers(),
            known_proxies: server.known_proxies(),
        };

        Self {
            environment: config.environment(),
            static_root: server.static_root(),
            https_redirection: server.https_redirection().then(|| HttpsRedirectionOptions {
                https_port: server.https_port(),
                forwarded: forwarded.clone(),
            }),
            hsts: HstsOptions {
                max_age: config.hsts().max_age(),
                include_subdomains: config.hsts().include_subdomains(),
                preload: config.hsts().preload(),
                forwarded,
            },
        }
    }
}

/// Assembles the application router around `state`.
pub fn build(state: AppState, options: &PipelineOptions) -> Router {
    let views = state.views().clone();
    let route = state.controllers().route().clone();
    let mvc = Router::new().fallback(dispatch).with_state(state);

    let static_files = ServeDir::new(&options.static_root)
        .append_index_html_on_directories(false)
        .call_fallback_on_method_not_allowed(true)
        .fallback(mvc);

    let mut app = Router::new().fallback_service(static_files);

    if let Some(https) = &options.https_redirection {
        app = app.layer(middleware::from_fn_with_state(
            https.clone(),
            https_redirection::redirect_to_https,
        ));
    }

    let development = options.environment.is_development();
    if !development {
        app = app.layer(middleware::from_fn_with_state(
            options.hsts.clone(),
            hsts::apply_hsts,
        ));
    }

    let handling = ExceptionHandling {
        policy: if development {
            ExceptionPolicy::DeveloperPage
        } else {
            ExceptionPolicy::ErrorPage
        },
        route,
        views,
    };

    app.layer(CatchPanicLayer::custom(exception_handler::panic_response))
        .layer(middleware::from_fn_with_state(
            handling,
            exception_handler::handle_exceptions,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
}

/// Which peers may tell us the original scheme and host.
///
/// Disabled by default. When enabled, forwarded headers are honoured only
/// from connections whose peer address is in `known_proxies`, or from
/// loopback peers when that list is empty. Requests without connection info
/// are never trusted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardedHeadersOptions {
    pub enabled: bool,
    pub known_proxies: Vec<IpAddr>,
}

impl ForwardedHeadersOptions {
    /// Trust forwarded headers from `proxies` only.
    pub fn from_proxies(proxies: impl IntoIterator<Item = IpAddr>) -> Self {
        Self {
            enabled: true,
            known_proxies: proxies.into_iter().collect(),
        }
    }

    pub fn trusts(&self, request: &Request) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(ConnectInfo(peer)) = request.extensions().get::<ConnectInfo<SocketAddr>>() else {
            return false;
        };

        let peer = peer.ip().to_canonical();
        if self.known_proxies.is_empty() {
            peer.is_loopback()
        } else {
            self.known_proxies
                .iter()
                .any(|proxy| proxy.to_canonical() == peer)
        }
    }
}

/// Scheme and host a request was addressed to, as far as the client is
/// concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin {
    pub is_https: bool,
    pub host: Option<String>,
}

impl RequestOrigin {
    /// `X-Forwarded-Proto` and `X-Forwarded-Host` take precedence over the
    /// request itself when `forwarded` trusts the peer.
    pub fn of(request: &Request, forwarded: &ForwardedHeadersOptions) -> Self {
        let trust_forwarded = forwarded.trusts(request);
        let headers = request.headers();
        let forwarded = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let forwarded_proto = trust_forwarded
            .then(|| forwarded("x-forwarded-proto"))
            .flatten();
        let is_https = match forwarded_proto {
            Some(proto) => proto.eq_ignore_ascii_case("https"),
            None => request.uri().scheme_str() == Some("https"),
        };

        let host = trust_forwarded
            .then(|| forwarded("x-forwarded-host"))
            .flatten()
            .or_else(|| {
                headers
                    .get(HOST)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            })
            .or_else(|| request.uri().authority().map(|a| a.as_str().to_string()));

        Self { is_https, host }
    }
}

/// `localhost`, `127.0.0.1` or `[::1]`, with or without a port.
pub fn is_loopback_host(host: &str) -> bool {
    let name = match host.strip_prefix('[') {
        Some(_) => host.split_inclusive(']').next().unwrap_or(host),
        None => host.split(':').next().unwrap_or(host),
    };
    LOOPBACK_HOSTS
        .iter()
        .any(|loopback| loopback.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn proxy() -> SocketAddr {
        "10.0.0.4:51234".parse().unwrap()
    }

    fn request(uri: &str, peer: Option<SocketAddr>, headers: &[(&str, &str)]) -> Request {
        let mut builder = axum::http::Request::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        if let Some(peer) = peer {
            builder = builder.extension(ConnectInfo(peer));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn forwarded_proto_is_ignored_unless_enabled() {
        let req = request(
            "/Home",
            Some(proxy()),
            &[("host", "shop.example.com"), ("x-forwarded-proto", "https")],
        );
        let trusted = ForwardedHeadersOptions::from_proxies([proxy().ip()]);

        assert!(RequestOrigin::of(&req, &trusted).is_https);
        assert!(!RequestOrigin::of(&req, &ForwardedHeadersOptions::default()).is_https);
    }

    #[test]
    fn forwarded_headers_from_unknown_peers_are_ignored() {
        let trusted = ForwardedHeadersOptions::from_proxies([proxy().ip()]);
        let headers = [("host", "shop.example.com"), ("x-forwarded-proto", "https")];

        let direct = request("/", Some("203.0.113.9:40000".parse().unwrap()), &headers);
        assert!(!RequestOrigin::of(&direct, &trusted).is_https);

        let no_peer = request("/", None, &headers);
        assert!(!RequestOrigin::of(&no_peer, &trusted).is_https);
    }

    #[test]
    fn empty_proxy_list_trusts_loopback_only() {
        let options = ForwardedHeadersOptions {
            enabled: true,
            known_proxies: Vec::new(),
        };
        let headers = [("x-forwarded-proto", "https")];

        let local = request("/", Some("127.0.0.1:9000".parse().unwrap()), &headers);
        assert!(options.trusts(&local));
        let mapped = request("/", Some("[::ffff:127.0.0.1]:9000".parse().unwrap()), &headers);
        assert!(options.trusts(&mapped));
        assert!(!options.trusts(&request("/", Some(proxy()), &headers)));
    }

    #[test]
    fn forwarded_host_and_first_value_are_used() {
        let req = request(
            "/",
            Some(proxy()),
            &[
                ("host", "10.0.0.4:5000"),
                ("x-forwarded-host", "shop.example.com, proxy.internal"),
                ("x-forwarded-proto", "http, https"),
            ],
        );
        let origin = RequestOrigin::of(&req, &ForwardedHeadersOptions::from_proxies([proxy().ip()]));
        assert_eq!(origin.host.as_deref(), Some("shop.example.com"));
        assert!(!origin.is_https);

        let origin = RequestOrigin::of(&req, &ForwardedHeadersOptions::default());
        assert_eq!(origin.host.as_deref(), Some("10.0.0.4:5000"));
    }

    #[test]
    fn absolute_uris_supply_scheme_and_host() {
        let req = request("https://shop.example.com/Home", None, &[]);
        let origin = RequestOrigin::of(&req, &ForwardedHeadersOptions::default());
        assert!(origin.is_https);
        assert_eq!(origin.host.as_deref(), Some("shop.example.com"));
    }

    #[test]
    fn loopback_hosts_are_recognised() {
        assert!(is_loopback_host("localhost"));
        assert!(is_loopback_host("LOCALHOST:5001"));
        assert!(is_loopback_host("127.0.0.1:443"));
        assert!(is_loopback_host("[::1]:5001"));
        assert!(!is_loopback_host("shop.example.com"));
        assert!(!is_loopback_host("localhost.example.com"));
    }
}

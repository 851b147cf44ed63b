use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode, header};
use axum::response::{IntoResponse, Response};
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use storage::{ClientOptions, ProvisionReport, StorageClients};
use tempfile::TempDir;
use tower::ServiceExt;
use web::config::{AppConfig, HostEnvironment};
use web::controllers::{ActionContext, ActionDescriptor, Controller};
use web::pipeline::hsts::HstsOptions;
use web::pipeline::https_redirection::HttpsRedirectionOptions;
use web::pipeline::{self, ForwardedHeadersOptions, PipelineOptions};
use web::routing::ControllerRegistry;
use web::views::Views;
use web::{AppError, AppResult, AppState};

const CONNECTION_STRING: &str =
    "DefaultEndpointsProtocol=https;AccountName=abcretail;AccountKey=a2V5LWZvci11bml0LXRlc3Rz";

const PROXY: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 4));

const DIAGNOSTICS_ACTIONS: &[ActionDescriptor] = &[
    ActionDescriptor::anonymous("Fail"),
    ActionDescriptor::anonymous("Panic"),
    ActionDescriptor::authenticated("Secret"),
];

struct DiagnosticsController;

#[async_trait]
impl Controller for DiagnosticsController {
    fn name(&self) -> &'static str {
        "Diagnostics"
    }

    fn actions(&self) -> &'static [ActionDescriptor] {
        DIAGNOSTICS_ACTIONS
    }

    async fn invoke(&self, action: &'static str, _context: ActionContext) -> AppResult<Response> {
        match action {
            "Fail" => Err(AppError::Internal("inventory lookup failed".to_string())),
            "Panic" => panic!("exploded while rendering"),
            _ => Ok("top secret".into_response()),
        }
    }
}

struct TestApp {
    router: Router,
    _web_root: TempDir,
}

fn app(environment: HostEnvironment) -> TestApp {
    let forwarded = ForwardedHeadersOptions::from_proxies([PROXY]);
    app_with(PipelineOptions {
        environment,
        https_redirection: Some(HttpsRedirectionOptions {
            forwarded: forwarded.clone(),
            ..HttpsRedirectionOptions::default()
        }),
        hsts: HstsOptions {
            forwarded,
            ..HstsOptions::default()
        },
        ..PipelineOptions::default()
    })
}

fn app_with(options: PipelineOptions) -> TestApp {
    let web_root = TempDir::new().unwrap();
    fs::create_dir_all(web_root.path().join("css")).unwrap();
    fs::write(web_root.path().join("css/site.css"), "body { margin: 0; }").unwrap();

    let clients =
        StorageClients::from_connection_string(CONNECTION_STRING, &ClientOptions::default())
            .unwrap();
    let registry = ControllerRegistry::with_defaults().register(Arc::new(DiagnosticsController));
    let state = AppState::new(
        clients,
        ProvisionReport::default(),
        options.environment.clone(),
        registry,
        Arc::new(Views::new().unwrap()),
    );

    let options = PipelineOptions {
        static_root: web_root.path().to_path_buf(),
        ..options
    };

    TestApp {
        router: pipeline::build(state, &options),
        _web_root: web_root,
    }
}

/// A request relayed by the TLS-terminating proxy.
fn proxied() -> axum::http::request::Builder {
    Request::builder()
        .header(header::HOST, "shop.example.com")
        .header("x-forwarded-proto", "https")
        .extension(ConnectInfo(SocketAddr::new(PROXY, 41_000)))
}

fn https_get(path: &str) -> Request<Body> {
    proxied().uri(path).body(Body::empty()).unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn root_renders_home_index() {
    let app = app(HostEnvironment::Production);

    let response = app.router.oneshot(https_get("/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("Welcome"));
    assert!(body.contains("abcretail"));
}

#[tokio::test]
async fn routes_match_case_insensitively_with_optional_id() {
    let app = app(HostEnvironment::Production);

    let response = app
        .router
        .clone()
        .oneshot(https_get("/home/privacy"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Privacy Policy"));

    let response = app
        .router
        .oneshot(https_get("/Home/Index/42"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_controller_or_action_is_not_found() {
    let app = app(HostEnvironment::Production);

    for path in ["/Products", "/Home/Missing", "/Home/Index/1/extra"] {
        let response = app.router.clone().oneshot(https_get(path)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
    }
}

#[tokio::test]
async fn plain_http_is_redirected_to_https() {
    let app = app(HostEnvironment::Production);
    let request = Request::builder()
        .uri("/Home/Privacy?lang=en")
        .header(header::HOST, "shop.example.com:5000")
        .body(Body::empty())
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers()[header::LOCATION],
        "https://shop.example.com/Home/Privacy?lang=en"
    );
    assert!(
        response
            .headers()
            .get(header::STRICT_TRANSPORT_SECURITY)
            .is_none()
    );
}

#[tokio::test]
async fn spoofed_forwarded_proto_is_redirected_by_default() {
    let app = app_with(PipelineOptions::from_config(&AppConfig::default()));
    let request = Request::builder()
        .uri("/Home/Privacy")
        .header(header::HOST, "shop.example.com")
        .header("x-forwarded-proto", "https")
        .extension(ConnectInfo(SocketAddr::from(([203, 0, 113, 9], 52_000))))
        .body(Body::empty())
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers()[header::LOCATION],
        "https://shop.example.com/Home/Privacy"
    );
}

#[tokio::test]
async fn forwarded_proto_from_untrusted_peer_is_redirected() {
    let app = app(HostEnvironment::Production);
    let request = Request::builder()
        .uri("/")
        .header(header::HOST, "shop.example.com")
        .header("x-forwarded-proto", "https")
        .extension(ConnectInfo(SocketAddr::from(([203, 0, 113, 9], 52_000))))
        .body(Body::empty())
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
}

#[tokio::test]
async fn hsts_is_sent_on_https_outside_development() {
    let app = app(HostEnvironment::Production);

    let response = app.router.oneshot(https_get("/")).await.unwrap();

    assert_eq!(
        response.headers()[header::STRICT_TRANSPORT_SECURITY],
        "max-age=2592000"
    );
}

#[tokio::test]
async fn hsts_is_skipped_for_loopback_and_development() {
    let production = app(HostEnvironment::Production);
    let request = Request::builder()
        .uri("/")
        .header(header::HOST, "localhost:5001")
        .header("x-forwarded-proto", "https")
        .extension(ConnectInfo(SocketAddr::new(PROXY, 41_000)))
        .body(Body::empty())
        .unwrap();
    let response = production.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .get(header::STRICT_TRANSPORT_SECURITY)
            .is_none()
    );

    let development = app(HostEnvironment::Development);
    let response = development.router.oneshot(https_get("/")).await.unwrap();
    assert!(
        response
            .headers()
            .get(header::STRICT_TRANSPORT_SECURITY)
            .is_none()
    );
}

#[tokio::test]
async fn failures_redirect_to_error_page_outside_development() {
    let app = app(HostEnvironment::Production);

    for path in ["/Diagnostics/Fail", "/Diagnostics/Panic"] {
        let response = app.router.clone().oneshot(https_get(path)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{path}");
        assert_eq!(response.headers()[header::LOCATION], "/Home/Error");
    }
}

#[tokio::test]
async fn error_page_is_not_cached() {
    let app = app(HostEnvironment::Staging);

    let response = app.router.oneshot(https_get("/Home/Error")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CACHE_CONTROL],
        "no-store, no-cache"
    );
    let body = body_text(response).await;
    assert!(body.contains("An error occurred while processing your request."));
    assert!(body.contains("Request ID"));
}

#[tokio::test]
async fn development_shows_error_details() {
    let app = app(HostEnvironment::Development);

    let response = app
        .router
        .clone()
        .oneshot(https_get("/Diagnostics/Fail"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_text(response).await;
    assert!(body.contains("inventory lookup failed"));
    assert!(body.contains("GET &#x2F;Diagnostics&#x2F;Fail"));

    let response = app
        .router
        .oneshot(https_get("/Diagnostics/Panic"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_text(response).await.contains("exploded while rendering"));
}

#[tokio::test]
async fn protected_actions_challenge_anonymous_callers() {
    let app = app(HostEnvironment::Production);

    let response = app
        .router
        .oneshot(https_get("/Diagnostics/Secret"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn static_files_are_served_before_routing() {
    let app = app(HostEnvironment::Production);

    let response = app
        .router
        .clone()
        .oneshot(https_get("/css/site.css"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "body { margin: 0; }");

    let response = app
        .router
        .oneshot(https_get("/css/missing.css"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_get_requests_fall_through_static_files() {
    let app = app(HostEnvironment::Production);
    let request = proxied()
        .method("POST")
        .uri("/Home/Privacy")
        .body(Body::empty())
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn request_ids_are_generated_and_propagated() {
    let app = app(HostEnvironment::Production);

    let response = app.router.clone().oneshot(https_get("/")).await.unwrap();
    assert!(response.headers().contains_key("x-request-id"));

    let request = proxied()
        .uri("/Home/Error")
        .header("x-request-id", "req-1234")
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-1234");
    assert!(body_text(response).await.contains("req-1234"));
}

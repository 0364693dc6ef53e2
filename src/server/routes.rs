use axum::{
    extract::Request,
    http::{header, HeaderName, Method, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::CorsConfig;
use crate::server::handlers::{activate_handler, health_handler, issue_code_handler, AppState};
use crate::server::logging::request_logging_middleware;

/// Methods browsers may use against the service.
const CORS_METHODS: [Method; 5] = [
    Method::POST,
    Method::OPTIONS,
    Method::GET,
    Method::PUT,
    Method::DELETE,
];

/// Build the CORS layer.
///
/// Every origin is accepted by echoing it back, which is what allows
/// credentials alongside an "any origin" policy.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods(CORS_METHODS)
        .allow_headers([
            header::CONTENT_TYPE,
            header::CONTENT_LENGTH,
            header::ACCEPT_ENCODING,
            HeaderName::from_static("x-csrf-token"),
            header::AUTHORIZATION,
            header::ACCEPT,
            header::ORIGIN,
            header::CACHE_CONTROL,
            HeaderName::from_static("x-requested-with"),
        ])
}

/// Answer `OPTIONS` requests with `204 No Content`.
///
/// The CORS layer ends every `OPTIONS` request itself with `200` and an
/// empty body.
pub async fn options_no_content(request: Request, next: Next) -> Response {
    let is_options = request.method() == Method::OPTIONS;
    let mut response = next.run(request).await;

    if is_options && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }

    response
}

/// Build the application router.
///
/// # Routes
///
/// - `POST /` - Activate or re-validate a code for a machine
/// - `POST /code/get` - Draw an unused code (only when issuance is enabled)
/// - `GET /health` - Liveness and database connectivity
pub fn build_router(state: AppState, cors: &CorsConfig) -> Router {
    let mut router = Router::new()
        .route("/", post(activate_handler))
        .route("/health", get(health_handler));

    if state.issuance.enabled {
        router = router.route("/code/get", post(issue_code_handler));
    }

    if cors.enabled {
        router = router
            .layer(cors_layer())
            .layer(middleware::from_fn(options_no_content));
    }

    router
        .layer(middleware::from_fn(request_logging_middleware))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    use tower::Layer;

    #[test]
    fn cors_rules_are_usable_with_credentials() {
        // tower-http panics when the layer is applied if credentials are
        // combined with a wildcard origin, header or method list.
        let _ = cors_layer().layer(());
    }

    #[cfg(feature = "sqlite")]
    async fn router(cors_enabled: bool) -> Router {
        use crate::config::IssuanceConfig;
        use crate::server::database::Database;

        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let state = AppState::new(
            std::sync::Arc::new(Database::SQLite(pool)),
            IssuanceConfig::default(),
        );
        build_router(
            state,
            &CorsConfig {
                enabled: cors_enabled,
            },
        )
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn preflight_is_no_content() {
        use axum::body::Body;
        use tower::ServiceExt;

        let request = axum::http::Request::builder()
            .method(Method::OPTIONS)
            .uri("/")
            .header(header::ORIGIN, "https://app.example")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();

        let response = router(true).await.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://app.example"
        );
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn options_is_not_routed_without_cors() {
        use axum::body::Body;
        use tower::ServiceExt;

        let request = axum::http::Request::builder()
            .method(Method::OPTIONS)
            .uri("/")
            .body(Body::empty())
            .unwrap();

        let response = router(false).await.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}

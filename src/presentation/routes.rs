//! Route definitions and server setup

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::presentation::controllers::AppState;
use crate::presentation::controllers::health::health_check;
use crate::presentation::controllers::reviews::{
    cancel_review, get_artifact, get_review, submit_review,
};
use crate::presentation::models::*;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::presentation::controllers::reviews::submit_review,
        crate::presentation::controllers::reviews::get_review,
        crate::presentation::controllers::reviews::get_artifact,
        crate::presentation::controllers::reviews::cancel_review,
        crate::presentation::controllers::health::health_check
    ),
    components(
        schemas(
            ReviewAcceptedResponse,
            ReviewStatusResponse,
            ErrorResponse,
            HealthResponse,
            crate::domain::job::JobStatus,
            crate::domain::job::ReviewSummary,
            crate::domain::job::SeverityBreakdown,
            crate::domain::job::JobError,
            crate::domain::job::ErrorKind,
            crate::domain::artifact::ArtifactName,
            crate::domain::artifact::ArtifactRef
        )
    ),
    tags(
        (name = "reviews", description = "Asynchronous code review submission and tracking"),
        (name = "health", description = "System health endpoints")
    ),
    info(
        title = "Reviewd API",
        version = "0.1.0",
        description = "Asynchronous code review service: submit a code bundle or SFTP reference, poll the job, download artifacts, receive signed webhooks on completion.",
        license(
            name = "AGPL-3.0",
            url = "https://www.gnu.org/licenses/agpl-3.0.html"
        )
    )
)]
pub struct ApiDoc;

/// Create the application router with the middleware stack
pub fn create_router(state: AppState, config: Arc<Config>) -> Router {
    let api_routes = Router::new()
        .route("/reviews", post(submit_review))
        .route("/reviews/{job_id}", get(get_review))
        .route("/reviews/{job_id}/cancel", post(cancel_review))
        .route("/reviews/{job_id}/artifacts/{name}", get(get_artifact));

    async fn root_handler() -> Response {
        Json(serde_json::json!({
            "name": "Reviewd API",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "health": "/health",
                "api": "/v1",
                "docs": "/docs"
            }
        }))
        .into_response()
    }

    let health_routes = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check));

    // Build CORS layer from configuration
    let cors_layer = if config.server.allowed_origins.len() == 1
        && config.server.allowed_origins[0] == "*"
    {
        CorsLayer::new()
            .allow_origin(tower_http::cors::AllowOrigin::any())
            .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
            .allow_headers([axum::http::header::CONTENT_TYPE, axum::http::header::ACCEPT])
            .max_age(Duration::from_secs(3600))
    } else {
        let origins: Vec<axum::http::HeaderValue> = config
            .server
            .allowed_origins
            .iter()
            .filter_map(|origin| {
                axum::http::HeaderValue::from_str(origin)
                    .map_err(|_| {
                        tracing::warn!(origin, "Invalid CORS origin in config; skipping");
                    })
                    .ok()
            })
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
            .allow_headers([axum::http::header::CONTENT_TYPE, axum::http::header::ACCEPT])
            .max_age(Duration::from_secs(3600))
    };

    // Body limit sits well above the bundle ceiling so the handler can answer
    // an oversized bundle with a clean 413 instead of a connection reset.
    let body_limit = (config.limits.max_bundle_bytes as usize)
        .saturating_mul(2)
        .max(1024 * 1024);

    let mut router = Router::new()
        .nest("/v1", api_routes)
        .merge(health_routes);

    // Avoid leaking interactive docs in hardened deployments.
    if config.server.enable_docs {
        router =
            router.merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer)
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    Duration::from_secs(config.server.request_timeout_seconds),
                ))
                .layer(axum::extract::DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}

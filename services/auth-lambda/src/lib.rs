pub mod config;
pub mod customer;
pub mod error;
pub mod handler;
pub mod store;

use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::{MatchedPath, State};
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::middleware::{from_fn, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use common_obs::{
    encode_prometheus_metrics, health_router, http_requests_total, service_name,
    PROMETHEUS_CONTENT_TYPE,
};
use tracing::{info_span, Instrument};
use uuid::Uuid;

pub use customer::Customer;
pub use error::{LookupError, LookupResponse, ResponseBody};
pub use handler::{LookupHandler, LookupRequest};
pub use store::{CustomerStore, MemoryCustomerStore, MongoCustomerStore, StoreConfig, StoreError};

pub const SERVICE_NAME: &str = "auth-lambda";
pub const AUTH_ROUTE: &str = "/v1/auth";
/// Metrics label for requests no route matched, which includes every Lambda
/// invocation. Keeps caller-chosen paths out of the label set.
pub const FALLBACK_ROUTE_LABEL: &str = "fallback";
const REQUEST_ID_HEADER: &str = "x-request-id";

pub struct AppState {
    pub handler: LookupHandler,
}

impl AppState {
    pub fn new(handler: LookupHandler) -> Self {
        Self { handler }
    }
}

/// Router for running as a standalone HTTP service.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(AUTH_ROUTE, post(authenticate))
        .route("/metrics", get(metrics))
        .with_state(state)
        .merge(health_router(SERVICE_NAME))
        .layer(from_fn(request_context))
}

/// Router for the Lambda runtime. The platform owns routing, so every
/// invocation goes to the lookup handler.
pub fn build_lambda_router(state: Arc<AppState>) -> Router {
    Router::new()
        .fallback(authenticate)
        .with_state(state)
        .layer(from_fn(request_context))
}

async fn authenticate(State(state): State<Arc<AppState>>, body: Bytes) -> LookupResponse {
    state.handler.handle_bytes(&body).await
}

async fn request_context(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| FALLBACK_ROUTE_LABEL.to_string());
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let span = info_span!(
        "http.request",
        method = %method,
        path = %path,
        request_id = %request_id
    );

    let start = Instant::now();
    let mut response = async {
        tracing::info!(event = "request_start", method = %method, path = %path);
        next.run(req).await
    }
    .instrument(span.clone())
    .await;

    let status = response.status();
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    {
        let _guard = span.enter();
        tracing::info!(
            event = "request_end",
            method = %method,
            path = %path,
            status = status.as_u16(),
            latency_ms
        );
    }

    if let Some(service) = service_name() {
        http_requests_total().inc(&[service, route.as_str(), status.as_str()], 1);
    }

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

async fn metrics() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static(PROMETHEUS_CONTENT_TYPE),
        )],
        encode_prometheus_metrics(),
    )
}

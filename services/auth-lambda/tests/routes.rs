use std::sync::Arc;

use auth_lambda::{
    build_lambda_router, build_router, AppState, Customer, LookupHandler, MemoryCustomerStore,
    AUTH_ROUTE, FALLBACK_ROUTE_LABEL,
};
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common_auth::PlaceholderTokenIssuer;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

fn state() -> Arc<AppState> {
    let store = MemoryCustomerStore::with_customers([
        Customer::new("12345678900").with_attribute("name", "Ana"),
    ]);
    let handler = LookupHandler::new(Arc::new(store), Arc::new(PlaceholderTokenIssuer::default()));
    Arc::new(AppState::new(handler))
}

async fn post(router: Router, uri: &str, body: impl Into<Body>) -> (StatusCode, Value) {
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.into())
                .unwrap(),
        )
        .await
        .expect("response");

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).expect("json body"))
}

#[tokio::test]
async fn auth_route_returns_customer_and_token() {
    let (status, body) = post(
        build_router(state()),
        AUTH_ROUTE,
        r#"{"cpf": "12345678900"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cliente"]["name"], "Ana");
    assert_eq!(body["token"], "jwt-token-exemplo");
}

#[tokio::test]
async fn request_id_is_echoed_or_generated() {
    let router = build_router(state());

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(AUTH_ROUTE)
                .header("x-request-id", "req-42")
                .body(Body::from(r#"{"cpf": ""}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()["x-request-id"], "req-42");
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(AUTH_ROUTE)
                .body(Body::from(r#"{"cpf": "1"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn lambda_router_accepts_any_path() {
    let (status, body) = post(
        build_lambda_router(state()),
        "/default/auth-lambda",
        r#"{"cpf": "00000000000"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Cliente não encontrado");
}

#[tokio::test]
async fn invalid_utf8_body_is_a_server_error() {
    let (status, body) = post(build_lambda_router(state()), "/", vec![b'{', 0xff, b'}']).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Erro no servidor");
}

#[tokio::test]
async fn health_and_metrics_are_served() {
    common_obs::ObsInit::init("auth-lambda-test").ok();
    let router = build_router(state());

    post(router.clone(), AUTH_ROUTE, r#"{"cpf": "12345678900"}"#).await;

    let response = router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain; version=0.0.4");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("auth_lookups_total{outcome=\"authenticated\"}"));
    assert!(text.contains("process_uptime_seconds"));
}

#[tokio::test]
async fn unmatched_paths_share_one_metrics_series() {
    common_obs::ObsInit::init("auth-lambda-test").ok();
    let router = build_lambda_router(state());

    for idx in 0..5 {
        let uri = format!("/stage-{idx}/caller-chosen");
        post(router.clone(), &uri, r#"{"cpf": "00000000000"}"#).await;
    }
    let response = build_router(state())
        .oneshot(Request::builder().uri("/not/a/route").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let text = common_obs::encode_prometheus_metrics();
    let series: Vec<&str> = text
        .lines()
        .filter(|line| line.starts_with("http_requests_total{"))
        .collect();

    assert!(series
        .iter()
        .all(|line| !line.contains("caller-chosen") && !line.contains("/not/a/route")));
    let fallback_label = format!("route=\"{FALLBACK_ROUTE_LABEL}\",code=\"404\"");
    assert_eq!(
        series
            .iter()
            .filter(|line| line.contains(&fallback_label))
            .count(),
        1
    );
}

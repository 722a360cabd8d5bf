//! Router-level checks: health probe and generated API docs.

mod common;

use axum::http::StatusCode;
use common::TestApp;
use parliament_alerts::api::openapi::ApiDoc;
use utoipa::OpenApi;

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::new().await;

    let response = app.server().get("/healthz").await;

    response.assert_status_ok();
    response.assert_text("ok");
}

#[tokio::test]
async fn test_api_docs_are_served() {
    let app = TestApp::new().await;

    app.server().get("/api-docs").await.assert_status_ok();
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = TestApp::new().await;

    app.server()
        .get("/alerts/nope/nothing")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[test]
fn test_openapi_lists_alert_paths() {
    let (_, api) = utoipa_axum::router::OpenApiRouter::<()>::with_openapi(ApiDoc::openapi())
        .merge(parliament_alerts::api::alerts::router())
        .split_for_parts();

    for path in [
        "/alerts/",
        "/alerts/create",
        "/alerts/{subscription_id}/modify",
        "/alerts/politician/signup",
        "/alerts/politician/subscribe/{signed_key}",
        "/alerts/unsubscribe/{key}",
    ] {
        assert!(api.paths.paths.contains_key(path), "missing {path}");
    }
    assert!(
        api.components
            .unwrap()
            .security_schemes
            .contains_key("AuthenticatedEmail")
    );
}

//! HTTP flows driven through the router without a listening socket.

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use photo_reveal_back::{
    config::AppConfig, dao::game_store::local::LocalGameStore, routes, state::AppState,
};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

async fn app() -> Router {
    let dir = std::env::temp_dir().join(format!("photo-reveal-http-{}", Uuid::new_v4()));
    let backend = LocalGameStore::open(dir).await.unwrap();
    let config = AppConfig {
        verify_delay: Duration::from_millis(20),
        entry_timeout: Duration::from_secs(5),
        ..AppConfig::default()
    };
    routes::router(AppState::with_backend(config, Arc::new(backend)))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, body)
}

fn post_json(uri: &str, payload: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

/// Upload a 2x2 board and return its codes.
async fn upload(app: &Router) -> Vec<String> {
    let (status, _, body) = send(
        app,
        post_json(
            "/admin/photo",
            json!({
                "imageUrl": "data:image/png;base64,iVBORw0KGgo=",
                "gridSize": 2,
                "baseUrl": "https://party.example/reveal"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["artifacts"].as_array().unwrap().len(), 4);
    assert!(
        body["artifacts"][0]["targetUrl"]
            .as_str()
            .unwrap()
            .starts_with("https://party.example/reveal?code=")
    );
    body["game"]["sections"]
        .as_array()
        .unwrap()
        .iter()
        .map(|section| section["code"].as_str().unwrap().to_owned())
        .collect()
}

#[tokio::test]
async fn public_board_hides_codes() {
    let app = app().await;
    let (status, _, _) = send(&app, get("/game")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let codes = upload(&app).await;
    let (status, _, body) = send(&app, get("/game")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 4);
    assert_eq!(body["gridSize"], 2);
    let raw = body.to_string();
    assert!(codes.iter().all(|code| !raw.contains(code.as_str())));
}

#[tokio::test]
async fn typed_codes_unlock_once() {
    let app = app().await;
    let codes = upload(&app).await;

    let (status, _, body) = send(&app, post_json("/unlock", json!({ "code": codes[1] }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "newly_unlocked");
    assert_eq!(body["sectionId"], 1);
    assert_eq!(body["game"]["unlockedCount"], 1);

    let (status, _, body) = send(&app, post_json("/unlock", json!({ "code": codes[1] }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "already_unlocked");

    let (status, _, _) = send(&app, post_json("/unlock", json!({ "code": "WED-NOPE0" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = send(&app, post_json("/unlock", json!({ "code": "" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reset_requires_confirmation() {
    let app = app().await;
    upload(&app).await;

    let (status, _, _) = send(&app, post_json("/admin/reset", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _, _) = send(&app, get("/game")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = send(&app, post_json("/admin/reset", json!({ "confirm": true }))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(&app, get("/game")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn entry_url_redirects_and_leaves_a_notice() {
    let app = app().await;
    let codes = upload(&app).await;

    let (status, headers, _) = send(&app, get(&format!("/?code={}", codes[3]))).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(headers[header::LOCATION], "/");
    let cookie = headers[header::SET_COOKIE]
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_owned();

    let dashboard = Request::get("/")
        .header(header::COOKIE, cookie.as_str())
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&app, dashboard).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"], "resolved");
    assert_eq!(body["notice"]["outcome"], "newly_unlocked");
    assert_eq!(body["notice"]["sectionId"], 3);
    assert_eq!(body["game"]["unlockedCount"], 1);

    let dismiss = Request::post("/visit/dismiss")
        .header(header::COOKIE, cookie.as_str())
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&app, dismiss).await;
    assert_eq!(status, StatusCode::OK);

    let revisit = Request::get("/")
        .header(header::COOKIE, cookie.as_str())
        .body(Body::empty())
        .unwrap();
    let (_, _, body) = send(&app, revisit).await;
    assert_eq!(body["phase"], "idle");
    assert!(body.get("notice").is_none());
}

#[tokio::test]
async fn unknown_entry_code_is_reported_as_invalid() {
    let app = app().await;
    upload(&app).await;

    let (status, headers, _) = send(&app, get("/?code=WED-ZZZZZ&table=7")).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(headers[header::LOCATION], "/?table=7");

    let cookie = headers[header::SET_COOKIE].to_str().unwrap().to_owned();
    let pair = cookie.split(';').next().unwrap();
    let (_, _, body) = send(
        &app,
        Request::get("/")
            .header(header::COOKIE, pair)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(body["notice"]["outcome"], "invalid_code");
    assert_eq!(body["game"]["unlockedCount"], 0);
}

#[tokio::test]
async fn admin_can_unlock_by_section_and_fetch_cards() {
    let app = app().await;
    upload(&app).await;

    let (status, _, body) = send(&app, post_json("/admin/sections/2/unlock", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "newly_unlocked");

    let (status, _, _) = send(&app, post_json("/admin/sections/9/unlock", json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(get("/admin/artifacts/0?baseUrl=https://party.example/"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/svg+xml");

    let (status, _, _) = send(&app, get("/admin/artifacts")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn healthcheck_reports_backend() {
    let app = app().await;
    let (status, _, body) = send(&app, get("/healthcheck")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

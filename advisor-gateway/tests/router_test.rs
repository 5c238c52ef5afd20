//! The router driven in-process, without binding a socket.

mod common;

use advisor_gateway::services::providers::mock::{MockBehavior, MockTextProvider};
use advisor_gateway::startup::{build_router, AppState};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use common::test_config;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn router(behavior: MockBehavior) -> (Router, Arc<MockTextProvider>) {
    let provider = Arc::new(MockTextProvider::new(behavior));
    let state = AppState::new(test_config(), provider.clone());
    (build_router(state), provider)
}

fn chat_request(body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn chat_answers_in_process() {
    let (app, provider) = router(MockBehavior::Echo);

    let response = app
        .oneshot(chat_request(json!({"message": "Is CS 111 required?", "session_id": "s1"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body = body_json(response).await;
    assert_eq!(body["response"], "Mock response for: Is CS 111 required?");
    assert_eq!(body["session_id"], "s1");
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn chat_validation_errors_render_as_json() {
    let (app, provider) = router(MockBehavior::Echo);

    let response = app
        .oneshot(chat_request(json!({"message": "hi", "user_id": ""})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Validation error");
    assert!(body["details"].as_str().unwrap().contains("user_id"));
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn session_lifecycle_through_one_router() {
    let (app, _) = router(MockBehavior::Reply("Start with CS 111.".into()));

    let response = app
        .clone()
        .oneshot(chat_request(json!({"message": "hi", "user_id": "ana", "session_id": "fall"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let listed = app
        .clone()
        .oneshot(Request::get("/sessions").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(body_json(listed).await["sessions"], json!(["ana_fall"]));

    let deleted = app
        .clone()
        .oneshot(
            Request::delete("/session/ana/fall")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::OK);
    assert_eq!(body_json(deleted).await["message"], "Session ana_fall deleted");

    let listed = app
        .oneshot(Request::get("/sessions").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(body_json(listed).await["active_sessions"], 0);
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let (app, _) = router(MockBehavior::Echo);

    let response = app
        .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

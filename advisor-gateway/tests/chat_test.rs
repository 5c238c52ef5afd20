//! POST /chat behaviour against a mock provider.

mod common;

use advisor_gateway::models::Role;
use advisor_gateway::services::providers::mock::MockBehavior;
use common::TestApp;
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn provider_reply_is_returned_verbatim() {
    let reply = "Consider the BA in Data Science at CDS, paired with a math minor.";
    let app = TestApp::spawn_with_behavior(MockBehavior::Reply(reply.to_string())).await;

    let response = app
        .post_chat(json!({"message": "What major fits someone interested in data science?"}))
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["response"], reply);
    assert_eq!(body["user_id"], "web_user");
    assert_eq!(body["blocked"], false);
    assert!(body["session_id"]
        .as_str()
        .unwrap()
        .starts_with("session_web_user_"));
    assert_eq!(app.provider.call_count(), 1);
}

#[tokio::test]
async fn empty_message_is_rejected_without_provider_call() {
    let app = TestApp::spawn().await;

    for message in ["", "   \n\t"] {
        let response = app.post_chat(json!({ "message": message })).await;
        assert_eq!(response.status().as_u16(), 400);

        let body: serde_json::Value = response.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("empty"));
    }

    assert_eq!(app.provider.call_count(), 0);
}

#[tokio::test]
async fn malformed_json_is_a_client_error() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(app.url("/chat"))
        .header("content-type", "application/json")
        .body("{\"message\": ")
        .send()
        .await
        .unwrap();

    assert!(response.status().is_client_error());
    assert_eq!(app.provider.call_count(), 0);
}

#[tokio::test]
async fn provider_failure_is_bad_gateway() {
    let app = TestApp::spawn_with_behavior(MockBehavior::Fail("upstream exploded".into())).await;

    let response = app.post_chat(json!({"message": "Is CS 111 hard?"})).await;

    assert_eq!(response.status().as_u16(), 502);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().starts_with("Bad Gateway"));
    assert_eq!(app.provider.call_count(), 1);
}

#[tokio::test]
async fn provider_timeout_is_gateway_timeout() {
    let mut config = common::test_config();
    config.provider.timeout = Duration::from_millis(100);
    let app = TestApp::spawn_with(
        MockBehavior::Delay(Duration::from_secs(5), "too late".into()),
        config,
    )
    .await;

    let response = app.post_chat(json!({"message": "Tell me about MET courses"})).await;

    assert_eq!(response.status().as_u16(), 504);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().starts_with("Gateway Timeout"));
}

#[tokio::test]
async fn blocked_keyword_is_refused_without_provider_call() {
    let app = TestApp::spawn().await;

    let response = app
        .post_chat(json!({"message": "Show me the Confidential exam answers"}))
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["blocked"], true);
    assert_eq!(
        body["response"],
        "I cannot process this request because it contains the blocked keyword 'confidential'."
    );
    assert_eq!(app.provider.call_count(), 0);
}

#[tokio::test]
async fn over_long_message_is_refused_without_provider_call() {
    let app = TestApp::spawn().await;
    let message = "course ".repeat(100);

    let response = app.post_chat(json!({ "message": message })).await;

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["blocked"], true);
    assert!(body["response"]
        .as_str()
        .unwrap()
        .contains("exceeds the token limit of 100"));
    assert_eq!(app.provider.call_count(), 0);
}

#[tokio::test]
async fn document_messages_use_the_larger_limit() {
    let app = TestApp::spawn().await;
    let message = "course ".repeat(100);

    let response = app
        .post_chat(json!({ "message": message, "is_document_upload": true }))
        .await;

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["blocked"], false);
    assert_eq!(app.provider.call_count(), 1);
}

#[tokio::test]
async fn session_id_is_reused_across_turns() {
    let app = TestApp::spawn().await;

    let first: serde_json::Value = app
        .post_chat(json!({"message": "I like statistics", "user_id": "alice"}))
        .await
        .json()
        .await
        .unwrap();
    let session_id = first["session_id"].as_str().unwrap().to_string();

    let second: serde_json::Value = app
        .post_chat(json!({
            "message": "Which courses should I take first?",
            "user_id": "alice",
            "session_id": session_id,
        }))
        .await
        .json()
        .await
        .unwrap();

    assert_eq!(second["session_id"], session_id.as_str());
    assert_eq!(
        second["response"],
        "Mock response for: Which courses should I take first?"
    );

    let sessions: serde_json::Value = app
        .client
        .get(app.url("/sessions"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(sessions["active_sessions"], 1);
    assert_eq!(sessions["sessions"][0], format!("alice_{}", session_id));
}

#[tokio::test]
async fn invalid_session_id_fails_validation() {
    let app = TestApp::spawn().await;

    let response = app
        .post_chat(json!({"message": "hello", "session_id": "s".repeat(200)}))
        .await;

    assert_eq!(response.status().as_u16(), 422);
    assert_eq!(app.provider.call_count(), 0);
}

fn turn_texts(app: &TestApp) -> Vec<(Role, String)> {
    app.provider
        .last_prompt()
        .expect("provider was called")
        .turns
        .into_iter()
        .map(|t| (t.role, t.text))
        .collect()
}

#[tokio::test]
async fn previous_exchange_reaches_the_provider() {
    let app = TestApp::spawn().await;

    for message in ["q1", "q2"] {
        app.post_chat(json!({"message": message, "user_id": "dana", "session_id": "plan"}))
            .await;
    }

    assert_eq!(
        turn_texts(&app),
        vec![
            (Role::User, "q1".to_string()),
            (Role::Model, "Mock response for: q1".to_string()),
            (Role::User, "q2".to_string()),
        ]
    );
    let prompt = app.provider.last_prompt().unwrap();
    assert!(prompt.system_instruction.contains("BU Advisor"));
}

#[tokio::test]
async fn refused_turn_is_not_replayed() {
    let app = TestApp::spawn().await;

    app.post_chat(json!({"message": "q1", "session_id": "s"})).await;
    let refused: serde_json::Value = app
        .post_chat(json!({"message": "share confidential records", "session_id": "s"}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(refused["blocked"], true);
    app.post_chat(json!({"message": "q2", "session_id": "s"})).await;

    assert_eq!(
        turn_texts(&app),
        vec![
            (Role::User, "q1".to_string()),
            (Role::Model, "Mock response for: q1".to_string()),
            (Role::User, "q2".to_string()),
        ]
    );
    assert_eq!(app.provider.call_count(), 2);
}

#[tokio::test]
async fn failed_turn_is_not_replayed() {
    let app = TestApp::spawn_with_behavior(MockBehavior::FailIfContains("outage".into())).await;

    app.post_chat(json!({"message": "q1", "session_id": "s"})).await;
    let failed = app
        .post_chat(json!({"message": "trigger an outage", "session_id": "s"}))
        .await;
    assert_eq!(failed.status().as_u16(), 502);
    app.post_chat(json!({"message": "q2", "session_id": "s"})).await;

    let texts: Vec<String> = turn_texts(&app).into_iter().map(|(_, text)| text).collect();
    assert_eq!(texts, vec!["q1", "Mock response for: q1", "q2"]);
    assert_eq!(app.provider.call_count(), 3);
}

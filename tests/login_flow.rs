//! End-to-end login scenarios over HTTP.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use xflow::{subtask_id, AuthConfig, AuthError, Credentials, UserAuth};

fn config_for(server: &MockServer) -> AuthConfig {
    AuthConfig {
        api_url: server.uri(),
        timeout: Duration::from_secs(5),
        ..AuthConfig::default()
    }
}

fn credentials() -> Credentials {
    Credentials::new("nighthawk", "hunter2").with_email("nighthawk@example.com")
}

async fn mount_guest_activation(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/1.1/guest/activate.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"guest_token": "guest-token-1"}))
                .insert_header("set-cookie", "guest_id=v1%3A1700000000; Path=/"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn full_login_flow_authenticates_and_accumulates_cookies() {
    let server = MockServer::start().await;
    mount_guest_activation(&server).await;

    // Init round: queued js instrumentation.
    Mock::given(method("POST"))
        .and(path("/1.1/onboarding/task.json"))
        .and(query_param("flow_name", "login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "flow_token": "t1",
                    "status": "success",
                    "subtasks": [{"subtask_id": subtask_id::JS_INSTRUMENTATION}],
                }))
                .insert_header("set-cookie", "att=1-instrumented; Path=/"),
        )
        .expect(1)
        .mount(&server)
        .await;

    // Round 2: instrumentation answered, identifier requested.
    Mock::given(method("POST"))
        .and(path("/1.1/onboarding/task.json"))
        .and(body_string_contains(subtask_id::JS_INSTRUMENTATION))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "flow_token": "t2",
                    "status": "success",
                    "subtasks": [{"subtask_id": subtask_id::ENTER_USER_IDENTIFIER}],
                }))
                .insert_header("set-cookie", "ct0=csrf-value; Path=/"),
        )
        .expect(1)
        .mount(&server)
        .await;

    // Round 3: identifier answered, password requested.
    Mock::given(method("POST"))
        .and(path("/1.1/onboarding/task.json"))
        .and(body_string_contains(subtask_id::ENTER_USER_IDENTIFIER))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "flow_token": "t3",
                    "status": "success",
                    "subtasks": [{"subtask_id": subtask_id::ENTER_PASSWORD}],
                }))
                .insert_header("set-cookie", "_twitter_sess=sess-value; Path=/"),
        )
        .expect(1)
        .mount(&server)
        .await;

    // Round 4: password accepted, terminal subtask queued.
    Mock::given(method("POST"))
        .and(path("/1.1/onboarding/task.json"))
        .and(body_string_contains(subtask_id::ENTER_PASSWORD))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "flow_token": "t4",
                    "status": "success",
                    "subtasks": [{"subtask_id": subtask_id::SUCCESS}],
                }))
                .insert_header("set-cookie", "auth_token=session-auth; Path=/; HttpOnly"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut auth = UserAuth::new(config_for(&server)).unwrap();
    auth.login(&credentials()).await.unwrap();

    assert!(auth.session().authenticated());
    assert_eq!(auth.session().guest_token(), Some("guest-token-1"));

    // Every intermediate response contributed to the jar.
    let cookies = auth.session().cookies();
    assert_eq!(cookies.get("guest_id"), Some("v1%3A1700000000"));
    assert_eq!(cookies.get("att"), Some("1-instrumented"));
    assert_eq!(cookies.get("ct0"), Some("csrf-value"));
    assert_eq!(cookies.get("_twitter_sess"), Some("sess-value"));
    assert_eq!(cookies.get("auth_token"), Some("session-auth"));
}

#[tokio::test]
async fn deny_subtask_fails_even_without_error_entries() {
    let server = MockServer::start().await;
    mount_guest_activation(&server).await;

    Mock::given(method("POST"))
        .and(path("/1.1/onboarding/task.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "flow_token": "t1",
            "status": "success",
            "subtasks": [{"subtask_id": subtask_id::DENY_LOGIN}],
            "errors": [],
        })))
        .mount(&server)
        .await;

    let mut auth = UserAuth::new(config_for(&server)).unwrap();
    let err = auth.login(&credentials()).await.unwrap_err();

    match err {
        AuthError::Subtask { subtask, source } => {
            assert_eq!(subtask, "LoginFlowInit");
            assert!(matches!(*source, AuthError::Denied));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!auth.session().authenticated());
}

#[tokio::test]
async fn remote_error_entries_are_surfaced_first() {
    let server = MockServer::start().await;
    mount_guest_activation(&server).await;

    Mock::given(method("POST"))
        .and(path("/1.1/onboarding/task.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "flow_token": "t1",
            "subtasks": [{"subtask_id": subtask_id::DENY_LOGIN}],
            "errors": [{"code": 399, "message": "Incorrect. Please try again."}],
        })))
        .mount(&server)
        .await;

    let mut auth = UserAuth::new(config_for(&server)).unwrap();
    let err = auth.login(&credentials()).await.unwrap_err();

    match err {
        AuthError::Subtask { source, .. } => match *source {
            AuthError::Flow { code, message } => {
                assert_eq!(code, 399);
                assert!(message.contains("Incorrect"));
            }
            other => panic!("unexpected source: {other:?}"),
        },
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn missing_flow_token_is_a_protocol_violation() {
    let server = MockServer::start().await;
    mount_guest_activation(&server).await;

    Mock::given(method("POST"))
        .and(path("/1.1/onboarding/task.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "subtasks": [{"subtask_id": subtask_id::ENTER_PASSWORD}],
        })))
        .mount(&server)
        .await;

    let mut auth = UserAuth::new(config_for(&server)).unwrap();
    let err = auth.login(&credentials()).await.unwrap_err();

    match err {
        AuthError::Subtask { source, .. } => assert!(matches!(*source, AuthError::Protocol(_))),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn non_success_status_maps_to_api_error() {
    let server = MockServer::start().await;
    mount_guest_activation(&server).await;

    Mock::given(method("POST"))
        .and(path("/1.1/onboarding/task.json"))
        .respond_with(
            ResponseTemplate::new(403).set_body_string(r#"{"errors":[{"code":200}]}"#),
        )
        .mount(&server)
        .await;

    let mut auth = UserAuth::new(config_for(&server)).unwrap();
    let err = auth.login(&credentials()).await.unwrap_err();

    match err {
        AuthError::Subtask { source, .. } => match *source {
            AuthError::Api { status, .. } => assert_eq!(status, 403),
            other => panic!("unexpected source: {other:?}"),
        },
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn is_authenticated_accepts_clean_verification() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/1.1/account/verify_credentials.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 20,
            "screen_name": "nighthawk",
        })))
        .mount(&server)
        .await;

    let mut auth = UserAuth::new(config_for(&server)).unwrap();
    assert!(auth.is_authenticated().await);
}

#[tokio::test]
async fn is_authenticated_rejects_error_bodies() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/1.1/account/verify_credentials.json"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "errors": [{"code": 32, "message": "Could not authenticate you."}],
        })))
        .mount(&server)
        .await;

    let mut auth = UserAuth::new(config_for(&server)).unwrap();
    assert!(!auth.is_authenticated().await);
}

#[tokio::test]
async fn is_authenticated_never_raises_when_unreachable() {
    // Nothing listens on the discard port; the connection is refused.
    let config = AuthConfig {
        api_url: "http://127.0.0.1:9".into(),
        timeout: Duration::from_secs(2),
        ..AuthConfig::default()
    };

    let mut auth = UserAuth::new(config).unwrap();
    assert!(!auth.is_authenticated().await);
}

#[tokio::test]
async fn logout_without_token_skips_the_network() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/1.1/account/logout.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(0)
        .mount(&server)
        .await;

    let mut auth = UserAuth::new(config_for(&server)).unwrap();
    auth.logout().await;
    assert!(auth.session().guest_token().is_none());
}

#[tokio::test]
async fn logout_clears_token_and_cookies() {
    let server = MockServer::start().await;
    mount_guest_activation(&server).await;

    Mock::given(method("POST"))
        .and(path("/1.1/account/logout.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut auth = UserAuth::new(config_for(&server)).unwrap();
    auth.refresh_guest_token().await.unwrap();
    assert!(auth.session().guest_token().is_some());
    assert!(!auth.session().cookies().is_empty());

    auth.logout().await;
    assert!(auth.session().guest_token().is_none());
    assert!(auth.session().cookies().is_empty());
    assert!(!auth.session().authenticated());
}

#[tokio::test]
async fn logout_clears_state_even_when_the_endpoint_fails() {
    let server = MockServer::start().await;
    mount_guest_activation(&server).await;

    Mock::given(method("POST"))
        .and(path("/1.1/account/logout.json"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    let mut auth = UserAuth::new(config_for(&server)).unwrap();
    auth.refresh_guest_token().await.unwrap();

    auth.logout().await;
    assert!(auth.session().guest_token().is_none());
    assert!(auth.session().cookies().is_empty());
}

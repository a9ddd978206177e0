mod common;

use common::*;
use emvue::{Requester, RetryPolicy, SimulatedRequester, TokenSet};
use reqwest::Method;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn simulator(server: &MockServer, sleeper: Arc<RecordingSleeper>) -> SimulatedRequester {
    SimulatedRequester::new(
        server.uri(),
        Some(EMAIL.to_string()),
        Some("password".to_string()),
    )
    .with_retry_policy(RetryPolicy::new(2, Duration::from_millis(50)))
    .with_sleeper(sleeper)
}

#[tokio::test]
async fn test_requests_carry_simulator_token() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/customers/devices"))
        .and(header("authtoken", "simulator"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .expect(1)
        .mount(&server)
        .await;

    let mut requester = simulator(&server, Arc::new(RecordingSleeper::default()));
    let response = requester
        .request(Method::GET, "customers/devices", None)
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(requester.tokens(), Some(&TokenSet::simulator()));
}

#[tokio::test]
async fn test_json_body_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/devices/outlet"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut requester = simulator(&server, Arc::new(RecordingSleeper::default()));
    let body = serde_json::json!({"deviceGid": 1, "outletOn": true});
    requester
        .request(Method::PUT, "devices/outlet", Some(&body))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_unauthorized_is_retried_once_with_same_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/customers/devices"))
        .and(header("authtoken", "simulator"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let mut requester = simulator(&server, sleeper.clone());
    let response = requester
        .request(Method::GET, "customers/devices", None)
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn test_server_errors_use_the_same_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/customers/devices"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let mut requester = simulator(&server, sleeper.clone());
    let response = requester
        .request(Method::GET, "customers/devices", None)
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
    assert_eq!(sleeper.delays(), vec![Duration::from_millis(50)]);
}

#[tokio::test]
async fn test_username() {
    let server = MockServer::start().await;
    let mut requester = simulator(&server, Arc::new(RecordingSleeper::default()));
    assert_eq!(requester.username().await.unwrap(), EMAIL);
    assert_eq!(requester.password(), Some("password"));
    assert_eq!(requester.host(), server.uri());
}

//! Integration tests for the session lifecycle: login/data/logout ordering,
//! cookie propagation, and failure paths.
//!
//! Infrastructure: a WireMock server standing in for a Nolij Web instance
//! hosted under a `/App` path prefix, so every test also exercises base-path
//! preservation in URL joining.

use std::collections::HashMap;

use nolijweb_client::{ConfigSource, Connection, NolijError, Payload, RequestOptions};
use serde_json::json;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LOGIN: &str = "/App/j_spring_security_check";
const LOGOUT: &str = "/App/j_spring_security_logout";

fn connection_for(server: &MockServer) -> Connection {
    let source = ConfigSource::from_value(json!({
        "username": "u",
        "password": "p",
        "base_url": format!("{}/App", server.uri()),
    }))
    .expect("config source");
    Connection::new(source).expect("connection")
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(LOGIN))
        .and(body_string("j_username=u&j_password=p"))
        .respond_with(ResponseTemplate::new(302).insert_header("Set-Cookie", "a=b"))
        .mount(server)
        .await;
}

async fn mount_logout(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(LOGOUT))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

fn request_trace(requests: &[wiremock::Request]) -> Vec<(String, String)> {
    requests.iter().map(|r| (r.method.to_string(), r.url.path().to_string())).collect()
}

#[tokio::test]
async fn close_on_a_never_opened_connection_is_a_noop() {
    let server = MockServer::start().await;
    let mut conn = connection_for(&server);

    conn.close().await.expect("close");

    assert!(!conn.is_open());
    assert!(conn.cookies().is_empty());
    let requests = server.received_requests().await.expect("requests");
    assert!(requests.is_empty(), "close must not issue any network call");
}

#[tokio::test]
async fn establish_then_close_sends_one_login_and_one_logout() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_logout(&server).await;
    let mut conn = connection_for(&server);

    let opened = conn.establish().await.expect("establish");
    assert!(opened);
    assert!(conn.is_open());
    assert_eq!(conn.cookies().get("a").map(String::as_str), Some("b"));

    conn.close().await.expect("close");
    assert!(!conn.is_open());
    assert!(conn.cookies().is_empty());
    assert!(conn.headers().is_empty());

    let requests = server.received_requests().await.expect("requests");
    assert_eq!(
        request_trace(&requests),
        vec![
            ("POST".to_string(), LOGIN.to_string()),
            ("GET".to_string(), LOGOUT.to_string()),
        ]
    );
}

#[tokio::test]
async fn login_answered_with_plain_200_still_opens_the_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(LOGIN))
        .respond_with(ResponseTemplate::new(200).insert_header("Set-Cookie", "a=b"))
        .mount(&server)
        .await;
    mount_logout(&server).await;
    let mut conn = connection_for(&server);

    assert!(conn.establish().await.expect("establish"));
    assert_eq!(conn.cookies().get("a").map(String::as_str), Some("b"));
    conn.close().await.expect("close");
}

#[tokio::test]
async fn one_shot_get_wraps_the_request_in_login_and_logout() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_logout(&server).await;
    Mock::given(method("GET"))
        .and(path("/App/go"))
        .and(header("Cookie", "a=b"))
        .respond_with(ResponseTemplate::new(200).set_body_string("went"))
        .expect(1)
        .mount(&server)
        .await;

    let mut conn = connection_for(&server);
    let response = conn.get("go", &RequestOptions::default()).await.expect("response");

    assert_eq!(response.status, 200);
    assert_eq!(response.text(), "went");
    assert!(!conn.is_open());
    assert!(conn.cookies().is_empty());

    let requests = server.received_requests().await.expect("requests");
    assert_eq!(
        request_trace(&requests),
        vec![
            ("POST".to_string(), LOGIN.to_string()),
            ("GET".to_string(), "/App/go".to_string()),
            ("GET".to_string(), LOGOUT.to_string()),
        ]
    );

    // the logout call carries the session cookie jar
    let logout = &requests[2];
    assert_eq!(logout.headers.get("cookie").and_then(|v| v.to_str().ok()), Some("a=b"));
}

#[tokio::test]
async fn one_shot_post_sends_the_form_payload() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_logout(&server).await;
    Mock::given(method("POST"))
        .and(path("/App/submit"))
        .and(body_string("k=v"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut conn = connection_for(&server);
    let payload = Payload::Form(vec![("k".to_string(), "v".to_string())]);
    conn.post("submit", payload, &RequestOptions::default()).await.expect("response");

    let requests = server.received_requests().await.expect("requests");
    assert_eq!(requests.len(), 3);
}

#[tokio::test]
async fn manual_calls_share_one_session() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_logout(&server).await;
    Mock::given(method("GET"))
        .and(path("/App/go"))
        .and(header("Cookie", "a=b"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&server)
        .await;

    let mut conn = connection_for(&server);
    conn.establish().await.expect("establish");
    for _ in 0..3 {
        conn.get_in_session("go", &RequestOptions::default()).await.expect("response");
    }
    conn.close().await.expect("close");

    let requests = server.received_requests().await.expect("requests");
    let trace = request_trace(&requests);
    assert_eq!(trace.len(), 5, "1 login + 3 data + 1 logout");
    assert_eq!(trace[0].1, LOGIN);
    assert_eq!(trace[4].1, LOGOUT);
    assert!(trace[1..4].iter().all(|(_, p)| p == "/App/go"));
}

#[tokio::test]
async fn per_call_cookies_override_the_session_jar() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_logout(&server).await;
    Mock::given(method("GET"))
        .and(path("/App/go"))
        .and(header("Cookie", "a=z; extra=1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut conn = connection_for(&server);
    conn.establish().await.expect("establish");

    let caller_cookies: HashMap<String, String> = [
        ("a".to_string(), "z".to_string()),
        ("extra".to_string(), "1".to_string()),
    ]
    .into_iter()
    .collect();
    let opts = RequestOptions { cookies: caller_cookies.clone(), ..RequestOptions::default() };
    conn.get_in_session("go", &opts).await.expect("response");

    // the caller's map and the session jar are both left untouched
    assert_eq!(opts.cookies, caller_cookies);
    assert_eq!(conn.cookies().get("a").map(String::as_str), Some("b"));

    conn.close().await.expect("close");
}

#[tokio::test]
async fn one_shot_get_with_rejected_login_sends_no_data_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(LOGIN))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let mut conn = connection_for(&server);
    let err = conn.get("go", &RequestOptions::default()).await.unwrap_err();

    assert!(matches!(err, NolijError::Http { status: 401, .. }));
    assert!(!conn.is_open());

    let requests = server.received_requests().await.expect("requests");
    assert_eq!(requests.len(), 1, "only the login attempt goes out");
}

#[tokio::test]
async fn session_expiry_surfaces_as_authentication_error_after_cleanup() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_logout(&server).await;
    Mock::given(method("GET"))
        .and(path("/App/go"))
        .respond_with(ResponseTemplate::new(302))
        .mount(&server)
        .await;

    let mut conn = connection_for(&server);
    let err = conn.get("go", &RequestOptions::default()).await.unwrap_err();

    assert!(matches!(err, NolijError::Auth(_)));
    assert!(err.to_string().contains("not logged in"));
    assert!(!conn.is_open());

    // close still ran: login, data, logout
    let requests = server.received_requests().await.expect("requests");
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[2].url.path(), LOGOUT);
}

#[tokio::test]
async fn unexpected_statuses_propagate_with_their_body() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_logout(&server).await;
    Mock::given(method("GET"))
        .and(path("/App/go"))
        .respond_with(ResponseTemplate::new(503).set_body_string("oops"))
        .mount(&server)
        .await;

    let mut conn = connection_for(&server);
    let err = conn.get("go", &RequestOptions::default()).await.unwrap_err();

    match err {
        NolijError::Http { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body, "oops");
        }
        other => panic!("expected HTTP error, got {other:?}"),
    }

    let requests = server.received_requests().await.expect("requests");
    assert_eq!(requests.len(), 3, "logout still runs after the failure");
}

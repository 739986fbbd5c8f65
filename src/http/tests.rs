use super::*;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn url_for(server: &MockServer, route: &str) -> Url {
    Url::parse(&server.uri())
        .and_then(|base| base.join(route))
        .expect("mock server url should parse")
}

#[tokio::test]
async fn get_text_returns_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<rss/>"))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::default();
    let body = client
        .get_text(&url_for(&server, "/feed.xml"))
        .expect("request should succeed");

    assert_eq!(body, "<rss/>");
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::default().with_retry_attempts(3);
    let err = client
        .get_text(&url_for(&server, "/missing"))
        .expect_err("404 should fail");

    assert!(err.to_string().contains("404"));
}

#[tokio::test]
async fn single_attempt_by_default() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::default();
    assert_eq!(client.retry_attempts(), 1);
    assert!(client.get_text(&url_for(&server, "/flaky")).is_err());
}

#[tokio::test]
async fn server_errors_retry_when_enabled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::default().with_retry_attempts(2);
    let body = client
        .get_text(&url_for(&server, "/flaky"))
        .expect("second attempt should succeed");

    assert_eq!(body, "recovered");
}

#[tokio::test]
async fn post_json_sends_body_and_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(header("x-goog-api-key", "secret"))
        .and(body_json(json!({"model": "m", "input": ["a"]})))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::default();
    let body = client
        .post_json(
            &url_for(&server, "/api/embed"),
            &json!({"model": "m", "input": ["a"]}),
            &[("x-goog-api-key", "secret")],
        )
        .expect("post should succeed");

    assert_eq!(body, "{}");
}

#[test]
fn retry_attempts_never_zero() {
    let client = HttpClient::new(Duration::from_secs(1), 0);
    assert_eq!(client.retry_attempts(), 1);
}

use super::*;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> GeminiClient {
    let mut config = Config::default();
    config.generation.temperature = 0.5;
    GeminiClient::with_api_key(&config, "test-key".to_string())
        .expect("should build client")
        .with_base_url(Url::parse(&server.uri()).expect("mock uri should parse"))
}

fn text_response(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{
            "content": {"parts": [{"text": text}], "role": "model"},
            "finishReason": "STOP"
        }]
    }))
}

#[test]
fn missing_api_key_fails_at_construction() {
    let mut config = Config::default();
    config.gemini.api_key_env = "RAG_CHAT_TEST_KEY_THAT_IS_NEVER_SET".to_string();

    let err = GeminiClient::new(&config).expect_err("should fail without key");
    assert!(matches!(
        err,
        RagError::Config(ConfigError::MissingApiKey(var)) if var == "RAG_CHAT_TEST_KEY_THAT_IS_NEVER_SET"
    ));
}

#[test]
fn debug_output_hides_the_key() {
    let client = GeminiClient::with_api_key(&Config::default(), "super-secret".to_string())
        .expect("should build client");
    assert!(!format!("{client:?}").contains("super-secret"));
}

#[tokio::test]
async fn complete_posts_generate_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_json(json!({
            "contents": [{"role": "user", "parts": [{"text": "Hello"}]}],
            "generationConfig": {"temperature": 0.5}
        })))
        .respond_with(text_response("Hi there"))
        .expect(1)
        .mount(&server)
        .await;

    let completion = client_for(&server).complete("Hello").expect("should complete");
    assert_eq!(completion, Completion::Text("Hi there".to_string()));
}

#[tokio::test]
async fn chat_sends_model_role_for_assistant_turns() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .and(body_json(json!({
            "contents": [
                {"role": "user", "parts": [{"text": "I live in Lisbon."}]},
                {"role": "model", "parts": [{"text": "Noted."}]},
                {"role": "user", "parts": [{"text": "Where do I live?"}]}
            ],
            "generationConfig": {"temperature": 0.5}
        })))
        .respond_with(text_response("Lisbon."))
        .expect(1)
        .mount(&server)
        .await;

    let turns = [
        ConversationTurn::user("I live in Lisbon."),
        ConversationTurn::assistant("Noted."),
        ConversationTurn::user("Where do I live?"),
    ];
    let completion = client_for(&server).chat(&turns).expect("should chat");
    assert_eq!(completion, Completion::Text("Lisbon.".to_string()));
}

#[tokio::test]
async fn joins_multiple_parts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "Hello, "}, {"text": "world"}]}}]
        })))
        .mount(&server)
        .await;

    let completion = client_for(&server).complete("greet").expect("should complete");
    assert_eq!(completion, Completion::Text("Hello, world".to_string()));
}

#[tokio::test]
async fn prompt_feedback_block_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        })))
        .mount(&server)
        .await;

    let completion = client_for(&server).complete("bad").expect("should complete");
    assert_eq!(
        completion,
        Completion::Blocked {
            reason: "SAFETY".to_string()
        }
    );
}

#[tokio::test]
async fn withheld_candidate_is_blocked_and_missing_candidates_are_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"finishReason": "RECITATION"}]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert_eq!(
        client.complete("one").expect("should complete"),
        Completion::Blocked {
            reason: "RECITATION".to_string()
        }
    );
    assert_eq!(client.complete("two").expect("should complete"), Completion::Empty);
}

#[tokio::test]
async fn http_errors_become_generation_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = client_for(&server).complete("hi").expect_err("should fail");
    assert!(matches!(err, RagError::Generation(msg) if msg.contains("403")));
}

use super::non_empty;
use super::test_ollama_connection as test_ollama_connection_impl;
use crate::config::OllamaConfig;

#[test]
fn model_names_must_not_be_blank() {
    assert!(non_empty(&"llama3:8b".to_string()).is_ok());
    assert!(non_empty(&String::new()).is_err());
    assert!(non_empty(&"   ".to_string()).is_err());
}

#[test]
fn unreachable_ollama_reports_failure() {
    let ollama = OllamaConfig {
        host: "127.0.0.1".to_string(),
        port: 1,
        ..OllamaConfig::default()
    };

    assert!(!test_ollama_connection_impl(&ollama));
}

// Shared fakes for integration tests
#![allow(dead_code, reason = "not every test binary uses every helper")]

use std::sync::Mutex;

use rag_chat::Result;
use rag_chat::embeddings::Embedder;
use rag_chat::llm::{Completion, LanguageModel};
use rag_chat::session::ConversationTurn;

/// Hashes words into buckets, so texts sharing vocabulary embed close together
pub struct WordEmbedder {
    pub dimension: usize,
}

impl WordEmbedder {
    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let hash = word
                .to_lowercase()
                .bytes()
                .fold(0xcbf2_9ce4_8422_2325_u64, |h, b| {
                    (h ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
                });
            vector[(hash % self.dimension as u64) as usize] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        } else {
            vector[0] = 1.0;
        }
        vector
    }
}

impl Embedder for WordEmbedder {
    fn model_name(&self) -> &str {
        "word-embedder"
    }

    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

/// Answers with the prompt it was given and keeps a log of prompts
#[derive(Default)]
pub struct EchoModel {
    pub prompts: Mutex<Vec<String>>,
}

impl EchoModel {
    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().expect("prompt log poisoned").len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts
            .lock()
            .expect("prompt log poisoned")
            .last()
            .cloned()
    }
}

impl LanguageModel for EchoModel {
    fn model_name(&self) -> &str {
        "echo"
    }

    fn complete(&self, prompt: &str) -> Result<Completion> {
        self.prompts
            .lock()
            .expect("prompt log poisoned")
            .push(prompt.to_string());
        Ok(Completion::Text(format!("Based on the context: {prompt}")))
    }

    fn chat(&self, turns: &[ConversationTurn]) -> Result<Completion> {
        let last = turns.last().map_or("", |turn| turn.text.as_str());
        self.complete(last)
    }
}

// Deterministic stand-ins for the network providers

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::embeddings::Embedder;
use crate::llm::{Completion, LanguageModel};
use crate::session::ConversationTurn;
use crate::{RagError, Result};

/// Bag-of-words embedder: each word is hashed into one of `dimension` buckets
/// and the vector is L2-normalised, so texts sharing words land close together.
#[derive(Debug)]
pub struct HashEmbedder {
    dimension: usize,
    calls: AtomicUsize,
}

impl HashEmbedder {
    pub const fn new(dimension: usize) -> Self {
        Self {
            dimension,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let bucket = fnv1a(&word.to_lowercase()) % self.dimension as u64;
            vector[bucket as usize] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        } else {
            vector[0] = 1.0;
        }
        vector
    }
}

impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-embedder"
    }

    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

/// Embedder whose provider is always down
#[derive(Debug, Default)]
pub struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing-embedder"
    }

    fn embed_documents(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(RagError::Embedding("connection refused".to_string()))
    }
}

#[derive(Debug, Clone)]
pub enum Reply {
    /// Answer with the prompt (or last chat turn) prefixed by `ANSWER: `
    Echo,
    Fixed(Completion),
    Fail(String),
}

/// Language model that records every call
#[derive(Debug)]
pub struct RecordingModel {
    reply: Reply,
    prompts: Mutex<Vec<String>>,
    chats: Mutex<Vec<Vec<ConversationTurn>>>,
}

impl RecordingModel {
    pub const fn new(reply: Reply) -> Self {
        Self {
            reply,
            prompts: Mutex::new(Vec::new()),
            chats: Mutex::new(Vec::new()),
        }
    }

    pub fn echo() -> Self {
        Self::new(Reply::Echo)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompt log poisoned").clone()
    }

    pub fn chats(&self) -> Vec<Vec<ConversationTurn>> {
        self.chats.lock().expect("chat log poisoned").clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts().len() + self.chats().len()
    }

    fn respond(&self, input: &str) -> Result<Completion> {
        match &self.reply {
            Reply::Echo => Ok(Completion::Text(format!("ANSWER: {input}"))),
            Reply::Fixed(completion) => Ok(completion.clone()),
            Reply::Fail(message) => Err(RagError::Generation(message.clone())),
        }
    }
}

impl LanguageModel for RecordingModel {
    fn model_name(&self) -> &str {
        "recording-model"
    }

    fn complete(&self, prompt: &str) -> Result<Completion> {
        self.prompts
            .lock()
            .expect("prompt log poisoned")
            .push(prompt.to_string());
        self.respond(prompt)
    }

    fn chat(&self, turns: &[ConversationTurn]) -> Result<Completion> {
        self.chats
            .lock()
            .expect("chat log poisoned")
            .push(turns.to_vec());
        let last = turns.last().map_or("", |turn| turn.text.as_str());
        self.respond(last)
    }
}

fn fnv1a(text: &str) -> u64 {
    text.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}


use std::sync::Arc;

use itertools::Itertools;
use tracing::debug;

use crate::llm::{Completion, LanguageModel};
use crate::retriever::RetrievedChunk;
use crate::{RagError, Result};

const CONTEXT_SLOT: &str = "{context}";
const QUESTION_SLOT: &str = "{question}";

pub const DEFAULT_TEMPLATE: &str = "You are a helpful assistant that answers questions based on the provided context from PDF documents.
Use the following pieces of context to answer the question. If you don't know the answer based on the context, just say that you don't know.
Don't try to make up an answer. Keep your answers concise and relevant.

Context:
{context}

Question: {question}

Answer:";

/// Instruction prompt with `{context}` and `{question}` slots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    #[inline]
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        for slot in [CONTEXT_SLOT, QUESTION_SLOT] {
            if !text.contains(slot) {
                return Err(RagError::Validation(format!(
                    "prompt template is missing the {slot} placeholder"
                )));
            }
        }
        Ok(Self { text })
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Fill both slots. Placeholder text inside the substituted values is left alone.
    #[inline]
    pub fn render(&self, context: &str, question: &str) -> String {
        self.text
            .split(CONTEXT_SLOT)
            .map(|part| part.replace(QUESTION_SLOT, question))
            .join(context)
    }
}

impl Default for PromptTemplate {
    #[inline]
    fn default() -> Self {
        Self {
            text: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

/// Chunk texts in retrieval order, separated by a blank line
#[inline]
pub fn format_context(chunks: &[RetrievedChunk]) -> String {
    chunks.iter().map(|chunk| chunk.text.as_str()).join("\n\n")
}

/// Turns retrieved context and a question into a model completion
pub struct AnswerGenerator {
    model: Arc<dyn LanguageModel>,
    template: PromptTemplate,
}

impl AnswerGenerator {
    #[inline]
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            template: PromptTemplate::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    #[inline]
    pub const fn template(&self) -> &PromptTemplate {
        &self.template
    }

    #[inline]
    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    #[inline]
    pub fn prompt(&self, chunks: &[RetrievedChunk], question: &str) -> String {
        self.template.render(&format_context(chunks), question)
    }

    #[inline]
    pub fn generate(&self, chunks: &[RetrievedChunk], question: &str) -> Result<Completion> {
        if question.trim().is_empty() {
            return Err(RagError::Validation("question cannot be empty".to_string()));
        }

        let prompt = self.prompt(chunks, question);
        debug!(
            "Generating answer from {} chunk(s), prompt length {}",
            chunks.len(),
            prompt.len()
        );
        self.model.complete(&prompt)
    }
}


use std::fmt;

use tracing::{debug, warn};

use crate::generator::AnswerGenerator;
use crate::retriever::{RetrievedChunk, Retriever};
use crate::session::ChatSession;
use crate::{RagError, Result};

/// Where a turn is. Every turn starts at `Idle` and ends at `Displayed` or `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Retrieving,
    Generating,
    Displayed,
    Error,
}

impl fmt::Display for TurnState {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Retrieving => "retrieving",
            Self::Generating => "generating",
            Self::Displayed => "displayed",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Answered {
        answer: String,
        sources: Vec<RetrievedChunk>,
    },
    /// Input was refused before any provider was called
    Rejected { warning: String },
    Failed { stage: TurnState, message: String },
}

impl TurnOutcome {
    /// State the turn finished in
    #[inline]
    pub const fn final_state(&self) -> TurnState {
        match self {
            Self::Answered { .. } => TurnState::Displayed,
            Self::Rejected { .. } => TurnState::Idle,
            Self::Failed { .. } => TurnState::Error,
        }
    }

    #[inline]
    pub fn answer(&self) -> Option<&str> {
        match self {
            Self::Answered { answer, .. } => Some(answer),
            _ => None,
        }
    }
}

/// Tracks state transitions for a single turn
#[derive(Debug)]
struct Turn {
    state: TurnState,
}

impl Turn {
    const fn new() -> Self {
        Self {
            state: TurnState::Idle,
        }
    }

    fn advance(&mut self, next: TurnState) {
        debug!("Turn {} -> {}", self.state, next);
        self.state = next;
    }

    /// Convert a stage error into an outcome. Fatal errors are handed back.
    fn fail(&mut self, error: RagError) -> Result<TurnOutcome> {
        if !error.is_recoverable() {
            return Err(error);
        }
        let stage = self.state;
        self.advance(TurnState::Error);
        warn!("Turn failed while {}: {}", stage, error);
        Ok(TurnOutcome::Failed {
            stage,
            message: error.to_string(),
        })
    }
}

/// Retrieval followed by generation, one question at a time
pub struct RagPipeline {
    retriever: Retriever,
    generator: AnswerGenerator,
}

impl RagPipeline {
    #[inline]
    pub const fn new(retriever: Retriever, generator: AnswerGenerator) -> Self {
        Self {
            retriever,
            generator,
        }
    }

    #[inline]
    pub const fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Run one turn with the retriever's default `k`
    #[inline]
    pub async fn ask(&self, session: &mut ChatSession, question: &str) -> Result<TurnOutcome> {
        self.ask_with_k(session, question, self.retriever.top_k())
            .await
    }

    /// Run one turn and record it in `session`.
    ///
    /// Only unrecoverable errors are returned as `Err`. Stage failures come
    /// back as [`TurnOutcome::Failed`] and are also written to the session.
    #[inline]
    pub async fn ask_with_k(
        &self,
        session: &mut ChatSession,
        question: &str,
        k: usize,
    ) -> Result<TurnOutcome> {
        let question = question.trim();
        if question.is_empty() {
            return Ok(TurnOutcome::Rejected {
                warning: "Please enter a question.".to_string(),
            });
        }

        let mut turn = Turn::new();
        session.push_user(question);

        turn.advance(TurnState::Retrieving);
        let sources = match self.retriever.retrieve(question, k).await {
            Ok(sources) => sources,
            Err(e) => return record(session, turn.fail(e)),
        };

        turn.advance(TurnState::Generating);
        let answer = match self
            .generator
            .generate(&sources, question)
            .and_then(|completion| completion.into_text())
        {
            Ok(answer) => answer,
            Err(e) => return record(session, turn.fail(e)),
        };

        turn.advance(TurnState::Displayed);
        session.push_assistant(answer.as_str());
        Ok(TurnOutcome::Answered { answer, sources })
    }
}

fn record(session: &mut ChatSession, outcome: Result<TurnOutcome>) -> Result<TurnOutcome> {
    if let Ok(TurnOutcome::Failed { message, .. }) = &outcome {
        session.push_assistant(format!("Error: {message}"));
    }
    outcome
}

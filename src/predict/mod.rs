//! Answer prediction from ranked evidence.
//!
//! Two strategies behind [`AnswerPredictor`]:
//! - [`DirectPredictor`]: reads the answer entity off the best path, no model call
//! - [`GenerativePredictor`]: one structured model call over the top-K paths
//!
//! Prediction is split into [`AnswerPredictor::plan`] and
//! [`PendingAnswer::resolve`] so the batch processor can collect the model
//! requests of many items, send them together and resolve replies by position.

pub mod direct;
pub mod generative;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::evidence::{EvidencePath, clamp_unit};
use crate::graph::KnowledgeGraph;
use crate::llm::json::{score_field, string_field};
use crate::llm::{CompletionRequest, LlmError, ParsedJson, TextCompletion, parse_reply};

pub use direct::DirectPredictor;
pub use generative::GenerativePredictor;

/// Answer text used when nothing could be determined.
pub const UNABLE_TO_ANSWER: &str = "Unable to find answer";

/// Reasoning attached to answers predicted from an empty path list.
pub const NO_EVIDENCE_REASONING: &str = "No evidence paths found";

/// Answer text when retrieval found no subgraph.
pub const NO_RELEVANT_INFORMATION: &str = "No relevant information found";

/// Answer text when the subgraph held no evidence path.
pub const NO_REASONING_PATHS: &str = "Unable to find reasoning paths";

/// Answer text when the model reply could not be parsed.
pub const ERROR_GENERATING_ANSWER: &str = "Error generating answer";

/// Answer text when the model returned an empty reply.
pub const NO_ANSWER_FOUND: &str = "No answer found";

const NON_ANSWERS: [&str; 5] = [
    UNABLE_TO_ANSWER,
    NO_RELEVANT_INFORMATION,
    NO_REASONING_PATHS,
    ERROR_GENERATING_ANSWER,
    NO_ANSWER_FOUND,
];

/// Whether `text` is one of the placeholder answers produced when no answer was found.
pub fn is_non_answer(text: &str) -> bool {
    let text = text.trim();
    NON_ANSWERS.iter().any(|s| s.eq_ignore_ascii_case(text))
}

/// Final answer with confidence in [0, 1] and the paths it rests on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub confidence: f64,
    pub supporting_paths: Vec<EvidencePath>,
    pub reasoning: String,
}

impl Answer {
    /// Create an answer; confidence is clamped into [0, 1].
    pub fn new(
        answer: impl Into<String>,
        confidence: f64,
        supporting_paths: Vec<EvidencePath>,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            answer: answer.into(),
            confidence: clamp_unit(confidence),
            supporting_paths,
            reasoning: reasoning.into(),
        }
    }

    /// Zero-confidence "unable to find answer" with the given reasoning.
    pub fn unable(reasoning: impl Into<String>) -> Self {
        Self::new(UNABLE_TO_ANSWER, 0.0, Vec::new(), reasoning)
    }

    /// The deterministic answer for an empty evidence list.
    pub fn no_evidence() -> Self {
        Self::unable(NO_EVIDENCE_REASONING)
    }

    /// False for the placeholder answers of failed predictions.
    pub fn is_answered(&self) -> bool {
        !is_non_answer(&self.answer)
    }
}

/// A model request whose reply completes an answer.
#[derive(Debug, Clone)]
pub struct PendingAnswer {
    pub request: CompletionRequest,
    pub supporting_paths: Vec<EvidencePath>,
    /// Upper bound on the reported confidence.
    pub ceiling: f64,
}

impl PendingAnswer {
    /// Turn a reply of the form `{answer, confidence, reasoning}` into an answer.
    ///
    /// A reply without a usable `answer` yields confidence 0 and reasoning `parse error`.
    pub fn resolve(self, reply: &str) -> Answer {
        let parsed = match parse_reply(reply) {
            ParsedJson::Ok(value) => string_field(&value, "answer")
                .filter(|a| !a.is_empty())
                .map(|answer| {
                    (
                        answer,
                        score_field(&value, "confidence").unwrap_or(0.5),
                        string_field(&value, "reasoning").unwrap_or_default(),
                    )
                }),
            ParsedJson::ParseFailure(_) => None,
        };

        match parsed {
            Some((answer, confidence, reasoning)) => Answer::new(
                answer,
                confidence.min(self.ceiling),
                self.supporting_paths,
                reasoning,
            ),
            None => {
                tracing::warn!("answer reply did not parse");
                Answer::new(
                    ERROR_GENERATING_ANSWER,
                    0.0,
                    self.supporting_paths,
                    crate::error::Degradation::MalformedModelOutput.reason(),
                )
            }
        }
    }
}

/// Either a finished answer or a model request still to be sent.
#[derive(Debug, Clone)]
pub enum PredictionPlan {
    Ready(Answer),
    Pending(PendingAnswer),
}

/// Strategy that turns ranked evidence into an answer.
pub trait AnswerPredictor: Send + Sync {
    /// Decide the answer, or the model request that will produce it.
    ///
    /// An empty `paths` slice must yield `Ready(Answer::no_evidence())`.
    fn plan(&self, question: &str, paths: &[EvidencePath], subgraph: &KnowledgeGraph) -> PredictionPlan;

    /// Backend used to resolve pending plans.
    fn client(&self) -> Option<&Arc<dyn TextCompletion>> {
        None
    }

    /// Plan, call the backend if needed, and resolve.
    fn predict(
        &self,
        question: &str,
        paths: &[EvidencePath],
        subgraph: &KnowledgeGraph,
    ) -> Result<Answer, LlmError> {
        match self.plan(question, paths, subgraph) {
            PredictionPlan::Ready(answer) => Ok(answer),
            PredictionPlan::Pending(pending) => match self.client() {
                Some(client) => {
                    let reply = client.generate(&pending.request)?;
                    Ok(pending.resolve(&reply))
                }
                None => Ok(Answer::unable("no text-completion backend configured")),
            },
        }
    }
}

/// Top `k` paths by descending score (stable for ties).
pub(crate) fn select_top(paths: &[EvidencePath], k: usize) -> Vec<EvidencePath> {
    let mut top = paths.to_vec();
    top.sort_by(|a, b| b.score.total_cmp(&a.score));
    top.truncate(k);
    top
}

//! Model-generated answers over the top-K evidence paths.

use std::sync::Arc;

use crate::config::PredictorConfig;
use crate::evidence::EvidencePath;
use crate::graph::{EntityNames, KnowledgeGraph};
use crate::llm::{CompletionRequest, TextCompletion};

use super::{Answer, AnswerPredictor, PendingAnswer, PredictionPlan, select_top};

const ANSWER_TEMPERATURE: f64 = 0.3;

const STRONG_EVIDENCE_PROMPT: &str = "You are a question answering system. Given a question and evidence paths from a knowledge graph, provide a concise answer.

Return JSON with:
- \"answer\": the direct answer to the question (concise, typically 1-10 words)
- \"confidence\": float between 0 and 1 (how confident are you?)
- \"reasoning\": brief explanation of your reasoning

Rely primarily on the evidence. If the evidence clearly supports an answer, give it with high confidence.";

/// Asks the model to answer from the rendered evidence.
///
/// When no selected path reaches `strong_evidence_threshold`, the prompt allows
/// outside knowledge and the reported confidence is capped at
/// `weak_confidence_ceiling`.
pub struct GenerativePredictor {
    config: PredictorConfig,
    client: Arc<dyn TextCompletion>,
    names: Arc<EntityNames>,
}

impl GenerativePredictor {
    pub fn new(
        config: PredictorConfig,
        client: Arc<dyn TextCompletion>,
        names: Arc<EntityNames>,
    ) -> Self {
        Self {
            config,
            client,
            names,
        }
    }

    fn weak_evidence_prompt(&self) -> String {
        format!(
            "You are a question answering system. Given a question and evidence paths from a knowledge graph, provide a concise answer.

Return JSON with:
- \"answer\": the direct answer to the question (concise, typically 1-10 words)
- \"confidence\": float between 0 and 1 (how confident are you?)
- \"reasoning\": brief explanation of your reasoning

The evidence is weak or incomplete. You may use your own knowledge to answer, \
but report a confidence of at most {:.2}.",
            self.config.weak_confidence_ceiling
        )
    }

    /// Numbered evidence lines with a strength marker and the path's own reasoning.
    fn format_evidence(&self, paths: &[EvidencePath], subgraph: &KnowledgeGraph) -> String {
        let mut lines = vec!["Evidence reasoning chains from the knowledge graph:".to_string(), String::new()];
        for (i, path) in paths.iter().enumerate() {
            let marker = if path.score >= 0.6 {
                "✓"
            } else if path.score >= 0.4 {
                "◐"
            } else {
                "✗"
            };
            lines.push(format!(
                "{}. {marker} [Confidence: {:.2}] {}",
                i + 1,
                path.score,
                path.to_text(subgraph, &self.names)
            ));
            if !path.reasoning.is_empty() {
                lines.push(format!("   Context: {}", path.reasoning));
            }
        }
        lines.join("\n")
    }
}

impl AnswerPredictor for GenerativePredictor {
    fn plan(&self, question: &str, paths: &[EvidencePath], subgraph: &KnowledgeGraph) -> PredictionPlan {
        if paths.is_empty() {
            return PredictionPlan::Ready(Answer::no_evidence());
        }
        let top = select_top(paths, self.config.top_k_paths);
        let strong = top
            .iter()
            .any(|p| p.score >= self.config.strong_evidence_threshold);

        let (system, ceiling) = if strong {
            (STRONG_EVIDENCE_PROMPT.to_string(), 1.0)
        } else {
            (self.weak_evidence_prompt(), self.config.weak_confidence_ceiling)
        };
        let user = format!(
            "Question: \"{question}\"\n\nEvidence from Knowledge Graph:\n{}\n\nBased on this evidence, what is the answer? (return JSON):",
            self.format_evidence(&top, subgraph)
        );
        tracing::debug!(paths = top.len(), strong, "answer request planned");

        PredictionPlan::Pending(PendingAnswer {
            request: CompletionRequest::new(system, user).with_temperature(ANSWER_TEMPERATURE),
            supporting_paths: top,
            ceiling,
        })
    }

    fn client(&self) -> Option<&Arc<dyn TextCompletion>> {
        Some(&self.client)
    }
}

//! Answer extraction from the best path, without a model call.

use std::sync::Arc;

use crate::config::PredictorConfig;
use crate::evidence::EvidencePath;
use crate::graph::{EntityNames, KnowledgeGraph};

use super::{Answer, AnswerPredictor, PredictionPlan, select_top};

/// Heuristic answers are never reported as certain.
const DIRECT_CONFIDENCE_CAP: f64 = 0.9;

/// Reads the answer entity off the highest-scoring path.
///
/// The answer is the path's terminal entity, unless the question already names
/// that entity and does not name the source, in which case the source is the
/// answer ("Who founded Co1?" over `Ada --[founded]--> Co1` answers `Ada`).
pub struct DirectPredictor {
    config: PredictorConfig,
    names: Arc<EntityNames>,
}

impl DirectPredictor {
    pub fn new(config: PredictorConfig, names: Arc<EntityNames>) -> Self {
        Self { config, names }
    }

    fn answer_entity<'a>(
        &self,
        question: &str,
        best: &'a EvidencePath,
        subgraph: &KnowledgeGraph,
    ) -> Option<&'a str> {
        let (source, terminal) = (best.source()?, best.terminal()?);
        let question = question.to_lowercase();
        let mentioned = |id: &str| {
            let name = subgraph.display_name(id, &self.names).to_lowercase();
            !name.is_empty() && question.contains(&name)
        };
        if mentioned(terminal) && !mentioned(source) {
            Some(source)
        } else {
            Some(terminal)
        }
    }
}

impl AnswerPredictor for DirectPredictor {
    fn plan(&self, question: &str, paths: &[EvidencePath], subgraph: &KnowledgeGraph) -> PredictionPlan {
        let top = select_top(paths, self.config.top_k_paths);
        let Some(best) = top.first() else {
            return PredictionPlan::Ready(Answer::no_evidence());
        };
        let Some(entity) = self.answer_entity(question, best, subgraph) else {
            return PredictionPlan::Ready(Answer::no_evidence());
        };

        let answer = subgraph.display_name(entity, &self.names).to_string();
        let confidence = best.score.min(DIRECT_CONFIDENCE_CAP);
        let reasoning = format!(
            "Extracted from top evidence path: {}",
            best.to_text(subgraph, &self.names)
        );
        PredictionPlan::Ready(Answer::new(answer, confidence, top, reasoning))
    }
}

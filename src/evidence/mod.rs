//! Evidence paths: scored reasoning chains through a subgraph.
//!
//! Two interchangeable [`PathFinder`] strategies:
//! - [`HeuristicPathFinder`]: keyword, degree and relation-importance scoring, no model calls
//! - [`AssistedPathFinder`]: the model picks answer candidates and scores paths,
//!   with the heuristic scorer as per-call fallback on malformed replies
//!
//! Both enumerate candidate paths the same way (see [`heuristic::enumerate_candidate_paths`]).

pub mod assisted;
pub mod heuristic;
pub mod keywords;

use serde::{Deserialize, Serialize};

use crate::graph::{EntityNames, KnowledgeGraph, Triple, short_relation_name};
use crate::llm::LlmError;

pub use assisted::AssistedPathFinder;
pub use heuristic::HeuristicPathFinder;

/// A reasoning path with a relevance score in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidencePath {
    /// Ordered hops; never empty.
    pub path: Vec<Triple>,
    pub score: f64,
    pub reasoning: String,
}

impl EvidencePath {
    /// Create a path; the score is clamped into [0, 1] (NaN becomes 0).
    pub fn new(path: Vec<Triple>, score: f64, reasoning: impl Into<String>) -> Self {
        Self {
            path,
            score: clamp_unit(score),
            reasoning: reasoning.into(),
        }
    }

    /// Number of hops.
    pub fn len(&self) -> usize {
        self.path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    /// Head of the first hop.
    pub fn source(&self) -> Option<&str> {
        self.path.first().map(|t| t.head.as_str())
    }

    /// Tail of the last hop: the entity the path argues for.
    pub fn terminal(&self) -> Option<&str> {
        self.path.last().map(|t| t.tail.as_str())
    }

    /// Render as `A --[rel]--> B → B --[rel2]--> C`, with display names and short relation names.
    pub fn to_text(&self, kg: &KnowledgeGraph, names: &EntityNames) -> String {
        render_path(&self.path, kg, names)
    }
}

/// Render hops as `A --[rel]--> B → ...`.
pub fn render_path(path: &[Triple], kg: &KnowledgeGraph, names: &EntityNames) -> String {
    path.iter()
        .map(|t| {
            format!(
                "{} --[{}]--> {}",
                kg.display_name(&t.head, names),
                short_relation_name(&t.relation),
                kg.display_name(&t.tail, names)
            )
        })
        .collect::<Vec<_>>()
        .join(" → ")
}

pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Sort by descending score, keeping discovery order among ties, and keep `limit`.
pub(crate) fn rank(mut paths: Vec<EvidencePath>, limit: usize) -> Vec<EvidencePath> {
    paths.sort_by(|a, b| b.score.total_cmp(&a.score));
    paths.truncate(limit);
    paths
}

/// Strategy that turns a question and its subgraph into ranked evidence.
///
/// Results are sorted by descending score and bounded by the configured
/// `max_paths`. An empty subgraph or empty candidate set yields an empty list.
/// Only transport failures of the text-completion collaborator are errors.
pub trait PathFinder: Send + Sync {
    fn find_evidence_paths(
        &self,
        question: &str,
        subgraph: &KnowledgeGraph,
    ) -> Result<Vec<EvidencePath>, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Entity, Relation};

    #[test]
    fn scores_are_clamped() {
        let t = vec![Triple::new("a", "r", "b")];
        assert_eq!(EvidencePath::new(t.clone(), 1.4, "").score, 1.0);
        assert_eq!(EvidencePath::new(t.clone(), -0.2, "").score, 0.0);
        assert_eq!(EvidencePath::new(t, f64::NAN, "").score, 0.0);
    }

    #[test]
    fn to_text_uses_names_and_short_relations() {
        let mut kg = KnowledgeGraph::new();
        kg.add_entity(Entity::new("m.1", "Jamaica"));
        kg.add_entity(Entity::new("m.2", "m.2"));
        kg.add_entity(Entity::new("m.3", "English"));
        kg.add_relation(Relation::new("m.1", "location.location.containedby", "m.2"));
        let mut names = EntityNames::new();
        names.insert("m.2", "Caribbean");

        let path = EvidencePath::new(
            vec![
                Triple::new("m.1", "location.location.containedby", "m.2"),
                Triple::new("m.2", "languages_spoken", "m.3"),
            ],
            0.7,
            "",
        );
        assert_eq!(
            path.to_text(&kg, &names),
            "Jamaica --[containedby]--> Caribbean → Caribbean --[languages_spoken]--> English"
        );
        assert_eq!(path.source(), Some("m.1"));
        assert_eq!(path.terminal(), Some("m.3"));
    }

    #[test]
    fn rank_is_stable_for_ties() {
        let p = |s: f64, r: &str| EvidencePath::new(vec![Triple::new("a", r, "b")], s, "");
        let ranked = rank(vec![p(0.5, "x"), p(0.9, "y"), p(0.5, "z")], 2);
        let rels: Vec<&str> = ranked.iter().map(|e| e.path[0].relation.as_str()).collect();
        assert_eq!(rels, vec!["y", "x"]);
    }
}

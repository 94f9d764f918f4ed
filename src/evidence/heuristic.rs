//! Model-free path finding.
//!
//! 1. Weight question keywords ([`QuestionKeywords`]).
//! 2. Rank every subgraph entity as an answer candidate by keyword overlap with its
//!    name or id, normalized degree (x0.5) and a name-length prior (x0.3).
//! 3. Enumerate bounded paths from every other entity to the top candidates.
//! 4. Score each path as a weighted sum of four factors in [0, 1]:
//!    - length: `max(0.2, 1 - 0.15 * (hops - 1))`
//!    - relation: fraction of hops whose relation contains an important keyword
//!    - popularity: mean over hops of the mean normalized degree of head and tail
//!    - keywords: summed weight of question keywords found in the path, capped at 1

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{PathFinderConfig, ScoreWeights};
use crate::graph::{EntityNames, KnowledgeGraph, Triple};
use crate::llm::LlmError;

use super::keywords::QuestionKeywords;
use super::{EvidencePath, PathFinder, clamp_unit, rank};

/// Relation fragments that usually carry answer-bearing facts.
const IMPORTANT_RELATION_KEYWORDS: &[&str] = &[
    "found", "created", "author", "invent", "discover", "winner", "direct", "film", "movie",
    "star", "actor", "award", "birth", "country", "capital", "location", "type", "member", "part",
];

/// Per-subgraph data shared by candidate ranking and path scoring.
pub(crate) struct GraphContext<'a> {
    pub kg: &'a KnowledgeGraph,
    pub names: &'a EntityNames,
    degrees: HashMap<String, usize>,
    max_degree: usize,
}

impl<'a> GraphContext<'a> {
    pub fn new(kg: &'a KnowledgeGraph, names: &'a EntityNames) -> Self {
        let degrees = kg.degrees();
        let max_degree = degrees.values().copied().max().unwrap_or(0);
        Self {
            kg,
            names,
            degrees,
            max_degree,
        }
    }

    /// Degree of `id` divided by the subgraph's maximum degree.
    pub fn popularity(&self, id: &str) -> f64 {
        if self.max_degree == 0 {
            return 0.0;
        }
        self.degrees.get(id).copied().unwrap_or(0) as f64 / self.max_degree as f64
    }

    /// Lowercase texts an entity can be matched by: name, id, display name.
    fn match_texts(&self, id: &str) -> Vec<String> {
        let mut texts = vec![id.to_lowercase()];
        if let Some(entity) = self.kg.entity(id) {
            texts.push(entity.name.to_lowercase());
        }
        if let Some(display) = self.names.get(id) {
            texts.push(display.to_lowercase());
        }
        texts
    }
}

/// Enumerate paths from every other entity to each candidate, in candidate order.
///
/// Each (source, candidate) pair contributes at most `paths_per_pair` paths of at
/// most `max_path_length` hops; enumeration stops at `max_total_paths`.
pub fn enumerate_candidate_paths(
    subgraph: &KnowledgeGraph,
    candidates: &[String],
    config: &PathFinderConfig,
) -> Vec<Vec<Triple>> {
    let mut all: Vec<Vec<Triple>> = Vec::new();
    'targets: for target in candidates {
        for source in subgraph.entities() {
            if source.id == *target {
                continue;
            }
            let remaining = config.max_total_paths.saturating_sub(all.len());
            if remaining == 0 {
                break 'targets;
            }
            let paths = subgraph.find_paths(
                &source.id,
                target,
                config.max_path_length,
                config.paths_per_pair.min(remaining),
            );
            all.extend(paths);
        }
    }
    all
}

/// Keyword/degree path finder.
pub struct HeuristicPathFinder {
    config: PathFinderConfig,
    weights: ScoreWeights,
    names: Arc<EntityNames>,
}

impl HeuristicPathFinder {
    pub fn new(config: PathFinderConfig, names: Arc<EntityNames>) -> Self {
        let weights = config.weights.normalized();
        Self {
            config,
            weights,
            names,
        }
    }

    pub fn config(&self) -> &PathFinderConfig {
        &self.config
    }

    pub fn names(&self) -> &EntityNames {
        &self.names
    }

    /// Top answer candidates (entity ids) by heuristic score, best first.
    ///
    /// Falls back to the first entities in insertion order when nothing scores above zero.
    pub(crate) fn rank_candidates(&self, keywords: &QuestionKeywords, ctx: &GraphContext<'_>) -> Vec<String> {
        let mut scored: Vec<(String, f64)> = ctx
            .kg
            .entities()
            .iter()
            .map(|entity| {
                let texts = ctx.match_texts(&entity.id);
                let keyword_overlap = keywords.overlap(texts.iter().map(String::as_str));
                let degree = 0.5 * ctx.popularity(&entity.id);
                let name_length = 0.3 * (entity.name.chars().count() as f64 / 20.0).min(1.0);
                (entity.id.clone(), keyword_overlap + degree + name_length)
            })
            .filter(|(_, score)| *score > 0.0)
            .collect();

        if scored.is_empty() {
            return ctx
                .kg
                .entities()
                .iter()
                .take(self.config.max_candidates)
                .map(|e| e.id.clone())
                .collect();
        }
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(self.config.max_candidates);
        scored.into_iter().map(|(id, _)| id).collect()
    }

    /// Score one path with the four weighted factors.
    pub(crate) fn score_path(
        &self,
        path: Vec<Triple>,
        keywords: &QuestionKeywords,
        ctx: &GraphContext<'_>,
    ) -> EvidencePath {
        let hops = path.len().max(1) as f64;

        let length = (1.0 - (hops - 1.0) * 0.15).max(0.2);

        let important = path
            .iter()
            .filter(|t| {
                let relation = t.relation.to_lowercase();
                IMPORTANT_RELATION_KEYWORDS.iter().any(|k| relation.contains(k))
            })
            .count();
        let relation = important as f64 / hops;

        let popularity = path
            .iter()
            .map(|t| (ctx.popularity(&t.head) + ctx.popularity(&t.tail)) / 2.0)
            .sum::<f64>()
            / hops;

        let mut texts: Vec<String> = Vec::new();
        for t in &path {
            texts.push(ctx.kg.display_name(&t.head, ctx.names).to_lowercase());
            texts.push(t.relation.to_lowercase());
            texts.push(ctx.kg.display_name(&t.tail, ctx.names).to_lowercase());
        }
        let relevance = keywords.overlap(texts.iter().map(String::as_str)).min(1.0);

        let w = &self.weights;
        let score = clamp_unit(
            w.length * length
                + w.relation * relation
                + w.popularity * popularity
                + w.keywords * relevance,
        );
        let reasoning = format!(
            "path_length={length:.2}; relation_importance={relation:.2}; \
             entity_popularity={popularity:.2}; question_relevance={relevance:.2}"
        );
        EvidencePath::new(path, score, reasoning)
    }

    /// Score paths heuristically, preserving input order.
    pub fn score_paths(
        &self,
        question: &str,
        paths: Vec<Vec<Triple>>,
        subgraph: &KnowledgeGraph,
    ) -> Vec<EvidencePath> {
        let keywords = QuestionKeywords::extract(question);
        let ctx = GraphContext::new(subgraph, &self.names);
        paths
            .into_iter()
            .map(|p| self.score_path(p, &keywords, &ctx))
            .collect()
    }

    /// Infallible form of [`PathFinder::find_evidence_paths`].
    pub fn find(&self, question: &str, subgraph: &KnowledgeGraph) -> Vec<EvidencePath> {
        if subgraph.is_empty() {
            return vec![];
        }
        let keywords = QuestionKeywords::extract(question);
        let ctx = GraphContext::new(subgraph, &self.names);

        let candidates = self.rank_candidates(&keywords, &ctx);
        if candidates.is_empty() {
            tracing::debug!("no answer candidates identified");
            return vec![];
        }

        let paths = enumerate_candidate_paths(subgraph, &candidates, &self.config);
        if paths.is_empty() {
            tracing::debug!(candidates = candidates.len(), "no valid paths found");
            return vec![];
        }

        let scored: Vec<EvidencePath> = paths
            .into_iter()
            .map(|p| self.score_path(p, &keywords, &ctx))
            .collect();
        let ranked = rank(scored, self.config.max_paths);
        tracing::debug!(
            keywords = keywords.len(),
            candidates = candidates.len(),
            paths = ranked.len(),
            "heuristic evidence paths"
        );
        ranked
    }
}

impl PathFinder for HeuristicPathFinder {
    fn find_evidence_paths(
        &self,
        question: &str,
        subgraph: &KnowledgeGraph,
    ) -> Result<Vec<EvidencePath>, LlmError> {
        Ok(self.find(question, subgraph))
    }
}

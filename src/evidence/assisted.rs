//! Model-assisted path finding.
//!
//! The model does two jobs: pick likely answer entities from the rendered
//! subgraph, and score enumerated paths (one prompt per path, or one combined
//! prompt per chunk of paths). A reply that does not parse falls back to the
//! heuristic for that call only. Transport failures are returned to the caller.

use std::sync::Arc;

use serde_json::Value;

use crate::config::PathFinderConfig;
use crate::graph::{EntityNames, KnowledgeGraph, Triple};
use crate::llm::json::{score_field, string_field};
use crate::llm::{CompletionRequest, LlmError, ParsedJson, TextCompletion, parse_reply};

use super::heuristic::{GraphContext, HeuristicPathFinder, enumerate_candidate_paths};
use super::keywords::QuestionKeywords;
use super::{EvidencePath, PathFinder, rank, render_path};

const IDENTIFY_SYSTEM_PROMPT: &str = "You are a knowledge graph reasoning assistant. Given a question and a knowledge graph subgraph, identify which entities are most likely to be the answer.

Return a JSON list of entity names with relevance scores (0-1).

Example:
Question: \"Who founded Microsoft?\"
Entities: [\"Microsoft\", \"Bill Gates\", \"Windows\", \"Seattle\"]
Answer: [{\"entity\": \"Bill Gates\", \"relevance\": 0.95}, {\"entity\": \"Microsoft\", \"relevance\": 0.3}]";

const SCORE_SYSTEM_PROMPT: &str = "You are a reasoning path evaluator. Given a question and a reasoning path from a knowledge graph, evaluate how well this path supports answering the question.

Return JSON with:
- \"score\": float between 0 and 1 (how relevant/useful is this path?)
- \"reasoning\": brief explanation

Example:
Question: \"Who founded Microsoft?\"
Path: \"Bill Gates --[founded]--> Microsoft\"
Answer: {\"score\": 0.95, \"reasoning\": \"Direct evidence that Bill Gates founded Microsoft\"}";

const COMBINED_SYSTEM_PROMPT: &str = "You are a reasoning path evaluator. Given a question and multiple reasoning paths from a knowledge graph, score each path (0-1) based on relevance.

Return JSON array with scores and brief reasoning for each path.

Example:
[
  {\"path_id\": 1, \"score\": 0.95, \"reasoning\": \"Direct answer\"},
  {\"path_id\": 2, \"score\": 0.3, \"reasoning\": \"Weakly related\"}
]";

const IDENTIFY_TEMPERATURE: f64 = 0.3;
const SCORE_TEMPERATURE: f64 = 0.2;

/// Path finder that delegates candidate selection and path scoring to a model.
pub struct AssistedPathFinder {
    client: Arc<dyn TextCompletion>,
    heuristic: HeuristicPathFinder,
}

impl AssistedPathFinder {
    pub fn new(
        config: PathFinderConfig,
        client: Arc<dyn TextCompletion>,
        names: Arc<EntityNames>,
    ) -> Self {
        Self {
            client,
            heuristic: HeuristicPathFinder::new(config, names),
        }
    }

    fn config(&self) -> &PathFinderConfig {
        self.heuristic.config()
    }

    /// Ask the model for answer candidates; fall back to heuristic ranking on a malformed reply.
    fn identify_candidates(
        &self,
        question: &str,
        keywords: &QuestionKeywords,
        ctx: &GraphContext<'_>,
    ) -> Result<Vec<String>, LlmError> {
        let request = CompletionRequest::new(
            IDENTIFY_SYSTEM_PROMPT,
            format!(
                "Question: \"{question}\"\n\nKnowledge Graph:\n{}\n\nIdentify potential answer entities (return JSON list):",
                ctx.kg.to_text(ctx.names)
            ),
        )
        .with_temperature(IDENTIFY_TEMPERATURE);

        let reply = self.client.generate(&request)?;
        let items = match parse_reply(&reply) {
            ParsedJson::Ok(value) => candidate_items(value),
            ParsedJson::ParseFailure(_) => None,
        };
        let Some(items) = items else {
            tracing::warn!("candidate reply did not parse, using heuristic ranking");
            return Ok(self.heuristic.rank_candidates(keywords, ctx));
        };

        let mut scored: Vec<(String, f64)> = Vec::new();
        for item in &items {
            let Some(name) = string_field(item, "entity").or_else(|| item.as_str().map(String::from))
            else {
                continue;
            };
            let relevance = score_field(item, "relevance").unwrap_or(0.5);
            if let Some(id) = resolve_entity(&name, ctx)
                && !scored.iter().any(|(seen, _)| *seen == id)
            {
                scored.push((id, relevance));
            }
        }
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(self.config().max_candidates);
        Ok(scored.into_iter().map(|(id, _)| id).collect())
    }

    /// One prompt per path.
    fn score_each(
        &self,
        question: &str,
        paths: Vec<Vec<Triple>>,
        keywords: &QuestionKeywords,
        ctx: &GraphContext<'_>,
    ) -> Result<Vec<EvidencePath>, LlmError> {
        let mut scored = Vec::with_capacity(paths.len());
        for path in paths {
            let request = CompletionRequest::new(
                SCORE_SYSTEM_PROMPT,
                format!(
                    "Question: \"{question}\"\nReasoning Path: {}\n\nEvaluate this path (return JSON):",
                    render_path(&path, ctx.kg, ctx.names)
                ),
            )
            .with_temperature(SCORE_TEMPERATURE);

            let reply = self.client.generate(&request)?;
            let parsed = parse_reply(&reply)
                .value()
                .and_then(|v| score_field(&v, "score").map(|s| (s, string_field(&v, "reasoning"))));
            match parsed {
                Some((score, reasoning)) => {
                    scored.push(EvidencePath::new(path, score, reasoning.unwrap_or_default()))
                }
                None => {
                    tracing::warn!("path score reply did not parse, using heuristic score");
                    scored.push(self.heuristic.score_path(path, keywords, ctx));
                }
            }
        }
        Ok(scored)
    }

    /// One prompt per chunk of `combined_limit` paths.
    fn score_combined(
        &self,
        question: &str,
        paths: Vec<Vec<Triple>>,
        keywords: &QuestionKeywords,
        ctx: &GraphContext<'_>,
    ) -> Result<Vec<EvidencePath>, LlmError> {
        let chunk_size = self.config().combined_limit.max(1);
        let mut scored = Vec::with_capacity(paths.len());
        let mut remaining = paths.into_iter().peekable();

        while remaining.peek().is_some() {
            let chunk: Vec<Vec<Triple>> = remaining.by_ref().take(chunk_size).collect();
            let listing = chunk
                .iter()
                .enumerate()
                .map(|(i, p)| format!("{}. {}", i + 1, render_path(p, ctx.kg, ctx.names)))
                .collect::<Vec<_>>()
                .join("\n");
            let request = CompletionRequest::new(
                COMBINED_SYSTEM_PROMPT,
                format!(
                    "Question: \"{question}\"\n\nReasoning Paths:\n{listing}\n\nScore each path (return JSON array):"
                ),
            )
            .with_temperature(SCORE_TEMPERATURE);

            let reply = self.client.generate(&request)?;
            let entries = match parse_reply(&reply) {
                ParsedJson::Ok(Value::Array(entries)) => entries,
                _ => {
                    tracing::warn!(paths = chunk.len(), "combined score reply did not parse, using heuristic scores");
                    Vec::new()
                }
            };

            let mut by_position: Vec<Option<(f64, String)>> = vec![None; chunk.len()];
            for entry in &entries {
                let Some(id) = entry["path_id"].as_u64() else {
                    continue;
                };
                let Some(slot) = (id as usize).checked_sub(1).and_then(|i| by_position.get_mut(i))
                else {
                    continue;
                };
                if slot.is_none()
                    && let Some(score) = score_field(entry, "score")
                {
                    *slot = Some((score, string_field(entry, "reasoning").unwrap_or_default()));
                }
            }

            for (path, model_score) in chunk.into_iter().zip(by_position) {
                scored.push(match model_score {
                    Some((score, reasoning)) => EvidencePath::new(path, score, reasoning),
                    None => self.heuristic.score_path(path, keywords, ctx),
                });
            }
        }
        Ok(scored)
    }
}

/// Accept `[...]` or an object wrapping the list under `candidates`/`entities`.
fn candidate_items(value: Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => ["candidates", "entities"]
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            }),
        _ => None,
    }
}

/// Map a model-supplied name to an entity id: name substring, display name, then exact id.
fn resolve_entity(name: &str, ctx: &GraphContext<'_>) -> Option<String> {
    if let Some(entity) = ctx.kg.entities_by_name(name).first() {
        return Some(entity.id.clone());
    }
    let needle = name.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    ctx.kg
        .entities()
        .iter()
        .find(|e| {
            ctx.names
                .get(&e.id)
                .is_some_and(|display| display.to_lowercase().contains(&needle))
                || e.id == name.trim()
        })
        .map(|e| e.id.clone())
}

impl PathFinder for AssistedPathFinder {
    fn find_evidence_paths(
        &self,
        question: &str,
        subgraph: &KnowledgeGraph,
    ) -> Result<Vec<EvidencePath>, LlmError> {
        if subgraph.is_empty() {
            return Ok(vec![]);
        }
        let keywords = QuestionKeywords::extract(question);
        let ctx = GraphContext::new(subgraph, self.heuristic.names());

        let candidates = self.identify_candidates(question, &keywords, &ctx)?;
        if candidates.is_empty() {
            tracing::debug!("no answer candidates identified");
            return Ok(vec![]);
        }

        let paths = enumerate_candidate_paths(subgraph, &candidates, self.config());
        if paths.is_empty() {
            tracing::debug!(candidates = candidates.len(), "no valid paths found");
            return Ok(vec![]);
        }

        let scored = if self.config().combined_scoring {
            self.score_combined(question, paths, &keywords, &ctx)?
        } else {
            self.score_each(question, paths, &keywords, &ctx)?
        };
        let ranked = rank(scored, self.config().max_paths);
        tracing::debug!(
            candidates = candidates.len(),
            paths = ranked.len(),
            "assisted evidence paths"
        );
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Entity, Relation};
    use crate::llm::ScriptedCompletion;

    fn founders() -> KnowledgeGraph {
        let mut kg = KnowledgeGraph::new();
        for id in ["Ada", "Bob", "Co1"] {
            kg.add_entity(Entity::new(id, id));
        }
        kg.add_relation(Relation::new("Ada", "founded", "Co1"));
        kg.add_relation(Relation::new("Bob", "advises", "Co1"));
        kg
    }

    fn finder(client: Arc<ScriptedCompletion>, combined: bool) -> AssistedPathFinder {
        let config = PathFinderConfig {
            combined_scoring: combined,
            ..PathFinderConfig::default()
        };
        AssistedPathFinder::new(config, client, Arc::new(EntityNames::new()))
    }

    fn responder(identify: &'static str, score: &'static str) -> Arc<ScriptedCompletion> {
        Arc::new(ScriptedCompletion::from_fn(move |req| {
            if req.system.starts_with("You are a knowledge graph reasoning assistant") {
                Ok(identify.to_string())
            } else {
                Ok(score.to_string())
            }
        }))
    }

    #[test]
    fn combined_scores_are_applied_by_position() {
        let client = responder(
            r#"[{"entity": "Co1", "relevance": 0.9}]"#,
            "```json\n[{\"path_id\": 2, \"score\": 0.8, \"reasoning\": \"advisor\"}, {\"path_id\": 1, \"score\": 0.4}]\n```",
        );
        let paths = finder(client.clone(), true)
            .find_evidence_paths("Who founded Co1?", &founders())
            .unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].path[0].relation, "advises");
        assert_eq!(paths[0].score, 0.8);
        assert_eq!(paths[0].reasoning, "advisor");
        assert_eq!(paths[1].score, 0.4);
        assert_eq!(client.call_count(), 2);
    }

    #[test]
    fn per_path_scoring_makes_one_call_per_path() {
        let client = responder(
            r#"[{"entity": "Co1", "relevance": 0.9}]"#,
            r#"{"score": 0.7, "reasoning": "ok"}"#,
        );
        let paths = finder(client.clone(), false)
            .find_evidence_paths("Who founded Co1?", &founders())
            .unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths.iter().all(|p| p.score == 0.7));
        assert_eq!(client.call_count(), 3);
    }

    #[test]
    fn malformed_score_reply_falls_back_to_heuristic() {
        for combined in [true, false] {
            let client = responder(r#"[{"entity": "Co1"}]"#, "I think path one is good");
            let paths = finder(client, combined)
                .find_evidence_paths("Who founded Co1?", &founders())
                .unwrap();
            assert_eq!(paths[0].path[0].relation, "founded");
            assert!(paths[0].reasoning.starts_with("path_length="));
        }
    }

    #[test]
    fn malformed_candidate_reply_falls_back_to_heuristic_ranking() {
        let client = responder("no idea", r#"[{"path_id": 1, "score": 0.9}]"#);
        let paths = finder(client, true)
            .find_evidence_paths("Who founded Co1?", &founders())
            .unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].score, 0.9);
    }

    #[test]
    fn unknown_candidates_give_no_paths() {
        let client = responder(r#"[{"entity": "Zed", "relevance": 1.0}]"#, "[]");
        let paths = finder(client.clone(), true)
            .find_evidence_paths("Who founded Co1?", &founders())
            .unwrap();
        assert!(paths.is_empty());
        assert_eq!(client.call_count(), 1);
    }

    #[test]
    fn transport_failure_is_returned() {
        let client = Arc::new(ScriptedCompletion::failing());
        let err = finder(client, true)
            .find_evidence_paths("Who founded Co1?", &founders())
            .unwrap_err();
        assert!(matches!(err, LlmError::Unavailable { .. }));
    }

    #[test]
    fn empty_subgraph_makes_no_calls() {
        let client = Arc::new(ScriptedCompletion::always("[]"));
        let paths = finder(client.clone(), true)
            .find_evidence_paths("q", &KnowledgeGraph::new())
            .unwrap();
        assert!(paths.is_empty());
        assert_eq!(client.call_count(), 0);
    }
}

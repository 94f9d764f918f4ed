//! Question → seed entities → k-hop subgraph.
//!
//! Mentions come from a [`MentionExtractor`]. The model-backed extractor falls
//! back to capitalization when the model call fails, so retrieval itself never
//! fails: an unresolvable question yields an empty graph.

use std::sync::Arc;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::RetrieverConfig;
use crate::graph::{EntityNames, KnowledgeGraph};
use crate::llm::{CompletionRequest, TextCompletion};

/// Produces surface-form entity mentions for a question.
pub trait MentionExtractor: Send + Sync {
    fn extract_mentions(&self, question: &str) -> Vec<String>;
}

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("valid punctuation regex"));

/// Capitalized words of the question, stripped of punctuation, longer than one character.
#[derive(Debug, Clone, Copy, Default)]
pub struct CapitalizationMentionExtractor;

impl MentionExtractor for CapitalizationMentionExtractor {
    fn extract_mentions(&self, question: &str) -> Vec<String> {
        question
            .split_whitespace()
            .map(|word| NON_WORD.replace_all(word, "").into_owned())
            .filter(|word| {
                word.chars().count() > 1 && word.chars().next().is_some_and(char::is_uppercase)
            })
            .collect()
    }
}

const MENTION_SYSTEM_PROMPT: &str = "You are an entity extraction system. Given a question, extract all entity mentions.
Return ONLY a comma-separated list of entities, nothing else.

Examples:
Question: \"Who is the founder of Microsoft?\"
Answer: Microsoft

Question: \"What is the capital of France and Germany?\"
Answer: France, Germany

Question: \"When did Apple release the iPhone?\"
Answer: Apple, iPhone";

/// Asks the model for a comma-separated mention list.
pub struct LlmMentionExtractor {
    client: Arc<dyn TextCompletion>,
    fallback: CapitalizationMentionExtractor,
}

impl LlmMentionExtractor {
    pub fn new(client: Arc<dyn TextCompletion>) -> Self {
        Self {
            client,
            fallback: CapitalizationMentionExtractor,
        }
    }
}

impl MentionExtractor for LlmMentionExtractor {
    fn extract_mentions(&self, question: &str) -> Vec<String> {
        let request = CompletionRequest::new(
            MENTION_SYSTEM_PROMPT,
            format!("Question: \"{question}\"\nAnswer:"),
        )
        .with_temperature(0.3);

        match self.client.generate(&request) {
            Ok(reply) => reply
                .trim()
                .split(',')
                .map(|m| m.trim().trim_matches('"').to_string())
                .filter(|m| !m.is_empty())
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "mention extraction failed, using capitalization");
                self.fallback.extract_mentions(question)
            }
        }
    }
}

/// Extracts the question-relevant neighbourhood of a knowledge graph.
pub struct SubgraphRetriever {
    config: RetrieverConfig,
    extractor: Arc<dyn MentionExtractor>,
}

impl SubgraphRetriever {
    pub fn new(config: RetrieverConfig, extractor: Arc<dyn MentionExtractor>) -> Self {
        Self { config, extractor }
    }

    /// Resolve mentions to entity ids: first case-insensitive substring match per mention.
    ///
    /// Entity names are tried first, then display names from `names`. Duplicates collapse.
    pub fn resolve_seeds(
        &self,
        question: &str,
        kg: &KnowledgeGraph,
        names: &EntityNames,
    ) -> Vec<String> {
        let mentions = self.extractor.extract_mentions(question);
        let mut seeds: Vec<String> = Vec::new();
        for mention in &mentions {
            let resolved = kg
                .entities_by_name(mention)
                .first()
                .map(|e| e.id.clone())
                .or_else(|| match_display_name(mention, kg, names));
            if let Some(id) = resolved
                && !seeds.contains(&id)
            {
                seeds.push(id);
            }
        }
        tracing::debug!(mentions = ?mentions, seeds = ?seeds, "resolved seed entities");
        seeds
    }

    /// Retrieve the k-hop subgraph around the question's seed entities.
    ///
    /// Returns an empty graph when no seed resolves.
    pub fn retrieve(&self, question: &str, kg: &KnowledgeGraph, names: &EntityNames) -> KnowledgeGraph {
        let seeds = self.resolve_seeds(question, kg, names);
        if seeds.is_empty() {
            tracing::debug!("no seed entities found, returning empty subgraph");
            return KnowledgeGraph::new();
        }
        let subgraph = kg.k_hop_subgraph(&seeds, self.config.max_hops, self.config.max_nodes);
        tracing::debug!(
            entities = subgraph.len(),
            relations = subgraph.relation_count(),
            "retrieved subgraph"
        );
        subgraph
    }
}

fn match_display_name(mention: &str, kg: &KnowledgeGraph, names: &EntityNames) -> Option<String> {
    if names.is_empty() {
        return None;
    }
    let needle = mention.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    kg.entities()
        .iter()
        .find(|e| {
            names
                .get(&e.id)
                .is_some_and(|name| name.to_lowercase().contains(&needle))
        })
        .map(|e| e.id.clone())
}

//! The end-to-end question answering pipeline.
//!
//! `question → retrieve subgraph → find evidence paths → predict answer`, with an
//! early exit whenever a stage comes back empty. Strategies are chosen from
//! [`EpermConfig`] and can be replaced for testing or embedding.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{EpermConfig, PathStrategy, PredictorStrategy};
use crate::error::{ConfigError, Degradation};
use crate::evidence::{AssistedPathFinder, EvidencePath, HeuristicPathFinder, PathFinder};
use crate::graph::{EntityNames, KnowledgeGraph};
use crate::llm::{CacheStats, CachedCompletion, LlmError, OpenAiClient, TextCompletion};
use crate::predict::{
    Answer, AnswerPredictor, DirectPredictor, GenerativePredictor, NO_REASONING_PATHS, NO_RELEVANT_INFORMATION,
};
use crate::retrieve::{
    CapitalizationMentionExtractor, LlmMentionExtractor, MentionExtractor, SubgraphRetriever,
};

/// A step the pipeline reached for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum PipelineStage {
    Retrieved { entities: usize, relations: usize },
    PathsFound { paths: usize },
    Answered,
    EarlyExit { reason: Degradation },
}

/// One evidence path as shown to users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedPath {
    pub path: String,
    pub score: f64,
    pub reasoning: String,
}

/// An answer with its rendered evidence and the stages that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedAnswer {
    pub question: String,
    pub answer: String,
    pub confidence: f64,
    pub reasoning: String,
    pub num_evidence_paths: usize,
    pub evidence_paths: Vec<RenderedPath>,
    pub stages: Vec<PipelineStage>,
}

/// Answers questions against one knowledge graph.
pub struct Orchestrator {
    config: EpermConfig,
    kg: KnowledgeGraph,
    names: Arc<EntityNames>,
    retriever: SubgraphRetriever,
    path_finder: Arc<dyn PathFinder>,
    predictor: Arc<dyn AnswerPredictor>,
    client: Option<Arc<dyn TextCompletion>>,
}

impl Orchestrator {
    /// Build the pipeline with strategies selected by `config`.
    ///
    /// `client` serves the assisted path finder, the generative predictor and
    /// mention extraction; it is wrapped in a response cache when
    /// `[llm] cache_enabled` is set. Without a client only the heuristic and
    /// direct strategies are available.
    pub fn new(
        config: EpermConfig,
        kg: KnowledgeGraph,
        names: Arc<EntityNames>,
        client: Option<Arc<dyn TextCompletion>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let client: Option<Arc<dyn TextCompletion>> = match client {
            Some(c) if config.llm.cache_enabled => Some(Arc::new(CachedCompletion::new(c))),
            other => other,
        };

        let path_finder: Arc<dyn PathFinder> = match (config.path_finder.strategy, &client) {
            (PathStrategy::Heuristic, _) => Arc::new(HeuristicPathFinder::new(
                config.path_finder.clone(),
                names.clone(),
            )),
            (PathStrategy::Assisted, Some(c)) => Arc::new(AssistedPathFinder::new(
                config.path_finder.clone(),
                c.clone(),
                names.clone(),
            )),
            (PathStrategy::Assisted, None) => {
                return Err(ConfigError::Invalid {
                    message: "`[path_finder] strategy = \"assisted\"` needs a text-completion backend".into(),
                });
            }
        };

        let predictor: Arc<dyn AnswerPredictor> = match (config.predictor.strategy, &client) {
            (PredictorStrategy::Direct, _) => Arc::new(DirectPredictor::new(config.predictor, names.clone())),
            (PredictorStrategy::Generative, Some(c)) => Arc::new(GenerativePredictor::new(
                config.predictor,
                c.clone(),
                names.clone(),
            )),
            (PredictorStrategy::Generative, None) => {
                return Err(ConfigError::Invalid {
                    message: "`[predictor] strategy = \"generative\"` needs a text-completion backend".into(),
                });
            }
        };

        let extractor: Arc<dyn MentionExtractor> = match &client {
            Some(c) => Arc::new(LlmMentionExtractor::new(c.clone())),
            None => Arc::new(CapitalizationMentionExtractor),
        };

        tracing::info!(
            entities = kg.len(),
            relations = kg.relation_count(),
            path_strategy = ?config.path_finder.strategy,
            predictor = ?config.predictor.strategy,
            backend = client.is_some(),
            "pipeline ready"
        );

        Ok(Self {
            retriever: SubgraphRetriever::new(config.retriever, extractor),
            config,
            kg,
            names,
            path_finder,
            predictor,
            client,
        })
    }

    /// Build the pipeline, connecting to the configured HTTP endpoint only
    /// when a selected strategy needs a model.
    pub fn from_config(
        config: EpermConfig,
        kg: KnowledgeGraph,
        names: Arc<EntityNames>,
    ) -> Result<Self, ConfigError> {
        let needs_model = config.path_finder.strategy == PathStrategy::Assisted
            || config.predictor.strategy == PredictorStrategy::Generative;
        let client: Option<Arc<dyn TextCompletion>> = if needs_model {
            Some(Arc::new(OpenAiClient::new(config.llm.clone())))
        } else {
            None
        };
        Self::new(config, kg, names, client)
    }

    pub fn with_path_finder(mut self, path_finder: Arc<dyn PathFinder>) -> Self {
        self.path_finder = path_finder;
        self
    }

    pub fn with_predictor(mut self, predictor: Arc<dyn AnswerPredictor>) -> Self {
        self.predictor = predictor;
        self
    }

    pub fn with_mention_extractor(mut self, extractor: Arc<dyn MentionExtractor>) -> Self {
        self.retriever = SubgraphRetriever::new(self.config.retriever, extractor);
        self
    }

    pub fn config(&self) -> &EpermConfig {
        &self.config
    }

    pub fn knowledge_graph(&self) -> &KnowledgeGraph {
        &self.kg
    }

    pub fn names(&self) -> &Arc<EntityNames> {
        &self.names
    }

    pub fn path_finder(&self) -> &Arc<dyn PathFinder> {
        &self.path_finder
    }

    pub fn predictor(&self) -> &Arc<dyn AnswerPredictor> {
        &self.predictor
    }

    /// The (possibly cached) text-completion backend.
    pub fn client(&self) -> Option<&Arc<dyn TextCompletion>> {
        self.client.as_ref()
    }

    /// Answer a question.
    ///
    /// Only a failing text-completion call is an error; empty retrieval or an
    /// empty path set yield a zero-confidence answer.
    pub fn answer_question(&self, question: &str) -> Result<Answer, LlmError> {
        self.run(question).map(|(answer, _)| answer)
    }

    /// Answer a question and report rendered evidence and the stage trace.
    pub fn answer_question_detailed(&self, question: &str) -> Result<DetailedAnswer, LlmError> {
        let (answer, stages) = self.run(question)?;
        let evidence_paths = answer
            .supporting_paths
            .iter()
            .map(|p| RenderedPath {
                path: p.to_text(&self.kg, &self.names),
                score: p.score,
                reasoning: p.reasoning.clone(),
            })
            .collect();
        Ok(DetailedAnswer {
            question: question.to_string(),
            num_evidence_paths: answer.supporting_paths.len(),
            answer: answer.answer,
            confidence: answer.confidence,
            reasoning: answer.reasoning,
            evidence_paths,
            stages,
        })
    }

    /// Evidence paths for a question, without predicting an answer.
    pub fn evidence_for(&self, question: &str) -> Result<Vec<EvidencePath>, LlmError> {
        let subgraph = self.retriever.retrieve(question, &self.kg, &self.names);
        if subgraph.is_empty() {
            return Ok(Vec::new());
        }
        self.path_finder.find_evidence_paths(question, &subgraph)
    }

    /// Drop cached model replies.
    pub fn clear_cache(&self) {
        if let Some(client) = &self.client {
            client.clear_cache();
        }
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.client.as_ref().and_then(|c| c.cache_stats())
    }

    fn run(&self, question: &str) -> Result<(Answer, Vec<PipelineStage>), LlmError> {
        let mut stages = Vec::new();

        let subgraph = self.retriever.retrieve(question, &self.kg, &self.names);
        if subgraph.is_empty() {
            tracing::info!(question, "no relevant subgraph");
            stages.push(PipelineStage::EarlyExit {
                reason: Degradation::RetrievalEmpty,
            });
            let answer = Answer::new(
                NO_RELEVANT_INFORMATION,
                0.0,
                Vec::new(),
                Degradation::RetrievalEmpty.reason(),
            );
            return Ok((answer, stages));
        }
        stages.push(PipelineStage::Retrieved {
            entities: subgraph.len(),
            relations: subgraph.relation_count(),
        });

        let paths = self.path_finder.find_evidence_paths(question, &subgraph)?;
        if paths.is_empty() {
            tracing::info!(question, "no evidence paths");
            stages.push(PipelineStage::EarlyExit {
                reason: Degradation::NoEvidencePaths,
            });
            let answer = Answer::new(
                NO_REASONING_PATHS,
                0.0,
                Vec::new(),
                Degradation::NoEvidencePaths.reason(),
            );
            return Ok((answer, stages));
        }
        stages.push(PipelineStage::PathsFound { paths: paths.len() });

        let answer = self.predictor.predict(question, &paths, &subgraph)?;
        stages.push(PipelineStage::Answered);
        tracing::info!(
            answer = %answer.answer,
            confidence = answer.confidence,
            "question answered"
        );
        Ok((answer, stages))
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("kg", &self.kg)
            .field("names", &self.names.len())
            .field("backend", &self.client.is_some())
            .finish()
    }
}

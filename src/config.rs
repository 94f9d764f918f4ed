//! Engine configuration, persisted as TOML.
//!
//! Every field has a serde default, so an empty file (or no file) yields the
//! standard profile. [`EpermConfig::fast`] is the reduced profile for large
//! batch runs.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration with one section per component.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EpermConfig {
    pub llm: LlmConfig,
    pub retriever: RetrieverConfig,
    pub path_finder: PathFinderConfig,
    pub predictor: PredictorConfig,
    pub batch: BatchConfig,
}

/// `[llm]`: text-completion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API (`.../v1`).
    pub base_url: String,
    /// Bearer token; empty sends no `Authorization` header.
    pub api_key: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Cache replies by prompt text.
    pub cache_enabled: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/v1".into(),
            api_key: String::new(),
            model: "qwen3-30b-a3b-instruct".into(),
            temperature: 0.7,
            max_tokens: 2000,
            timeout_secs: 30,
            cache_enabled: true,
        }
    }
}

/// `[retriever]`: k-hop subgraph bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    pub max_hops: usize,
    pub max_nodes: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            max_hops: 2,
            max_nodes: 50,
        }
    }
}

/// Which path-finding strategy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathStrategy {
    /// Keyword/degree scoring, no model calls.
    #[default]
    Heuristic,
    /// Model-assisted entity selection and path scoring.
    Assisted,
}

/// Relative weights of the four heuristic path-score factors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub length: f64,
    pub relation: f64,
    pub popularity: f64,
    pub keywords: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            length: 0.25,
            relation: 0.25,
            popularity: 0.25,
            keywords: 0.25,
        }
    }
}

impl ScoreWeights {
    fn sum(&self) -> f64 {
        self.length + self.relation + self.popularity + self.keywords
    }

    fn all_valid(&self) -> bool {
        [self.length, self.relation, self.popularity, self.keywords]
            .iter()
            .all(|w| w.is_finite() && *w >= 0.0)
    }

    /// Scale the weights so they sum to 1. Falls back to equal weights when they sum to 0.
    pub fn normalized(&self) -> Self {
        let sum = self.sum();
        if !self.all_valid() || sum <= 0.0 {
            return Self::default();
        }
        Self {
            length: self.length / sum,
            relation: self.relation / sum,
            popularity: self.popularity / sum,
            keywords: self.keywords / sum,
        }
    }
}

/// `[path_finder]`: candidate selection and path enumeration bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathFinderConfig {
    pub strategy: PathStrategy,
    /// Paths returned per question.
    pub max_paths: usize,
    /// Edges per path.
    pub max_path_length: usize,
    /// Paths enumerated per (source, candidate) pair.
    pub paths_per_pair: usize,
    /// Answer candidates kept after entity scoring.
    pub max_candidates: usize,
    /// Cap on paths enumerated per question before scoring.
    pub max_total_paths: usize,
    /// Score paths in one combined prompt instead of one prompt per path.
    pub combined_scoring: bool,
    /// Paths per combined scoring prompt.
    pub combined_limit: usize,
    pub weights: ScoreWeights,
}

impl Default for PathFinderConfig {
    fn default() -> Self {
        Self {
            strategy: PathStrategy::default(),
            max_paths: 10,
            max_path_length: 3,
            paths_per_pair: 3,
            max_candidates: 20,
            max_total_paths: 50,
            combined_scoring: true,
            combined_limit: 15,
            weights: ScoreWeights::default(),
        }
    }
}

/// Which answer-prediction strategy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictorStrategy {
    /// Read the answer off the best path.
    #[default]
    Direct,
    /// Ask the model to compose an answer from the evidence.
    Generative,
}

/// `[predictor]`: evidence selection and confidence policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    pub strategy: PredictorStrategy,
    pub top_k_paths: usize,
    /// A selected path at or above this score counts as strong evidence.
    pub strong_evidence_threshold: f64,
    /// Confidence cap for answers produced without strong evidence.
    pub weak_confidence_ceiling: f64,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            strategy: PredictorStrategy::default(),
            top_k_paths: 3,
            strong_evidence_threshold: 0.5,
            weak_confidence_ceiling: 0.6,
        }
    }
}

/// `[batch]`: dataset run settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub batch_size: usize,
    /// Run path finding for the items of a batch on the rayon pool.
    pub parallel: bool,
    /// Send the answer prompts of a batch as one batched request.
    pub combine_requests: bool,
    /// Write a checkpoint every this many results (0 disables).
    pub save_interval: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 8,
            parallel: true,
            combine_requests: true,
            save_interval: 50,
        }
    }
}

impl EpermConfig {
    /// The reduced profile: smaller subgraphs and path sets, short timeout, low temperature.
    pub fn fast() -> Self {
        Self {
            llm: LlmConfig {
                temperature: 0.2,
                max_tokens: 1000,
                timeout_secs: 15,
                ..LlmConfig::default()
            },
            retriever: RetrieverConfig {
                max_hops: 2,
                max_nodes: 30,
            },
            path_finder: PathFinderConfig {
                max_paths: 5,
                max_path_length: 3,
                ..PathFinderConfig::default()
            },
            predictor: PredictorConfig {
                top_k_paths: 3,
                ..PredictorConfig::default()
            },
            batch: BatchConfig::default(),
        }
    }

    /// Parse TOML text, then normalize and validate. Environment overrides are not applied.
    pub fn from_toml_str(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })?;
        config.finish()
    }

    /// Load from a TOML file and apply `EPERM_*` environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let mut config = Self::from_toml_str(&content, &path.display().to_string())?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Replace `[llm]` values from `EPERM_API_KEY`, `EPERM_BASE_URL` and `EPERM_MODEL`.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("EPERM_API_KEY") {
            self.llm.api_key = key;
        }
        if let Some(url) = lookup("EPERM_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(model) = lookup("EPERM_MODEL") {
            self.llm.model = model;
        }
    }

    fn finish(mut self) -> Result<Self, ConfigError> {
        self.validate()?;
        self.path_finder.weights = self.path_finder.weights.normalized();
        Ok(self)
    }

    /// Reject settings that would disable a mandatory bound.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| {
            Err(ConfigError::Invalid {
                message: message.to_string(),
            })
        };
        if self.retriever.max_nodes == 0 {
            return invalid("`[retriever] max_nodes` must be at least 1");
        }
        if self.path_finder.max_path_length == 0 {
            return invalid("`[path_finder] max_path_length` must be at least 1");
        }
        if self.path_finder.max_paths == 0 {
            return invalid("`[path_finder] max_paths` must be at least 1");
        }
        if self.predictor.top_k_paths == 0 {
            return invalid("`[predictor] top_k_paths` must be at least 1");
        }
        let weights = &self.path_finder.weights;
        if !weights.all_valid() || weights.sum() <= 0.0 {
            return invalid("`[path_finder.weights]` must be non-negative and not all zero");
        }
        if self.llm.timeout_secs == 0 {
            return invalid("`[llm] timeout_secs` must be at least 1");
        }
        Ok(())
    }
}

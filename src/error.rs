//! Rich diagnostic error types for the eperm reasoning engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.
//!
//! Most failures inside the question-answering pipeline are *not* errors: an empty
//! retrieval or an unparseable model reply degrades to a lower-confidence answer.
//! Those outcomes are described by [`Degradation`] and recorded, never raised.

// Fields read only by the Error/Diagnostic derives trip this lint.
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

use crate::llm::LlmError;

/// Top-level error type for the eperm engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, source spans) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum EpermError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Batch(#[from] BatchError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Dataset(#[from] DatasetError),
}

// ---------------------------------------------------------------------------
// Degradations
// ---------------------------------------------------------------------------

/// Recoverable failure classes of the reasoning pipeline.
///
/// A degradation lowers the quality of a result (empty subgraph, zero-confidence
/// answer, heuristic instead of model scores) but never aborts the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Degradation {
    /// No seed entity in the question resolved against the graph.
    RetrievalEmpty,
    /// Candidates existed but no path connected them within the bounds.
    NoEvidencePaths,
    /// The text-completion collaborator replied with unparseable JSON.
    MalformedModelOutput,
    /// The text-completion collaborator timed out or was unreachable.
    ExternalCallFailure,
}

impl Degradation {
    /// Short human-readable reason, used in answers and logs.
    pub fn reason(self) -> &'static str {
        match self {
            Self::RetrievalEmpty => "no seed entities resolved in the knowledge graph",
            Self::NoEvidencePaths => "no evidence paths found in the subgraph",
            Self::MalformedModelOutput => "parse error",
            Self::ExternalCallFailure => "external call failed",
        }
    }
}

impl std::fmt::Display for Degradation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.reason())
    }
}

// ---------------------------------------------------------------------------
// Graph errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("failed to read knowledge graph file: {path}")]
    #[diagnostic(
        code(eperm::graph::io),
        help(
            "The knowledge graph file could not be read or written. \
             Check that the path exists and that you have the right permissions."
        )
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse knowledge graph document {path}: {message}")]
    #[diagnostic(
        code(eperm::graph::parse),
        help(
            "The file must be a JSON object with an \"entities\" array of \
             {{id, name, type, attributes}} and a \"relations\" array of \
             {{head, relation, tail, weight, attributes}}."
        )
    )]
    Parse { path: String, message: String },

    #[error("failed to serialize knowledge graph: {message}")]
    #[diagnostic(
        code(eperm::graph::serialize),
        help("An entity or relation attribute could not be encoded as JSON.")
    )]
    Serialize { message: String },

    #[error("failed to load entity name map {path}: {message}")]
    #[diagnostic(
        code(eperm::graph::names),
        help("The entity name map must be a flat JSON object of id -> display name.")
    )]
    NameMap { path: String, message: String },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config file: {path}")]
    #[diagnostic(
        code(eperm::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    #[diagnostic(
        code(eperm::config::parse),
        help("Check the TOML syntax. Unknown sections are rejected.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config file: {path}")]
    #[diagnostic(
        code(eperm::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {message}")]
    #[diagnostic(code(eperm::config::invalid), help("{message}"))]
    Invalid { message: String },
}

// ---------------------------------------------------------------------------
// Batch errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum BatchError {
    #[error("checkpoint I/O failed: {path}")]
    #[diagnostic(
        code(eperm::batch::checkpoint_io),
        help("Ensure the results directory exists and is writable.")
    )]
    CheckpointIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("checkpoint {path} is corrupt: {message}")]
    #[diagnostic(
        code(eperm::batch::checkpoint_parse),
        help(
            "The checkpoint must be a JSON object with \"results\", \"stats\" and \
             \"timestamp\". Delete it to start the run from scratch."
        )
    )]
    CheckpointParse { path: String, message: String },

    #[error("batch size must be at least 1")]
    #[diagnostic(
        code(eperm::batch::batch_size),
        help("Set `[batch] batch_size` to a positive number.")
    )]
    ZeroBatchSize,
}

// ---------------------------------------------------------------------------
// Dataset errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum DatasetError {
    #[error("failed to read dataset file: {path}")]
    #[diagnostic(
        code(eperm::dataset::io),
        help("Check that the dataset path exists and is readable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record on line {line} of {path}: {message}")]
    #[diagnostic(
        code(eperm::dataset::record),
        help("Each line must be one JSON object. Blank lines are skipped.")
    )]
    Record {
        path: String,
        line: usize,
        message: String,
    },
}

/// Convenience alias for functions returning eperm results.
pub type EpermResult<T> = std::result::Result<T, EpermError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_error_converts_to_eperm_error() {
        let err = GraphError::Parse {
            path: "kg.json".into(),
            message: "expected value".into(),
        };
        let top: EpermError = err.into();
        assert!(matches!(top, EpermError::Graph(GraphError::Parse { .. })));
    }

    #[test]
    fn llm_error_converts_to_eperm_error() {
        let err = LlmError::Timeout { timeout_secs: 30 };
        let top: EpermError = err.into();
        assert!(matches!(top, EpermError::Llm(LlmError::Timeout { .. })));
    }

    #[test]
    fn degradation_reasons_are_distinct() {
        let all = [
            Degradation::RetrievalEmpty,
            Degradation::NoEvidencePaths,
            Degradation::MalformedModelOutput,
            Degradation::ExternalCallFailure,
        ];
        let mut reasons: Vec<_> = all.iter().map(|d| d.reason()).collect();
        reasons.sort();
        reasons.dedup();
        assert_eq!(reasons.len(), all.len());
        assert_eq!(Degradation::MalformedModelOutput.to_string(), "parse error");
    }

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = DatasetError::Record {
            path: "qa.jsonl".into(),
            line: 7,
            message: "missing field `question`".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("line 7"));
        assert!(msg.contains("qa.jsonl"));
    }
}

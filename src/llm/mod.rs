//! Text-completion collaborator used by the assisted strategies.
//!
//! Every component that talks to a language model depends on the
//! [`TextCompletion`] trait, never on a concrete client:
//! - [`OpenAiClient`]: OpenAI-compatible `/chat/completions` over HTTP
//! - [`CachedCompletion`]: response cache keyed by exact prompt text
//! - [`ScriptedCompletion`]: deterministic in-memory responder for tests and offline runs
//!
//! Model replies are free text that should contain JSON; [`json::parse_reply`]
//! turns them into an explicit [`ParsedJson`] instead of raising.

// Fields read only by the Error/Diagnostic derives trip this lint.
#![allow(unused_assignments)]

pub mod cache;
pub mod json;
pub mod openai;
pub mod scripted;

use miette::Diagnostic;
use thiserror::Error;

use crate::error::Degradation;

pub use cache::{CacheStats, CachedCompletion};
pub use json::{ParsedJson, parse_reply};
pub use openai::OpenAiClient;
pub use scripted::ScriptedCompletion;

/// Errors from the text-completion subsystem.
///
/// All of these are `ExternalCallFailure` degradations: they fail the current
/// question (or batch item) and nothing else.
#[derive(Debug, Error, Diagnostic)]
pub enum LlmError {
    #[error("completion endpoint is not reachable at {url}")]
    #[diagnostic(
        code(eperm::llm::unavailable),
        help("Check `[llm] base_url` and that the server is running.")
    )]
    Unavailable { url: String },

    #[error("completion request failed: {message}")]
    #[diagnostic(
        code(eperm::llm::request_failed),
        help("Check the API key, the model name and the server logs.")
    )]
    RequestFailed { message: String },

    #[error("failed to parse completion response: {message}")]
    #[diagnostic(
        code(eperm::llm::parse_error),
        help("The endpoint returned something other than an OpenAI-style chat completion.")
    )]
    ParseError { message: String },

    #[error("completion request timed out after {timeout_secs}s")]
    #[diagnostic(
        code(eperm::llm::timeout),
        help("Increase `[llm] timeout_secs` or use a smaller model.")
    )]
    Timeout { timeout_secs: u64 },
}

impl LlmError {
    /// Failure class of this error: unparseable replies are malformed output,
    /// everything else is a failed external call.
    pub fn degradation(&self) -> Degradation {
        match self {
            Self::ParseError { .. } => Degradation::MalformedModelOutput,
            Self::Unavailable { .. } | Self::RequestFailed { .. } | Self::Timeout { .. } => {
                Degradation::ExternalCallFailure
            }
        }
    }
}

/// One completion request: a system prompt, a user prompt and a sampling temperature.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    /// Sampling temperature; `None` uses the client default.
    pub temperature: Option<f64>,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// A text-completion backend.
///
/// Implementations must be shareable across the batch worker pool.
pub trait TextCompletion: Send + Sync {
    /// Complete one request.
    fn generate(&self, request: &CompletionRequest) -> Result<String, LlmError>;

    /// Complete several independent requests, returning replies by position.
    ///
    /// The default issues them one after another.
    fn batch_generate(&self, requests: &[CompletionRequest]) -> Vec<Result<String, LlmError>> {
        requests.iter().map(|r| self.generate(r)).collect()
    }

    /// Whether [`batch_generate`](Self::batch_generate) is cheaper than repeated `generate` calls.
    fn supports_batch(&self) -> bool {
        false
    }

    /// Drop any cached responses.
    fn clear_cache(&self) {}

    /// Cache counters, if this backend caches.
    fn cache_stats(&self) -> Option<CacheStats> {
        None
    }
}

impl<T: TextCompletion + ?Sized> TextCompletion for std::sync::Arc<T> {
    fn generate(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        (**self).generate(request)
    }

    fn batch_generate(&self, requests: &[CompletionRequest]) -> Vec<Result<String, LlmError>> {
        (**self).batch_generate(requests)
    }

    fn supports_batch(&self) -> bool {
        (**self).supports_batch()
    }

    fn clear_cache(&self) {
        (**self).clear_cache()
    }

    fn cache_stats(&self) -> Option<CacheStats> {
        (**self).cache_stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder() {
        let req = CompletionRequest::new("sys", "user").with_temperature(0.3);
        assert_eq!(req.system, "sys");
        assert_eq!(req.temperature, Some(0.3));
    }

    #[test]
    fn default_batch_is_sequential_and_positional() {
        let client = ScriptedCompletion::from_fn(|req| Ok(format!("echo {}", req.user)));
        let replies = client.batch_generate(&[
            CompletionRequest::new("s", "one"),
            CompletionRequest::new("s", "two"),
        ]);
        let texts: Vec<String> = replies.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(texts, vec!["echo one", "echo two"]);
        assert!(!client.supports_batch());
    }

    #[test]
    fn error_messages_name_the_failure() {
        let err = LlmError::Timeout { timeout_secs: 15 };
        assert!(err.to_string().contains("15s"));
    }

    #[test]
    fn errors_map_to_degradations() {
        let unreachable = LlmError::Unavailable { url: "http://x".into() };
        assert_eq!(unreachable.degradation(), Degradation::ExternalCallFailure);
        assert_eq!(
            LlmError::Timeout { timeout_secs: 1 }.degradation(),
            Degradation::ExternalCallFailure
        );
        let garbled = LlmError::ParseError { message: "eof".into() };
        assert_eq!(garbled.degradation(), Degradation::MalformedModelOutput);
    }
}

//! In-memory text-completion backend driven by a closure.
//!
//! Used by tests and offline pipelines. Every request is recorded so callers
//! can assert on prompts and call counts.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{CompletionRequest, LlmError, TextCompletion};

type Responder = Box<dyn Fn(&CompletionRequest) -> Result<String, LlmError> + Send + Sync>;

/// Deterministic [`TextCompletion`] that answers through a responder closure.
pub struct ScriptedCompletion {
    responder: Responder,
    batch: bool,
    calls: Mutex<Vec<CompletionRequest>>,
    batch_calls: AtomicUsize,
}

impl ScriptedCompletion {
    /// Answer every request with `responder`.
    pub fn from_fn(
        responder: impl Fn(&CompletionRequest) -> Result<String, LlmError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            batch: false,
            calls: Mutex::new(Vec::new()),
            batch_calls: AtomicUsize::new(0),
        }
    }

    /// Answer every request with the same text.
    pub fn always(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        Self::from_fn(move |_| Ok(reply.clone()))
    }

    /// Fail every request as if the endpoint were unreachable.
    pub fn failing() -> Self {
        Self::from_fn(|_| {
            Err(LlmError::Unavailable {
                url: "scripted://offline".into(),
            })
        })
    }

    /// Report batch support so callers combine requests.
    pub fn with_batch_support(mut self) -> Self {
        self.batch = true;
        self
    }

    /// Every request seen so far, in arrival order.
    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().expect("scripted call log poisoned").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("scripted call log poisoned").len()
    }

    /// Number of `batch_generate` invocations.
    pub fn batch_call_count(&self) -> usize {
        self.batch_calls.load(Ordering::Relaxed)
    }
}

impl TextCompletion for ScriptedCompletion {
    fn generate(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.calls
            .lock()
            .expect("scripted call log poisoned")
            .push(request.clone());
        (self.responder)(request)
    }

    fn batch_generate(&self, requests: &[CompletionRequest]) -> Vec<Result<String, LlmError>> {
        self.batch_calls.fetch_add(1, Ordering::Relaxed);
        requests.iter().map(|r| self.generate(r)).collect()
    }

    fn supports_batch(&self) -> bool {
        self.batch
    }
}

impl std::fmt::Debug for ScriptedCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedCompletion")
            .field("batch", &self.batch)
            .field("calls", &self.call_count())
            .finish()
    }
}

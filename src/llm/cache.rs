//! Response cache keyed by exact prompt text.
//!
//! The cache grows without bound until [`CachedCompletion::clear`] is called.
//! Temperature is not part of the key.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;

use super::{CompletionRequest, LlmError, TextCompletion};

/// Hit/miss counters of a [`CachedCompletion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Wraps a backend and memoizes successful replies.
pub struct CachedCompletion<C> {
    inner: C,
    /// (system, user) → reply.
    entries: DashMap<(String, String), String>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<C: TextCompletion> CachedCompletion<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// The wrapped backend.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Remove every cached reply. Counters are kept.
    pub fn clear(&self) {
        let dropped = self.entries.len();
        self.entries.clear();
        tracing::debug!(dropped, "completion cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn key(request: &CompletionRequest) -> (String, String) {
        (request.system.clone(), request.user.clone())
    }

    fn lookup(&self, key: &(String, String)) -> Option<String> {
        let hit = self.entries.get(key).map(|v| v.value().clone());
        match hit {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        hit
    }
}

impl<C: TextCompletion> TextCompletion for CachedCompletion<C> {
    fn generate(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let key = Self::key(request);
        if let Some(reply) = self.lookup(&key) {
            tracing::trace!("completion cache hit");
            return Ok(reply);
        }
        let reply = self.inner.generate(request)?;
        self.entries.insert(key, reply.clone());
        Ok(reply)
    }

    /// Serves hits from the cache and forwards only the misses, in one inner batch.
    fn batch_generate(&self, requests: &[CompletionRequest]) -> Vec<Result<String, LlmError>> {
        let mut replies: Vec<Option<Result<String, LlmError>>> = Vec::with_capacity(requests.len());
        let mut missing: Vec<usize> = Vec::new();
        for (i, request) in requests.iter().enumerate() {
            match self.lookup(&Self::key(request)) {
                Some(reply) => replies.push(Some(Ok(reply))),
                None => {
                    replies.push(None);
                    missing.push(i);
                }
            }
        }

        if !missing.is_empty() {
            let forwarded: Vec<CompletionRequest> =
                missing.iter().map(|&i| requests[i].clone()).collect();
            let fresh = self.inner.batch_generate(&forwarded);
            for (&i, reply) in missing.iter().zip(fresh) {
                if let Ok(text) = &reply {
                    self.entries.insert(Self::key(&requests[i]), text.clone());
                }
                replies[i] = Some(reply);
            }
        }

        replies
            .into_iter()
            .map(|r| {
                r.unwrap_or_else(|| {
                    Err(LlmError::RequestFailed {
                        message: "backend returned fewer replies than requests".into(),
                    })
                })
            })
            .collect()
    }

    fn supports_batch(&self) -> bool {
        self.inner.supports_batch()
    }

    fn clear_cache(&self) {
        self.clear();
    }

    fn cache_stats(&self) -> Option<CacheStats> {
        Some(self.stats())
    }
}

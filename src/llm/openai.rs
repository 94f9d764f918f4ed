//! Client for OpenAI-compatible chat completion endpoints.

use std::time::Duration;

use rayon::prelude::*;

use crate::config::LlmConfig;

use super::{CompletionRequest, LlmError, TextCompletion};

/// Blocking client for `POST {base_url}/chat/completions`.
pub struct OpenAiClient {
    config: LlmConfig,
    agent: ureq::Agent,
}

impl OpenAiClient {
    /// Create a client. No request is made until the first completion.
    pub fn new(config: LlmConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        Self { config, agent }
    }

    /// Get the model name being used.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn map_transport(&self, err: ureq::Error) -> LlmError {
        match err {
            ureq::Error::Status(status, resp) => {
                let body = resp.into_string().unwrap_or_default();
                LlmError::RequestFailed {
                    message: format!("server returned status {status}: {body}"),
                }
            }
            ureq::Error::Transport(transport) => {
                let message = transport.to_string();
                if message.contains("timed out") {
                    LlmError::Timeout {
                        timeout_secs: self.config.timeout_secs,
                    }
                } else if transport.kind() == ureq::ErrorKind::ConnectionFailed {
                    LlmError::Unavailable {
                        url: self.config.base_url.clone(),
                    }
                } else {
                    LlmError::RequestFailed { message }
                }
            }
        }
    }
}

impl TextCompletion for OpenAiClient {
    fn generate(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": request.user},
            ],
            "temperature": request.temperature.unwrap_or(self.config.temperature),
            "max_tokens": self.config.max_tokens,
        });

        let body_str = serde_json::to_string(&body).map_err(|e| LlmError::RequestFailed {
            message: format!("JSON serialize error: {e}"),
        })?;

        let mut call = self
            .agent
            .post(&self.endpoint())
            .set("Content-Type", "application/json");
        if !self.config.api_key.is_empty() {
            call = call.set("Authorization", &format!("Bearer {}", self.config.api_key));
        }
        let resp = call
            .send_string(&body_str)
            .map_err(|e| self.map_transport(e))?;

        let resp_str = resp.into_string().map_err(|e| LlmError::ParseError {
            message: e.to_string(),
        })?;
        let json: serde_json::Value =
            serde_json::from_str(&resp_str).map_err(|e| LlmError::ParseError {
                message: e.to_string(),
            })?;

        json["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| LlmError::ParseError {
                message: "missing 'choices[0].message.content' field".into(),
            })
    }

    /// Issues the requests concurrently; replies keep request order.
    fn batch_generate(&self, requests: &[CompletionRequest]) -> Vec<Result<String, LlmError>> {
        tracing::debug!(requests = requests.len(), model = %self.config.model, "batched completion");
        requests.par_iter().map(|r| self.generate(r)).collect()
    }

    fn supports_batch(&self) -> bool {
        true
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("timeout_secs", &self.config.timeout_secs)
            .finish()
    }
}

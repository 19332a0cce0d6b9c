//! Ollama adapter: analyzes one batch per `/api/generate` call.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::BackendError;
use super::traits::AnalysisBackend;
use super::types::{AnalysisPayload, Batch, BatchRequest};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

const SYSTEM_PROMPT: &str = "You are a log and conversation analyst. \
Read the records and answer with a JSON object: \
{\"summary\": string, \"issues\": [string]}. Output valid JSON only.";

/// Analysis backend backed by a local Ollama instance.
pub struct OllamaBackend {
    base_url: String,
    model: String,
    system_prompt: String,
    client: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            system_prompt: SYSTEM_PROMPT.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Replace the default instruction sent with every batch.
    pub fn with_system_prompt(mut self, system_prompt: &str) -> Self {
        self.system_prompt = system_prompt.to_string();
        self
    }

    pub fn default_local(model: &str) -> Self {
        Self::new(DEFAULT_OLLAMA_URL, model)
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    format: &'a str,
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// One line per record, under a header naming the tier and position.
pub fn build_prompt(batch: &Batch) -> String {
    let mut prompt = format!(
        "Tier: {} (priority {}), batch {} with {} records.\n\nRecords:\n",
        batch.tier,
        batch.priority,
        batch.sequence,
        batch.len()
    );
    for entry in &batch.entries {
        prompt.push_str(&format!(
            "[{}] {} {}: {}\n",
            entry.timestamp.to_rfc3339(),
            entry.level.as_str().to_uppercase(),
            entry.source,
            entry.message
        ));
    }
    prompt
}

/// Structured payload when the model complied, raw text as the summary otherwise.
pub fn parse_payload(raw: &str) -> Result<AnalysisPayload, BackendError> {
    let text = strip_code_fence(raw.trim());
    if text.is_empty() {
        return Err(BackendError::MalformedResponse("empty response".into()));
    }
    match serde_json::from_str::<AnalysisPayload>(text) {
        Ok(payload) => Ok(payload),
        Err(e) => {
            tracing::debug!(error = %e, "Model output is not a payload object, keeping raw text");
            Ok(AnalysisPayload {
                summary: text.to_string(),
                ..Default::default()
            })
        }
    }
}

fn strip_code_fence(text: &str) -> &str {
    text.strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .and_then(|t| t.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(text)
}

#[async_trait]
impl AnalysisBackend for OllamaBackend {
    async fn analyze(&self, request: BatchRequest<'_>) -> Result<AnalysisPayload, BackendError> {
        let url = format!("{}/api/generate", self.base_url);
        let prompt = build_prompt(request.batch);
        let body = GenerateRequest {
            model: &self.model,
            prompt: &prompt,
            system: &self.system_prompt,
            stream: false,
            format: "json",
        };

        let response = self
            .client
            .post(&url)
            .timeout(request.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e, request.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout(request.timeout)
            } else {
                BackendError::MalformedResponse(e.to_string())
            }
        })?;

        parse_payload(&parsed.response)
    }
}

impl OllamaBackend {
    fn map_send_error(&self, e: reqwest::Error, timeout: Duration) -> BackendError {
        if e.is_timeout() {
            BackendError::Timeout(timeout)
        } else if e.is_connect() {
            BackendError::Connection(self.base_url.clone())
        } else {
            BackendError::Http(e.to_string())
        }
    }
}

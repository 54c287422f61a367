//! Chat-completions HTTP adapter.
//!
//! Works with OpenAI, Azure-style proxies, Ollama, vLLM, and any other
//! endpoint following the OpenAI chat-completions contract. Each call is a
//! single non-streaming POST with a hard 15 s deadline; timeouts are fatal
//! to the tick, never to the engine.

use std::time::{Duration, Instant};

use serde_json::Value;

use sn_domain::error::{Error, Result};

/// Per-request deadline. The tick engine treats this as a tick failure and
/// walks the model chain.
pub const CHAT_TIMEOUT: Duration = Duration::from_secs(15);

/// Result of one successful chat call.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub content: String,
    /// Model name echoed by the endpoint, falling back to the requested one.
    pub model: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub latency_ms: u64,
}

/// Seam for the chain walker so tests can stub the remote endpoint.
#[async_trait::async_trait]
pub trait ChatTransport: Send + Sync {
    async fn chat(&self, model: &str, prompt: &str) -> Result<ChatOutcome>;
}

/// Live HTTP implementation of [`ChatTransport`].
pub struct ChatClient {
    base_url: String,
    api_key: Option<String>,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
}

impl ChatClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(CHAT_TIMEOUT)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            max_tokens,
            temperature,
            client,
        })
    }

    fn build_body(&self, model: &str, prompt: &str) -> Value {
        serde_json::json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        })
    }
}

#[async_trait::async_trait]
impl ChatTransport for ChatClient {
    async fn chat(&self, model: &str, prompt: &str) -> Result<ChatOutcome> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_body(model, prompt);

        tracing::debug!(model = %model, url = %url, "chat request");

        let start = Instant::now();
        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }

        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(format!("model '{model}' timed out after {CHAT_TIMEOUT:?}"))
            } else {
                Error::Http(e.to_string())
            }
        })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
        let latency_ms = start.elapsed().as_millis() as u64;

        if !status.is_success() {
            return Err(Error::Model {
                model: model.to_string(),
                message: format!("HTTP {} - {}", status.as_u16(), text),
            });
        }

        let json: Value = serde_json::from_str(&text)?;
        let outcome = parse_chat_response(&json, model)?;
        Ok(ChatOutcome {
            latency_ms,
            ..outcome
        })
    }
}

fn parse_chat_response(body: &Value, requested_model: &str) -> Result<ChatOutcome> {
    let message = body
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
        .and_then(|c| c.get("message"))
        .ok_or_else(|| Error::Model {
            model: requested_model.to_string(),
            message: "no choices in response".into(),
        })?;

    let content = message
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let model = body
        .get("model")
        .and_then(|v| v.as_str())
        .unwrap_or(requested_model)
        .to_string();

    let usage = body.get("usage");
    let tokens_in = usage
        .and_then(|u| u.get("prompt_tokens"))
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as u32;
    let tokens_out = usage
        .and_then(|u| u.get("completion_tokens"))
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as u32;

    Ok(ChatOutcome {
        content,
        model,
        tokens_in,
        tokens_out,
        latency_ms: 0,
    })
}

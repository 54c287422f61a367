//! Model fallback chain.
//!
//! The tick engine calls `[primary, ...fallbacks]` in order; any failure
//! (HTTP non-2xx, timeout, network) moves to the next model. Exhausting the
//! chain fails the tick with `ModelUnavailable`. Every attempt is reported
//! through an observer so the caller can record one `llmCall` span per
//! attempt.

use sn_domain::error::{Error, Result};
use sn_domain::now_ms;

use crate::client::{ChatOutcome, ChatTransport};

/// Record of one chain attempt, successful or not.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub model: String,
    /// Wall clock at attempt start, ms since epoch.
    pub started_at: i64,
    pub latency_ms: u64,
    pub tokens_in: u32,
    pub tokens_out: u32,
    /// `None` means the attempt succeeded.
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ModelChain {
    pub primary: String,
    pub fallbacks: Vec<String>,
}

impl ModelChain {
    pub fn new(primary: impl Into<String>, fallbacks: Vec<String>) -> Self {
        Self {
            primary: primary.into(),
            fallbacks,
        }
    }

    /// Models in the order they will be tried.
    pub fn candidates(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary.as_str()).chain(self.fallbacks.iter().map(String::as_str))
    }

    /// Walk the chain until one model answers.
    ///
    /// `observe` is called once per attempt, in order, including the
    /// successful one.
    pub async fn invoke(
        &self,
        transport: &dyn ChatTransport,
        prompt: &str,
        observe: &mut (dyn FnMut(Attempt) + Send),
    ) -> Result<ChatOutcome> {
        let mut last_error: Option<Error> = None;

        for model in self.candidates() {
            let started_at = now_ms();
            let started = std::time::Instant::now();
            match transport.chat(model, prompt).await {
                Ok(outcome) => {
                    observe(Attempt {
                        model: model.to_string(),
                        started_at,
                        latency_ms: outcome.latency_ms,
                        tokens_in: outcome.tokens_in,
                        tokens_out: outcome.tokens_out,
                        error: None,
                    });
                    return Ok(outcome);
                }
                Err(e) => {
                    tracing::warn!(model = %model, error = %e, "model attempt failed, trying next");
                    observe(Attempt {
                        model: model.to_string(),
                        started_at,
                        latency_ms: started.elapsed().as_millis() as u64,
                        tokens_in: 0,
                        tokens_out: 0,
                        error: Some(e.to_string()),
                    });
                    last_error = Some(e);
                }
            }
        }

        let detail = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no models configured".into());
        Err(Error::ModelUnavailable(format!(
            "all {} model(s) failed; last error: {detail}",
            1 + self.fallbacks.len()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Stub transport: fails `failures` times, then succeeds.
    struct FlakyTransport {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ChatTransport for FlakyTransport {
        async fn chat(&self, model: &str, _prompt: &str) -> Result<ChatOutcome> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(Error::Model {
                    model: model.to_string(),
                    message: "HTTP 500 - upstream".into(),
                })
            } else {
                Ok(ChatOutcome {
                    content: r#"{"hud":"ok","digest":"fine"}"#.into(),
                    model: model.to_string(),
                    tokens_in: 10,
                    tokens_out: 5,
                    latency_ms: 7,
                })
            }
        }
    }

    #[tokio::test]
    async fn falls_back_after_primary_failure() {
        let chain = ModelChain::new("primary", vec!["backup-a".into(), "backup-b".into()]);
        let transport = FlakyTransport {
            failures: 1,
            calls: AtomicUsize::new(0),
        };

        let mut attempts = Vec::new();
        let out = chain
            .invoke(&transport, "p", &mut |a| attempts.push(a))
            .await
            .expect("fallback should answer");

        assert_eq!(out.model, "backup-a");
        assert_eq!(attempts.len(), 2);
        assert!(attempts[0].error.is_some());
        assert!(attempts[1].error.is_none());
        assert_eq!(attempts[1].model, "backup-a");
    }

    #[tokio::test]
    async fn exhausted_chain_is_model_unavailable() {
        let chain = ModelChain::new("primary", vec!["backup".into()]);
        let transport = FlakyTransport {
            failures: 99,
            calls: AtomicUsize::new(0),
        };

        let mut attempts = Vec::new();
        let err = chain
            .invoke(&transport, "p", &mut |a| attempts.push(a))
            .await
            .expect_err("must exhaust");

        assert!(matches!(err, Error::ModelUnavailable(_)));
        assert_eq!(attempts.len(), 2);
        assert!(attempts.iter().all(|a| a.error.is_some()));
    }

    #[tokio::test]
    async fn primary_success_makes_one_attempt() {
        let chain = ModelChain::new("primary", vec!["backup".into()]);
        let transport = FlakyTransport {
            failures: 0,
            calls: AtomicUsize::new(0),
        };

        let mut attempts = Vec::new();
        let out = chain
            .invoke(&transport, "p", &mut |a| attempts.push(a))
            .await
            .expect("primary answers");
        assert_eq!(out.model, "primary");
        assert_eq!(attempts.len(), 1);
    }
}

//! HTTP hook fallback.
//!
//! Used when the RPC socket is down or died mid-call. The hook wakes the
//! assistant out-of-band; no response body is captured, only the status.

use std::time::Duration;

use sn_domain::error::{Error, Result};

const HOOK_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HookClient {
    url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HookClient {
    pub fn new(url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(HOOK_TIMEOUT)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            token,
            client,
        })
    }

    /// Fire-and-forget wake. A non-2xx status is an error the caller counts;
    /// nothing else comes back.
    pub async fn post_wake(&self, message: &str, session_key: &str) -> Result<()> {
        let body = serde_json::json!({
            "message": message,
            "name": "sinain-core",
            "sessionKey": session_key,
            "wakeMode": "now",
            "deliver": false,
        });

        let mut req = self.client.post(&self.url).json(&body);
        if let Some(token) = &self.token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }

        let resp = req.send().await.map_err(|e| Error::Http(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Http(format!("hook returned HTTP {}", status.as_u16())));
        }
        tracing::debug!(session_key = %session_key, "hook wake delivered");
        Ok(())
    }
}

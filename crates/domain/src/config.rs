//! Configuration tree for the sinain hub.
//!
//! Loaded from a TOML file; secrets come from the environment
//! (`SINAIN_MODEL_KEY`, `SINAIN_GATEWAY_TOKEN`, `SINAIN_HOOK_TOKEN`) so they
//! never sit in the config file on disk.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub escalation: EscalationConfig,
    #[serde(default)]
    pub openclaw: OpenclawConfig,
    #[serde(default)]
    pub situation: SituationConfig,
    #[serde(default)]
    pub trace: TraceConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind port for both the HTTP ingress surface and the overlay
    /// fan-out socket.
    #[serde(default = "d_ws_port")]
    pub ws_port: u16,
    #[serde(default = "d_host")]
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ws_port: d_ws_port(),
            host: "127.0.0.1".into(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Agent (tick engine)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,
    /// Chat-completion endpoint base URL (OpenAI-compatible).
    #[serde(default = "d_model_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key for the model endpoint.
    #[serde(default = "d_model_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_model")]
    pub model: String,
    /// Tried in order when the primary model fails.
    #[serde(default)]
    pub fallback_models: Vec<String>,
    #[serde(default = "d_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "d_temperature")]
    pub temperature: f32,
    #[serde(default = "d_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "d_max_interval_ms")]
    pub max_interval_ms: u64,
    #[serde(default = "d_tick_cooldown_ms")]
    pub cooldown_ms: u64,
    /// Context window age bound.
    #[serde(default = "d_max_age_ms")]
    pub max_age_ms: i64,
    #[serde(default)]
    pub richness: RichnessLevel,
    /// Push HUD changes into the feed buffer.
    #[serde(default = "d_true")]
    pub push_to_feed: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: d_model_base_url(),
            api_key_env: d_model_key_env(),
            model: d_model(),
            fallback_models: Vec::new(),
            max_tokens: d_max_tokens(),
            temperature: d_temperature(),
            debounce_ms: d_debounce_ms(),
            max_interval_ms: d_max_interval_ms(),
            cooldown_ms: d_tick_cooldown_ms(),
            max_age_ms: d_max_age_ms(),
            richness: RichnessLevel::default(),
            push_to_feed: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RichnessLevel {
    Lean,
    #[default]
    Standard,
    Rich,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Escalation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EscalationMode {
    #[default]
    Off,
    Selective,
    Focus,
    Rich,
}

impl fmt::Display for EscalationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EscalationMode::Off => "off",
            EscalationMode::Selective => "selective",
            EscalationMode::Focus => "focus",
            EscalationMode::Rich => "rich",
        };
        f.write_str(s)
    }
}

impl EscalationMode {
    /// Focus and rich escalate unconditionally (subject to cooldown).
    pub fn always_escalates(&self) -> bool {
        matches!(self, EscalationMode::Focus | EscalationMode::Rich)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationConfig {
    #[serde(default)]
    pub mode: EscalationMode,
    #[serde(default = "d_escalation_cooldown_ms")]
    pub cooldown_ms: i64,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            mode: EscalationMode::Off,
            cooldown_ms: d_escalation_cooldown_ms(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// OpenClaw assistant gateway
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenclawConfig {
    /// WebSocket base URL of the assistant gateway. Empty disables RPC.
    #[serde(default)]
    pub gateway_ws_url: String,
    /// Environment variable holding the gateway auth token.
    #[serde(default = "d_gateway_token_env")]
    pub gateway_token_env: String,
    /// HTTP fallback hook URL. Empty disables the fallback.
    #[serde(default)]
    pub hook_url: String,
    /// Environment variable holding the hook bearer token.
    #[serde(default = "d_hook_token_env")]
    pub hook_token_env: String,
    #[serde(default = "d_session_key")]
    pub session_key: String,
}

impl Default for OpenclawConfig {
    fn default() -> Self {
        Self {
            gateway_ws_url: String::new(),
            gateway_token_env: d_gateway_token_env(),
            hook_url: String::new(),
            hook_token_env: d_hook_token_env(),
            session_key: d_session_key(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Situation snapshot file
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SituationConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,
    #[serde(default = "d_situation_path")]
    pub path: PathBuf,
}

impl Default for SituationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: d_situation_path(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trace journal
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,
    #[serde(default = "d_trace_dir")]
    pub dir: PathBuf,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: d_trace_dir(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good. A missing model key
    /// while the agent is enabled is a warning, not an error: the hub still
    /// serves ingress and fan-out, only the tick engine stays down.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.server.ws_port == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "ws_port".into(),
                message: "port must be greater than 0".into(),
            });
        }

        if self.agent.enabled && std::env::var(&self.agent.api_key_env).is_err() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "agent.api_key_env".into(),
                message: format!(
                    "{} is unset — the tick engine will be disabled",
                    self.agent.api_key_env
                ),
            });
        }

        if self.agent.debounce_ms == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "agent.debounce_ms".into(),
                message: "zero debounce ticks on every event".into(),
            });
        }

        if self.escalation.mode != EscalationMode::Off
            && self.openclaw.gateway_ws_url.is_empty()
            && self.openclaw.hook_url.is_empty()
        {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "openclaw".into(),
                message: "escalation enabled but neither gateway_ws_url nor hook_url is set"
                    .into(),
            });
        }

        issues
    }

    /// Read the model API key from the configured env var, if present.
    pub fn model_api_key(&self) -> Option<String> {
        std::env::var(&self.agent.api_key_env).ok()
    }

    /// Read the gateway WS auth token from the configured env var.
    pub fn gateway_token(&self) -> Option<String> {
        std::env::var(&self.openclaw.gateway_token_env).ok()
    }

    /// Read the HTTP hook bearer token from the configured env var.
    pub fn hook_token(&self) -> Option<String> {
        std::env::var(&self.openclaw.hook_token_env).ok()
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_true() -> bool {
    true
}
fn d_ws_port() -> u16 {
    8700
}
fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_model_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn d_model_key_env() -> String {
    "SINAIN_MODEL_KEY".into()
}
fn d_model() -> String {
    "gpt-4o-mini".into()
}
fn d_max_tokens() -> u32 {
    400
}
fn d_temperature() -> f32 {
    0.3
}
fn d_debounce_ms() -> u64 {
    3_000
}
fn d_max_interval_ms() -> u64 {
    30_000
}
fn d_tick_cooldown_ms() -> u64 {
    5_000
}
fn d_max_age_ms() -> i64 {
    120_000
}
fn d_escalation_cooldown_ms() -> i64 {
    90_000
}
fn d_gateway_token_env() -> String {
    "SINAIN_GATEWAY_TOKEN".into()
}
fn d_hook_token_env() -> String {
    "SINAIN_HOOK_TOKEN".into()
}
fn d_session_key() -> String {
    "sinain-hud".into()
}
fn d_situation_path() -> PathBuf {
    PathBuf::from("./data/situation.md")
}
fn d_trace_dir() -> PathBuf {
    PathBuf::from("./data/traces")
}

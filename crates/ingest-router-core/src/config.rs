//! Router configuration.
//!
//! [`RouterConfig`] carries process-level settings loaded from environment
//! variables. The routing rules themselves, together with per-backend retry
//! overrides, live in a JSON [`RulesDocument`] named by `ROUTING_RULES_FILE`.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use ingest_router_model::{BackendKind, RoutingRule};

use crate::error::{RouterError, RouterResult};

/// Router process configuration.
///
/// # Examples
///
/// ```
/// use ingest_router_core::config::RouterConfig;
///
/// let config = RouterConfig::default();
/// assert_eq!(config.gateway_listen, "0.0.0.0:4580");
/// assert_eq!(config.max_attempts, 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct RouterConfig {
    /// Bind address for the HTTP gateway.
    #[builder(default = String::from("0.0.0.0:4580"))]
    pub gateway_listen: String,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,

    /// Log output format, `"text"` or `"json"`.
    #[builder(default = String::from("text"))]
    pub log_format: String,

    /// Path of the JSON rules document.
    #[builder(default = String::from("rules.json"))]
    pub rules_file: String,

    /// Reject rule tables where two same-kind rules can match one key.
    #[builder(default = false)]
    pub exclusive_backends: bool,

    /// Default attempt bound per chain.
    #[builder(default = 2)]
    pub max_attempts: u32,

    /// Default event age bound, in seconds.
    #[builder(default = 21_600)]
    pub max_event_age_secs: u64,

    /// Default delay between attempts, in milliseconds.
    #[builder(default = 1_000)]
    pub retry_delay_ms: u64,

    /// Base URL of the FastPath function endpoint.
    #[builder(default, setter(strip_option, into))]
    pub fast_path_endpoint: Option<String>,

    /// Base URL of the workflow engine.
    #[builder(default, setter(strip_option, into))]
    pub batch_endpoint: Option<String>,

    /// Base URL of the job queue service.
    #[builder(default, setter(strip_option, into))]
    pub heavy_compute_endpoint: Option<String>,

    /// How long a FastPath call may hold the handling path, in milliseconds.
    #[builder(default = 60_000)]
    pub fast_path_timeout_ms: u64,

    /// How long a workflow start or job submission may wait for acknowledgment.
    #[builder(default = 10_000)]
    pub submit_timeout_ms: u64,

    /// JSON-lines dead-letter file; in-memory store when unset.
    #[builder(default, setter(strip_option, into))]
    pub dead_letter_file: Option<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            gateway_listen: String::from("0.0.0.0:4580"),
            log_level: String::from("info"),
            log_format: String::from("text"),
            rules_file: String::from("rules.json"),
            exclusive_backends: false,
            max_attempts: 2,
            max_event_age_secs: 21_600,
            retry_delay_ms: 1_000,
            fast_path_endpoint: None,
            batch_endpoint: None,
            heavy_compute_endpoint: None,
            fast_path_timeout_ms: 60_000,
            submit_timeout_ms: 10_000,
            dead_letter_file: None,
        }
    }
}

impl RouterConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables (falling back to defaults):
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `GATEWAY_LISTEN` | `0.0.0.0:4580` |
    /// | `LOG_LEVEL` | `info` |
    /// | `LOG_FORMAT` | `text` |
    /// | `ROUTING_RULES_FILE` | `rules.json` |
    /// | `EXCLUSIVE_BACKENDS` | `false` |
    /// | `MAX_ATTEMPTS` | `2` |
    /// | `MAX_EVENT_AGE_SECS` | `21600` |
    /// | `RETRY_DELAY_MS` | `1000` |
    /// | `FAST_PATH_ENDPOINT` | unset |
    /// | `BATCH_ENDPOINT` | unset |
    /// | `HEAVY_COMPUTE_ENDPOINT` | unset |
    /// | `FAST_PATH_TIMEOUT_MS` | `60000` |
    /// | `SUBMIT_TIMEOUT_MS` | `10000` |
    /// | `DEAD_LETTER_FILE` | unset |
    ///
    /// Unparseable numbers keep their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("GATEWAY_LISTEN") {
            config.gateway_listen = v;
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            config.log_level = v;
        }
        if let Ok(v) = std::env::var("LOG_FORMAT") {
            config.log_format = v;
        }
        if let Ok(v) = std::env::var("ROUTING_RULES_FILE") {
            config.rules_file = v;
        }
        if let Ok(v) = std::env::var("EXCLUSIVE_BACKENDS") {
            config.exclusive_backends = parse_bool(&v);
        }
        if let Some(n) = env_number("MAX_ATTEMPTS") {
            config.max_attempts = n;
        }
        if let Some(n) = env_number("MAX_EVENT_AGE_SECS") {
            config.max_event_age_secs = n;
        }
        if let Some(n) = env_number("RETRY_DELAY_MS") {
            config.retry_delay_ms = n;
        }
        config.fast_path_endpoint = env_non_empty("FAST_PATH_ENDPOINT");
        config.batch_endpoint = env_non_empty("BATCH_ENDPOINT");
        config.heavy_compute_endpoint = env_non_empty("HEAVY_COMPUTE_ENDPOINT");
        if let Some(n) = env_number("FAST_PATH_TIMEOUT_MS") {
            config.fast_path_timeout_ms = n;
        }
        if let Some(n) = env_number("SUBMIT_TIMEOUT_MS") {
            config.submit_timeout_ms = n;
        }
        config.dead_letter_file = env_non_empty("DEAD_LETTER_FILE");

        config
    }

    /// Configured endpoint for a backend kind.
    #[must_use]
    pub fn endpoint(&self, kind: BackendKind) -> Option<&str> {
        match kind {
            BackendKind::FastPath => self.fast_path_endpoint.as_deref(),
            BackendKind::BatchOrchestration => self.batch_endpoint.as_deref(),
            BackendKind::HeavyCompute => self.heavy_compute_endpoint.as_deref(),
        }
    }

    /// FastPath call timeout.
    #[must_use]
    pub fn fast_path_timeout(&self) -> Duration {
        Duration::from_millis(self.fast_path_timeout_ms)
    }

    /// Submission acknowledgment timeout.
    #[must_use]
    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }

    /// Whether logs should be emitted as JSON.
    #[must_use]
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

/// Retry settings overriding the process defaults for one backend kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RetryOverride {
    /// Attempt bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    /// Event age bound, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_event_age_secs: Option<u64>,
    /// Delay between attempts, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay_ms: Option<u64>,
}

/// Per-backend-kind retry overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RetryOverrides {
    /// FastPath override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fast_path: Option<RetryOverride>,
    /// BatchOrchestration override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_orchestration: Option<RetryOverride>,
    /// HeavyCompute override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heavy_compute: Option<RetryOverride>,
}

impl RetryOverrides {
    /// Override for a backend kind, if any.
    #[must_use]
    pub fn get(&self, kind: BackendKind) -> Option<&RetryOverride> {
        match kind {
            BackendKind::FastPath => self.fast_path.as_ref(),
            BackendKind::BatchOrchestration => self.batch_orchestration.as_ref(),
            BackendKind::HeavyCompute => self.heavy_compute.as_ref(),
        }
    }
}

/// Contents of the rules file.
///
/// ```json
/// {
///   "rules": [
///     {"id": "orders", "keyPrefix": "lambda/", "keySuffix": ".csv",
///      "backendKind": "fastPath", "target": "ingest-orders"}
///   ],
///   "retry": {"heavyCompute": {"maxAttempts": 3}}
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RulesDocument {
    /// Routing rules in evaluation order.
    pub rules: Vec<RoutingRule>,
    /// Retry overrides.
    #[serde(default)]
    pub retry: RetryOverrides,
}

impl RulesDocument {
    /// Read and parse a rules file.
    pub fn load(path: impl AsRef<Path>) -> RouterResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| RouterError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&raw).map_err(|source| RouterError::InvalidRules {
            path: path.display().to_string(),
            source,
        })
    }

    /// Parse a rules document from a JSON string.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

fn env_number<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

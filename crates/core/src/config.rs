use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub rules: RulesConfig,
    pub store: StoreConfig,
    pub elasticsearch: ElasticsearchConfig,
    pub metrics: MetricsConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `RISKGATE_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("RISKGATE_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            server: ServerConfig::from_env_profiled(p),
            rules: RulesConfig::from_env_profiled(p),
            store: StoreConfig::from_env_profiled(p),
            elasticsearch: ElasticsearchConfig::from_env_profiled(p),
            metrics: MetricsConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:        {}:{}", self.server.host, self.server.port);
        tracing::info!(
            "  rules:         path={}, reload_interval={}ms, watch={}",
            self.rules.path.display(),
            self.rules.reload_interval_ms,
            self.rules.watch
        );
        tracing::info!(
            "  store:         backend={}, timeout={}ms",
            self.store.backend,
            self.store.timeout_ms
        );
        tracing::info!(
            "  elasticsearch: url={}, events={}, blacklist={}",
            self.elasticsearch.base_url(),
            self.elasticsearch.events_index,
            self.elasticsearch.blacklist_index
        );
        tracing::info!("  metrics:       capacity={}", self.metrics.capacity);
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "HOST", "0.0.0.0"),
            port: profiled_env_u16(p, "PORT", 8003),
            cors_origin: profiled_env_or(p, "CORS_ORIGIN", "*"),
        }
    }
}

// ── Rules ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    /// YAML file holding `score_reject_threshold` and the rule list.
    pub path: PathBuf,
    /// Minimum spacing between modification-time checks.
    pub reload_interval_ms: u64,
    /// Also reload on filesystem notifications, not only on polling.
    pub watch: bool,
}

impl RulesConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            path: PathBuf::from(profiled_env_or(p, "RULES_CONFIG_PATH", "config/rules.yaml")),
            reload_interval_ms: profiled_env_u64(p, "RULES_RELOAD_INTERVAL_MS", 2000),
            watch: profiled_env_bool(p, "RULES_WATCH", false),
        }
    }
}

// ── Analytical store ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "elasticsearch", "memory" or "none"
    pub backend: String,
    /// Upper bound for a single store round trip.
    pub timeout_ms: u64,
}

impl StoreConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            backend: profiled_env_or(p, "ANALYTICS_BACKEND", "elasticsearch").to_lowercase(),
            timeout_ms: profiled_env_u64(p, "STORE_TIMEOUT_MS", 800),
        }
    }
}

// ── Elasticsearch ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticsearchConfig {
    pub host: String,
    pub port: u16,
    pub scheme: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub events_index: String,
    pub blacklist_index: String,
}

impl ElasticsearchConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "ELASTICSEARCH_HOST", "localhost"),
            port: profiled_env_u16(p, "ELASTICSEARCH_PORT", 9200),
            scheme: profiled_env_or(p, "ELASTICSEARCH_SCHEME", "http"),
            username: profiled_env_opt(p, "ELASTICSEARCH_USER"),
            password: profiled_env_opt(p, "ELASTICSEARCH_PASSWORD"),
            events_index: profiled_env_or(p, "RISK_EVENTS_INDEX", "risk_events"),
            blacklist_index: profiled_env_or(p, "RISK_BLACKLIST_INDEX", "risk_blacklist"),
        }
    }

    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

// ── Realtime metrics ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Ring buffer capacity for the in-process decision window.
    pub capacity: usize,
}

impl MetricsConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            capacity: profiled_env_u64(p, "METRICS_CAPACITY", 5000) as usize,
        }
    }
}

//! Configuration loading and validation for lingxi.
//!
//! Loads configuration from `lingxi.toml` (path overridable via
//! `LINGXI_CONFIG`) with environment variable overrides (`LLM_API_KEY`,
//! `WEATHER_API_KEY`, ...), so deployments can stay file-free and drive
//! everything from the environment.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// The root configuration structure.
///
/// Everything here is established at process start and read-only
/// afterwards; no component mutates configuration at runtime.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Language oracle (LLM) settings
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Weather provider credentials
    #[serde(default)]
    pub weather: WeatherConfig,

    /// News provider credentials
    #[serde(default)]
    pub news: NewsConfig,

    /// Stock provider credentials
    #[serde(default)]
    pub stock: StockConfig,

    /// Tool invocation settings
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Language oracle settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// API key. Unset means the oracle is disabled and intent resolution
    /// runs on the deterministic rule engine only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible endpoint. Unset falls back to the
    /// DashScope compatible-mode endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_oracle_timeout")]
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: default_model(),
            timeout_secs: default_oracle_timeout(),
        }
    }
}

/// Weather provider credentials. Providers are tried in the order
/// Seniverse → QWeather → deterministic mock.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct WeatherConfig {
    /// Seniverse public key (uid).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seniverse_uid: Option<String>,

    /// Seniverse private key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seniverse_key: Option<String>,

    /// QWeather API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qweather_key: Option<String>,
}

#[derive(Clone, Serialize, Deserialize, Default)]
pub struct NewsConfig {
    /// NewsAPI key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Clone, Serialize, Deserialize, Default)]
pub struct StockConfig {
    /// Alpha Vantage API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Tool invocation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// HTTP timeout for provider calls, in seconds.
    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,

    /// Maximum number of steps an oracle-produced chain may declare.
    #[serde(default = "default_max_chain_steps")]
    pub max_chain_steps: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_tool_timeout(),
            max_chain_steps: default_max_chain_steps(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8000
}
fn default_model() -> String {
    "gpt-3.5-turbo".into()
}
fn default_oracle_timeout() -> u64 {
    30
}
fn default_tool_timeout() -> u64 {
    10
}
fn default_max_chain_steps() -> usize {
    4
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for OracleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl std::fmt::Debug for WeatherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherConfig")
            .field("seniverse_uid", &redact(&self.seniverse_uid))
            .field("seniverse_key", &redact(&self.seniverse_key))
            .field("qweather_key", &redact(&self.qweather_key))
            .finish()
    }
}

impl std::fmt::Debug for NewsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewsConfig")
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

impl std::fmt::Debug for StockConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StockConfig")
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("server", &self.server)
            .field("oracle", &self.oracle)
            .field("weather", &self.weather)
            .field("news", &self.news)
            .field("stock", &self.stock)
            .field("tools", &self.tools)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration: file (if present) + environment overrides.
    ///
    /// The file path is `LINGXI_CONFIG` if set, else `lingxi.toml` in the
    /// working directory. A missing file is not an error — defaults apply.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("LINGXI_CONFIG").unwrap_or_else(|_| "lingxi.toml".into());
        let mut config = if Path::new(&path).exists() {
            Self::load_from(Path::new(&path))?
        } else {
            tracing::debug!(path = %path, "No config file found, using defaults");
            Self::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific TOML file, without env overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Self = toml::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("HOST") {
            self.server.host = v;
        }
        if let Ok(v) = std::env::var("PORT")
            && let Ok(port) = v.parse()
        {
            self.server.port = port;
        }
        if let Ok(v) = std::env::var("LLM_API_KEY") {
            self.oracle.api_key = non_empty(v);
        }
        if let Ok(v) = std::env::var("LLM_BASE_URL") {
            self.oracle.base_url = non_empty(v);
        }
        if let Ok(v) = std::env::var("LLM_MODEL") {
            self.oracle.model = v;
        }
        if let Ok(v) = std::env::var("WEATHER_API_UID") {
            self.weather.seniverse_uid = non_empty(v);
        }
        if let Ok(v) = std::env::var("WEATHER_API_SECRET") {
            self.weather.seniverse_key = non_empty(v);
        }
        if let Ok(v) = std::env::var("WEATHER_API_KEY") {
            self.weather.qweather_key = non_empty(v);
        }
        if let Ok(v) = std::env::var("NEWS_API_KEY") {
            self.news.api_key = non_empty(v);
        }
        if let Ok(v) = std::env::var("STOCK_API_KEY") {
            self.stock.api_key = non_empty(v);
        }
        if let Ok(v) = std::env::var("TOOL_TIMEOUT")
            && let Ok(secs) = v.parse()
        {
            self.tools.timeout_secs = secs;
        }
    }

    /// Validate settings that would otherwise fail far from their cause.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tools.max_chain_steps == 0 {
            return Err(ConfigError::Invalid(
                "tools.max_chain_steps must be at least 1".into(),
            ));
        }
        if self.oracle.timeout_secs == 0 || self.tools.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "timeouts must be at least 1 second".into(),
            ));
        }
        Ok(())
    }

    /// Whether the oracle has credentials.
    pub fn has_oracle(&self) -> bool {
        self.oracle.api_key.is_some()
    }

    /// A commented sample config file.
    pub fn default_toml() -> String {
        r#"# lingxi configuration

[server]
host = "0.0.0.0"
port = 8000

[oracle]
# api_key = "sk-..."
# base_url = "https://dashscope.aliyuncs.com/compatible-mode/v1"
model = "gpt-3.5-turbo"
timeout_secs = 30

[weather]
# seniverse_uid = ""
# seniverse_key = ""
# qweather_key = ""

[news]
# api_key = ""

[stock]
# api_key = ""

[tools]
timeout_secs = 10
max_chain_steps = 4
"#
        .to_string()
    }
}

fn non_empty(v: String) -> Option<String> {
    if v.trim().is_empty() { None } else { Some(v) }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

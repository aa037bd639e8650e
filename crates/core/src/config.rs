use serde::{Deserialize, Serialize};
use std::{fmt, net::SocketAddr, path::PathBuf, time::Duration};

pub const DEFAULT_BIND: &str = "127.0.0.1:5000";
pub const DEFAULT_STATIC_DIR: &str = "static";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_WHISPER_MODEL_PATH: &str = "models/ggml-base.bin";
pub const DEFAULT_TTS_LANG: &str = "en";
pub const DEFAULT_TTS_BASE_URL: &str = "https://translate.google.com";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;
pub const DEFAULT_MAX_CONCURRENT_MODELS: usize = 2;
pub const DEFAULT_UPSTREAM_TIMEOUT_MS: u64 = 60_000;

pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_GEMINI_MODEL: &str = "GEMINI_MODEL";
pub const ENV_GEMINI_BASE_URL: &str = "GEMINI_BASE_URL";
pub const ENV_BIND: &str = "HEARTLINE_BIND";
pub const ENV_STATIC_DIR: &str = "HEARTLINE_STATIC_DIR";
pub const ENV_WHISPER_MODEL_PATH: &str = "WHISPER_MODEL_PATH";
pub const ENV_WHISPER_LANGUAGE: &str = "WHISPER_LANGUAGE";
pub const ENV_TTS_LANG: &str = "TTS_LANG";

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new<S: Into<String>>(value: S) -> Result<Self, ConfigError> {
        let v = value.into();
        if v.trim().is_empty() {
            return Err(ConfigError::EmptyApiKey);
        }
        Ok(Self(v))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(**redacted**)")
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LlmConfig {
    pub api_key: ApiKey,
    pub model: String,
    pub base_url: String,
}

impl LlmConfig {
    pub fn new(api_key: ApiKey) -> Self {
        Self {
            api_key,
            model: DEFAULT_GEMINI_MODEL.to_owned(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_owned(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AsrConfig {
    pub model_path: PathBuf,
    /// Whisper language code; `None` lets the model detect it.
    pub language: Option<String>,
}

impl Default for AsrConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_WHISPER_MODEL_PATH),
            language: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TtsConfig {
    pub lang: String,
    pub base_url: String,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            lang: DEFAULT_TTS_LANG.to_owned(),
            base_url: DEFAULT_TTS_BASE_URL.to_owned(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub static_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    pub fn new(
        bind: SocketAddr,
        static_dir: PathBuf,
        max_upload_bytes: usize,
    ) -> Result<Self, ConfigError> {
        if max_upload_bytes == 0 {
            return Err(ConfigError::ZeroUploadLimit);
        }
        Ok(Self {
            bind,
            static_dir,
            max_upload_bytes,
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 5000)),
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Bounds on how much upstream work a single process takes on.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceLimits {
    pub max_concurrent_models: usize,
    pub upstream_timeout_ms: u64,
}

impl ServiceLimits {
    pub fn new(max_concurrent_models: usize, upstream_timeout_ms: u64) -> Result<Self, ConfigError> {
        if max_concurrent_models == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if upstream_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(Self {
            max_concurrent_models,
            upstream_timeout_ms,
        })
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }
}

impl Default for ServiceLimits {
    fn default() -> Self {
        Self {
            max_concurrent_models: DEFAULT_MAX_CONCURRENT_MODELS,
            upstream_timeout_ms: DEFAULT_UPSTREAM_TIMEOUT_MS,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub asr: AsrConfig,
    pub tts: TtsConfig,
    pub limits: ServiceLimits,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("api key must not be empty")]
    EmptyApiKey,
    #[error("{0} is not set")]
    MissingApiKey(&'static str),
    #[error("invalid bind address {0:?}")]
    InvalidBind(String),
    #[error("max upload size must be > 0 bytes")]
    ZeroUploadLimit,
    #[error("max concurrent model calls must be > 0")]
    ZeroConcurrency,
    #[error("upstream timeout must be > 0 ms")]
    ZeroTimeout,
}

pub trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

#[derive(Clone, Debug, Default)]
pub struct StdEnv;

impl Env for StdEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MapEnv {
    vars: std::collections::BTreeMap<String, String>,
}

impl MapEnv {
    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_owned(), value.to_owned());
        self
    }
}

impl Env for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub fn resolve_api_key(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
) -> Result<Option<ApiKey>, ConfigError> {
    match cli_value {
        Some(v) => Ok(Some(ApiKey::new(v)?)),
        None => match env.var(env_key) {
            Some(v) => Ok(Some(ApiKey::new(v)?)),
            None => Ok(None),
        },
    }
}

/// Like [`resolve_api_key`], but absence is an error.
pub fn require_api_key(
    cli_value: Option<String>,
    env_key: &'static str,
    env: &impl Env,
) -> Result<ApiKey, ConfigError> {
    resolve_api_key(cli_value, env_key, env)?.ok_or(ConfigError::MissingApiKey(env_key))
}

pub fn resolve_string_with_default(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
    default: &str,
) -> String {
    match cli_value {
        Some(v) => v,
        None => env.var(env_key).unwrap_or_else(|| default.to_owned()),
    }
}

pub fn resolve_optional_string(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
) -> Option<String> {
    match cli_value {
        Some(v) => Some(v),
        None => env.var(env_key),
    }
}

pub fn parse_bind(value: &str) -> Result<SocketAddr, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidBind(value.to_owned()))
}

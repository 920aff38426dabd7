use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_RECORD_FILE: &str = "profile_data.json";
pub const DEFAULT_SCREENSHOT_FILE: &str = "profile_ss.png";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing credential: {0} is not set")]
    MissingCredential(&'static str),
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
    #[error("Cannot determine working directory: {0}")]
    WorkingDir(#[from] std::io::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Secret credential for the text-generation service. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Which text-generation backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Groq,
    /// Canned responses, no network
    Fake,
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "groq" => Ok(Self::Groq),
            "fake" => Ok(Self::Fake),
            other => Err(ConfigError::Invalid {
                key: "PROFILEX_PROVIDER",
                value: other.to_string(),
            }),
        }
    }
}

/// Which page renderer to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RendererKind {
    /// Headless Chrome/Chromium, executes page scripts
    #[default]
    Chrome,
    /// Plain HTTP GET, no script execution
    Http,
}

impl FromStr for RendererKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chrome" | "chromium" => Ok(Self::Chrome),
            "http" => Ok(Self::Http),
            other => Err(ConfigError::Invalid {
                key: "PROFILEX_RENDERER",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub kind: ProviderKind,
    #[serde(skip)]
    pub api_key: Option<ApiKey>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            api_key: None,
            model: default_model(),
            temperature: 0.0,
            timeout_seconds: default_llm_timeout(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl ProviderConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default)]
    pub kind: RendererKind,
    /// Explicit browser binary; looked up on PATH when unset
    #[serde(default)]
    pub chrome_binary: Option<PathBuf>,
    /// Virtual time the browser is given for scripts to settle
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default = "default_render_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_true")]
    pub screenshot: bool,
    #[serde(default = "default_window_size")]
    pub window_size: (u32, u32),
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            kind: RendererKind::default(),
            chrome_binary: None,
            settle_ms: default_settle_ms(),
            timeout_seconds: default_render_timeout(),
            screenshot: true,
            window_size: default_window_size(),
        }
    }
}

impl RenderConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Process-wide settings, read once at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub render: RenderConfig,
    pub output_dir: PathBuf,
}

impl Settings {
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut provider = ProviderConfig::default();
        if let Some(kind) = get("PROFILEX_PROVIDER") {
            provider.kind = kind.parse()?;
        }
        provider.api_key = get("GROQ_API_KEY").map(ApiKey::new);
        if provider.kind == ProviderKind::Groq && provider.api_key.is_none() {
            return Err(ConfigError::MissingCredential("GROQ_API_KEY"));
        }
        if let Some(model) = get("PROFILEX_MODEL") {
            provider.model = model;
        }
        if let Some(v) = get("PROFILEX_LLM_TIMEOUT_SECS") {
            provider.timeout_seconds = parse_number("PROFILEX_LLM_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("PROFILEX_LLM_MAX_ATTEMPTS") {
            provider.max_attempts = parse_number("PROFILEX_LLM_MAX_ATTEMPTS", &v)?;
        }

        let mut render = RenderConfig::default();
        if let Some(kind) = get("PROFILEX_RENDERER") {
            render.kind = kind.parse()?;
        }
        render.chrome_binary = get("PROFILEX_CHROME_BIN").map(PathBuf::from);
        if let Some(v) = get("PROFILEX_SETTLE_MS") {
            render.settle_ms = parse_number("PROFILEX_SETTLE_MS", &v)?;
        }
        if let Some(v) = get("PROFILEX_RENDER_TIMEOUT_SECS") {
            render.timeout_seconds = parse_number("PROFILEX_RENDER_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("PROFILEX_SCREENSHOT") {
            render.screenshot = parse_bool("PROFILEX_SCREENSHOT", &v)?;
        }

        let output_dir = match get("PROFILEX_OUTPUT_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir()?,
        };

        Ok(Self {
            provider,
            render,
            output_dir,
        })
    }

    pub fn record_path(&self) -> PathBuf {
        self.output_dir.join(DEFAULT_RECORD_FILE)
    }

    pub fn screenshot_path(&self) -> PathBuf {
        self.output_dir.join(DEFAULT_SCREENSHOT_FILE)
    }
}

fn parse_number<T: FromStr>(key: &'static str, value: &str) -> ConfigResult<T> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}

fn parse_bool(key: &'static str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        }),
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

const fn default_llm_timeout() -> u64 {
    60
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_settle_ms() -> u64 {
    5_000
}

const fn default_render_timeout() -> u64 {
    45
}

const fn default_true() -> bool {
    true
}

const fn default_window_size() -> (u32, u32) {
    (1280, 800)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_missing_credential_is_startup_error() {
        let result = Settings::from_lookup(lookup(&[("PROFILEX_OUTPUT_DIR", "/tmp")]));

        assert!(matches!(
            result,
            Err(ConfigError::MissingCredential("GROQ_API_KEY"))
        ));
    }

    #[test]
    fn test_blank_credential_counts_as_missing() {
        let result = Settings::from_lookup(lookup(&[
            ("GROQ_API_KEY", "   "),
            ("PROFILEX_OUTPUT_DIR", "/tmp"),
        ]));

        assert!(matches!(result, Err(ConfigError::MissingCredential(_))));
    }

    #[test]
    fn test_fake_provider_needs_no_credential() {
        let settings = Settings::from_lookup(lookup(&[
            ("PROFILEX_PROVIDER", "fake"),
            ("PROFILEX_OUTPUT_DIR", "/tmp/out"),
        ]))
        .unwrap();

        assert_eq!(settings.provider.kind, ProviderKind::Fake);
        assert!(settings.provider.api_key.is_none());
        assert_eq!(settings.record_path(), PathBuf::from("/tmp/out/profile_data.json"));
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&[
            ("GROQ_API_KEY", "gsk_test"),
            ("PROFILEX_OUTPUT_DIR", "/tmp"),
        ]))
        .unwrap();

        assert_eq!(settings.provider.model, DEFAULT_MODEL);
        assert!(settings.provider.temperature.abs() < f32::EPSILON);
        assert_eq!(settings.provider.max_attempts, 3);
        assert_eq!(settings.render.kind, RendererKind::Chrome);
        assert_eq!(settings.render.settle_ms, 5_000);
        assert!(settings.render.screenshot);
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            ("GROQ_API_KEY", "gsk_test"),
            ("PROFILEX_OUTPUT_DIR", "/tmp"),
            ("PROFILEX_MODEL", "other-model"),
            ("PROFILEX_RENDERER", "http"),
            ("PROFILEX_SETTLE_MS", "1500"),
            ("PROFILEX_SCREENSHOT", "off"),
        ]))
        .unwrap();

        assert_eq!(settings.provider.model, "other-model");
        assert_eq!(settings.render.kind, RendererKind::Http);
        assert_eq!(settings.render.settle_ms, 1500);
        assert!(!settings.render.screenshot);
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let result = Settings::from_lookup(lookup(&[
            ("GROQ_API_KEY", "gsk_test"),
            ("PROFILEX_OUTPUT_DIR", "/tmp"),
            ("PROFILEX_RENDER_TIMEOUT_SECS", "soon"),
        ]));

        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                key: "PROFILEX_RENDER_TIMEOUT_SECS",
                ..
            })
        ));
    }

    #[test]
    fn test_api_key_debug_is_redacted() {
        let key = ApiKey::new("gsk_secret");
        assert_eq!(format!("{key:?}"), "ApiKey(***)");
        assert_eq!(key.expose(), "gsk_secret");
    }
}

use serde::Deserialize;
use std::collections::HashMap;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-05-20";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gemini: GeminiParams,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiParams {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Left empty when the hosting platform injects the key.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for GeminiParams {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            model: default_model(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}

/// Flat key/value secrets file, the interactive app's source for the API key.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct SecretStore {
    values: HashMap<String, String>,
}

impl SecretStore {
    pub const GEMINI_API_KEY: &'static str = "gemini_api_key";

    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read secrets file {}: {}", path, e))?;
        let store: SecretStore = serde_yaml::from_str(&content)?;
        Ok(store)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn require(&self, key: &str) -> anyhow::Result<&str> {
        self.get(key)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("Secret '{}' is missing or empty", key))
    }
}

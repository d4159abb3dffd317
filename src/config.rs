use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{GmailError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub account: AccountConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Fixed delay between poll cycles, in seconds.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Page size for the candidate message listing. One page per cycle.
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_results: default_max_results(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Path to the local secrets file holding the endpoint and API key.
    #[serde(default = "default_secrets_path")]
    pub secrets_path: PathBuf,
    /// Deployment (model) name on the completion endpoint.
    #[serde(default = "default_deployment")]
    pub deployment: String,
    /// API version query parameter for the completion endpoint.
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Maximum output tokens; the verdict is a single word.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            secrets_path: default_secrets_path(),
            deployment: default_deployment(),
            api_version: default_api_version(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AccountConfig {
    /// The mailbox owner's address, as the classification rubric sees it.
    /// When unset, the authenticated profile's address is used.
    #[serde(default)]
    pub self_address: Option<String>,
}

fn default_interval_secs() -> u64 {
    10
}

fn default_max_results() -> u32 {
    10
}

fn default_secrets_path() -> PathBuf {
    PathBuf::from("secret.json")
}

fn default_deployment() -> String {
    "gpt-4.1".to_string()
}

fn default_api_version() -> String {
    "2024-12-01-preview".to_string()
}

fn default_max_tokens() -> u32 {
    20
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        // If file doesn't exist, return default config with warning
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GmailError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| GmailError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.poll.interval_secs == 0 {
            return Err(GmailError::ConfigError(
                "poll.interval_secs must be at least 1".to_string(),
            ));
        }

        if self.poll.max_results == 0 {
            return Err(GmailError::ConfigError(
                "poll.max_results must be at least 1".to_string(),
            ));
        }
        if self.poll.max_results > 500 {
            return Err(GmailError::ConfigError(
                "poll.max_results cannot exceed 500 (Gmail API page size limit)".to_string(),
            ));
        }

        if self.classifier.deployment.is_empty() {
            return Err(GmailError::ConfigError(
                "classifier.deployment cannot be empty".to_string(),
            ));
        }

        if self.classifier.api_version.is_empty() {
            return Err(GmailError::ConfigError(
                "classifier.api_version cannot be empty".to_string(),
            ));
        }

        if self.classifier.max_tokens == 0 {
            return Err(GmailError::ConfigError(
                "classifier.max_tokens must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Secrets for the completion endpoint, read from a local JSON file.
///
/// The file layout is an `ApiKeys` array of single-key objects:
///
/// ```json
/// {
///   "ApiKeys": [
///     { "OPENAIURL": "https://example.openai.azure.com" },
///     { "OPENAIURLSECRET": "..." }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierSecrets {
    #[serde(rename = "ApiKeys", default)]
    api_keys: Vec<HashMap<String, String>>,
}

impl ClassifierSecrets {
    /// Load secrets from disk. `Ok(None)` when the file does not exist —
    /// that is a recoverable condition, not an error.
    pub async fn load(path: &Path) -> Result<Option<Self>> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let secrets: Self = serde_json::from_str(&content)
            .map_err(|e| GmailError::ConfigError(format!("Failed to parse secrets file: {}", e)))?;
        Ok(Some(secrets))
    }

    /// The completion endpoint base URL, if present.
    pub fn endpoint(&self) -> Option<&str> {
        self.lookup("OPENAIURL")
    }

    /// The completion endpoint API key, if present.
    pub fn api_key(&self) -> Option<&str> {
        self.lookup("OPENAIURLSECRET")
    }

    fn lookup(&self, key: &str) -> Option<&str> {
        self.api_keys
            .iter()
            .find_map(|entry| entry.get(key))
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }
}

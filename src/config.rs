//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.motoboys.toml` files. Command-line flags and their environment
//! variables override what the file says.

use crate::cli::{Args, OutputFormat};
use crate::error::ConfigError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = ".motoboys.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Record store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Assistant settings.
    #[serde(default)]
    pub assistant: AssistantConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Output format for reports and listings.
    #[serde(default)]
    pub format: OutputFormat,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// Where shift records and rate configurations live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Local SQLite file (default)
    #[default]
    Sqlite,
    /// Hosted PostgREST table API
    Supabase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Database file for the SQLite backend.
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: PathBuf,

    /// Project URL for the Supabase backend.
    #[serde(default)]
    pub supabase_url: String,

    /// API key for the Supabase backend.
    #[serde(default)]
    pub supabase_key: String,

    /// Request timeout in seconds for the remote backend.
    #[serde(default = "default_store_timeout")]
    pub timeout_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            sqlite_path: default_sqlite_path(),
            supabase_url: String::new(),
            supabase_key: String::new(),
            timeout_seconds: default_store_timeout(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("motoboys.db")
}

fn default_store_timeout() -> u64 {
    15
}

impl StoreConfig {
    pub fn supabase_url(&self) -> Result<&str, ConfigError> {
        non_empty(&self.supabase_url, "store.supabase_url")
    }

    pub fn supabase_key(&self) -> Result<&str, ConfigError> {
        non_empty(&self.supabase_key, "store.supabase_key")
    }
}

/// Completion API used by the assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AssistantProvider {
    /// Google Gemini REST API (default)
    #[default]
    Gemini,
    /// Local Ollama server
    Ollama,
}

impl AssistantProvider {
    pub fn default_model(self) -> &'static str {
        match self {
            AssistantProvider::Gemini => "gemini-1.5-flash",
            AssistantProvider::Ollama => "llama3.2:latest",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default)]
    pub provider: AssistantProvider,

    /// Model name passed to the provider. Unset means the provider's default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// API key for Gemini. Ollama does not need one.
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_gemini_url")]
    pub gemini_url: String,

    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Request timeout in seconds.
    #[serde(default = "default_assistant_timeout")]
    pub timeout_seconds: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            provider: AssistantProvider::default(),
            model: None,
            api_key: String::new(),
            gemini_url: default_gemini_url(),
            ollama_url: default_ollama_url(),
            temperature: default_temperature(),
            timeout_seconds: default_assistant_timeout(),
        }
    }
}

fn default_gemini_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_assistant_timeout() -> u64 {
    60
}

impl AssistantConfig {
    pub fn api_key(&self) -> Result<&str, ConfigError> {
        non_empty(&self.api_key, "assistant.api_key")
    }

    /// Configured model, or the selected provider's default.
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .map(str::trim)
            .filter(|model| !model.is_empty())
            .unwrap_or_else(|| self.provider.default_model())
    }

    /// Base URL of the selected provider.
    pub fn endpoint(&self) -> &str {
        match self.provider {
            AssistantProvider::Gemini => &self.gemini_url,
            AssistantProvider::Ollama => &self.ollama_url,
        }
    }
}

fn non_empty<'a>(value: &'a str, key: &'static str) -> Result<&'a str, ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        Err(ConfigError::Missing(key))
    } else {
        Ok(value)
    }
}

fn check_http_url(value: &str, key: &'static str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            key,
            reason: format!("'{}' must start with 'http://' or 'https://'", value),
        })
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only values given on the command line (or through their environment
    /// variables) override the file.
    pub fn merge_with_args(&mut self, args: &Args) {
        if let Some(format) = args.format {
            self.general.format = format;
        }
        if args.verbose {
            self.general.verbose = true;
        }

        if let Some(backend) = args.backend {
            self.store.backend = backend;
        }
        if let Some(ref db) = args.db {
            self.store.sqlite_path = db.clone();
        }
        if let Some(ref url) = args.supabase_url {
            self.store.supabase_url = url.clone();
        }
        if let Some(ref key) = args.supabase_key {
            self.store.supabase_key = key.clone();
        }

        if let Some(provider) = args.provider {
            self.assistant.provider = provider;
        }
        if let Some(ref model) = args.model {
            self.assistant.model = Some(model.clone());
        }
        if let Some(ref api_key) = args.api_key {
            self.assistant.api_key = api_key.clone();
        }
    }

    /// Check the settings every command depends on.
    ///
    /// The assistant API key is checked only when the assistant is used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.backend == StoreBackend::Supabase {
            check_http_url(self.store.supabase_url()?, "store.supabase_url")?;
            self.store.supabase_key()?;
        }
        if self.store.timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                key: "store.timeout_seconds",
                reason: "must be at least 1 second".to_string(),
            });
        }

        check_http_url(&self.assistant.gemini_url, "assistant.gemini_url")?;
        check_http_url(&self.assistant.ollama_url, "assistant.ollama_url")?;

        if !(0.0..=2.0).contains(&self.assistant.temperature) {
            return Err(ConfigError::Invalid {
                key: "assistant.temperature",
                reason: format!("{} is outside 0.0 - 2.0", self.assistant.temperature),
            });
        }
        if self.assistant.timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                key: "assistant.timeout_seconds",
                reason: "must be at least 1 second".to_string(),
            });
        }

        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

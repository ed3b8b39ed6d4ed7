//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$REPLYSCRIBE_CONFIG` (environment variable)
//! 2. `~/.config/replyscribe/config.toml` (Linux/macOS)
//!    `%APPDATA%\replyscribe\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! The loaded [`Config`] is passed explicitly to every component; nothing in
//! the library reads process-wide settings on its own, except the
//! `GEMINI_API_KEY` fallback applied by [`load_config`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Environment variable consulted when `model.api_key` is empty.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Mail store location and folder names.
    pub mail: MailConfig,
    /// Generative model endpoint.
    pub model: ModelConfig,
    /// Sample collection and style extraction policy.
    pub style: StyleConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override data directory for samples, the profile and logs.
    pub data_dir: Option<PathBuf>,
}

/// Mail store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// Root of the Maildir++ tree. Defaults to `~/Maildir`.
    pub maildir: Option<PathBuf>,
    /// Folder scanned for unread messages.
    pub inbox_folder: String,
    /// Folder holding the user's own sent mail.
    pub sent_folder: String,
    /// Folder receiving generated drafts.
    pub drafts_folder: String,
    /// Maximum unread messages handled per `respond` run.
    pub unread_limit: usize,
}

/// Which model API the client speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    /// Google Gemini `generateContent` REST API.
    Gemini,
    /// Ollama-compatible `/api/chat` endpoint.
    Ollama,
}

/// Generative model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub provider: ModelProvider,
    /// Endpoint base URL. Empty means the provider's default.
    pub base_url: String,
    /// Model name.
    pub model: String,
    /// API key. Falls back to `$GEMINI_API_KEY` when empty.
    pub api_key: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

/// Style collection and extraction policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    /// Directory of writing samples. Defaults to `<data_dir>/samples`.
    pub samples_dir: Option<PathBuf>,
    /// Style profile JSON file. Defaults to `<data_dir>/style_profile.json`.
    pub profile_path: Option<PathBuf>,
    /// Upper bound on the sample corpus sent for analysis, in characters.
    pub max_corpus_chars: usize,
    /// Messages with a shorter trimmed body are not kept as samples.
    pub min_body_chars: usize,
    /// Default number of messages to collect.
    pub collect_limit: usize,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            data_dir: None,
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            maildir: None,
            inbox_folder: "INBOX".to_string(),
            sent_folder: "Sent".to_string(),
            drafts_folder: "Drafts".to_string(),
            unread_limit: 20,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ModelProvider::Gemini,
            base_url: String::new(),
            model: "gemini-2.0-flash".to_string(),
            api_key: String::new(),
            timeout_secs: 60,
        }
    }
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            samples_dir: None,
            profile_path: None,
            max_corpus_chars: 60_000,
            min_body_chars: 20,
            collect_limit: 100,
        }
    }
}

impl ModelConfig {
    /// The endpoint to talk to, resolving the provider default.
    pub fn endpoint(&self) -> &str {
        if !self.base_url.is_empty() {
            return self.base_url.trim_end_matches('/');
        }
        match self.provider {
            ModelProvider::Gemini => "https://generativelanguage.googleapis.com",
            ModelProvider::Ollama => "http://localhost:11434",
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    let mut cfg = read_config_file().unwrap_or_default();
    if cfg.model.api_key.is_empty() {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            cfg.model.api_key = key.trim().to_string();
        }
    }
    cfg
}

fn read_config_file() -> Option<Config> {
    let path = config_file_path()?;
    if !path.exists() {
        return None;
    }
    match std::fs::read_to_string(&path) {
        Ok(contents) => match toml::from_str::<Config>(&contents) {
            Ok(cfg) => {
                tracing::info!(path = %path.display(), "Loaded config");
                Some(cfg)
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to parse config, using defaults"
                );
                None
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to read config file, using defaults"
            );
            None
        }
    }
}

/// Save configuration to the standard location.
pub fn save_config(config: &Config) -> anyhow::Result<PathBuf> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(&path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(path)
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("REPLYSCRIBE_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("replyscribe").join("config.toml"))
}

/// Return the data directory for samples, the profile and logs.
pub fn data_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.data_dir {
        return dir.clone();
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("replyscribe")
}

/// Directory holding the collected writing samples.
pub fn samples_dir(config: &Config) -> PathBuf {
    config
        .style
        .samples_dir
        .clone()
        .unwrap_or_else(|| data_dir(config).join("samples"))
}

/// Path of the persisted style profile.
pub fn profile_path(config: &Config) -> PathBuf {
    config
        .style
        .profile_path
        .clone()
        .unwrap_or_else(|| data_dir(config).join("style_profile.json"))
}

/// Root of the Maildir tree.
pub fn maildir_root(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.mail.maildir {
        return dir.clone();
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Maildir")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    data_dir(config).join("replyscribe.log")
}

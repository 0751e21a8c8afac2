use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::request::{DEFAULT_MODEL_ID, DEFAULT_PLACEHOLDER};
use crate::core::{GenerationRequest, PainterError};

/// Environment variable that overrides `api.key`
pub const API_KEY_ENV: &str = "STABLE_DIFFUSION_API_KEY";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub tui: TuiConfig,

    #[serde(skip)]
    pub config_path: PathBuf,

    /// Key from the environment; never written back to the file
    #[serde(skip)]
    pub env_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DefaultsConfig {
    /// Empty means no negative prompt
    #[serde(default)]
    pub negative_prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_directory")]
    pub directory: String,
    #[serde(default = "default_true")]
    pub auto_download: bool,
    #[serde(default = "default_display")]
    pub display: DisplayMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuiConfig {
    #[serde(default = "default_placeholder")]
    pub placeholder: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Terminal,
    None,
}

impl DisplayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayMode::Terminal => "terminal",
            DisplayMode::None => "none",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "terminal" => Some(DisplayMode::Terminal),
            "none" => Some(DisplayMode::None),
            _ => None,
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &["terminal", "none"]
    }
}

// Default value functions
fn default_endpoint() -> String {
    "https://stablediffusionapi.com/api/v3/dreambooth".to_string()
}

fn default_model_id() -> String {
    DEFAULT_MODEL_ID.to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_connect_timeout_secs() -> u64 {
    15
}

fn default_output_directory() -> String {
    "./painter-output".to_string()
}

fn default_true() -> bool {
    true
}

fn default_display() -> DisplayMode {
    DisplayMode::Terminal
}

fn default_placeholder() -> String {
    DEFAULT_PLACEHOLDER.to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            key: None,
            endpoint: default_endpoint(),
            model_id: default_model_id(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            auto_download: true,
            display: DisplayMode::Terminal,
        }
    }
}

impl Default for TuiConfig {
    fn default() -> Self {
        Self {
            placeholder: default_placeholder(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            defaults: DefaultsConfig::default(),
            output: OutputConfig::default(),
            tui: TuiConfig::default(),
            config_path: PathBuf::new(),
            env_key: None,
        }
    }
}

impl Config {
    pub fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("com", "aipainter", "painter")
            .context("Failed to determine config directory")
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Load config from the default location or create it
    pub fn load_or_create() -> Result<Self> {
        let config_path = Self::config_path()?;
        let env_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty());
        Self::load_from(&config_path, env_key)
    }

    /// Load config from `path`, writing defaults there if it does not exist.
    /// `env_key` takes precedence over the stored key.
    pub fn load_from(path: &Path, env_key: Option<String>) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)
                .context("Failed to read config file")?;
            let mut config: Config = toml::from_str(&content)
                .context("Failed to parse config file")?;
            config.config_path = path.to_path_buf();
            config
        } else {
            let mut config = Config::default();
            config.config_path = path.to_path_buf();
            config.save()?;
            config
        };

        config.env_key = env_key.filter(|k| !k.is_empty());

        Ok(config)
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;
        fs::write(&self.config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    pub fn api_key(&self) -> Option<&str> {
        self.env_key
            .as_deref()
            .or(self.api.key.as_deref())
            .filter(|k| !k.is_empty())
    }

    /// Build a request for an already validated prompt
    pub fn request_for(&self, prompt: impl Into<String>) -> Result<GenerationRequest, PainterError> {
        let key = self.api_key().ok_or(PainterError::MissingApiKey)?;
        Ok(GenerationRequest::new(key, prompt)
            .with_model(&self.api.model_id)
            .with_negative_prompt(&self.defaults.negative_prompt))
    }

    /// Set a config value by key path (e.g., "api.key", "output.directory")
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "api.key" => self.api.key = Some(value.to_string()),
            "api.endpoint" => {
                let url = reqwest::Url::parse(value)
                    .with_context(|| format!("Invalid URL: {}", value))?;
                if !matches!(url.scheme(), "http" | "https") {
                    anyhow::bail!("Endpoint must be an http or https URL");
                }
                self.api.endpoint = value.to_string();
            }
            "api.model_id" => {
                if value.trim().is_empty() {
                    anyhow::bail!("Model id cannot be empty");
                }
                self.api.model_id = value.trim().to_string();
            }
            "api.timeout_secs" => self.api.timeout_secs = parse_secs(value)?,
            "api.connect_timeout_secs" => self.api.connect_timeout_secs = parse_secs(value)?,
            "defaults.negative_prompt" => self.defaults.negative_prompt = value.to_string(),
            "output.directory" => self.output.directory = value.to_string(),
            "output.auto_download" => {
                self.output.auto_download = value.parse()
                    .context("Invalid boolean value")?;
            }
            "output.display" => {
                self.output.display = DisplayMode::parse(value).with_context(|| {
                    format!(
                        "Invalid display mode. Valid values: {}",
                        DisplayMode::variants().join(", ")
                    )
                })?;
            }
            "tui.placeholder" => {
                if value.trim().is_empty() {
                    anyhow::bail!("Placeholder cannot be empty");
                }
                self.tui.placeholder = value.to_string();
            }
            _ => anyhow::bail!("Unknown config key: {}", key),
        }
        Ok(())
    }

    /// Get a config value by key path
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "api.key" => self.api_key().map(|_| "****".to_string()), // Mask API key
            "api.endpoint" => Some(self.api.endpoint.clone()),
            "api.model_id" => Some(self.api.model_id.clone()),
            "api.timeout_secs" => Some(self.api.timeout_secs.to_string()),
            "api.connect_timeout_secs" => Some(self.api.connect_timeout_secs.to_string()),
            "defaults.negative_prompt" => Some(self.defaults.negative_prompt.clone()),
            "output.directory" => Some(self.output.directory.clone()),
            "output.auto_download" => Some(self.output.auto_download.to_string()),
            "output.display" => Some(self.output.display.as_str().to_string()),
            "tui.placeholder" => Some(self.tui.placeholder.clone()),
            _ => None,
        }
    }

    /// Get all config keys
    pub fn keys() -> &'static [&'static str] {
        &[
            "api.key",
            "api.endpoint",
            "api.model_id",
            "api.timeout_secs",
            "api.connect_timeout_secs",
            "defaults.negative_prompt",
            "output.directory",
            "output.auto_download",
            "output.display",
            "tui.placeholder",
        ]
    }

    /// Suggested models
    pub fn models() -> &'static [&'static str] {
        &["midjourney", "sdxl", "realistic-vision-v51", "anything-v5"]
    }
}

fn parse_secs(value: &str) -> Result<u64> {
    let secs: u64 = value.parse().context("Invalid number of seconds")?;
    if secs == 0 {
        anyhow::bail!("Timeout must be at least 1 second");
    }
    Ok(secs)
}

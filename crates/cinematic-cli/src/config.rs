//! Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for cinematic
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub openai: OpenAIConfig,
    pub radarr: ArrConfig,
    pub sonarr: ArrConfig,
    pub bot: BotConfig,
}

/// Completion endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAIConfig {
    /// API key (falls back to OPENAI_API_KEY)
    pub api_key: Option<String>,
    /// OpenAI-compatible endpoint
    pub base_url: Option<String>,
    /// Model for the main conversation
    pub model: String,
    /// Cheaper model for the relevance check, summaries and statuses
    pub utility_model: String,
    pub temperature: f32,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: "gpt-4".to_string(),
            utility_model: "gpt-3.5-turbo".to_string(),
            temperature: 0.7,
        }
    }
}

/// Connection to a Radarr or Sonarr server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    /// Optional basic auth in front of the server
    pub auth_user: Option<String>,
    pub auth_pass: Option<String>,
    /// Where new items are stored
    pub root_folder: Option<String>,
}

/// Bot behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub name: String,
    /// Seconds between status refreshes
    pub status_interval_secs: u64,
    /// User memories file (defaults next to the config file)
    pub memory_path: Option<PathBuf>,
    /// Review log file (defaults next to the config file)
    pub review_log_path: Option<PathBuf>,
    /// Continuations allowed after the first completion
    pub max_depth: u32,
    /// Token ceiling for the conversation window
    pub token_ceiling: f64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "CineMatic".to_string(),
            status_interval_secs: 6000,
            memory_path: None,
            review_log_path: None,
            max_depth: cinematic_agent::resolver::DEFAULT_MAX_DEPTH,
            token_ceiling: cinematic_agent::budget::DEFAULT_CEILING,
        }
    }
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cinematic")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("CINEMATIC_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from the default path
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load config from a file, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to parse config file");
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read config file");
                Self::default()
            }
        }
    }

    /// Write the example config if no file exists yet
    pub fn init(path: &Path) -> std::io::Result<PathBuf> {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, example_config())?;
        Ok(path.to_path_buf())
    }

    /// OpenAI key from config, then environment
    pub fn openai_api_key(&self) -> Option<String> {
        self.openai
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }

    pub fn memory_path(&self) -> PathBuf {
        self.bot
            .memory_path
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("memories.json"))
    }

    pub fn review_log_path(&self) -> PathBuf {
        self.bot
            .review_log_path
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("review.log"))
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# cinematic configuration file
# Place at ~/.config/cinematic/config.toml (Linux) or set CINEMATIC_CONFIG_PATH

[openai]
# api_key = "sk-..."            # or set OPENAI_API_KEY
# base_url = "https://api.openai.com/v1"
model = "gpt-4"
utility_model = "gpt-3.5-turbo"
temperature = 0.7

[radarr]
# url = "http://localhost:7878"
# api_key = "..."
# auth_user = "..."
# auth_pass = "..."
root_folder = "/movies"

[sonarr]
# url = "http://localhost:8989"
# api_key = "..."
root_folder = "/tv"

[bot]
name = "CineMatic"
status_interval_secs = 6000
max_depth = 3
token_ceiling = 4000.0
# memory_path = "~/.config/cinematic/memories.json"
# review_log_path = "~/.config/cinematic/review.log"
"#
}

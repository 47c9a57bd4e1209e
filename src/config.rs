use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, TriageError};
use crate::generation::{parse_list, CandidateList};

/// Upper bound on messages handled by one run
pub const MAX_MESSAGES_LIMIT: u32 = 500;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub vertex: VertexConfig,
    #[serde(default)]
    pub gmail: GmailConfig,
    #[serde(default)]
    pub labels: LabelConfig,
    #[serde(default)]
    pub reply: ReplyConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexConfig {
    /// Google Cloud project; required before a run starts
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_location")]
    pub location: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Regions tried after `location`; empty means the built-in fallbacks
    #[serde(default)]
    pub location_candidates: Vec<String>,
    /// Models tried after `model`; empty means the built-in fallbacks
    #[serde(default)]
    pub model_candidates: Vec<String>,
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,
    #[serde(default)]
    pub log_model_selection: bool,
}

impl Default for VertexConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            location: default_location(),
            model: default_model(),
            location_candidates: Vec::new(),
            model_candidates: Vec::new(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
            log_model_selection: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GmailConfig {
    #[serde(default = "default_max_messages")]
    pub max_messages: u32,
    #[serde(default = "default_auto_mark_read")]
    pub auto_mark_read: bool,
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            auto_mark_read: default_auto_mark_read(),
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReplyConfig {
    /// Appended after a blank line to every non-empty draft
    #[serde(default)]
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub dry_run: bool,
}

fn default_location() -> String {
    "us-central1".to_string()
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_attempt_timeout_secs() -> u64 {
    60
}

fn default_max_messages() -> u32 {
    10
}

fn default_auto_mark_read() -> bool {
    true
}

fn default_call_timeout_secs() -> u64 {
    30
}

fn default_prefix() -> String {
    "Auto".to_string()
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
            .map_err(|e| TriageError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| TriageError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load the file, overlay the process environment and validate
    pub async fn load_for_run(path: &Path) -> Result<Self> {
        let mut config = Self::load(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    TriageError::ConfigError(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| TriageError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        tokio::fs::write(path, content)
            .await
            .map_err(|e| TriageError::ConfigError(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Overlay values from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_lookup(|key| std::env::var(key).ok());
    }

    /// Overlay values from an arbitrary variable source
    pub fn apply_lookup<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(project) = get("GOOGLE_CLOUD_PROJECT") {
            self.vertex.project_id = Some(project.trim().to_string());
        }
        if let Some(location) = get("GEMINI_LOCATION") {
            self.vertex.location = location.trim().to_string();
        }
        if let Some(model) = get("GEMINI_MODEL") {
            self.vertex.model = model.trim().to_string();
        }
        if let Some(regions) = get("GEMINI_LOCATION_CANDIDATES") {
            self.vertex.location_candidates = parse_list(&regions);
        }
        if let Some(models) = get("GEMINI_MODEL_CANDIDATES") {
            self.vertex.model_candidates = parse_list(&models);
        }
        if let Some(enabled) = get("LOG_MODEL_SELECTION") {
            self.vertex.log_model_selection = enabled.trim() == "1";
        }
        if let Some(signature) = lookup("REPLY_SIGNATURE") {
            self.reply.signature = signature;
        }
        if let Some(enabled) = get("AUTO_MARK_READ") {
            self.gmail.auto_mark_read = enabled.trim() == "1";
        }
        if let Some(max) = get("MAX_MESSAGES") {
            match max.trim().parse() {
                Ok(value) => self.gmail.max_messages = value,
                Err(_) => tracing::warn!("Ignoring invalid MAX_MESSAGES value {:?}", max),
            }
        }
    }

    /// Defaults, then the values found through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_lookup(lookup);
        config
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        match self.vertex.project_id.as_deref().map(str::trim) {
            Some(project) if !project.is_empty() => {}
            _ => {
                return Err(TriageError::ConfigError(
                    "vertex.project_id is required (set it in the config file or GOOGLE_CLOUD_PROJECT)"
                        .to_string(),
                ));
            }
        }

        if self.vertex.location.trim().is_empty() {
            return Err(TriageError::ConfigError(
                "vertex.location cannot be empty".to_string(),
            ));
        }
        if self.vertex.model.trim().is_empty() {
            return Err(TriageError::ConfigError(
                "vertex.model cannot be empty".to_string(),
            ));
        }
        if self.vertex.attempt_timeout_secs == 0 {
            return Err(TriageError::ConfigError(
                "vertex.attempt_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.gmail.max_messages == 0 {
            return Err(TriageError::ConfigError(
                "gmail.max_messages must be at least 1".to_string(),
            ));
        }
        if self.gmail.max_messages > MAX_MESSAGES_LIMIT {
            return Err(TriageError::ConfigError(format!(
                "gmail.max_messages cannot exceed {}",
                MAX_MESSAGES_LIMIT
            )));
        }
        if self.gmail.call_timeout_secs == 0 {
            return Err(TriageError::ConfigError(
                "gmail.call_timeout_secs must be greater than 0".to_string(),
            ));
        }

        // Validate labels config
        if self.labels.prefix.is_empty() {
            return Err(TriageError::ConfigError(
                "labels.prefix cannot be empty".to_string(),
            ));
        }
        if self.labels.prefix.contains('/') {
            return Err(TriageError::ConfigError(
                "labels.prefix cannot contain '/' character".to_string(),
            ));
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Region and model order for the generation client
    pub fn candidate_list(&self) -> CandidateList {
        CandidateList::new(
            &self.vertex.location,
            &self.vertex.model,
            &self.vertex.location_candidates,
            &self.vertex.model_candidates,
        )
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.vertex.attempt_timeout_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.gmail.call_timeout_secs)
    }

    /// Create an example configuration file
    pub async fn create_example(path: &Path) -> Result<()> {
        let mut config = Self::default();
        config.vertex.project_id = Some("your-gcp-project".to_string());
        config.save(path).await
    }
}

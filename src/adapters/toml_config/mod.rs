// TOML config adapter - Configuration management using TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::domain::errors::*;
use crate::error::RangeCropResult;
use crate::utils::logging::{LogFormat, LogLevel, LoggingConfig};

/// File name looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "rangecrop.toml";
/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "RANGECROP_";

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub export: ExportConfig,
    pub caption: CaptionConfig,
    pub playback: PlaybackConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

/// `[export]` section
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub preset: String,
    pub crf: u8,
    pub longest_edge: Option<u32>,
    pub prefix: Option<String>,
    pub trigger: Option<String>,
    /// Transcoder executable
    pub ffmpeg: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            preset: "medium".to_string(),
            crf: 23,
            longest_edge: None,
            prefix: None,
            trigger: None,
            ffmpeg: PathBuf::from("ffmpeg"),
        }
    }
}

/// `[caption]` section; durations are in seconds
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CaptionConfig {
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: String,
    pub max_retries: u32,
    pub backoff_base_secs: f64,
    pub poll_interval_secs: f64,
    pub max_poll_attempts: u32,
    pub video_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Name of the main subject, woven into prompts
    pub subject: Option<String>,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            model: "gemini-1.5-flash-latest".to_string(),
            api_key: None,
            base_url: crate::adapters::gemini_caption::DEFAULT_BASE_URL.to_string(),
            max_retries: 3,
            backoff_base_secs: 1.0,
            poll_interval_secs: 5.0,
            max_poll_attempts: 120,
            video_timeout_secs: 600,
            request_timeout_secs: 60,
            subject: None,
        }
    }
}

impl CaptionConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn video_timeout(&self) -> Duration {
        Duration::from_secs(self.video_timeout_secs)
    }
}

/// `[playback]` section
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Seconds moved by a jump
    pub jump_seconds: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self { jump_seconds: 1.0 }
    }
}

/// `[session]` section
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub file: PathBuf,
    /// Frames covered by a range added at a position
    pub default_range_duration: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("session_data.json"),
            default_range_duration: 60,
        }
    }
}

/// Loads `AppConfig` from TOML and the environment
pub struct TomlConfigAdapter;

impl TomlConfigAdapter {
    /// Load configuration: explicit file, else the local file, else the platform file, else defaults
    pub fn load(explicit: Option<&Path>) -> RangeCropResult<AppConfig> {
        let mut config = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(DomainError::Config(format!(
                        "Config file does not exist: {}",
                        path.display()
                    ))
                    .into());
                }
                Self::load_file(path)?
            }
            None => match Self::discover() {
                Some(path) => Self::load_file(&path)?,
                None => {
                    debug!("No configuration file found, using defaults");
                    AppConfig::default()
                }
            },
        };

        Self::apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_file(path: &Path) -> RangeCropResult<AppConfig> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::parse(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn parse(content: &str) -> RangeCropResult<AppConfig> {
        let config: AppConfig = toml::from_str(content)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// First existing candidate among the local and platform config files
    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        Self::platform_config_path().filter(|p| p.exists())
    }

    /// `%APPDATA%\rangecrop\config.toml` or `$XDG_CONFIG_HOME/rangecrop/config.toml`
    pub fn platform_config_path() -> Option<PathBuf> {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return Some(PathBuf::from(appdata).join("rangecrop").join("config.toml"));
        }
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
        Some(base.join("rangecrop").join("config.toml"))
    }

    /// Apply `RANGECROP_*` variables and `GEMINI_API_KEY` on top of file values
    pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> RangeCropResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|v| !v.trim().is_empty())
        };

        if let Some(key) = lookup("GEMINI_API_KEY").filter(|v| !v.trim().is_empty()) {
            config.caption.api_key = Some(key);
        }
        if let Some(key) = var("API_KEY") {
            config.caption.api_key = Some(key);
        }
        if let Some(model) = var("MODEL") {
            config.caption.model = model;
        }
        if let Some(subject) = var("SUBJECT") {
            config.caption.subject = Some(subject);
        }
        if let Some(trigger) = var("TRIGGER") {
            config.export.trigger = Some(trigger);
        }
        if let Some(prefix) = var("PREFIX") {
            config.export.prefix = Some(prefix);
        }
        if let Some(ffmpeg) = var("FFMPEG") {
            config.export.ffmpeg = PathBuf::from(ffmpeg);
        }
        if let Some(crf) = var("CRF") {
            config.export.crf = crf
                .trim()
                .parse()
                .map_err(|_| DomainError::Config(format!("Invalid {}CRF: {}", ENV_PREFIX, crf)))?;
        }
        if let Some(file) = var("SESSION") {
            config.session.file = PathBuf::from(file);
        }
        if let Some(level) = var("LOG_LEVEL") {
            config.logging.level = level.parse::<LogLevel>()?;
        }
        if let Some(format) = var("LOG_FORMAT") {
            config.logging.format = format.parse::<LogFormat>()?;
        }

        Self::validate(config)?;
        Ok(())
    }

    pub fn validate(config: &AppConfig) -> Result<(), DomainError> {
        if config.export.crf > 51 {
            return Err(DomainError::Config(
                "CRF value cannot exceed 51".to_string(),
            ));
        }
        if config.export.preset.trim().is_empty() {
            return Err(DomainError::Config("Encoder preset cannot be empty".to_string()));
        }
        if config.session.default_range_duration == 0 {
            return Err(DomainError::Config(
                "Default range duration must be at least one frame".to_string(),
            ));
        }
        if !(config.playback.jump_seconds.is_finite() && config.playback.jump_seconds > 0.0) {
            return Err(DomainError::Config(
                "Jump length must be a positive number of seconds".to_string(),
            ));
        }
        if !(config.caption.backoff_base_secs.is_finite() && config.caption.backoff_base_secs >= 0.0)
            || !(config.caption.poll_interval_secs.is_finite() && config.caption.poll_interval_secs >= 0.0)
        {
            return Err(DomainError::Config(
                "Caption delays must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

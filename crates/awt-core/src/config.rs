//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/awt-sync/config.toml)
//! 3. Environment variables
//!
//! Environment variables take precedence over config file values. The
//! variable names match the ones the scheduled job has always been deployed
//! with (`AWT_USERNAME`, `GCS_BUCKET_NAME`, ...).

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable prefix for AWT settings
const ENV_PREFIX: &str = "AWT";

/// Production API host
pub const DEFAULT_BASE_URL: &str = "https://api-next.africawildlifetracking.com";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_INITIAL_WINDOW_DAYS: u32 = 90;
const DEFAULT_INCREMENTAL_FALLBACK_HOURS: u32 = 24;

/// Longest lookback either sync mode may request (100 years)
pub const MAX_WINDOW_DAYS: u32 = 36_500;
const MAX_FALLBACK_HOURS: u32 = MAX_WINDOW_DAYS * 24;

/// Errors raised while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Required API credentials are not set
    #[error("Missing required environment variables: {}", .missing.join(", "))]
    MissingCredentials { missing: Vec<&'static str> },

    /// Config file exists but could not be read
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A numeric environment override could not be parsed
    #[error("Invalid value for {var}: '{value}'")]
    InvalidValue { var: String, value: String },
}

/// Application configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the tracking API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API username
    #[serde(default)]
    pub username: Option<String>,

    /// API password
    #[serde(default)]
    pub password: Option<String>,

    /// API key sent with every request
    #[serde(default)]
    pub api_key: Option<String>,

    /// Google Cloud Storage bucket
    #[serde(default)]
    pub gcs_bucket: Option<String>,

    /// Google Cloud project that owns the bucket
    #[serde(default)]
    pub gcs_project_id: Option<String>,

    /// Local directory used instead of GCS (development)
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,

    /// Timeout applied to every API request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Days of history pulled by the first sync
    #[serde(default = "default_initial_window_days")]
    pub initial_window_days: u32,

    /// Lookback used when no last-sync timestamp can be read
    #[serde(default = "default_incremental_fallback_hours")]
    pub incremental_fallback_hours: u32,
}

/// Validated credentials for the tracking API
#[derive(Clone)]
pub struct ApiCredentials {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub api_key: String,
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("gcs_bucket", &self.gcs_bucket)
            .field("gcs_project_id", &self.gcs_project_id)
            .field("storage_dir", &self.storage_dir)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("initial_window_days", &self.initial_window_days)
            .field(
                "incremental_fallback_hours",
                &self.incremental_fallback_hours,
            )
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            username: None,
            password: None,
            api_key: None,
            gcs_bucket: None,
            gcs_project_id: None,
            storage_dir: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            initial_window_days: DEFAULT_INITIAL_WINDOW_DAYS,
            incremental_fallback_hours: DEFAULT_INCREMENTAL_FALLBACK_HOURS,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (AWT_*, GCS_*)
    /// 2. Config file (~/.config/awt-sync/config.toml or AWT_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring an explicit path from the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            Self::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self, ConfigError> {
        let mut config: Config =
            toml::from_str(toml_content).map_err(|source| ConfigError::Parse {
                path: PathBuf::from("<string>"),
                source,
            })?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(val) = env_value(&format!("{}_BASE_URL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.base_url = val;
            }
        }

        override_optional(&mut self.username, &format!("{}_USERNAME", ENV_PREFIX));
        override_optional(&mut self.password, &format!("{}_PASSWORD", ENV_PREFIX));
        override_optional(&mut self.api_key, &format!("{}_API_KEY", ENV_PREFIX));
        override_optional(&mut self.gcs_bucket, "GCS_BUCKET_NAME");
        override_optional(&mut self.gcs_project_id, "GCS_PROJECT_ID");

        if let Some(val) = env_value(&format!("{}_STORAGE_DIR", ENV_PREFIX)) {
            self.storage_dir = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }

        override_number(
            &mut self.request_timeout_secs,
            &format!("{}_REQUEST_TIMEOUT_SECS", ENV_PREFIX),
        )?;
        override_number(
            &mut self.initial_window_days,
            &format!("{}_INITIAL_WINDOW_DAYS", ENV_PREFIX),
        )?;
        override_number(
            &mut self.incremental_fallback_hours,
            &format!("{}_INCREMENTAL_FALLBACK_HOURS", ENV_PREFIX),
        )?;

        Ok(())
    }

    /// Check numeric settings are usable
    ///
    /// A zero timeout fails every request, and an oversized window cannot be
    /// subtracted from the current time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range(
            "request_timeout_secs",
            self.request_timeout_secs,
            1..=u64::from(u32::MAX),
        )?;
        check_range(
            "initial_window_days",
            self.initial_window_days,
            1..=MAX_WINDOW_DAYS,
        )?;
        check_range(
            "incremental_fallback_hours",
            self.incremental_fallback_hours,
            1..=MAX_FALLBACK_HOURS,
        )
    }

    /// Validate and return the API credentials
    ///
    /// Every missing variable is reported at once, so a misconfigured
    /// deployment can be fixed in one pass.
    pub fn api_credentials(&self) -> Result<ApiCredentials, ConfigError> {
        let mut missing = Vec::new();
        let username = required(&self.username, "AWT_USERNAME", &mut missing);
        let password = required(&self.password, "AWT_PASSWORD", &mut missing);
        let api_key = required(&self.api_key, "AWT_API_KEY", &mut missing);

        match (username, password, api_key) {
            (Some(username), Some(password), Some(api_key)) => Ok(ApiCredentials {
                base_url: self.base_url.trim_end_matches('/').to_string(),
                username,
                password,
                api_key,
            }),
            _ => Err(ConfigError::MissingCredentials { missing }),
        }
    }

    /// Request timeout as a `Duration`
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Get the config file path
    ///
    /// Can be overridden with AWT_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("awt-sync")
            .join("config.toml")
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Empty string clears the value
fn override_optional(field: &mut Option<String>, var: &str) {
    if let Some(val) = env_value(var) {
        *field = if val.is_empty() { None } else { Some(val) };
    }
}

fn override_number<T: std::str::FromStr>(field: &mut T, var: &str) -> Result<(), ConfigError> {
    if let Some(val) = env_value(var) {
        if val.is_empty() {
            return Ok(());
        }
        *field = val.trim().parse().map_err(|_| ConfigError::InvalidValue {
            var: var.to_string(),
            value: val.clone(),
        })?;
    }
    Ok(())
}

fn check_range<T>(
    name: &str,
    value: T,
    range: std::ops::RangeInclusive<T>,
) -> Result<(), ConfigError>
where
    T: PartialOrd + fmt::Display,
{
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            var: name.to_string(),
            value: value.to_string(),
        })
    }
}

fn required(
    value: &Option<String>,
    var: &'static str,
    missing: &mut Vec<&'static str>,
) -> Option<String> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Some(v.to_string()),
        _ => {
            missing.push(var);
            None
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_initial_window_days() -> u32 {
    DEFAULT_INITIAL_WINDOW_DAYS
}

fn default_incremental_fallback_hours() -> u32 {
    DEFAULT_INCREMENTAL_FALLBACK_HOURS
}

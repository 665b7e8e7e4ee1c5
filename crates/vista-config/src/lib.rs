//! # vista-config
//!
//! Configuration for Vista, read from `~/.vista/config.yaml`.
//!
//! ```yaml
//! backend:
//!   base_url: http://localhost:8000
//!   timeout_secs: 30
//!   token_env: VISTA_TOKEN
//! session:
//!   username: alice
//! display:
//!   utc_offset_hours: -5
//!   zone_label: EST
//! search:
//!   debounce_ms: 300
//! ```
//!
//! Every section and field is optional; anything left out takes its default.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use vista_core::{Result, VistaError};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VistaConfig {
    /// Backend connection settings
    pub backend: BackendConfig,
    /// Session identity
    pub session: SessionConfig,
    /// Display settings for schedule times
    pub display: DisplayConfig,
    /// Autocomplete search settings
    pub search: SearchConfig,
}

/// Backend connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL all API paths are joined to
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Environment variable holding the bearer token
    pub token_env: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 30,
            token_env: "VISTA_TOKEN".to_string(),
        }
    }
}

/// Session identity used for view ownership checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Username compared against a view's `owner`
    pub username: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            username: std::env::var("USER").unwrap_or_else(|_| "analyst".to_string()),
        }
    }
}

/// Fixed display offset for schedule times (stored in UTC).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Hours east of UTC (negative for west)
    pub utc_offset_hours: i32,
    /// Label appended to rendered times
    pub zone_label: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: -5,
            zone_label: "EST".to_string(),
        }
    }
}

/// Autocomplete search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Quiet period before a lookup is sent
    pub debounce_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { debounce_ms: 300 }
    }
}

impl VistaConfig {
    /// Default config file location (`~/.vista/config.yaml`).
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".vista").join("config.yaml"))
    }

    /// Load from the default location, falling back to defaults when absent.
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VistaError::ConfigNotFound {
                    path: path.to_path_buf(),
                    source: Some(e),
                }
            } else {
                VistaError::io("reading config", path, e)
            }
        })?;

        let config = Self::from_yaml(&content).map_err(|e| match e {
            VistaError::ConfigInvalid { message, .. } => VistaError::ConfigInvalid {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })?;

        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Parse and validate YAML content.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content).map_err(|e| VistaError::ConfigInvalid {
            path: PathBuf::from("<inline>"),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check semantic constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.backend.base_url.trim().is_empty() {
            return Err(VistaError::ConfigValidation {
                message: "backend.base_url must not be empty".into(),
            });
        }
        if self.backend.timeout_secs == 0 {
            return Err(VistaError::ConfigValidation {
                message: "backend.timeout_secs must be at least 1".into(),
            });
        }
        if self.session.username.trim().is_empty() {
            return Err(VistaError::ConfigValidation {
                message: "session.username must not be empty".into(),
            });
        }
        if !(-12..=14).contains(&self.display.utc_offset_hours) {
            return Err(VistaError::ConfigValidation {
                message: format!(
                    "display.utc_offset_hours {} is outside -12..=14",
                    self.display.utc_offset_hours
                ),
            });
        }
        Ok(())
    }

    /// Override the backend URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.backend.base_url = url.into();
        self
    }

    /// Override the session username.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.session.username = username.into();
        self
    }

    /// Override the display offset and label.
    pub fn with_display_offset(mut self, hours: i32, label: impl Into<String>) -> Self {
        self.display.utc_offset_hours = hours;
        self.display.zone_label = label.into();
        self
    }
}

//! Pipeline configuration
//!
//! Loaded from a JSON file; every key is optional:
//!
//! ```json
//! {
//!   "checkbox_rule": "legacy_single_value",
//!   "validate_fields": true,
//!   "title_max_length": 255,
//!   "forms_dir": "./forms"
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::{Event, Logger};
use crate::schema::CheckboxRule;
use crate::submission::{RecordRules, DEFAULT_TITLE_MAX_LENGTH};

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {reason}")]
    Read { path: String, reason: String },

    #[error("Invalid config JSON in '{path}': {reason}")]
    Parse { path: String, reason: String },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Read { .. } => "FORMENTRY_CONFIG_READ",
            Self::Parse { .. } => "FORMENTRY_CONFIG_PARSE",
            Self::Invalid(_) => "FORMENTRY_CONFIG_INVALID",
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Submission pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// How required checkbox groups are judged unanswered
    pub checkbox_rule: CheckboxRule,

    /// Run field rules inside `process()`.
    ///
    /// Turn off only when callers validate with `validate_entry` beforehand.
    pub validate_fields: bool,

    /// Maximum record title length in characters
    pub title_max_length: usize,

    /// Directory of form and field definitions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forms_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            checkbox_rule: CheckboxRule::default(),
            validate_fields: true,
            title_max_length: DEFAULT_TITLE_MAX_LENGTH,
            forms_dir: None,
        }
    }
}

impl PipelineConfig {
    /// Load and validate configuration from a file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let config: PipelineConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        config.validate()?;

        Logger::info(
            Event::ConfigLoaded.as_str(),
            &[("path", &path.display().to_string())],
        );

        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.title_max_length == 0 {
            return Err(ConfigError::Invalid(
                "title_max_length must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn record_rules(&self) -> RecordRules {
        RecordRules::new(self.title_max_length)
    }
}

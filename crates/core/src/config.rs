//! TOML-based configuration for the post forking library.
//!
//! A host loads one [`AppConfig`] at startup and hands it to
//! [`App`](crate::app::App). Every section has defaults, so an empty file is
//! a valid configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;
use crate::fork::ForkField;
use crate::models::{FORK_POST_TYPE, REVISION_POST_TYPE};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Tracing settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Document store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Identity provider settings.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Fork creation settings.
    #[serde(default)]
    pub forking: ForkingConfig,

    /// Merge and publish settings.
    #[serde(default)]
    pub merge: MergeConfig,
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Tracing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive: trace, debug, info, warn, error, or a full
    /// `EnvFilter` expression such as `postfork_core=debug`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// SQLite document store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file. An in-memory database is used when
    /// unset.
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_busy_timeout() -> u64 {
    5000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Identity provider settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Path to the TOML author mapping file.
    #[serde(default)]
    pub mapping_file: Option<PathBuf>,

    /// Author id acting for this process when no other actor is supplied.
    #[serde(default)]
    pub current_author: Option<i64>,
}

// ---------------------------------------------------------------------------
// Forking
// ---------------------------------------------------------------------------

/// Fork creation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForkingConfig {
    /// Post types that may be forked.
    #[serde(default = "default_post_types")]
    pub post_types: Vec<String>,

    /// Fields copied from the parent into a new fork.
    #[serde(default = "default_fork_fields")]
    pub fields: Vec<ForkField>,
}

fn default_post_types() -> Vec<String> {
    vec!["post".into(), "page".into()]
}
fn default_fork_fields() -> Vec<ForkField> {
    vec![ForkField::Title, ForkField::Content]
}

impl Default for ForkingConfig {
    fn default() -> Self {
        Self {
            post_types: default_post_types(),
            fields: default_fork_fields(),
        }
    }
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// Merge orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Label on the fork side of conflict markers.
    #[serde(default = "default_fork_label")]
    pub fork_label: String,

    /// Label on the current-version side of conflict markers.
    #[serde(default = "default_current_label")]
    pub current_label: String,

    /// Lifetime of a cached diff inside one request, in milliseconds.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_ms: u64,
}

fn default_fork_label() -> String {
    "Fork".into()
}
fn default_current_label() -> String {
    "Current Version".into()
}
fn default_cache_ttl() -> u64 {
    1000
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            fork_label: default_fork_label(),
            current_label: default_current_label(),
            cache_ttl_ms: default_cache_ttl(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Validate that all fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.merge.fork_label.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "merge.fork_label".into(),
                detail: "conflict label must not be empty".into(),
            });
        }
        if self.merge.current_label.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "merge.current_label".into(),
                detail: "conflict label must not be empty".into(),
            });
        }
        if self.merge.cache_ttl_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "merge.cache_ttl_ms".into(),
                detail: "cache ttl must be > 0".into(),
            });
        }
        if self.forking.fields.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "forking.fields".into(),
                detail: "at least one field must be copied into a fork".into(),
            });
        }
        if let Some(pt) = self
            .forking
            .post_types
            .iter()
            .find(|pt| pt.as_str() == FORK_POST_TYPE || pt.as_str() == REVISION_POST_TYPE)
        {
            return Err(ConfigError::InvalidValue {
                field: "forking.post_types".into(),
                detail: format!("'{}' documents cannot be forked", pt),
            });
        }

        Ok(())
    }

    /// Convenience: load and validate in one call.
    pub fn load_and_validate<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }
}

//! Tarn execution-policy configuration
//!
//! Provides configuration for embedding hosts:
//! - Execution limits (recursion / runaway-instruction ceilings)
//! - Network role for callspace routing
//! - Development-tooling toggles (trace events, warning escalation)
//!
//! Configuration is loaded from a `tarn.toml` file or built programmatically;
//! every loaded value is validated before it reaches the runtime.
//!
//! # Example
//!
//! ```no_run
//! use tarn_config::VmConfig;
//! use std::path::Path;
//!
//! let config = VmConfig::load_from_file(Path::new("tarn.toml")).unwrap();
//! assert!(config.limits.runaway_ceiling > 0);
//! ```

pub mod vm;

use std::path::PathBuf;
use thiserror::Error;

pub use vm::{LimitsConfig, NetConfig, NetRoleConfig, ToolingConfig, VmConfig};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

//! VM configuration (tarn.toml)
//!
//! Execution-policy settings consumed by `tarn-runtime` when constructing a
//! machine: safety ceilings, the process network role, and development
//! tooling toggles.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default recursion ceiling (interpreted-to-interpreted call depth).
pub const DEFAULT_RECURSION_CEILING: u32 = 250;

/// Default runaway-instruction ceiling (opcodes dispatched per top-level run).
pub const DEFAULT_RUNAWAY_CEILING: u64 = 1_000_000;

/// Root VM configuration from tarn.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct VmConfig {
    /// Execution safety ceilings
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Network role for callspace routing
    #[serde(default)]
    pub net: NetConfig,

    /// Development-tooling toggles
    #[serde(default)]
    pub tooling: ToolingConfig,
}

/// Execution safety ceilings
///
/// Both ceilings are policy constants, not correctness invariants: they bound
/// how long a script invocation may run before the runtime gives up and
/// returns a zeroed value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    /// Maximum interpreted call depth before the invocation is aborted
    #[serde(default = "default_recursion_ceiling")]
    pub recursion_ceiling: u32,

    /// Maximum opcodes dispatched before the invocation is aborted
    #[serde(default = "default_runaway_ceiling")]
    pub runaway_ceiling: u64,
}

fn default_recursion_ceiling() -> u32 {
    DEFAULT_RECURSION_CEILING
}

fn default_runaway_ceiling() -> u64 {
    DEFAULT_RUNAWAY_CEILING
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            recursion_ceiling: DEFAULT_RECURSION_CEILING,
            runaway_ceiling: DEFAULT_RUNAWAY_CEILING,
        }
    }
}

/// Process network role used by the callspace router
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NetRoleConfig {
    /// No networking; every call executes locally
    #[default]
    Standalone,
    /// Connected client
    Client,
    /// Authoritative server
    Server,
}

/// Network section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct NetConfig {
    /// Role of this process
    #[serde(default)]
    pub role: NetRoleConfig,
}

/// Development-tooling toggles
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ToolingConfig {
    /// Emit breakpoint/tracepoint fault events (observers still decide what
    /// to do with them)
    #[serde(default = "default_true")]
    pub trace_events: bool,

    /// Append the script call stack to runtime warnings
    #[serde(default)]
    pub stack_on_warnings: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ToolingConfig {
    fn default() -> Self {
        Self {
            trace_events: true,
            stack_on_warnings: false,
        }
    }
}

impl VmConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: VmConfig =
            toml::from_str(&content).map_err(|error| ConfigError::TomlParseError {
                file: path.to_path_buf(),
                error,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: VmConfig =
            toml::from_str(content).map_err(|error| ConfigError::TomlParseError {
                file: "<inline>".into(),
                error,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all values
    ///
    /// A zero ceiling would abort every invocation before its first opcode,
    /// which is never what a host wants; rejected here rather than at runtime.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.limits.recursion_ceiling == 0 {
            return Err(ConfigError::InvalidValue {
                field: "limits.recursion_ceiling".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.limits.runaway_ceiling == 0 {
            return Err(ConfigError::InvalidValue {
                field: "limits.runaway_ceiling".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

//! Toolflow Configuration Module
//!
//! Compiler settings: complexity caps and the known-library index.
//!
//! ## Lookup Order (highest to lowest)
//!
//! 1. `--config <path>` on the command line
//! 2. `TOOLFLOW_CONFIG` environment variable
//! 3. Config file (`~/.config/toolflow/config.toml`)
//! 4. Defaults
//!
//! ```toml
//! [limits]
//! max_sequence_len = 20
//!
//! [library.web_search]
//! module = "acme.tools.search"
//! function = "web_search"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ast::validate_identifier;
use crate::error::{Result, ToolflowError};
use crate::limits::Limits;

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "TOOLFLOW_CONFIG";

static MODULE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*$").unwrap());

static FUNCTION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Where a known tool is implemented
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryEntry {
    /// Dotted module path, e.g. `acme.tools.search`
    pub module: String,
    pub function: String,
}

/// Tool name → implementation, sorted by tool name
pub type LibraryIndex = BTreeMap<String, LibraryEntry>;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompilerConfig {
    #[serde(default)]
    pub limits: Limits,

    /// Known tools; anything missing here gets a stub
    #[serde(default)]
    pub library: LibraryIndex,
}

impl CompilerConfig {
    /// Returns `~/.config/toolflow/` on Unix, `%APPDATA%/toolflow/` on Windows
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("toolflow")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Parse and check a TOML config
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ToolflowError::ConfigError {
            reason: format!("Failed to parse config: {}", e),
        })?;
        config.check()?;
        Ok(config)
    }

    /// Load from an explicit file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| ToolflowError::ConfigError {
            reason: format!("Failed to read config file {}: {}", path.display(), e),
        })?;
        Self::from_toml(&content)
    }

    /// Resolve the config using the lookup order
    ///
    /// An explicit path or `TOOLFLOW_CONFIG` must exist; the default location
    /// is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            debug!(path = %path.display(), "loading config from --config");
            return Self::from_file(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.is_empty() {
                debug!(path = %path, "loading config from {}", CONFIG_ENV);
                return Self::from_file(Path::new(&path));
            }
        }

        let path = Self::config_path();
        if path.exists() {
            debug!(path = %path.display(), "loading config from default location");
            return Self::from_file(&path);
        }

        Ok(Self::default())
    }

    fn check(&self) -> Result<()> {
        for (tool, entry) in &self.library {
            if let Err(problem) = validate_identifier(tool) {
                return Err(ToolflowError::ConfigError {
                    reason: format!("library tool '{}': {}", tool, problem),
                });
            }
            if !MODULE_RE.is_match(&entry.module) {
                return Err(ToolflowError::ConfigError {
                    reason: format!(
                        "library tool '{}': module '{}' is not a dotted module path",
                        tool, entry.module
                    ),
                });
            }
            if !FUNCTION_RE.is_match(&entry.function) {
                return Err(ToolflowError::ConfigError {
                    reason: format!(
                        "library tool '{}': function '{}' is not a valid name",
                        tool, entry.function
                    ),
                });
            }
        }

        let l = &self.limits;
        let caps = [
            ("max_sequence_len", l.max_sequence_len),
            ("max_fanout_branches", l.max_fanout_branches),
            ("max_dispatch_rules", l.max_dispatch_rules),
            ("max_tool_calls", l.max_tool_calls),
            ("max_depth", l.max_depth),
        ];
        if let Some((name, _)) = caps.iter().find(|(_, v)| *v == 0) {
            return Err(ToolflowError::ConfigError {
                reason: format!("limits.{} must be at least 1", name),
            });
        }
        Ok(())
    }
}

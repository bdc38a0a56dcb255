//! Configuration types for MCP integration
//!
//! Loaded from an `mcp.json` file next to the binary (or any path the
//! caller supplies). Only the stdio transport is supported: every server
//! is a local subprocess speaking JSON-RPC over its pipes.
//!
//! # Example
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "stock-data": {
//!       "command": "uvx",
//!       "args": ["stock-data-mcp"],
//!       "env": { "DATA_API_KEY": "${DATA_API_KEY}" }
//!     }
//!   }
//! }
//! ```

use crate::error::MCPError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::LazyLock;

/// `${VAR}` references
static BRACED_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static regex"));

/// Bare `$VAR` references
static BARE_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").expect("static regex"));

/// Root MCP configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MCPConfig {
    /// MCP server definitions, keyed by server name
    #[serde(default)]
    pub mcp_servers: HashMap<String, MCPServerConfig>,
}

/// Stdio MCP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MCPServerConfig {
    /// Command to execute
    pub command: String,

    /// Command arguments
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment variables for the child process
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Working directory (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
}

impl MCPConfig {
    /// Load configuration from a file and resolve `${VAR}` references
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, MCPError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| MCPError::ConfigError(format!("Failed to read config file: {e}")))?;

        let mut config: MCPConfig = serde_json::from_str(&content)
            .map_err(|e| MCPError::ConfigError(format!("Failed to parse config file: {e}")))?;

        config.resolve_env_vars()?;

        Ok(config)
    }

    /// Resolve environment variable references in all server entries
    ///
    /// Supports `${VAR}` and `$VAR` syntax in commands, arguments,
    /// environment values, and working directories.
    pub fn resolve_env_vars(&mut self) -> Result<(), MCPError> {
        for server_config in self.mcp_servers.values_mut() {
            server_config.command = resolve_env_string(&server_config.command)?;

            for arg in server_config.args.iter_mut() {
                *arg = resolve_env_string(arg)?;
            }

            for value in server_config.env.values_mut() {
                *value = resolve_env_string(value)?;
            }

            if let Some(path) = &server_config.cwd {
                let path_str = path.to_string_lossy().to_string();
                let resolved = resolve_env_string(&path_str)?;
                server_config.cwd = Some(PathBuf::from(resolved));
            }
        }

        Ok(())
    }
}

/// Resolve environment variable references in a string
///
/// Supports `${VAR}` and `$VAR` syntax. Fails with
/// [`MCPError::EnvVarNotFound`] when a referenced variable is unset.
pub fn resolve_env_string(s: &str) -> Result<String, MCPError> {
    let mut result = s.to_string();

    for cap in BRACED_VAR.captures_iter(s) {
        let var_name = &cap[1];
        let value =
            std::env::var(var_name).map_err(|_| MCPError::EnvVarNotFound(var_name.to_string()))?;
        result = result.replace(&cap[0], &value);
    }

    for cap in BARE_VAR.captures_iter(&result.clone()) {
        let var_name = &cap[1];
        let value =
            std::env::var(var_name).map_err(|_| MCPError::EnvVarNotFound(var_name.to_string()))?;
        result = result.replace(&cap[0], &value);
    }

    Ok(result)
}

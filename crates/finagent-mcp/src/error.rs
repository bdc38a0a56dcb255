//! Error types for MCP operations

use finagent_core::NodeError;
use thiserror::Error;

/// Result type for MCP operations
pub type Result<T> = std::result::Result<T, MCPError>;

/// Errors that can occur during MCP operations
#[derive(Error, Debug)]
pub enum MCPError {
    /// MCP connection failed
    #[error("MCP connection failed: {0}")]
    ConnectionFailed(String),

    /// MCP initialization failed
    #[error("MCP initialization failed: {0}")]
    InitializationFailed(String),

    /// Not connected to MCP server
    #[error("Not connected to MCP server")]
    NotConnected,

    /// MCP request failed
    #[error("MCP request failed: {0}")]
    RequestFailed(String),

    /// MCP tool call failed
    #[error("MCP tool call failed: {0}")]
    ToolCallFailed(String),

    /// No server exposes the requested tool
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Environment variable error
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
}

/// Tool infrastructure failures surface to nodes as resource errors
impl From<MCPError> for NodeError {
    fn from(err: MCPError) -> Self {
        NodeError::ResourceUnavailable(err.to_string())
    }
}

//! MCP (Model Context Protocol) integration for finagent-rs
//!
//! This crate connects the analysis agents to their market-data tools:
//!
//! - Configuration types for stdio MCP servers (`mcp.json`)
//! - A JSON-RPC 2.0 stdio client that spawns the server as a child process
//! - A shared toolset with single-flight initialization, so concurrent
//!   agents trigger exactly one server startup and tool discovery

pub mod client;
pub mod config;
pub mod error;
pub mod toolset;

pub use client::stdio::StdioMCPClient;
pub use client::{MCPClient, MCPContent, MCPServerInfo, MCPToolDefinition, MCPToolResult};
pub use config::{MCPConfig, MCPServerConfig};
pub use error::{MCPError, Result};
pub use toolset::{SharedToolset, ToolProvider};

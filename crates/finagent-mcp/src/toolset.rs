//! Shared toolset with single-flight initialization
//!
//! All analysis agents draw on the same MCP servers. Server startup and
//! tool discovery are expensive and must happen once per process, no
//! matter how many agents ask for tools concurrently: the first caller
//! performs the initialization, concurrent callers await the same future,
//! and later callers get the cached result. A failed initialization is
//! cached as an empty toolset rather than retried, so a broken server
//! degrades every agent the same way instead of stampeding it.

use crate::client::{MCPClient, MCPToolDefinition, MCPToolResult};
use crate::config::MCPConfig;
use crate::error::MCPError;
use crate::Result;
use crate::StdioMCPClient;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Source of tools for the analysis agents
///
/// Abstracts over the shared MCP toolset so agents can be driven by
/// in-memory fakes in tests.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// List all available tools across servers
    async fn list_tools(&self) -> Result<Vec<MCPToolDefinition>>;

    /// Call a tool by name, routed to the server that exposes it
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<MCPToolResult>;
}

/// Initialized tool inventory: discovered tools plus their owning clients
struct Toolset {
    tools: Vec<MCPToolDefinition>,
    routes: HashMap<String, Arc<dyn MCPClient>>,
}

/// Process-wide shared toolset
///
/// Cheap to clone via Arc; every handle shares the same initialization
/// cell and therefore the same server connections.
pub struct SharedToolset {
    clients: Vec<(String, Arc<dyn MCPClient>)>,
    init: OnceCell<Arc<Toolset>>,
}

impl SharedToolset {
    /// Build a toolset over explicit clients
    ///
    /// Each entry pairs a server name (for logging) with its client.
    /// No connection happens until the first tool listing.
    pub fn new(clients: Vec<(String, Arc<dyn MCPClient>)>) -> Self {
        Self {
            clients,
            init: OnceCell::new(),
        }
    }

    /// Build a toolset with one stdio client per configured server
    pub fn from_config(config: &MCPConfig) -> Self {
        let clients = config
            .mcp_servers
            .iter()
            .map(|(name, server)| {
                let client: Arc<dyn MCPClient> = Arc::new(StdioMCPClient::from_config(server));
                (name.clone(), client)
            })
            .collect();
        Self::new(clients)
    }

    /// Get the initialized toolset, performing single-flight init
    async fn toolset(&self) -> &Arc<Toolset> {
        self.init
            .get_or_init(|| async { Arc::new(self.initialize().await) })
            .await
    }

    /// Connect every server and discover its tools
    ///
    /// A server that fails to connect or list contributes nothing; the
    /// remaining servers still count. The combined result, even when
    /// empty, is what gets cached.
    async fn initialize(&self) -> Toolset {
        let mut tools = Vec::new();
        let mut routes: HashMap<String, Arc<dyn MCPClient>> = HashMap::new();

        for (name, client) in &self.clients {
            if let Err(e) = client.connect().await {
                warn!("MCP server {} failed to connect: {}", name, e);
                continue;
            }

            match client.list_tools().await {
                Ok(server_tools) => {
                    info!("MCP server {} exposes {} tools", name, server_tools.len());
                    for tool in server_tools {
                        routes.insert(tool.name.clone(), Arc::clone(client));
                        tools.push(tool);
                    }
                }
                Err(e) => {
                    warn!("MCP server {} failed to list tools: {}", name, e);
                }
            }
        }

        Toolset { tools, routes }
    }
}

#[async_trait]
impl ToolProvider for SharedToolset {
    async fn list_tools(&self) -> Result<Vec<MCPToolDefinition>> {
        Ok(self.toolset().await.tools.clone())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<MCPToolResult> {
        let toolset = self.toolset().await;
        let client = toolset
            .routes
            .get(name)
            .ok_or_else(|| MCPError::ToolNotFound(name.to_string()))?;
        client.call_tool(name, arguments).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MCPContent, MCPServerInfo};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeClient {
        connects: AtomicUsize,
        fail_connect: bool,
    }

    impl FakeClient {
        fn new(fail_connect: bool) -> Self {
            Self {
                connects: AtomicUsize::new(0),
                fail_connect,
            }
        }
    }

    #[async_trait]
    impl MCPClient for FakeClient {
        async fn connect(&self) -> Result<()> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.fail_connect {
                Err(MCPError::ConnectionFailed("refused".to_string()))
            } else {
                Ok(())
            }
        }

        fn is_connected(&self) -> bool {
            !self.fail_connect
        }

        async fn disconnect(&self) -> Result<()> {
            Ok(())
        }

        async fn list_tools(&self) -> Result<Vec<MCPToolDefinition>> {
            Ok(vec![MCPToolDefinition {
                name: "get_stock_basic".to_string(),
                description: Some("Fetch basic stock data".to_string()),
                input_schema: serde_json::json!({"type": "object"}),
            }])
        }

        async fn call_tool(&self, name: &str, _arguments: Value) -> Result<MCPToolResult> {
            Ok(MCPToolResult {
                content: vec![MCPContent::Text {
                    text: format!("result of {name}"),
                }],
                is_error: None,
            })
        }

        async fn server_info(&self) -> Option<MCPServerInfo> {
            None
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_initialization() {
        let fake = Arc::new(FakeClient::new(false));
        let toolset = Arc::new(SharedToolset::new(vec![(
            "fake".to_string(),
            Arc::clone(&fake) as Arc<dyn MCPClient>,
        )]));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let ts = Arc::clone(&toolset);
            handles.push(tokio::spawn(async move { ts.list_tools().await }));
        }
        for handle in handles {
            let tools = handle.await.unwrap().unwrap();
            assert_eq!(tools.len(), 1);
        }

        assert_eq!(fake.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_init_caches_empty_toolset() {
        let fake = Arc::new(FakeClient::new(true));
        let toolset = SharedToolset::new(vec![(
            "fake".to_string(),
            Arc::clone(&fake) as Arc<dyn MCPClient>,
        )]);

        assert!(toolset.list_tools().await.unwrap().is_empty());
        assert!(toolset.list_tools().await.unwrap().is_empty());

        // Second listing must not retry the connection
        assert_eq!(fake.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_call_tool_routes_by_name() {
        let fake = Arc::new(FakeClient::new(false));
        let toolset = SharedToolset::new(vec![(
            "fake".to_string(),
            Arc::clone(&fake) as Arc<dyn MCPClient>,
        )]);

        let result = toolset
            .call_tool("get_stock_basic", serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(result.text(), "result of get_stock_basic");

        let missing = toolset.call_tool("unknown", serde_json::json!({})).await;
        assert!(matches!(missing, Err(MCPError::ToolNotFound(_))));
    }
}

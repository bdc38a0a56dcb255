//! Tool definition types for LLM tool use

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool definition for LLM provider
///
/// This describes a tool that the LLM can use, including its name,
/// description, and input schema in JSON Schema format. Schemas are
/// typically supplied verbatim by the MCP server that owns the tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON schema for the tool's input parameters
    pub input_schema: Value,
}

impl ToolDefinition {
    /// Create a new tool definition
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_definition_creation() {
        let schema = json!({
            "type": "object",
            "properties": {
                "code": { "type": "string", "description": "Stock code" },
            },
            "required": ["code"],
        });

        let tool = ToolDefinition::new("get_stock_basic", "Fetch basic stock data", schema.clone());
        assert_eq!(tool.name, "get_stock_basic");
        assert_eq!(tool.description, "Fetch basic stock data");
        assert_eq!(tool.input_schema, schema);
    }
}

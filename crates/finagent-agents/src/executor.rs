//! Bounded tool-use loop
//!
//! The loop pattern all analysts share:
//! 1. Call LLM with conversation history and available tools
//! 2. Check stop reason
//! 3. If tool use requested, execute tools and loop back
//! 4. If completed, return the full transcript
//!
//! The transcript (not just the last message) is returned so callers can
//! decode it with [`finagent_llm::extract_final_text`], which also covers
//! runs cut short by the iteration bound or the token limit.

use finagent_core::{NodeError, NodeResult};
use finagent_llm::{
    CompletionRequest, ContentBlock, LLMProvider, Message, StopReason, ToolDefinition,
};
use finagent_mcp::ToolProvider;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Configuration for one tool loop run
#[derive(Debug, Clone)]
pub struct ToolLoopConfig {
    /// Maximum number of LLM round trips (prevents infinite loops)
    pub max_iterations: usize,

    /// System prompt
    pub system_prompt: Option<String>,

    /// Max tokens per completion
    pub max_tokens: usize,

    /// Temperature
    pub temperature: f32,
}

impl Default for ToolLoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            system_prompt: None,
            max_tokens: 3000,
            temperature: 0.3,
        }
    }
}

/// Executes a tool loop: LLM, tool calls, execution, loop back
pub struct ToolLoop {
    provider: Arc<dyn LLMProvider>,
    tools: Arc<dyn ToolProvider>,
    config: ToolLoopConfig,
}

impl ToolLoop {
    /// Create a new tool loop
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        tools: Arc<dyn ToolProvider>,
        config: ToolLoopConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            config,
        }
    }

    /// Run the loop on a user message, returning the full transcript
    pub async fn run(&self, user_message: String) -> NodeResult<Vec<Message>> {
        let tool_definitions = self.tool_definitions().await?;
        debug!("Available tools: {}", tool_definitions.len());

        let mut conversation = vec![Message::user(user_message)];
        let mut iteration = 0;

        loop {
            iteration += 1;
            if iteration > self.config.max_iterations {
                warn!(
                    "Max iterations ({}) reached, stopping",
                    self.config.max_iterations
                );
                return Ok(conversation);
            }

            info!(
                "Tool loop iteration {}/{}",
                iteration, self.config.max_iterations
            );

            let mut request_builder = CompletionRequest::builder(self.provider.default_model())
                .messages(conversation.clone())
                .max_tokens(self.config.max_tokens)
                .temperature(self.config.temperature);

            if let Some(system) = &self.config.system_prompt {
                request_builder = request_builder.system(system.clone());
            }
            if !tool_definitions.is_empty() {
                request_builder = request_builder.tools(tool_definitions.clone());
            }

            let response = self
                .provider
                .complete(request_builder.build())
                .await
                .map_err(NodeError::execution)?;

            debug!(
                "LLM response - stop_reason: {:?}, tokens: {:?}",
                response.stop_reason, response.usage
            );

            conversation.push(response.message.clone());

            match response.stop_reason {
                StopReason::EndTurn => {
                    debug!("Tool loop completed naturally");
                    return Ok(conversation);
                }

                StopReason::ToolUse => {
                    debug!("Tool use requested");
                    let tool_results = self.execute_tools(&response.message).await;

                    if tool_results.is_empty() {
                        warn!("No tool results despite ToolUse stop reason");
                        return Ok(conversation);
                    }

                    conversation.extend(tool_results);
                }

                StopReason::MaxTokens => {
                    warn!("Hit max tokens in LLM response");
                    return Ok(conversation);
                }
            }
        }
    }

    /// Build LLM tool definitions from the MCP toolset
    async fn tool_definitions(&self) -> NodeResult<Vec<ToolDefinition>> {
        let tools = self.tools.list_tools().await?;
        Ok(tools
            .into_iter()
            .map(|tool| {
                ToolDefinition::new(
                    tool.name,
                    tool.description.unwrap_or_default(),
                    tool.input_schema,
                )
            })
            .collect())
    }

    /// Execute tool calls from an assistant message
    ///
    /// A failed call becomes an error tool-result message; the loop goes on
    /// and the model decides how to proceed with the failure.
    async fn execute_tools(&self, message: &Message) -> Vec<Message> {
        let tool_uses = message.tool_uses();
        debug!("Executing {} tool(s)", tool_uses.len());

        let mut results = Vec::new();
        for tool_use in tool_uses {
            if let ContentBlock::ToolUse { id, name, input } = tool_use {
                info!("Executing tool: {}", name);

                match self.tools.call_tool(name, input.clone()).await {
                    Ok(result) => {
                        debug!("Tool {} succeeded", name);
                        results.push(Message::tool_result(id.clone(), result.text()));
                    }
                    Err(e) => {
                        warn!("Tool {} execution failed: {}", name, e);
                        results.push(Message::tool_error(id.clone(), format!("Error: {e}")));
                    }
                }
            }
        }

        results
    }
}

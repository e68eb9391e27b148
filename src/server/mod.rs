//! Line-delimited JSON-RPC server over stdio
//!
//! Reads one request per line, answers in arrival order and writes one
//! response per line. Notifications get no response. Logging goes to
//! stderr so stdout stays a clean protocol channel.

pub mod protocol;

use crate::dispatcher::Dispatcher;
use crate::error::{
    ErrorEnvelope, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND,
};
use crate::provider::Platform;
use crate::types::ToolInvocationRequest;
use protocol::*;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// JSON-RPC: request line is not valid JSON
pub const PARSE_ERROR: i32 = -32700;

/// Name of the issue prompt
pub const ISSUE_PROMPT: &str = "sentry-issue";

/// MCP server backed by a `Dispatcher`
pub struct McpServer {
    dispatcher: Arc<Dispatcher>,
}

impl McpServer {
    /// Create a server
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Serve stdin/stdout until stdin closes
    pub async fn serve_stdio(&self) -> std::io::Result<()> {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.serve(stdin, stdout).await
    }

    /// Serve an arbitrary line-oriented stream until EOF
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        tracing::info!(
            backend = self.dispatcher.backend_name(),
            platform = self.dispatcher.platform().as_str(),
            "MCP server listening"
        );

        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                tracing::info!("Input closed, stopping server");
                return Ok(());
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if let Some(response) = self.handle_message(trimmed).await {
                let mut payload = serde_json::to_string(&response)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
                payload.push('\n');
                writer.write_all(payload.as_bytes()).await?;
                writer.flush().await?;
            }
        }
    }

    /// Handle one raw message; `None` for notifications
    pub async fn handle_message(&self, raw: &str) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(raw) {
            Ok(req) => req,
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable message");
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    JsonRpcError::new(PARSE_ERROR, format!("Parse error: {}", e)),
                ));
            }
        };

        if request.is_notification() {
            tracing::debug!(method = %request.method, "Notification received");
            return None;
        }

        let id = request.id.clone().unwrap_or(Value::Null);
        let response = match self.handle_request(&request).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::failure(id, error),
        };
        Some(response)
    }

    async fn handle_request(&self, request: &JsonRpcRequest) -> Result<Value, JsonRpcError> {
        if request.jsonrpc != JSONRPC_VERSION {
            return Err(JsonRpcError::new(
                INVALID_REQUEST,
                format!("Unsupported jsonrpc version '{}'", request.jsonrpc),
            ));
        }

        tracing::debug!(method = %request.method, "Request received");

        match request.method.as_str() {
            "initialize" => to_value(self.initialize(request.params.as_ref())),
            "ping" => Ok(serde_json::json!({})),
            "tools/list" => to_value(self.list_tools()),
            "tools/call" => {
                let params: CallToolParams = parse_params(request.params.as_ref())?;
                let result = self.call_tool(params).await?;
                to_value(result)
            }
            "prompts/list" => to_value(self.list_prompts()),
            "prompts/get" => {
                let params: GetPromptParams = parse_params(request.params.as_ref())?;
                let result = self.get_prompt(params).await?;
                to_value(result)
            }
            other => Err(JsonRpcError::new(
                METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            )),
        }
    }

    fn initialize(&self, params: Option<&Value>) -> InitializeResult {
        let protocol_version = params
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str)
            .unwrap_or(PROTOCOL_VERSION)
            .to_string();

        let prompts = (self.dispatcher.platform() == Platform::IssueTracking)
            .then(PromptsCapability::default);

        InitializeResult {
            protocol_version,
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability::default()),
                prompts,
            },
            server_info: ServerInfo {
                name: self.dispatcher.backend_name().to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    fn list_tools(&self) -> ListToolsResult {
        ListToolsResult {
            tools: self
                .dispatcher
                .tools()
                .into_iter()
                .map(|d| McpTool {
                    name: d.name.to_string(),
                    description: Some(d.description.to_string()),
                    input_schema: d.input_schema(),
                })
                .collect(),
        }
    }

    async fn call_tool(&self, params: CallToolParams) -> Result<CallToolResult, JsonRpcError> {
        let request =
            ToolInvocationRequest::from_value(params.name, params.arguments.unwrap_or(Value::Null));

        let result = self.dispatcher.dispatch(request).await.map_err(envelope_error)?;

        Ok(CallToolResult {
            content: result.content().iter().map(ToolContent::from).collect(),
        })
    }

    fn list_prompts(&self) -> ListPromptsResult {
        let prompts = if self.dispatcher.platform() == Platform::IssueTracking {
            vec![McpPrompt {
                name: ISSUE_PROMPT.to_string(),
                description: Some("Retrieve a Sentry issue by ID or URL".to_string()),
                arguments: Some(vec![PromptArgument {
                    name: "issue_id_or_url".to_string(),
                    description: Some("Sentry issue ID or URL".to_string()),
                    required: true,
                }]),
            }]
        } else {
            Vec::new()
        };
        ListPromptsResult { prompts }
    }

    async fn get_prompt(&self, params: GetPromptParams) -> Result<GetPromptResult, JsonRpcError> {
        if params.name != ISSUE_PROMPT || self.dispatcher.platform() != Platform::IssueTracking {
            return Err(JsonRpcError::new(
                INVALID_PARAMS,
                format!("Unknown prompt: {}", params.name),
            ));
        }

        let issue_id_or_url = params
            .arguments
            .as_ref()
            .and_then(|args| args.get("issue_id_or_url"))
            .map(String::as_str)
            .unwrap_or_default();

        let summary = self
            .dispatcher
            .issue_summary(issue_id_or_url)
            .await
            .map_err(envelope_error)?;

        Ok(GetPromptResult {
            description: Some(format!("Sentry Issue: {}", summary.title)),
            messages: vec![PromptMessage {
                role: "user".to_string(),
                content: ToolContent::Text {
                    text: summary.to_text(),
                },
            }],
        })
    }
}

fn envelope_error(envelope: ErrorEnvelope) -> JsonRpcError {
    JsonRpcError {
        code: envelope.code,
        message: envelope.message,
        data: Some(serde_json::json!({ "kind": envelope.kind })),
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(params: Option<&Value>) -> Result<T, JsonRpcError> {
    let params = params.cloned().unwrap_or(Value::Null);
    serde_json::from_value(params)
        .map_err(|e| JsonRpcError::new(INVALID_PARAMS, format!("Invalid params: {}", e)))
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value)
        .map_err(|e| JsonRpcError::new(INTERNAL_ERROR, format!("Serialization error: {}", e)))
}

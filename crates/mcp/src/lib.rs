//! MCP (Model Context Protocol) server library.
//!
//! This crate serves tools to an MCP host over stdio: newline-delimited
//! JSON-RPC 2.0 on stdin/stdout. Tools are supplied by a [`ToolHandler`].
//!
//! # Example
//!
//! ```no_run
//! use mcp::{CallToolResult, Server, ServerInfo, Tool, ToolHandler};
//! use serde_json::Value;
//!
//! struct Hello;
//!
//! impl ToolHandler for Hello {
//!     fn tools(&self) -> Vec<Tool> {
//!         vec![Tool {
//!             name: "hello".to_string(),
//!             description: Some("Say hello".to_string()),
//!             input_schema: serde_json::json!({"type": "object"}),
//!         }]
//!     }
//!
//!     async fn call_tool(&self, name: &str, _args: Option<Value>) -> mcp::Result<CallToolResult> {
//!         match name {
//!             "hello" => Ok(CallToolResult::text("hello!")),
//!             other => Err(mcp::Error::ToolNotFound(other.to_string())),
//!         }
//!     }
//! }
//!
//! # async fn example() -> mcp::Result<()> {
//! let info = ServerInfo {
//!     name: "hello".to_string(),
//!     version: "0.1.0".to_string(),
//! };
//! Server::new(info, Hello).serve_stdio().await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod protocol;
mod server;

pub use error::{Error, Result};
pub use protocol::{
    CallToolParams, CallToolResult, ClientInfo, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, LATEST_PROTOCOL_VERSION, ListToolsResult, RequestId,
    SUPPORTED_PROTOCOL_VERSIONS, ServerCapabilities, ServerInfo, Tool, ToolContent,
    ToolsCapability,
};
pub use server::{MAX_MESSAGE_SIZE, Server, ToolHandler};

//! MCP server loop (read requests from stdin, dispatch, write responses).

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, LATEST_PROTOCOL_VERSION, ListToolsResult, RequestId,
    SUPPORTED_PROTOCOL_VERSIONS, ServerCapabilities, ServerInfo, Tool, ToolsCapability,
};

/// Maximum size of a single incoming message (1MB).
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Something that can list and execute tools on behalf of the server.
///
/// Failures that the user should see belong in a [`CallToolResult`] with
/// `is_error` set. `Err` is reserved for protocol-level problems such as an
/// unknown tool name.
pub trait ToolHandler: Send + Sync + 'static {
    /// Tools advertised through `tools/list`.
    fn tools(&self) -> Vec<Tool>;

    /// Execute a tool by name.
    fn call_tool(
        &self,
        name: &str,
        arguments: Option<Value>,
    ) -> impl Future<Output = Result<CallToolResult>> + Send;
}

struct Inner<H> {
    info: ServerInfo,
    instructions: Option<String>,
    handler: Arc<H>,
}

/// MCP server speaking newline-delimited JSON-RPC.
pub struct Server<H> {
    info: ServerInfo,
    instructions: Option<String>,
    handler: Arc<H>,
}

impl<H: ToolHandler> Server<H> {
    pub fn new(info: ServerInfo, handler: H) -> Self {
        Self {
            info,
            instructions: None,
            handler: Arc::new(handler),
        }
    }

    /// Attach usage instructions returned to the client on initialize.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Serve on the process's stdin and stdout until stdin closes.
    pub async fn serve_stdio(&self) -> Result<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve on arbitrary byte streams until the reader hits EOF.
    ///
    /// Every request runs on its own task. Responses are written by a single
    /// writer task so lines never interleave; they may be written out of
    /// request order.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        info!(
            server = %self.info.name,
            version = %self.info.version,
            "MCP server listening"
        );

        let shared = Arc::new(Inner {
            info: self.info.clone(),
            instructions: self.instructions.clone(),
            handler: Arc::clone(&self.handler),
        });

        let (tx, rx) = mpsc::unbounded_channel::<JsonRpcResponse>();
        let writer_task = tokio::spawn(write_responses(writer, rx));

        let mut reader = BufReader::new(reader);
        let mut tasks = JoinSet::new();
        let mut buf = Vec::new();

        let read_result = loop {
            let size = match read_frame(&mut reader, &mut buf, MAX_MESSAGE_SIZE).await {
                Ok(Frame::Eof) => break Ok(()),
                Ok(Frame::Line) => buf.len(),
                Ok(Frame::TooLarge(size)) => size,
                Err(e) => break Err(Error::Io(e)),
            };

            if size > MAX_MESSAGE_SIZE {
                let err = Error::MessageTooLarge {
                    size,
                    max: MAX_MESSAGE_SIZE,
                };
                warn!(error = %err, "rejecting message");
                let _ = tx.send(JsonRpcResponse::failure(None, err.to_rpc_error()));
                continue;
            }

            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "message is not valid UTF-8");
                    let _ = tx.send(JsonRpcResponse::failure(
                        None,
                        JsonRpcError::new(JsonRpcError::PARSE_ERROR, format!("parse error: {e}")),
                    ));
                    continue;
                }
            };

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let request = match parse_request(trimmed) {
                Ok(request) => request,
                Err(response) => {
                    let _ = tx.send(*response);
                    continue;
                }
            };

            let id = match request.id.clone() {
                Some(id) if !request.is_notification() => id,
                _ => {
                    debug!(method = %request.method, "received notification");
                    continue;
                }
            };

            let inner = Arc::clone(&shared);
            let tx = tx.clone();
            tasks.spawn(async move {
                let response = match inner.dispatch(&request.method, request.params).await {
                    Ok(result) => JsonRpcResponse::success(id, result),
                    Err(e) => {
                        debug!(method = %request.method, error = %e, "request failed");
                        JsonRpcResponse::failure(Some(id), e.to_rpc_error())
                    }
                };
                let _ = tx.send(response);
            });

            while let Some(joined) = tasks.try_join_next() {
                log_join(joined);
            }
        };

        // Let in-flight requests finish before closing the writer.
        while let Some(joined) = tasks.join_next().await {
            log_join(joined);
        }
        drop(tx);

        match writer_task.await {
            Ok(write_result) => write_result?,
            Err(e) => error!(error = %e, "response writer panicked"),
        }

        info!("MCP client disconnected");
        read_result
    }
}

impl<H: ToolHandler> Inner<H> {
    async fn dispatch(&self, method: &str, params: Option<Value>) -> Result<Value> {
        match method {
            "initialize" => {
                let params: InitializeParams = match params {
                    Some(p) => serde_json::from_value(p)
                        .map_err(|e| Error::InvalidParams(e.to_string()))?,
                    None => InitializeParams::default(),
                };
                Ok(serde_json::to_value(self.initialize(params))?)
            }
            "ping" => Ok(Value::Object(Default::default())),
            "tools/list" => {
                let result = ListToolsResult {
                    tools: self.handler.tools(),
                };
                Ok(serde_json::to_value(result)?)
            }
            "tools/call" => {
                let params: CallToolParams = params
                    .ok_or_else(|| Error::InvalidParams("missing params".to_string()))
                    .and_then(|p| {
                        serde_json::from_value(p).map_err(|e| Error::InvalidParams(e.to_string()))
                    })?;
                debug!(tool = %params.name, "calling tool");
                let result = self
                    .handler
                    .call_tool(&params.name, params.arguments)
                    .await?;
                debug!(tool = %params.name, is_error = result.is_error, "tool finished");
                Ok(serde_json::to_value(result)?)
            }
            other => Err(Error::MethodNotFound(other.to_string())),
        }
    }

    fn initialize(&self, params: InitializeParams) -> InitializeResult {
        if let Some(client) = &params.client_info {
            info!(
                client = %client.name,
                client_version = client.version.as_deref().unwrap_or("unknown"),
                "client connected"
            );
        }

        let protocol_version = params
            .protocol_version
            .as_deref()
            .filter(|v| SUPPORTED_PROTOCOL_VERSIONS.contains(v))
            .unwrap_or(LATEST_PROTOCOL_VERSION)
            .to_string();

        InitializeResult {
            protocol_version,
            capabilities: ServerCapabilities {
                tools: ToolsCapability {
                    list_changed: false,
                },
            },
            server_info: self.info.clone(),
            instructions: self.instructions.clone(),
        }
    }
}

enum Frame {
    Eof,
    /// A complete line is in the buffer, newline included.
    Line,
    /// The line exceeded the limit; it was discarded through the newline.
    TooLarge(usize),
}

/// Read one newline-terminated frame into `buf`, buffering at most `max` bytes.
///
/// An oversized line is consumed and dropped so the next read starts at the
/// following message. A final line without a newline still counts as a frame.
async fn read_frame<R>(reader: &mut R, buf: &mut Vec<u8>, max: usize) -> std::io::Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let mut seen = 0usize;
    let mut overflow = false;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(match (seen, overflow) {
                (0, _) => Frame::Eof,
                (_, true) => Frame::TooLarge(seen),
                (_, false) => Frame::Line,
            });
        }

        let (chunk, complete) = match available.iter().position(|&b| b == b'\n') {
            Some(i) => (&available[..=i], true),
            None => (available, false),
        };
        let len = chunk.len();
        seen += len;

        if !overflow {
            if buf.len() + len > max {
                overflow = true;
                buf.clear();
            } else {
                buf.extend_from_slice(chunk);
            }
        }
        reader.consume(len);

        if complete {
            return Ok(if overflow {
                Frame::TooLarge(seen)
            } else {
                Frame::Line
            });
        }
    }
}

/// Parse one line into a request, or produce the error response for it.
fn parse_request(line: &str) -> std::result::Result<JsonRpcRequest, Box<JsonRpcResponse>> {
    let value: Value = serde_json::from_str(line).map_err(|e| {
        warn!(error = %e, "unparseable message");
        Box::new(JsonRpcResponse::failure(
            None,
            JsonRpcError::new(JsonRpcError::PARSE_ERROR, format!("parse error: {e}")),
        ))
    })?;

    let id = value
        .get("id")
        .cloned()
        .and_then(|id| serde_json::from_value::<RequestId>(id).ok());

    let invalid = |message: String| {
        Box::new(JsonRpcResponse::failure(
            id.clone(),
            Error::InvalidRequest(message).to_rpc_error(),
        ))
    };

    let request: JsonRpcRequest =
        serde_json::from_value(value).map_err(|e| invalid(e.to_string()))?;

    if request.jsonrpc != "2.0" {
        return Err(invalid(format!(
            "unsupported jsonrpc version {:?}",
            request.jsonrpc
        )));
    }

    Ok(request)
}

async fn write_responses<W>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<JsonRpcResponse>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let json = match serde_json::to_string(&response) {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "failed to serialize response");
                continue;
            }
        };
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}

fn log_join(joined: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "request task failed");
    }
}

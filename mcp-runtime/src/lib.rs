//! MCP server exposing the CData Arc Admin API as tools.
//!
//! JSON-RPC 2.0 over stdio, accepting both `Content-Length` framed and
//! newline-delimited messages and answering in the framing the client used.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_mcp_core::{QueryOptions, Resource};
use clap::{Subcommand, ValueEnum};
use serde_json::{Map, Value, json};
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use uuid::Uuid;

pub mod args;
pub mod client;
pub mod error;
pub mod http;
pub mod tools;

#[cfg(test)]
mod test_support;

pub use arc_mcp_core::DateLiteralStyle;

use client::{ArcClient, ClientConfig};
use error::{RpcError, ToolError, status_hint};
use tools::{ToolContext, ToolOutput, ToolResult, execute_tool, tool_definitions};

pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
pub const MCP_SERVER_NAME: &str = "arc-mcp";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    /// MCP over stdin/stdout
    #[default]
    Stdio,
    /// Health endpoint only
    Http,
}

#[derive(Subcommand, Clone, Debug)]
pub enum McpCommands {
    /// Run the MCP server (default)
    Serve,
    /// Call the Arc Admin API once and print a JSON readiness report
    Check,
}

/// Settings resolved once at start-up.
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub base_url: String,
    pub auth_token: Option<String>,
    pub timeout: Duration,
    pub date_style: DateLiteralStyle,
    pub transport: Transport,
    pub port: u16,
}

impl RuntimeConfig {
    fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.base_url.clone())
            .with_auth_token(self.auth_token.clone())
            .with_timeout(self.timeout)
    }
}

pub async fn run(config: RuntimeConfig, command: McpCommands) -> i32 {
    let client = match ArcClient::new(&config.client_config()) {
        Ok(client) => client,
        Err(err) => {
            let payload = json!({
                "error": "invalid_configuration",
                "message": err.to_string(),
            });
            eprintln!("{}", to_pretty_json(&payload));
            return 1;
        }
    };

    match command {
        McpCommands::Serve => {
            let result = match config.transport {
                Transport::Stdio => {
                    let ctx = ToolContext::new(client).with_date_style(config.date_style);
                    McpServer::new(ctx).serve_stdio().await
                }
                Transport::Http => http::serve_http(config.port).await,
            };
            match result {
                Ok(()) => 0,
                Err(err) => {
                    let payload = json!({
                        "error": "mcp_server_error",
                        "message": err,
                    });
                    eprintln!("{}", to_pretty_json(&payload));
                    1
                }
            }
        }
        McpCommands::Check => {
            let report = check_report(&client).await;
            println!("{}", to_pretty_json(&report));
            if report.get("status").and_then(Value::as_str) == Some("ready") {
                0
            } else {
                2
            }
        }
    }
}

/// One `GET /profile` against the configured upstream.
async fn check_report(client: &ArcClient) -> Value {
    let mut report = json!({
        "server": MCP_SERVER_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "base_url": client.base_url(),
        "auth_mode": client.auth_mode(),
    });
    match client.list(Resource::Profile, &QueryOptions::new()).await {
        Ok(_) => {
            report["status"] = json!("ready");
        }
        Err(err) => {
            report["status"] = json!("unreachable");
            report["error"] = json!(err.to_string());
            if let Some(hint) = err.status().and_then(status_hint) {
                report["hint"] = json!(hint);
            }
        }
    }
    report
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Framing {
    ContentLength,
    Newline,
}

/// Largest `Content-Length` body that is buffered; bigger ones are skipped.
pub const MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

/// One framed message. A framing problem is carried as the error the
/// client gets back, not as a read failure.
struct Incoming {
    payload: Result<Vec<u8>, RpcError>,
    framing: Framing,
}

#[derive(Clone)]
pub struct McpServer {
    ctx: Arc<ToolContext>,
}

impl McpServer {
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    async fn serve_stdio(&self) -> Result<(), String> {
        tracing::info!(
            server = MCP_SERVER_NAME,
            version = env!("CARGO_PKG_VERSION"),
            base_url = self.ctx.client().base_url(),
            auth_mode = self.ctx.client().auth_mode(),
            date_style = %self.ctx.date_style(),
            "serving MCP over stdio"
        );
        let reader = BufReader::new(io::stdin());
        let writer = io::stdout();
        tokio::select! {
            result = self.serve(reader, writer) => result,
            _ = shutdown_signal() => Ok(()),
        }
    }

    /// Read, dispatch and answer messages until the reader is exhausted.
    /// Every message runs on its own task, so a slow tool call never holds
    /// up later requests and responses may arrive out of order. Responses
    /// still in flight at end of input are written before returning.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> Result<(), String>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<(Value, Framing)>();
        let server = self.clone();

        let read_loop = async move {
            loop {
                let incoming = read_message(&mut reader)
                    .await
                    .map_err(|e| format!("Failed to read MCP message: {e}"))?;
                let Some(Incoming { payload, framing }) = incoming else {
                    break;
                };

                let message = payload.and_then(|bytes| {
                    serde_json::from_slice::<Value>(&bytes)
                        .map_err(|err| RpcError::parse_error(format!("Invalid JSON: {err}")))
                });
                match message {
                    Ok(message) => {
                        let server = server.clone();
                        let tx = tx.clone();
                        tokio::spawn(async move {
                            if let Some(response) = server.handle_incoming_message(message).await {
                                let _ = tx.send((response, framing));
                            }
                        });
                    }
                    Err(err) => {
                        tracing::warn!(code = err.code, reason = %err.message, "unreadable MCP message");
                        let _ = tx.send((error_response(Value::Null, err), framing));
                    }
                }
            }
            tracing::info!("stdin closed, stopping");
            Ok::<(), String>(())
        };

        let write_loop = async move {
            while let Some((response, framing)) = rx.recv().await {
                write_message(&mut writer, &response, framing)
                    .await
                    .map_err(|e| format!("Failed to write MCP response: {e}"))?;
            }
            Ok::<(), String>(())
        };

        tokio::try_join!(read_loop, write_loop).map(|_| ())
    }

    /// A batch is answered with one array holding every non-notification
    /// response.
    async fn handle_incoming_message(&self, incoming: Value) -> Option<Value> {
        let Value::Array(batch) = incoming else {
            return self.handle_single_message(incoming).await;
        };
        if batch.is_empty() {
            return Some(error_response(
                Value::Null,
                RpcError::invalid_request("Batch request must not be empty"),
            ));
        }
        let mut responses = Vec::with_capacity(batch.len());
        for item in batch {
            if let Some(response) = self.handle_single_message(item).await {
                responses.push(response);
            }
        }
        (!responses.is_empty()).then_some(Value::Array(responses))
    }

    async fn handle_single_message(&self, incoming: Value) -> Option<Value> {
        let Some(obj) = incoming.as_object() else {
            return Some(error_response(
                Value::Null,
                RpcError::invalid_request("Request must be a JSON object"),
            ));
        };

        if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            let id = obj.get("id").cloned().unwrap_or(Value::Null);
            return Some(error_response(
                id,
                RpcError::invalid_request("jsonrpc must be '2.0'"),
            ));
        }

        // Responses to server-initiated requests; none are ever sent.
        let method = obj.get("method").and_then(Value::as_str)?;

        let params = obj.get("params").cloned().unwrap_or(Value::Null);
        match obj.get("id").cloned() {
            Some(id) => Some(match self.handle_request(method, params).await {
                Ok(payload) => success_response(id, payload),
                Err(err) => error_response(id, err),
            }),
            None => {
                tracing::debug!(method, "notification ignored");
                None
            }
        }
    }

    async fn handle_request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(initialize_payload()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(tools_list_payload()),
            "tools/call" => self.handle_tools_call(params).await,
            "resources/list" => Ok(json!({ "resources": [] })),
            "prompts/list" => Ok(json!({ "prompts": [] })),
            _ => Err(RpcError::method_not_found(method)),
        }
    }

    async fn handle_tools_call(&self, params: Value) -> Result<Value, RpcError> {
        let params = params
            .as_object()
            .ok_or_else(|| RpcError::invalid_params("tools/call params must be an object"))?;

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params("tools/call requires string field 'name'"))?
            .to_string();

        let args = match params.get("arguments") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::Null) | None => Map::new(),
            Some(_) => {
                return Err(RpcError::invalid_params(
                    "tools/call 'arguments' must be an object",
                ));
            }
        };

        let call_id = Uuid::now_v7();
        let started = Instant::now();
        let ctx = Arc::clone(&self.ctx);
        let tool = name.clone();
        let output = call_isolated(&name, async move {
            execute_tool(&ctx, &tool, &args).await
        })
        .await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if output.is_error {
            tracing::warn!(%call_id, tool = %name, elapsed_ms, "tool call failed");
        } else {
            tracing::info!(%call_id, tool = %name, elapsed_ms, "tool call completed");
        }

        Ok(json!({
            "content": [{ "type": "text", "text": output.text }],
            "isError": output.is_error
        }))
    }
}

/// Run one tool call on its own task. Errors and panics become `isError`
/// outputs; nothing escapes to the serve loop.
async fn call_isolated<F>(name: &str, call: F) -> ToolOutput
where
    F: Future<Output = ToolResult> + Send + 'static,
{
    match tokio::spawn(call).await {
        Ok(Ok(output)) => output,
        Ok(Err(err)) => tool_error_output(err),
        Err(join_error) => {
            let reason = if join_error.is_panic() {
                panic_message(join_error.into_panic())
            } else {
                "cancelled".to_string()
            };
            tracing::error!(tool = name, reason = %reason, "tool call panicked");
            ToolOutput::error(format!(
                "Error: tool '{name}' failed unexpectedly: {reason}"
            ))
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "panic".to_string()
}

fn tool_error_output(err: ToolError) -> ToolOutput {
    let err = match (&err.docs_hint, err.status.and_then(status_hint)) {
        (None, Some(hint)) => err.with_docs_hint(hint),
        _ => err,
    };
    ToolOutput::error(err.render())
}

fn initialize_payload() -> Value {
    json!({
        "protocolVersion": MCP_PROTOCOL_VERSION,
        "capabilities": {
            "tools": {
                "listChanged": false
            },
            "resources": {
                "listChanged": false
            },
            "prompts": {
                "listChanged": false
            }
        },
        "serverInfo": {
            "name": MCP_SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION")
        },
        "instructions": "Tools for administering a CData Arc server: connectors, files, transactions, logs, profile, workspaces, vault, certificates, reports and request logs. List tools accept OData filter/orderby/top/skip; 'Nothing found' answers are not errors."
    })
}

fn tools_list_payload() -> Value {
    let tools: Vec<Value> = tool_definitions()
        .into_iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "inputSchema": tool.input_schema,
            })
        })
        .collect();
    json!({ "tools": tools })
}

fn success_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

fn error_response(id: Value, error: RpcError) -> Value {
    let mut payload = json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": error.code,
            "message": error.message
        }
    });
    if let Some(data) = error.data {
        payload["error"]["data"] = data;
    }
    payload
}

fn invalid_data(message: impl Into<String>) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, message.into())
}

/// Next message, or `None` at end of input. A first line starting with
/// `Content-Length:` opens a header block; any other non-blank line is a
/// complete newline-delimited message.
async fn read_message<R>(reader: &mut R) -> Result<Option<Incoming>, std::io::Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        if !line.trim().is_empty() {
            break;
        }
    }

    if !is_content_length(&line) {
        return Ok(Some(Incoming {
            payload: Ok(line.trim().as_bytes().to_vec()),
            framing: Framing::Newline,
        }));
    }

    let mut declared = parse_content_length(&line);
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            tracing::warn!("input ended inside MCP headers");
            return Ok(None);
        }
        let header = line.trim_end_matches(['\r', '\n']);
        if header.is_empty() {
            break;
        }
        if is_content_length(header) {
            declared = parse_content_length(header);
        }
    }

    let framing = Framing::ContentLength;
    let length = match declared {
        Ok(length) => length,
        Err(err) => {
            return Ok(Some(Incoming {
                payload: Err(err),
                framing,
            }));
        }
    };

    if length > MAX_MESSAGE_BYTES {
        let skipped = io::copy(&mut (&mut *reader).take(length as u64), &mut io::sink()).await?;
        tracing::warn!(length, skipped, "oversized MCP message skipped");
        return Ok(Some(Incoming {
            payload: Err(RpcError::invalid_request(format!(
                "Message of {length} bytes exceeds the {MAX_MESSAGE_BYTES} byte limit"
            ))),
            framing,
        }));
    }

    let mut payload = vec![0_u8; length];
    reader.read_exact(&mut payload).await?;
    Ok(Some(Incoming {
        payload: Ok(payload),
        framing,
    }))
}

fn is_content_length(header: &str) -> bool {
    header.to_ascii_lowercase().starts_with("content-length:")
}

fn parse_content_length(header: &str) -> Result<usize, RpcError> {
    let raw = header
        .split_once(':')
        .map(|(_, right)| right.trim())
        .unwrap_or_default();
    raw.parse::<usize>()
        .map_err(|_| RpcError::invalid_request(format!("Invalid Content-Length header: '{raw}'")))
}

async fn write_message<W>(writer: &mut W, value: &Value, framing: Framing) -> Result<(), std::io::Error>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(value)
        .map_err(|e| invalid_data(format!("Failed to serialize JSON: {e}")))?;
    match framing {
        Framing::ContentLength => {
            let header = format!(
                "Content-Length: {}\r\nContent-Type: application/json\r\n\r\n",
                body.len()
            );
            writer.write_all(header.as_bytes()).await?;
            writer.write_all(&body).await?;
        }
        Framing::Newline => {
            writer.write_all(&body).await?;
            writer.write_all(b"\n").await?;
        }
    }
    writer.flush().await
}

fn to_pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::test_support::{MockArc, Reply};

    async fn exchange(server: &McpServer, input: &str) -> String {
        let mut output = Vec::new();
        server.serve(input.as_bytes(), &mut output).await.unwrap();
        String::from_utf8(output).unwrap()
    }

    fn lines(output: &str) -> Vec<Value> {
        output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    fn with_id(responses: &[Value], id: Value) -> &Value {
        responses
            .iter()
            .find(|response| response["id"] == id)
            .unwrap()
    }

    /// First `Content-Length` framed response and whatever follows it.
    fn split_framed(output: &str) -> (Value, &str) {
        let (header, rest) = output.split_once("\r\n\r\n").unwrap();
        let length: usize = header
            .lines()
            .next()
            .and_then(|line| line.strip_prefix("Content-Length: "))
            .unwrap()
            .parse()
            .unwrap();
        (serde_json::from_str(&rest[..length]).unwrap(), &rest[length..])
    }

    #[tokio::test]
    async fn newline_framing_answers_in_kind() {
        let mock = MockArc::start().await;
        let server = McpServer::new(mock.context());
        let output = exchange(
            &server,
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"initialize\",\"params\":{}}\n\
             {\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n\
             {\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"ping\"}\n",
        )
        .await;

        let responses = lines(&output);
        assert_eq!(responses.len(), 2);
        let initialized = with_id(&responses, json!(1));
        assert_eq!(initialized["result"]["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert_eq!(initialized["result"]["serverInfo"]["name"], "arc-mcp");
        assert_eq!(
            with_id(&responses, json!(2)),
            &json!({"jsonrpc": "2.0", "id": 2, "result": {}})
        );
    }

    #[tokio::test]
    async fn content_length_framing_answers_in_kind() {
        let mock = MockArc::start().await;
        let server = McpServer::new(mock.context());
        let body = r#"{"jsonrpc":"2.0","id":7,"method":"tools/list"}"#;
        let input = format!("Content-Length: {}\r\n\r\n{body}", body.len());
        let output = exchange(&server, &input).await;

        let (response, rest) = split_framed(&output);
        assert!(rest.is_empty());
        assert_eq!(response["id"], 7);
        assert_eq!(
            response["result"]["tools"].as_array().unwrap().len(),
            tool_definitions().len()
        );
        assert!(response["result"]["tools"][0]["inputSchema"].is_object());
    }

    #[tokio::test]
    async fn malformed_json_is_a_parse_error_and_serving_continues() {
        let mock = MockArc::start().await;
        let server = McpServer::new(mock.context());
        let output = exchange(
            &server,
            "{not json\n{\"jsonrpc\":\"2.0\",\"id\":3,\"method\":\"ping\"}\n",
        )
        .await;
        let responses = lines(&output);
        assert_eq!(with_id(&responses, Value::Null)["error"]["code"], -32700);
        assert_eq!(with_id(&responses, json!(3))["result"], json!({}));
    }

    #[tokio::test]
    async fn bad_content_length_is_answered_and_serving_continues() {
        let mock = MockArc::start().await;
        let server = McpServer::new(mock.context());
        let output = exchange(
            &server,
            "Content-Length: abc\r\n\r\n{\"jsonrpc\":\"2.0\",\"id\":5,\"method\":\"ping\"}\n",
        )
        .await;

        let (error, rest) = split_framed(&output);
        assert_eq!(error["error"]["code"], -32600);
        assert_eq!(error["error"]["message"], "Invalid Content-Length header: 'abc'");
        let responses = lines(rest);
        assert_eq!(responses, vec![json!({"jsonrpc": "2.0", "id": 5, "result": {}})]);
    }

    #[tokio::test]
    async fn oversized_message_is_skipped_without_buffering() {
        let mock = MockArc::start().await;
        let server = McpServer::new(mock.context());
        let input = format!(
            "Content-Length: {}\r\n\r\n{{\"jsonrpc\":\"2.0\"",
            MAX_MESSAGE_BYTES + 1
        );
        let output = exchange(&server, &input).await;

        let (error, rest) = split_framed(&output);
        assert_eq!(error["error"]["code"], -32600);
        assert!(
            error["error"]["message"]
                .as_str()
                .unwrap()
                .contains("exceeds the 16777216 byte limit")
        );
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn slow_tool_call_does_not_hold_up_later_requests() {
        let mock = MockArc::start().await;
        mock.reply(
            "GET",
            "/connectors",
            Reply::json(json!({"value": []})).after(Duration::from_millis(300)),
        );
        let server = McpServer::new(mock.context());
        let output = exchange(
            &server,
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"tools/call\",\"params\":{\"name\":\"list_connectors\"}}\n\
             {\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"ping\"}\n",
        )
        .await;

        let responses = lines(&output);
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], 2);
        assert_eq!(responses[1]["id"], 1);
        assert_eq!(responses[1]["result"]["isError"], false);
    }

    #[tokio::test]
    async fn batch_gets_one_array_response() {
        let mock = MockArc::start().await;
        let server = McpServer::new(mock.context());
        let response = server
            .handle_incoming_message(json!([
                {"jsonrpc": "2.0", "id": 1, "method": "ping"},
                {"jsonrpc": "2.0", "method": "notifications/cancelled"},
                {"jsonrpc": "2.0", "id": 2, "method": "nope"}
            ]))
            .await
            .unwrap();
        let responses = response.as_array().unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[1]["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn validation_errors_are_tool_results_not_rpc_errors() {
        let mock = MockArc::start().await;
        let server = McpServer::new(mock.context());
        let result = server
            .handle_tools_call(json!({"name": "get_connector", "arguments": {}}))
            .await
            .unwrap();
        assert_eq!(result["isError"], true);
        let text = result["content"][0]["text"].as_str().unwrap();
        assert!(text.starts_with("Invalid arguments: Missing required field 'connectorId'"));
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn upstream_status_gets_fixed_hint() {
        let mock = MockArc::start().await;
        mock.reply(
            "GET",
            "/connectors",
            Reply::json_status(401, json!({"error": {"code": "AUTH", "message": "denied"}})),
        );
        let server = McpServer::new(mock.context());
        let result = server
            .handle_tools_call(json!({"name": "list_connectors"}))
            .await
            .unwrap();
        let text = result["content"][0]["text"].as_str().unwrap();
        assert!(text.starts_with("Arc API error (HTTP 401) [AUTH]: denied"));
        assert!(text.contains("Hint: Authentication failed."));
        assert_eq!(result["isError"], true);
    }

    #[tokio::test]
    async fn panicking_call_becomes_error_output() {
        let output = call_isolated("boom", async {
            if true {
                panic!("exploded");
            }
            Ok::<_, ToolError>(ToolOutput::text("unreachable"))
        })
        .await;
        assert!(output.is_error);
        assert_eq!(output.text, "Error: tool 'boom' failed unexpectedly: exploded");
    }

    #[tokio::test]
    async fn tools_call_rejects_non_object_arguments() {
        let mock = MockArc::start().await;
        let server = McpServer::new(mock.context());
        let err = server
            .handle_tools_call(json!({"name": "list_connectors", "arguments": [1]}))
            .await
            .unwrap_err();
        assert_eq!(err.code, -32602);
    }

    #[tokio::test]
    async fn check_reports_ready_and_unreachable() {
        let mock = MockArc::start().await;
        mock.reply("GET", "/profile", Reply::json(json!({"CompanyName": "Acme"})));
        let client = ArcClient::new(&ClientConfig::new(mock.base_url())).unwrap();
        let report = check_report(&client).await;
        assert_eq!(report["status"], "ready");
        assert_eq!(report["auth_mode"], "none");

        let down = ArcClient::new(
            &ClientConfig::new("http://127.0.0.1:9").with_timeout(Duration::from_secs(2)),
        )
        .unwrap();
        let report = check_report(&down).await;
        assert_eq!(report["status"], "unreachable");
        assert!(report["error"].is_string());
    }

    #[tokio::test]
    async fn wrong_jsonrpc_version_is_invalid_request() {
        let mock = MockArc::start().await;
        let server = McpServer::new(mock.context());
        let response = server
            .handle_single_message(json!({"jsonrpc": "1.0", "id": 4, "method": "ping"}))
            .await
            .unwrap();
        assert_eq!(response["error"]["code"], -32600);
        assert_eq!(response["id"], 4);
    }
}

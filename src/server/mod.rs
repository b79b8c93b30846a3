//! MCP server over stdio.
//!
//! Messages are newline-delimited JSON-RPC 2.0. Each request is handled on
//! its own task so a slow synthesis only delays its own response; a single
//! writer task serializes everything written to stdout.

pub mod protocol;
pub mod tools;

use std::io;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::types::Quality;
use crate::{PlaybackController, Router};
use protocol::*;
use tools::{Tool, ToolContext};

pub const SERVER_NAME: &str = "tts-mcp";

pub struct Server {
    router: Arc<Router>,
    playback: Arc<PlaybackController>,
    default_quality: Quality,
}

impl Server {
    pub fn new(
        router: Arc<Router>,
        playback: Arc<PlaybackController>,
        default_quality: Quality,
    ) -> Self {
        Self {
            router,
            playback,
            default_quality,
        }
    }

    /// Handle one raw line. Returns `None` for notifications.
    pub async fn handle_message(&self, line: &str) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Unparseable message: {e}");
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    JsonRpcError::new(PARSE_ERROR, format!("Parse error: {e}")),
                ));
            }
        };
        let id = value.get("id").cloned();
        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                return Some(JsonRpcResponse::failure(
                    id.unwrap_or(Value::Null),
                    JsonRpcError::new(INVALID_REQUEST, format!("Invalid request: {e}")),
                ))
            }
        };

        let Some(id) = request.id.clone() else {
            log::debug!("Notification {}", request.method);
            return None;
        };
        log::debug!("Request {id} {}", request.method);
        Some(match self.handle_request(request).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::failure(id, error),
        })
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> Result<Value, JsonRpcError> {
        match request.method.as_str() {
            "initialize" => to_value(InitializeResult {
                protocol_version: PROTOCOL_VERSION.to_string(),
                capabilities: ServerCapabilities {
                    tools: Some(ToolsCapability {
                        list_changed: false,
                    }),
                },
                server_info: ServerInfo {
                    name: SERVER_NAME.to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                },
            }),
            "ping" => Ok(json!({})),
            "tools/list" => to_value(ListToolsResult {
                tools: tools::definitions(),
            }),
            "tools/call" => {
                let params: CallToolParams = request
                    .params
                    .ok_or_else(|| JsonRpcError::new(INVALID_PARAMS, "Missing params"))
                    .and_then(|p| {
                        serde_json::from_value(p).map_err(|e| {
                            JsonRpcError::new(INVALID_PARAMS, format!("Invalid params: {e}"))
                        })
                    })?;
                let tool = Tool::from_name(&params.name).ok_or_else(|| {
                    JsonRpcError::new(INVALID_PARAMS, format!("Unknown tool: {}", params.name))
                })?;
                log::info!("Calling tool {}", tool.name());
                let context = ToolContext {
                    router: &self.router,
                    playback: &self.playback,
                    default_quality: self.default_quality,
                };
                to_value(context.call(tool, params.arguments).await)
            }
            other => Err(JsonRpcError::new(
                METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            )),
        }
    }

    /// Serve on the process's stdin and stdout until stdin closes.
    pub async fn serve(self: Arc<Self>) -> io::Result<()> {
        self.serve_io(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve until `reader` reaches end of input, then wait for in-flight
    /// requests, flush and clean up engines and playback.
    pub async fn serve_io<R, W>(self: Arc<Self>, reader: R, writer: W) -> io::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let writer_task = tokio::spawn(async move {
            let mut writer = writer;
            while let Some(line) = rx.recv().await {
                writer.write_all(line.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
            Ok::<_, io::Error>(())
        });

        let mut requests = JoinSet::new();
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        let read_error = loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break None,
                Ok(_) => {}
                Err(e) => {
                    log::error!("Reading input failed: {e}");
                    break Some(e);
                }
            }
            let line = match String::from_utf8(std::mem::take(&mut buf)) {
                Ok(line) => line,
                Err(e) => {
                    log::warn!("Input line is not valid UTF-8: {e}");
                    let response = JsonRpcResponse::failure(
                        Value::Null,
                        JsonRpcError::new(PARSE_ERROR, "Parse error: input is not valid UTF-8"),
                    );
                    if let Ok(text) = serde_json::to_string(&response) {
                        let _ = tx.send(text);
                    }
                    continue;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            let server = Arc::clone(&self);
            let tx = tx.clone();
            requests.spawn(async move {
                let Some(response) = server.handle_message(line.trim_end()).await else {
                    return;
                };
                match serde_json::to_string(&response) {
                    Ok(text) => {
                        if tx.send(text).is_err() {
                            log::warn!("Response dropped, writer has stopped");
                        }
                    }
                    Err(e) => log::error!("Could not serialize response: {e}"),
                }
            });
        };
        log::info!("Input closed, finishing {} pending requests", requests.len());
        while let Some(joined) = requests.join_next().await {
            if let Err(e) = joined {
                log::error!("Request task failed: {e}");
            }
        }
        drop(tx);

        let written = writer_task.await.map_err(io::Error::other);
        self.shutdown().await;
        match read_error {
            Some(e) => Err(e),
            None => written?,
        }
    }

    pub async fn shutdown(&self) {
        self.playback.shutdown().await;
        self.router.cleanup().await;
        log::info!("Server stopped");
    }
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::new(INTERNAL_ERROR, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::tests::FakeEngine;
    use crate::SynthesisEngine;
    use tokio::io::AsyncReadExt;

    fn server(kokoro: bool, system: bool) -> Server {
        let engines: Vec<Arc<dyn SynthesisEngine>> = vec![
            Arc::new(FakeEngine::new("kokoro", kokoro)),
            Arc::new(FakeEngine::new("system", system)),
        ];
        Server::new(
            Arc::new(Router::new(engines, "auto")),
            Arc::new(PlaybackController::new()),
            Quality::Balanced,
        )
    }

    async fn call(server: &Server, line: Value) -> Value {
        let response = server.handle_message(&line.to_string()).await.unwrap();
        serde_json::to_value(response).unwrap()
    }

    async fn call_tool(server: &Server, name: &str, arguments: Value) -> (bool, Value) {
        let response = call(
            server,
            json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call",
                   "params": {"name": name, "arguments": arguments}}),
        )
        .await;
        let result = &response["result"];
        let text = result["content"][0]["text"].as_str().unwrap();
        (
            result["isError"].as_bool().unwrap(),
            serde_json::from_str(text).unwrap(),
        )
    }

    #[tokio::test]
    async fn initialize_announces_tools_capability() {
        let server = server(true, true);
        let response = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 0, "method": "initialize", "params": {}}),
        )
        .await;
        assert_eq!(response["result"]["protocolVersion"], json!("2024-11-05"));
        assert_eq!(response["result"]["serverInfo"]["name"], json!("tts-mcp"));
        assert!(response["result"]["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn notifications_get_no_reply() {
        let server = server(true, true);
        let line = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
        assert!(server.handle_message(&line.to_string()).await.is_none());
    }

    #[tokio::test]
    async fn protocol_errors_use_json_rpc_codes() {
        let server = server(true, true);
        let garbage = server.handle_message("{not json").await.unwrap();
        assert_eq!(garbage.error.unwrap().code, PARSE_ERROR);

        let unknown = call(&server, json!({"jsonrpc": "2.0", "id": 2, "method": "resources/list"})).await;
        assert_eq!(unknown["error"]["code"], json!(METHOD_NOT_FOUND));
        assert_eq!(unknown["id"], json!(2));

        let bad_tool = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": {"name": "speak"}}),
        )
        .await;
        assert_eq!(bad_tool["error"]["code"], json!(INVALID_PARAMS));

        let no_params = call(&server, json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call"})).await;
        assert_eq!(no_params["error"]["code"], json!(INVALID_PARAMS));
    }

    #[tokio::test]
    async fn lists_all_tools() {
        let server = server(true, true);
        let response = call(&server, json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"})).await;
        let names: Vec<&str> = response["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            ["synthesize_text", "list_voices", "health_check", "play_audio"]
        );
    }

    #[tokio::test]
    async fn synthesize_without_engine_picks_preferred() {
        let server = server(true, true);
        let (is_error, payload) =
            call_tool(&server, "synthesize_text", json!({"text": "Hello, world!"})).await;
        assert!(!is_error);
        assert_eq!(payload["success"], json!(true));
        assert_eq!(payload["engine"], json!("kokoro"));
        assert_eq!(payload["sizeBytes"], json!(42));
        assert_eq!(payload["quality"], json!("balanced"));
    }

    #[tokio::test]
    async fn tool_failures_are_payloads_not_protocol_errors() {
        let server = server(true, true);
        let (is_error, payload) = call_tool(&server, "synthesize_text", json!({"text": "  "})).await;
        assert!(is_error);
        assert_eq!(payload["success"], json!(false));
        assert_eq!(payload["error"]["code"], json!("INVALID_PARAMETERS"));

        let (is_error, payload) = call_tool(
            &server,
            "synthesize_text",
            json!({"text": "hi", "engine": "polly"}),
        )
        .await;
        assert!(is_error);
        assert_eq!(payload["error"]["code"], json!("ENGINE_NOT_AVAILABLE"));
        assert_eq!(payload["error"]["engine"], json!("polly"));

        let (is_error, payload) =
            call_tool(&server, "synthesize_text", json!({"text": "hi", "outputFormat": "ogg"})).await;
        assert!(is_error);
        assert_eq!(payload["error"]["code"], json!("INVALID_PARAMETERS"));
    }

    #[tokio::test]
    async fn list_voices_applies_filters() {
        let server = server(true, false);
        let (is_error, payload) =
            call_tool(&server, "list_voices", json!({"language": "en", "gender": "male"})).await;
        assert!(!is_error);
        assert_eq!(payload["count"], json!(1));
        assert_eq!(payload["voices"][0]["id"], json!("kokoro-gb"));

        let (is_error, payload) = call_tool(&server, "list_voices", json!({"gender": "robot"})).await;
        assert!(is_error);
        assert_eq!(payload["error"]["code"], json!("INVALID_PARAMETERS"));
    }

    #[tokio::test]
    async fn health_check_reports_degraded() {
        let server = server(false, true);
        server.router.initialize_all().await;
        let (is_error, payload) = call_tool(&server, "health_check", Value::Null).await;
        assert!(!is_error);
        assert_eq!(payload["status"], json!("degraded"));
        assert_eq!(payload["engines"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn play_audio_edge_cases() {
        let server = server(true, true);
        let (is_error, payload) = call_tool(&server, "play_audio", json!({})).await;
        assert!(is_error);
        assert_eq!(payload["error"]["code"], json!("FILE_NOT_FOUND"));

        let (is_error, payload) = call_tool(&server, "play_audio", json!({"action": "pause"})).await;
        assert!(!is_error);
        assert_eq!(payload["status"], json!("stopped"));

        let (is_error, payload) = call_tool(&server, "play_audio", json!({"action": "resume"})).await;
        assert!(!is_error);
        assert_eq!(payload["status"], json!("stopped"));
    }

    #[tokio::test]
    async fn serves_line_delimited_messages() {
        let server = Arc::new(server(true, true));
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#,
            "\n",
        );
        let (mut client, server_side) = tokio::io::duplex(64 * 1024);
        server.serve_io(input.as_bytes(), server_side).await.unwrap();

        let mut output = String::new();
        client.read_to_string(&mut output).await.unwrap();
        let mut ids: Vec<i64> = output
            .lines()
            .map(|line| serde_json::from_str::<Value>(line).unwrap()["id"].as_i64().unwrap())
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, [1, 2]);
    }

    #[tokio::test]
    async fn invalid_utf8_line_gets_parse_error_and_serving_continues() {
        let server = Arc::new(server(true, true));
        let mut input = Vec::new();
        input.extend_from_slice(br#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#);
        input.extend_from_slice(b"\n\xff\xfe garbage\n");
        input.extend_from_slice(br#"{"jsonrpc":"2.0","id":3,"method":"ping"}"#);
        input.push(b'\n');

        let (mut client, server_side) = tokio::io::duplex(64 * 1024);
        server.serve_io(input.as_slice(), server_side).await.unwrap();

        let mut output = String::new();
        client.read_to_string(&mut output).await.unwrap();
        let responses: Vec<Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(responses.len(), 3);

        let parse_errors: Vec<&Value> = responses
            .iter()
            .filter(|r| r["error"]["code"] == json!(PARSE_ERROR))
            .collect();
        assert_eq!(parse_errors.len(), 1);
        assert!(parse_errors[0]["id"].is_null());

        let mut ids: Vec<i64> = responses.iter().filter_map(|r| r["id"].as_i64()).collect();
        ids.sort_unstable();
        assert_eq!(ids, [1, 3]);
    }
}

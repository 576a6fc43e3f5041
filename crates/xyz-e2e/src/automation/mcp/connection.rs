//! JSON-RPC 2.0 connection to an MCP server

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio::sync::Mutex as TokioMutex;
use tokio::sync::{mpsc, oneshot};

use super::transport::send_line;

const JSONRPC_VERSION: &str = "2.0";

/// Outgoing request
#[derive(Debug, Clone, Serialize)]
pub struct Request<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

/// Response to one of our requests
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    pub id: u64,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Request initiated by the server (e.g. `ping`)
#[derive(Debug, Clone, Deserialize)]
pub struct ServerRequest {
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Notification {
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// Variant order matters: a server request carries both `id` and `method`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Message {
    ServerRequest(ServerRequest),
    Response(Response),
    Notification(Notification),
}

type Callbacks = HashMap<u64, oneshot::Sender<Result<Value>>>;
type Writer = Box<dyn AsyncWrite + Unpin + Send>;

/// Request/response correlation over a line transport
pub struct Connection {
    last_id: AtomicU64,
    callbacks: Arc<TokioMutex<Callbacks>>,
    writer: Arc<TokioMutex<Writer>>,
}

impl Connection {
    pub fn new(writer: impl AsyncWrite + Unpin + Send + 'static) -> Self {
        Self {
            last_id: AtomicU64::new(0),
            callbacks: Arc::new(TokioMutex::new(HashMap::new())),
            writer: Arc::new(TokioMutex::new(Box::new(writer))),
        }
    }

    /// Sends a request and waits for the matching response.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let (_, rx) = self.send_request(method, params).await?;
        rx.await
            .map_err(|_| Error::ChannelClosed)
            .and_then(|result| result)
    }

    /// Sends a request and waits at most `timeout` for its response. On
    /// timeout the pending entry is dropped, so a late reply is discarded.
    pub async fn request_within(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value> {
        let (id, rx) = self.send_request(method, params).await?;
        match tokio::time::timeout(timeout, rx).await {
            Ok(reply) => reply.map_err(|_| Error::ChannelClosed).and_then(|result| result),
            Err(_) => {
                self.callbacks.lock().await.remove(&id);
                Err(Error::Transport(format!(
                    "'{}' got no reply within {:?}",
                    method, timeout
                )))
            }
        }
    }

    async fn send_request(
        &self,
        method: &str,
        params: Value,
    ) -> Result<(u64, oneshot::Receiver<Result<Value>>)> {
        let id = self.last_id.fetch_add(1, Ordering::SeqCst);

        let (tx, rx) = oneshot::channel();
        self.callbacks.lock().await.insert(id, tx);

        let request = Request {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        };
        let request_value = serde_json::to_value(&request)?;
        tracing::debug!("MCP request id={} method='{}'", id, method);

        if let Err(e) = send_line(&mut *self.writer.lock().await, &request_value).await {
            self.callbacks.lock().await.remove(&id);
            return Err(e);
        }
        Ok((id, rx))
    }

    /// Sends a notification (no response expected).
    pub async fn notify(&self, method: &str, params: Value) -> Result<()> {
        let mut message = json!({ "jsonrpc": JSONRPC_VERSION, "method": method });
        if !params.is_null() {
            message["params"] = params;
        }
        send_line(&mut *self.writer.lock().await, &message).await
    }

    /// Dispatch loop. Returns when the transport closes; pending requests then
    /// fail with [`Error::ChannelClosed`].
    pub async fn run(self: &Arc<Self>, mut message_rx: mpsc::UnboundedReceiver<Value>) {
        while let Some(message_value) = message_rx.recv().await {
            match serde_json::from_value::<Message>(message_value) {
                Ok(message) => {
                    if let Err(e) = self.dispatch(message).await {
                        tracing::error!("Error dispatching MCP message: {}", e);
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to parse MCP message: {}", e);
                }
            }
        }

        tracing::debug!("MCP message loop ended (transport closed)");
        self.callbacks.lock().await.clear();
    }

    async fn dispatch(&self, message: Message) -> Result<()> {
        match message {
            Message::Response(response) => {
                let callback = self
                    .callbacks
                    .lock()
                    .await
                    .remove(&response.id)
                    .ok_or_else(|| {
                        Error::Protocol(format!("Cannot find request to respond: id={}", response.id))
                    })?;

                let result = match response.error {
                    Some(error) => Err(Error::Protocol(format!(
                        "{} (code {}){}",
                        error.message,
                        error.code,
                        error.data.map(|d| format!(": {}", d)).unwrap_or_default()
                    ))),
                    None => Ok(response.result.unwrap_or(Value::Null)),
                };

                let _ = callback.send(result);
                Ok(())
            }
            Message::ServerRequest(request) => {
                let reply = if request.method == "ping" {
                    json!({ "jsonrpc": JSONRPC_VERSION, "id": request.id, "result": {} })
                } else {
                    tracing::warn!("Unsupported server request: {}", request.method);
                    json!({
                        "jsonrpc": JSONRPC_VERSION,
                        "id": request.id,
                        "error": { "code": -32601, "message": "Method not found" }
                    })
                };
                send_line(&mut *self.writer.lock().await, &reply).await
            }
            Message::Notification(notification) => {
                tracing::debug!(
                    "MCP notification '{}': {}",
                    notification.method,
                    notification.params
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::mcp::transport::LineReceiver;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, duplex};

    /// Wires a connection to an in-memory "server" and returns its ends.
    fn wired() -> (
        Arc<Connection>,
        BufReader<tokio::io::DuplexStream>,
        tokio::io::DuplexStream,
    ) {
        let (client_out, server_in) = duplex(8192);
        let (server_out, client_in) = duplex(8192);

        let connection = Arc::new(Connection::new(client_out));
        let (mut receiver, message_rx) = LineReceiver::new(client_in);
        tokio::spawn(async move {
            let _ = receiver.run_loop().await;
        });
        let runner = Arc::clone(&connection);
        tokio::spawn(async move { runner.run(message_rx).await });

        (connection, BufReader::new(server_in), server_out)
    }

    #[tokio::test]
    async fn test_request_is_correlated_by_id() {
        let (connection, mut server_in, mut server_out) = wired();

        let pending = tokio::spawn({
            let connection = Arc::clone(&connection);
            async move { connection.request("tools/list", json!({})).await }
        });

        let mut line = String::new();
        server_in.read_line(&mut line).await.unwrap();
        let sent: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(sent["jsonrpc"], "2.0");
        assert_eq!(sent["method"], "tools/list");
        let id = sent["id"].as_u64().unwrap();

        let reply = json!({ "jsonrpc": "2.0", "id": id, "result": { "tools": [] } });
        server_out
            .write_all(format!("{}\n", reply).as_bytes())
            .await
            .unwrap();

        let result = pending.await.unwrap().unwrap();
        assert_eq!(result["tools"], json!([]));
    }

    #[tokio::test]
    async fn test_error_response_becomes_protocol_error() {
        let (connection, mut server_in, mut server_out) = wired();

        let pending = tokio::spawn({
            let connection = Arc::clone(&connection);
            async move { connection.request("tools/call", json!({"name": "nope"})).await }
        });

        let mut line = String::new();
        server_in.read_line(&mut line).await.unwrap();
        let id = serde_json::from_str::<Value>(&line).unwrap()["id"].clone();

        let reply = json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": -32602, "message": "Unknown tool" }
        });
        server_out
            .write_all(format!("{}\n", reply).as_bytes())
            .await
            .unwrap();

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Protocol(msg) if msg.contains("Unknown tool")));
    }

    #[tokio::test]
    async fn test_server_ping_is_answered() {
        let (_connection, mut server_in, mut server_out) = wired();

        server_out
            .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":\"srv-1\",\"method\":\"ping\"}\n")
            .await
            .unwrap();

        let mut line = String::new();
        server_in.read_line(&mut line).await.unwrap();
        let reply: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(reply["id"], "srv-1");
        assert_eq!(reply["result"], json!({}));
    }

    #[tokio::test]
    async fn test_pending_request_fails_when_transport_closes() {
        let (connection, mut server_in, server_out) = wired();

        let pending = tokio::spawn({
            let connection = Arc::clone(&connection);
            async move { connection.request("tools/list", Value::Null).await }
        });

        let mut line = String::new();
        server_in.read_line(&mut line).await.unwrap();
        drop(server_out);

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::ChannelClosed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_request_forgets_its_callback() {
        let (connection, mut server_in, mut server_out) = wired();

        let err = connection
            .request_within("tools/call", json!({}), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(ref msg) if msg.contains("no reply")));
        assert!(connection.callbacks.lock().await.is_empty());

        // A late reply finds no pending entry and is dropped.
        let mut line = String::new();
        server_in.read_line(&mut line).await.unwrap();
        let id = serde_json::from_str::<Value>(&line).unwrap()["id"].clone();
        let reply = json!({ "jsonrpc": "2.0", "id": id, "result": {} });
        server_out
            .write_all(format!("{}\n", reply).as_bytes())
            .await
            .unwrap();

        let result = connection
            .request_within("tools/list", json!({}), Duration::from_secs(5))
            .await;
        assert!(result.is_err());
        assert!(connection.callbacks.lock().await.is_empty());
    }
}

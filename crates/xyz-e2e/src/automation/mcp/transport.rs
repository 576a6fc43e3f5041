// MCP stdio transport
//
// Newline-delimited JSON: one JSON-RPC message per line in each direction.
// Messages never contain raw newlines (serde_json escapes them).

use crate::error::{Error, Result};
use serde_json::Value as JsonValue;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

/// Send a JSON message as a single line
pub async fn send_line<W>(writer: &mut W, message: &JsonValue) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut bytes = serde_json::to_vec(message)
        .map_err(|e| Error::Transport(format!("Failed to serialize JSON: {}", e)))?;
    bytes.push(b'\n');

    writer
        .write_all(&bytes)
        .await
        .map_err(|e| Error::Transport(format!("Failed to write message: {}", e)))?;

    writer
        .flush()
        .await
        .map_err(|e| Error::Transport(format!("Failed to flush: {}", e)))?;

    Ok(())
}

/// Receive half: reads lines from the server's stdout and forwards parsed messages.
pub struct LineReceiver<R>
where
    R: AsyncRead + Unpin + Send,
{
    reader: BufReader<R>,
    message_tx: mpsc::UnboundedSender<JsonValue>,
}

impl<R> LineReceiver<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(stdout: R) -> (Self, mpsc::UnboundedReceiver<JsonValue>) {
        let (message_tx, message_rx) = mpsc::unbounded_channel();
        let receiver = Self {
            reader: BufReader::new(stdout),
            message_tx,
        };
        (receiver, message_rx)
    }

    /// Run the read loop until EOF or until nobody is listening.
    ///
    /// Lines that are not JSON (server banners, stray logging) are skipped.
    pub async fn run_loop(&mut self) -> Result<()> {
        let mut line = String::new();

        loop {
            line.clear();
            let n = self
                .reader
                .read_line(&mut line)
                .await
                .map_err(|e| Error::Transport(format!("Failed to read line: {}", e)))?;

            if n == 0 {
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let message: JsonValue = match serde_json::from_str(trimmed) {
                Ok(message) => message,
                Err(e) => {
                    tracing::debug!("Skipping non-JSON line from MCP server: {} ({})", trimmed, e);
                    continue;
                }
            };

            if self.message_tx.send(message).is_err() {
                break;
            }
        }

        Ok(())
    }
}

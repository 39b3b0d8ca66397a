//! Line-delimited JSON-RPC transport over a pair of pipes

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

use super::launcher::{BoxedReader, BoxedWriter};
use crate::connection::{ConnectionError, ConnectionResult};
use crate::types::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

struct LineIo {
    writer: BoxedWriter,
    reader: BufReader<BoxedReader>,
    /// Bytes of a line not yet terminated; survives a cancelled read
    pending: Vec<u8>,
}

/// One request in flight at a time: the lock covers the write and the read
pub struct LineTransport {
    io: Mutex<LineIo>,
    next_id: AtomicU64,
}

impl LineTransport {
    pub fn new(writer: BoxedWriter, reader: BoxedReader) -> Self {
        Self {
            io: Mutex::new(LineIo {
                writer,
                reader: BufReader::new(reader),
                pending: Vec::new(),
            }),
            next_id: AtomicU64::new(1),
        }
    }

    /// Send a request and wait for the response carrying the same id
    ///
    /// Lines that are not JSON-RPC responses, and responses to other ids, are
    /// skipped.
    pub async fn request(&self, method: &str, params: Option<Value>) -> ConnectionResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, params);

        let mut io = self.io.lock().await;
        write_line(&mut io.writer, &request).await?;

        loop {
            let line = read_line(&mut io).await?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<JsonRpcResponse>(trimmed) {
                Ok(response) if response.id == Some(id) => {
                    return response.into_result().map_err(|e| ConnectionError::Remote {
                        code: e.code,
                        message: e.message,
                    });
                }
                // Stale response or server output on stdout
                _ => continue,
            }
        }
    }

    /// Send a notification; no response is read
    pub async fn notify(&self, method: &str, params: Option<Value>) -> ConnectionResult<()> {
        let notification = JsonRpcNotification::new(method, params);
        let mut io = self.io.lock().await;
        write_line(&mut io.writer, &notification).await
    }
}

async fn write_line<T: Serialize>(writer: &mut BoxedWriter, message: &T) -> ConnectionResult<()> {
    let mut json = serde_json::to_vec(message)
        .map_err(|e| ConnectionError::Transport(format!("failed to serialize message: {}", e)))?;
    json.push(b'\n');
    writer
        .write_all(&json)
        .await
        .map_err(|e| ConnectionError::Transport(format!("failed to write to stdin: {}", e)))?;
    writer
        .flush()
        .await
        .map_err(|e| ConnectionError::Transport(format!("failed to flush stdin: {}", e)))
}

async fn read_line(io: &mut LineIo) -> ConnectionResult<String> {
    let LineIo {
        reader, pending, ..
    } = io;
    let read = reader
        .read_until(b'\n', pending)
        .await
        .map_err(|e| ConnectionError::Transport(format!("failed to read from stdout: {}", e)))?;
    if read == 0 {
        return Err(ConnectionError::Closed);
    }
    let line = String::from_utf8_lossy(pending).into_owned();
    pending.clear();
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_request_skips_noise_and_stale_ids() {
        let (client_in, server_in) = duplex(4096);
        let (mut server_out, client_out) = duplex(4096);
        let transport = LineTransport::new(Box::new(client_in), Box::new(client_out));

        let server = tokio::spawn(async move {
            let mut line = String::new();
            BufReader::new(server_in).read_line(&mut line).await.unwrap();
            let request: Value = serde_json::from_str(&line).unwrap();
            assert_eq!(request["method"], "tools/list");
            assert_eq!(request["id"], 1);

            server_out
                .write_all(b"npm WARN deprecated something\n\n")
                .await
                .unwrap();
            server_out
                .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":42,\"result\":\"stale\"}\n")
                .await
                .unwrap();
            server_out
                .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"tools\":[]}}\n")
                .await
                .unwrap();
        });

        let result = transport.request("tools/list", None).await.unwrap();
        assert_eq!(result, json!({ "tools": [] }));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_remote_error_and_closed_stream() {
        let (client_in, _server_in) = duplex(4096);
        let (mut server_out, client_out) = duplex(4096);
        let transport = LineTransport::new(Box::new(client_in), Box::new(client_out));

        server_out
            .write_all(
                b"{\"jsonrpc\":\"2.0\",\"id\":1,\"error\":{\"code\":-32601,\"message\":\"Method not found\"}}\n",
            )
            .await
            .unwrap();

        let err = transport.request("bogus", None).await.unwrap_err();
        assert!(matches!(err, ConnectionError::Remote { code: -32601, .. }));

        drop(server_out);
        let err = transport.request("tools/list", None).await.unwrap_err();
        assert!(matches!(err, ConnectionError::Closed));
    }
}

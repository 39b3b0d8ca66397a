//! Fake HTTP tool server for integration tests

#![allow(dead_code)]

use std::io::Read;
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tiny_http::{Header, Response, Server};

/// One request as the fake server saw it
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub body: String,
    pub session: Option<String>,
}

impl Recorded {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }

    /// JSON-RPC method, for POSTs to the base URL
    pub fn rpc_method(&self) -> Option<String> {
        self.json()["method"].as_str().map(str::to_string)
    }
}

type Handler = dyn Fn(&Recorded) -> (u16, Value) + Send + Sync;

pub struct FakeHttp {
    pub url: String,
    server: Arc<Server>,
    requests: Arc<Mutex<Vec<Recorded>>>,
    worker: Option<JoinHandle<()>>,
}

impl FakeHttp {
    pub fn start<F>(handler: F) -> Self
    where
        F: Fn(&Recorded) -> (u16, Value) + Send + Sync + 'static,
    {
        Self::start_with_session(None, handler)
    }

    /// Every response carries `mcp-session-id: {session}`
    pub fn start_with_session<F>(session: Option<&str>, handler: F) -> Self
    where
        F: Fn(&Recorded) -> (u16, Value) + Send + Sync + 'static,
    {
        let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
        let addr = server.server_addr().to_ip().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<Handler> = Arc::new(handler);
        let session = session.map(str::to_string);

        let worker = {
            let server = Arc::clone(&server);
            let requests = Arc::clone(&requests);
            std::thread::spawn(move || {
                for mut request in server.incoming_requests() {
                    let mut body = String::new();
                    let _ = request.as_reader().read_to_string(&mut body);
                    let recorded = Recorded {
                        method: request.method().as_str().to_string(),
                        path: request.url().to_string(),
                        body,
                        session: request
                            .headers()
                            .iter()
                            .find(|h| h.field.equiv("mcp-session-id"))
                            .map(|h| h.value.as_str().to_string()),
                    };
                    requests.lock().push(recorded.clone());

                    let (status, payload) = handler(&recorded);
                    let mut response = Response::from_string(payload.to_string())
                        .with_status_code(status)
                        .with_header(
                            Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                                .unwrap(),
                        );
                    if let Some(session) = &session {
                        response = response.with_header(
                            Header::from_bytes(&b"mcp-session-id"[..], session.as_bytes()).unwrap(),
                        );
                    }
                    let _ = request.respond(response);
                }
            })
        };

        Self {
            url: format!("http://{}", addr),
            server,
            requests,
            worker: Some(worker),
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().clone()
    }

    pub fn rpc_calls(&self, method: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == "POST" && r.path == "/" && r.rpc_method().as_deref() == Some(method))
            .count()
    }
}

impl Drop for FakeHttp {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

pub fn not_found() -> (u16, Value) {
    (404, json!({ "error": "not found" }))
}

/// JSON-RPC success envelope mirroring the request id
pub fn rpc_result(request: &Recorded, result: Value) -> (u16, Value) {
    (
        200,
        json!({ "jsonrpc": "2.0", "id": request.json()["id"], "result": result }),
    )
}

/// A server that only speaks JSON-RPC on its base URL and knows `multiply`
pub fn jsonrpc_multiply_server() -> FakeHttp {
    FakeHttp::start(|request| {
        if request.method != "POST" || request.path != "/" {
            return not_found();
        }
        match request.rpc_method().as_deref() {
            Some("tools/list") => rpc_result(
                request,
                json!({ "tools": [{
                    "name": "multiply",
                    "description": "Multiply two numbers",
                    "inputSchema": {
                        "type": "object",
                        "properties": { "a": { "type": "number" }, "b": { "type": "number" } },
                        "required": ["a", "b"]
                    }
                }] }),
            ),
            Some("tools/call") => {
                let args = &request.json()["params"]["arguments"];
                let product = args["a"].as_f64().unwrap_or(0.0) * args["b"].as_f64().unwrap_or(0.0);
                rpc_result(
                    request,
                    json!({ "content": [{ "type": "text", "text": (product as i64).to_string() }] }),
                )
            }
            _ => (
                200,
                json!({ "jsonrpc": "2.0", "id": request.json()["id"], "error": { "code": -32601, "message": "Method not found" } }),
            ),
        }
    })
}

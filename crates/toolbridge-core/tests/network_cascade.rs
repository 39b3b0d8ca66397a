mod common;

use std::sync::Arc;

use common::{jsonrpc_multiply_server, not_found, FakeHttp};
use serde_json::json;
use toolbridge_core::{
    ConnectionDescriptor, ConnectionError, ConnectionState, NetworkClient, NetworkParams,
    NetworkStyle, NoOpLogger, ToolConnection,
};

async fn connect(url: &str) -> NetworkClient {
    let descriptor = ConnectionDescriptor::network(
        "fake",
        NetworkParams::new(NetworkStyle::PlainHttp, url),
    )
    .unwrap();
    let client = NetworkClient::new(descriptor, Arc::new(NoOpLogger)).unwrap();
    client.initialize().await.unwrap();
    client
}

#[tokio::test]
async fn listing_cascades_to_mcp_tools_without_jsonrpc() {
    let server = FakeHttp::start(|request| match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/mcp/tools") => (200, json!({ "tools": [{ "name": "search", "description": "Search" }] })),
        _ => not_found(),
    });
    let client = connect(&server.url).await;
    assert_eq!(client.state(), ConnectionState::Ready);

    let tools = client.list_tools().await;
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "search");

    let gets: Vec<_> = server
        .requests()
        .into_iter()
        .filter(|r| r.method == "GET" && r.path.ends_with("tools"))
        .map(|r| r.path)
        .collect();
    assert_eq!(gets, vec!["/tools", "/api/tools", "/mcp/tools"]);
    assert!(server.requests().iter().all(|r| r.method != "POST"));
}

#[tokio::test]
async fn bare_list_on_first_path_wins() {
    let server = FakeHttp::start(|request| match request.path.as_str() {
        "/tools" => (200, json!([{ "name": "a" }, { "name": "b" }])),
        _ => not_found(),
    });
    let client = connect(&server.url).await;

    let names: Vec<_> = client.list_tools().await.into_iter().map(|t| t.name).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert!(!server.requests().iter().any(|r| r.path == "/api/tools"));
}

#[tokio::test]
async fn all_paths_failing_falls_back_to_jsonrpc() {
    let server = jsonrpc_multiply_server();
    let client = connect(&server.url).await;

    let tools = client.list_tools().await;
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "multiply");
    assert!(tools[0].input_schema.is_some());
    assert_eq!(server.rpc_calls("tools/list"), 1);

    let args = json!({ "a": 3, "b": 4 }).as_object().cloned().unwrap();
    let result = client.call_tool("multiply", args).await.unwrap();
    assert_eq!(result["content"][0]["text"], "12");

    let posts: Vec<_> = server
        .requests()
        .into_iter()
        .filter(|r| r.method == "POST")
        .map(|r| r.path)
        .collect();
    assert_eq!(posts, vec!["/", "/tools/multiply", "/api/tools/multiply", "/mcp/tools/multiply", "/"]);

    let body = server.requests().last().unwrap().json();
    assert_eq!(body["jsonrpc"], "2.0");
    assert_eq!(body["params"]["name"], "multiply");
}

#[tokio::test]
async fn direct_call_posts_tool_and_arguments() {
    let server = FakeHttp::start(|request| match (request.method.as_str(), request.path.as_str()) {
        ("POST", "/api/tools/echo") => (200, json!({ "echoed": request.json()["arguments"]["text"] })),
        _ => not_found(),
    });
    let client = connect(&server.url).await;

    let args = json!({ "text": "hi" }).as_object().cloned().unwrap();
    let result = client.call_tool("echo", args).await.unwrap();
    assert_eq!(result, json!({ "echoed": "hi" }));

    let posted = server
        .requests()
        .into_iter()
        .find(|r| r.path == "/api/tools/echo")
        .unwrap()
        .json();
    assert_eq!(posted["tool"], "echo");
    assert!(posted["timestamp"].is_string());
}

#[tokio::test]
async fn session_header_is_captured_and_reused() {
    let server = FakeHttp::start_with_session(Some("sess-42"), |request| match request.path.as_str() {
        "/tools" => (200, json!({ "tools": [] })),
        _ => not_found(),
    });
    let client = connect(&server.url).await;
    assert_eq!(client.session_id().as_deref(), Some("sess-42"));

    client.list_tools().await;
    let requests = server.requests();
    assert_eq!(requests[0].session, None);
    assert_eq!(requests.last().unwrap().session.as_deref(), Some("sess-42"));
}

#[tokio::test]
async fn jsonrpc_errors_surface_as_connection_errors() {
    let server = FakeHttp::start(|request| match (request.method.as_str(), request.path.as_str()) {
        ("POST", "/") => (
            200,
            json!({ "jsonrpc": "2.0", "id": request.json()["id"], "error": { "code": -32602, "message": "bad params" } }),
        ),
        _ => not_found(),
    });
    let client = connect(&server.url).await;

    let err = client.call_tool("x", Default::default()).await.unwrap_err();
    assert!(matches!(err, ConnectionError::Remote { code: -32602, .. }));
    assert!(client.list_tools().await.is_empty());
}

#[tokio::test]
async fn jsonrpc_http_failure_keeps_status_and_body() {
    let server = FakeHttp::start(|request| match (request.method.as_str(), request.path.as_str()) {
        ("POST", "/") => (503, json!({ "detail": "overloaded" })),
        _ => not_found(),
    });
    let client = connect(&server.url).await;

    match client.call_tool("x", Default::default()).await {
        Err(ConnectionError::Http { status, body }) => {
            assert_eq!(status, 503);
            assert!(body.contains("overloaded"));
        }
        other => panic!("unexpected: {:?}", other),
    }
}

#[tokio::test]
async fn cleanup_is_idempotent_and_stops_calls() {
    let server = jsonrpc_multiply_server();
    let client = connect(&server.url).await;

    client.cleanup().await.unwrap();
    client.cleanup().await.unwrap();
    assert_eq!(client.state(), ConnectionState::Closed);
    assert!(client.call_tool("multiply", Default::default()).await.is_err());
}

mod common;

use std::sync::Arc;

use common::jsonrpc_multiply_server;
use serde_json::{json, Value};
use toolbridge_core::stdio::{MockServer, MockStats, MockTool};
use toolbridge_core::{
    LocalTool, NetworkStudio, NoOpLogger, ProcessLauncher, QueuedApprovalGate, ServersConfig,
    SharedLogger, SubprocessClient, SubprocessStudio, ToolCall, ToolCategory, ToolHub,
    ToolRegistry,
};

fn call(name: &str, arguments: Value) -> ToolCall {
    ToolCall::new(name, arguments.as_object().cloned().unwrap())
}

fn echo_tool() -> LocalTool {
    LocalTool::new("echo", "Echo the message back", |args| async move {
        Ok::<_, String>(args.get("message").cloned().unwrap_or(Value::Null))
    })
}

struct Fixture {
    hub: ToolHub,
    server: common::FakeHttp,
    mock: Arc<MockStats>,
}

fn fixture(registry: impl FnOnce(SharedLogger) -> ToolRegistry) -> Fixture {
    let logger: SharedLogger = Arc::new(NoOpLogger);
    let server = jsonrpc_multiply_server();
    let config = ServersConfig::from_json_str(&format!(
        r#"{{
            "mcpServers": {{
                "math": {{ "command": "math-server", "args": ["--stdio"] }},
                "calc": {{ "transport": "http", "url": "{}" }}
            }}
        }}"#,
        server.url
    ))
    .unwrap();

    let mock = MockServer::new(vec![MockTool::add()]);
    let stats = mock.stats();
    let launcher: Arc<dyn ProcessLauncher> = Arc::new(mock);
    let subprocess = SubprocessStudio::new(Arc::clone(&logger)).with_builder(move |descriptor, logger| {
        Ok(SubprocessClient::new(descriptor, logger)?.with_launcher(Arc::clone(&launcher)))
    });
    assert_eq!(subprocess.load_from_config(&config).unwrap(), 1);

    let network = NetworkStudio::new(Arc::clone(&logger));
    assert_eq!(network.load_from_config(&config).unwrap(), 1);

    let hub = ToolHub::new(Arc::clone(&logger))
        .with_registry(registry(logger))
        .with_subprocess_studio(subprocess)
        .with_network_studio(network);

    Fixture { hub, server, mock: stats }
}

#[tokio::test]
async fn echo_add_multiply_across_all_sources() {
    let Fixture { hub, server, .. } = fixture(|logger| ToolRegistry::new(logger).with_approval(false));

    let report = hub.start(vec![echo_tool()]).await.unwrap();
    assert_eq!(report.subprocess.ready, vec!["math"]);
    assert_eq!(report.network.ready, vec!["calc"]);
    assert_eq!(report.summary.total, 3);
    assert_eq!(report.summary.local.count, 1);
    assert_eq!(report.summary.subprocess.by_connection["math"], vec!["add"]);
    assert_eq!(report.summary.network.by_connection["calc"], vec!["multiply"]);

    let registry = hub.registry();
    let names: Vec<_> = registry.all_tools().into_iter().map(|t| t.name).collect();
    assert_eq!(names, vec!["echo", "add", "multiply"]);
    assert_eq!(registry.resolve("multiply").unwrap().descriptor.source.to_string(), "network:calc");

    let results = registry
        .execute_all(&[
            call("echo", json!({ "message": "hello" })),
            call("add", json!({ "a": 2, "b": 3 })),
            call("multiply", json!({ "a": 3, "b": 4 })),
        ])
        .await;
    assert!(results.iter().all(|r| r.success), "{:?}", results);
    assert_eq!(results[0].result, Some(json!("hello")));
    assert_eq!(results[1].result, Some(json!(5)));
    assert_eq!(results[2].result, Some(json!(12)));
    assert_eq!(server.rpc_calls("tools/call"), 1);

    hub.shutdown().await;
    assert!(registry.tools_by_source(ToolCategory::Network, None).is_empty());
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn rejected_call_never_reaches_network_server() {
    let (gate, mut pending) = QueuedApprovalGate::channel(4);
    let Fixture { hub, server, .. } =
        fixture(move |logger| ToolRegistry::new(logger).with_gate(Arc::new(gate)));
    hub.start(Vec::new()).await.unwrap();

    let host = tokio::spawn(async move {
        let approval = pending.recv().await.unwrap();
        assert_eq!(approval.request.tool_name, "multiply");
        assert_eq!(approval.request.source.to_string(), "network:calc");
        approval.reject();
    });

    let result = hub.registry().execute(&call("multiply", json!({ "a": 3, "b": 4 }))).await;
    host.await.unwrap();

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("disapproved by user"));
    assert_eq!(server.rpc_calls("tools/call"), 0);

    hub.shutdown().await;
}

#[tokio::test]
async fn approved_call_dispatches_exactly_once() {
    let (gate, mut pending) = QueuedApprovalGate::channel(4);
    let Fixture { hub, mock, .. } =
        fixture(move |logger| ToolRegistry::new(logger).with_gate(Arc::new(gate)));
    hub.start(Vec::new()).await.unwrap();

    let host = tokio::spawn(async move {
        pending.recv().await.unwrap().approve();
    });

    let result = hub.registry().execute(&call("add", json!({ "a": 1, "b": 1 }))).await;
    host.await.unwrap();

    assert_eq!(result.result, Some(json!(2)));
    assert_eq!(mock.count("tools/call"), 1);

    hub.shutdown().await;
    assert!(mock.methods().contains(&"initialize".to_string()));
}

#[tokio::test]
async fn unreachable_network_server_is_isolated() {
    let logger: SharedLogger = Arc::new(NoOpLogger);
    let config = ServersConfig::from_yaml_str(
        "servers:\n  gone:\n    transport: sse\n    url: http://127.0.0.1:9/sse\n",
    )
    .unwrap();
    let hub = ToolHub::from_config(&config, Arc::clone(&logger))
        .unwrap()
        .with_registry(ToolRegistry::new(logger).with_approval(false));

    let report = hub.start(vec![echo_tool()]).await.unwrap();
    assert!(report.network.is_failed("gone"));
    assert_eq!(report.summary.total, 1);

    let result = hub.registry().execute(&call("echo", json!({ "message": "still here" }))).await;
    assert_eq!(result.result, Some(json!("still here")));
}

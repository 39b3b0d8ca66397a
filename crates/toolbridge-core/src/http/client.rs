//! Network tool client

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use super::delegated::{DelegatedAdapter, DelegatedSession, RmcpAdapter};
use super::direct::DirectTransport;
use crate::config::{ConfigError, ConfigResult, ConnectionDescriptor, NetworkParams};
use crate::connection::{
    ConnectionError, ConnectionResult, ConnectionState, ManagedConnection, StateCell,
    ToolConnection,
};
use crate::logging::SharedLogger;
use crate::types::{RemoteTool, ToolArguments, TransportKind};
use crate::{log_error, log_info, log_warn};

#[derive(Clone)]
enum Link {
    Direct(Arc<DirectTransport>),
    Delegated(Arc<dyn DelegatedSession>),
}

/// A tool server reached over HTTP
///
/// Plain HTTP servers are driven directly; SSE and streamable servers go
/// through a [`DelegatedAdapter`]. Calls on one client may run concurrently.
pub struct NetworkClient {
    name: String,
    params: NetworkParams,
    adapter: Arc<dyn DelegatedAdapter>,
    logger: SharedLogger,
    state: StateCell,
    link: RwLock<Option<Link>>,
    lifecycle: tokio::sync::Mutex<()>,
}

impl NetworkClient {
    /// Create a client for a network descriptor
    pub fn new(descriptor: ConnectionDescriptor, logger: SharedLogger) -> ConfigResult<Self> {
        descriptor.expect_kind(TransportKind::Network)?;
        let params = descriptor
            .as_network()
            .cloned()
            .ok_or_else(|| ConfigError::MissingField {
                server: descriptor.name().to_string(),
                field: "url",
            })?;

        Ok(Self {
            name: descriptor.name().to_string(),
            params,
            adapter: Arc::new(RmcpAdapter),
            logger,
            state: StateCell::new(),
            link: RwLock::new(None),
            lifecycle: tokio::sync::Mutex::new(()),
        })
    }

    /// Use a different adapter for the delegated styles
    pub fn with_adapter(mut self, adapter: Arc<dyn DelegatedAdapter>) -> Self {
        self.adapter = adapter;
        self
    }

    pub fn params(&self) -> &NetworkParams {
        &self.params
    }

    /// Session token captured from a direct-style server
    pub fn session_id(&self) -> Option<String> {
        match self.link.read().as_ref() {
            Some(Link::Direct(direct)) => direct.session_id(),
            _ => None,
        }
    }

    fn tag(&self) -> String {
        format!("[NetworkClient:{}]", self.name)
    }

    fn ready_link(&self) -> ConnectionResult<Link> {
        if self.state.get() != ConnectionState::Ready {
            return Err(ConnectionError::NotInitialized(self.name.clone()));
        }
        self.link
            .read()
            .clone()
            .ok_or_else(|| ConnectionError::NotInitialized(self.name.clone()))
    }

    async fn open(&self) -> ConnectionResult<Link> {
        if self.params.style.is_delegated() {
            let session = self
                .adapter
                .connect(&self.name, &self.params, Arc::clone(&self.logger))
                .await?;
            return Ok(Link::Delegated(Arc::from(session)));
        }

        let direct = DirectTransport::new(&self.name, self.params.clone(), Arc::clone(&self.logger))?;
        direct.probe().await;
        Ok(Link::Direct(Arc::new(direct)))
    }
}

#[async_trait]
impl ToolConnection for NetworkClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Network
    }

    fn state(&self) -> ConnectionState {
        self.state.get()
    }

    async fn initialize(&self) -> ConnectionResult<()> {
        let _lifecycle = self.lifecycle.lock().await;
        if self.state.get() == ConnectionState::Ready {
            return Ok(());
        }
        let guard = self.state.begin_initializing().map_err(|state| {
            ConnectionError::Handshake(format!("cannot initialize a {} connection", state))
        })?;

        log_info!(
            self.logger,
            "{} Connecting to {} ({})",
            self.tag(),
            self.params.base_url,
            self.params.style
        );

        match self.open().await {
            Ok(link) => {
                *self.link.write() = Some(link);
                guard.ready();
                Ok(())
            }
            Err(e) => {
                drop(guard);
                log_error!(self.logger, "{} Connection failed: {}", self.tag(), e);
                Err(e)
            }
        }
    }

    async fn list_tools(&self) -> Vec<RemoteTool> {
        let link = match self.ready_link() {
            Ok(link) => link,
            Err(e) => {
                log_warn!(self.logger, "{} Cannot list tools: {}", self.tag(), e);
                return Vec::new();
            }
        };

        let listed = match link {
            Link::Direct(direct) => direct.list_tools().await,
            Link::Delegated(session) => session.list_tools().await,
        };
        listed.unwrap_or_else(|e| {
            log_warn!(self.logger, "{} Listing tools failed: {}", self.tag(), e);
            Vec::new()
        })
    }

    async fn call_tool(&self, name: &str, arguments: ToolArguments) -> ConnectionResult<Value> {
        match self.ready_link()? {
            Link::Direct(direct) => direct.call_tool(name, arguments).await,
            Link::Delegated(session) => session.call_tool(name, arguments).await,
        }
    }

    async fn cleanup(&self) -> ConnectionResult<()> {
        let _lifecycle = self.lifecycle.lock().await;
        if self.state.get() != ConnectionState::Ready {
            return Ok(());
        }
        self.state.set(ConnectionState::Closed);

        let link = self.link.write().take();
        match link {
            Some(Link::Direct(direct)) => direct.clear_session(),
            Some(Link::Delegated(session)) => session.close().await?,
            None => {}
        }

        log_info!(self.logger, "{} Closed", self.tag());
        Ok(())
    }
}

impl ManagedConnection for NetworkClient {
    const KIND: TransportKind = TransportKind::Network;

    fn from_descriptor(descriptor: ConnectionDescriptor, logger: SharedLogger) -> ConfigResult<Self> {
        Self::new(descriptor, logger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkStyle;
    use crate::logging::NoOpLogger;
    use parking_lot::Mutex;
    use serde_json::json;

    struct RecordingSession {
        calls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl DelegatedSession for RecordingSession {
        async fn list_tools(&self) -> ConnectionResult<Vec<RemoteTool>> {
            Ok(vec![RemoteTool::new("search", "Search documents")])
        }

        async fn call_tool(&self, name: &str, _arguments: ToolArguments) -> ConnectionResult<Value> {
            self.calls.lock().push(name.to_string());
            Ok(json!({ "hits": 3 }))
        }

        async fn close(&self) -> ConnectionResult<()> {
            self.calls.lock().push("<close>".to_string());
            Ok(())
        }
    }

    struct RecordingAdapter {
        calls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl DelegatedAdapter for RecordingAdapter {
        async fn connect(
            &self,
            _name: &str,
            _params: &NetworkParams,
            _logger: SharedLogger,
        ) -> ConnectionResult<Box<dyn DelegatedSession>> {
            Ok(Box::new(RecordingSession {
                calls: Arc::clone(&self.calls),
            }))
        }
    }

    /// Never finishes connecting
    struct StalledAdapter;

    #[async_trait]
    impl DelegatedAdapter for StalledAdapter {
        async fn connect(
            &self,
            _name: &str,
            _params: &NetworkParams,
            _logger: SharedLogger,
        ) -> ConnectionResult<Box<dyn DelegatedSession>> {
            futures::future::pending::<ConnectionResult<Box<dyn DelegatedSession>>>().await
        }
    }

    fn sse_descriptor() -> ConnectionDescriptor {
        ConnectionDescriptor::network(
            "events",
            NetworkParams::new(NetworkStyle::Sse, "http://127.0.0.1:9/sse"),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_sse_without_adapter_fails_isolated() {
        let client = NetworkClient::new(sse_descriptor(), Arc::new(NoOpLogger)).unwrap();
        let err = client.initialize().await.unwrap_err();
        assert!(matches!(err, ConnectionError::Unsupported(_)));
        assert_eq!(client.state(), ConnectionState::Failed);
        assert!(client.list_tools().await.is_empty());
    }

    #[tokio::test]
    async fn test_delegated_session_routing() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let client = NetworkClient::new(sse_descriptor(), Arc::new(NoOpLogger))
            .unwrap()
            .with_adapter(Arc::new(RecordingAdapter {
                calls: Arc::clone(&calls),
            }));

        client.initialize().await.unwrap();
        assert_eq!(client.list_tools().await[0].name, "search");
        let result = client.call_tool("search", ToolArguments::new()).await.unwrap();
        assert_eq!(result["hits"], 3);

        client.cleanup().await.unwrap();
        client.cleanup().await.unwrap();
        assert_eq!(*calls.lock(), vec!["search".to_string(), "<close>".to_string()]);
        assert!(matches!(
            client.call_tool("search", ToolArguments::new()).await,
            Err(ConnectionError::NotInitialized(_))
        ));
    }

    #[tokio::test]
    async fn test_cancelled_connect_leaves_failed() {
        let client = NetworkClient::new(sse_descriptor(), Arc::new(NoOpLogger))
            .unwrap()
            .with_adapter(Arc::new(StalledAdapter));

        let outcome =
            tokio::time::timeout(std::time::Duration::from_millis(20), client.initialize()).await;
        assert!(outcome.is_err());
        assert_eq!(client.state(), ConnectionState::Failed);

        let err = client.initialize().await.unwrap_err();
        assert!(matches!(err, ConnectionError::Handshake(_)));
        assert_eq!(client.state(), ConnectionState::Failed);
    }

    #[test]
    fn test_rejects_subprocess_descriptor() {
        let descriptor = ConnectionDescriptor::subprocess(
            "fs",
            crate::config::SubprocessParams::new("echo"),
        )
        .unwrap();
        assert!(matches!(
            NetworkClient::new(descriptor, Arc::new(NoOpLogger)),
            Err(ConfigError::WrongKind { .. })
        ));
    }
}

//! Delegated network styles
//!
//! SSE and streamable HTTP servers are driven by a session library rather
//! than by hand. [`RmcpAdapter`] covers streamable HTTP with the official
//! `rmcp` SDK; hosts can plug in their own [`DelegatedAdapter`] for SSE.

use async_trait::async_trait;
use rmcp::{
    model::{CallToolRequestParams, ClientCapabilities, ClientInfo, Implementation},
    service::RunningService,
    transport::{
        streamable_http_client::StreamableHttpClientTransportConfig, StreamableHttpClientTransport,
    },
    RoleClient, ServiceExt,
};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::config::{NetworkParams, NetworkStyle};
use crate::connection::{ConnectionError, ConnectionResult};
use crate::logging::SharedLogger;
use crate::types::{RemoteTool, ToolArguments};
use crate::{log_info, log_warn};

/// An open session with a delegated server
#[async_trait]
pub trait DelegatedSession: Send + Sync {
    async fn list_tools(&self) -> ConnectionResult<Vec<RemoteTool>>;

    async fn call_tool(&self, name: &str, arguments: ToolArguments) -> ConnectionResult<Value>;

    /// Close the session; later calls fail with [`ConnectionError::Closed`]
    async fn close(&self) -> ConnectionResult<()>;
}

/// Opens sessions for the delegated network styles
#[async_trait]
pub trait DelegatedAdapter: Send + Sync {
    async fn connect(
        &self,
        name: &str,
        params: &NetworkParams,
        logger: SharedLogger,
    ) -> ConnectionResult<Box<dyn DelegatedSession>>;
}

/// Streamable HTTP sessions through `rmcp`
#[derive(Debug, Default, Clone, Copy)]
pub struct RmcpAdapter;

#[async_trait]
impl DelegatedAdapter for RmcpAdapter {
    async fn connect(
        &self,
        name: &str,
        params: &NetworkParams,
        logger: SharedLogger,
    ) -> ConnectionResult<Box<dyn DelegatedSession>> {
        if params.style != NetworkStyle::Streamable {
            return Err(ConnectionError::Unsupported(format!(
                "no adapter configured for {} transport",
                params.style
            )));
        }

        let tag = format!("[RmcpSession:{}]", name);
        let extra_headers = params
            .headers
            .keys()
            .filter(|key| !key.eq_ignore_ascii_case("authorization"))
            .count();
        if extra_headers > 0 {
            log_warn!(
                logger,
                "{} Ignoring {} header(s); only Authorization is forwarded",
                tag,
                extra_headers
            );
        }

        let transport = match params.bearer_token() {
            Some(token) => {
                let mut config = StreamableHttpClientTransportConfig::with_uri(params.base_url.as_str());
                config.auth_header = Some(token.to_string());
                StreamableHttpClientTransport::from_config(config)
            }
            None => StreamableHttpClientTransport::from_uri(params.base_url.as_str()),
        };

        let client_info = ClientInfo {
            meta: None,
            protocol_version: Default::default(),
            capabilities: ClientCapabilities::default(),
            client_info: Implementation {
                name: "toolbridge".to_string(),
                title: Some("Toolbridge".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                website_url: None,
                icons: None,
            },
        };

        let service = tokio::time::timeout(params.timeout, client_info.serve(transport))
            .await
            .map_err(|_| ConnectionError::Timeout(params.timeout))?
            .map_err(|e| ConnectionError::Handshake(e.to_string()))?;

        log_info!(logger, "{} Connected to {}", tag, params.base_url);
        Ok(Box::new(RmcpSession {
            service: Mutex::new(Some(service)),
            timeout: params.timeout,
        }))
    }
}

struct RmcpSession {
    service: Mutex<Option<RunningService<RoleClient, ClientInfo>>>,
    timeout: std::time::Duration,
}

#[async_trait]
impl DelegatedSession for RmcpSession {
    async fn list_tools(&self) -> ConnectionResult<Vec<RemoteTool>> {
        let guard = self.service.lock().await;
        let service = guard.as_ref().ok_or(ConnectionError::Closed)?;

        let result = tokio::time::timeout(self.timeout, service.list_tools(Default::default()))
            .await
            .map_err(|_| ConnectionError::Timeout(self.timeout))?
            .map_err(|e| ConnectionError::Transport(e.to_string()))?;

        let items = result
            .tools
            .iter()
            .filter_map(|tool| serde_json::to_value(tool).ok())
            .collect::<Vec<_>>();
        Ok(RemoteTool::parse_list(&items))
    }

    async fn call_tool(&self, name: &str, arguments: ToolArguments) -> ConnectionResult<Value> {
        let guard = self.service.lock().await;
        let service = guard.as_ref().ok_or(ConnectionError::Closed)?;

        let params = CallToolRequestParams {
            meta: None,
            name: name.to_owned().into(),
            arguments: Some(arguments),
            task: None,
        };
        let result = tokio::time::timeout(self.timeout, service.call_tool(params))
            .await
            .map_err(|_| ConnectionError::Timeout(self.timeout))?
            .map_err(|e| ConnectionError::Transport(e.to_string()))?;

        serde_json::to_value(&result)
            .map_err(|e| ConnectionError::Transport(format!("unreadable tool result: {}", e)))
    }

    async fn close(&self) -> ConnectionResult<()> {
        if let Some(service) = self.service.lock().await.take() {
            service
                .cancel()
                .await
                .map_err(|e| ConnectionError::Transport(e.to_string()))?;
        }
        Ok(())
    }
}

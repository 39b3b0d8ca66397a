//! Generic connection fleet

use std::sync::Arc;

use parking_lot::RwLock;

use super::report::{InitPolicy, InitReport};
use crate::config::{ConfigResult, ConnectionDescriptor, ServersConfig};
use crate::connection::{ConnectionError, ManagedConnection, ToolConnection};
use crate::http::NetworkClient;
use crate::logging::SharedLogger;
use crate::stdio::SubprocessClient;
use crate::types::TransportKind;
use crate::{log_info, log_warn};

/// Studio for child-process tool servers
pub type SubprocessStudio = Studio<SubprocessClient>;

/// Studio for HTTP tool servers
pub type NetworkStudio = Studio<NetworkClient>;

type ClientBuilder<C> =
    Arc<dyn Fn(ConnectionDescriptor, SharedLogger) -> ConfigResult<C> + Send + Sync>;

/// Errors from fleet initialization
#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    #[error("Initialization aborted at '{connection}': {source}")]
    Aborted {
        connection: String,
        #[source]
        source: ConnectionError,
    },
}

/// Owner of every connection of one transport kind
///
/// The studio is the only writer of its connections' lifecycle: it
/// initializes them in registration order and cleans them up in reverse.
pub struct Studio<C: ManagedConnection> {
    connections: RwLock<Vec<Arc<C>>>,
    builder: ClientBuilder<C>,
    policy: InitPolicy,
    logger: SharedLogger,
}

impl<C: ManagedConnection> Studio<C> {
    pub fn new(logger: SharedLogger) -> Self {
        Self {
            connections: RwLock::new(Vec::new()),
            builder: Arc::new(C::from_descriptor),
            policy: InitPolicy::default(),
            logger,
        }
    }

    pub fn with_policy(mut self, policy: InitPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Customize how clients are built from descriptors
    ///
    /// Useful to give every client a shared launcher or adapter.
    pub fn with_builder<F>(mut self, builder: F) -> Self
    where
        F: Fn(ConnectionDescriptor, SharedLogger) -> ConfigResult<C> + Send + Sync + 'static,
    {
        self.builder = Arc::new(builder);
        self
    }

    pub fn kind(&self) -> TransportKind {
        C::KIND
    }

    pub fn policy(&self) -> InitPolicy {
        self.policy
    }

    fn tag(&self) -> String {
        format!("[Studio:{}]", C::KIND)
    }

    /// Build a client for `descriptor` and append it to the fleet
    ///
    /// Names are not checked for uniqueness here.
    pub fn add_connection(&self, descriptor: ConnectionDescriptor) -> ConfigResult<Arc<C>> {
        descriptor.expect_kind(C::KIND)?;
        let client = (self.builder)(descriptor, Arc::clone(&self.logger))?;
        Ok(self.add_client(client))
    }

    /// Append an already built client
    pub fn add_client(&self, client: C) -> Arc<C> {
        let client = Arc::new(client);
        self.connections.write().push(Arc::clone(&client));
        client
    }

    /// Add every entry of this studio's kind; one invalid entry adds none
    pub fn load_from_config(&self, config: &ServersConfig) -> ConfigResult<usize> {
        let clients = config
            .descriptors(C::KIND)?
            .into_iter()
            .map(|descriptor| (self.builder)(descriptor, Arc::clone(&self.logger)))
            .collect::<ConfigResult<Vec<_>>>()?;

        let count = clients.len();
        let mut connections = self.connections.write();
        connections.extend(clients.into_iter().map(Arc::new));
        drop(connections);

        log_info!(self.logger, "{} Loaded {} connection(s) from config", self.tag(), count);
        Ok(count)
    }

    /// Initialize every connection in registration order
    pub async fn initialize_all(&self) -> Result<InitReport, StudioError> {
        let mut report = InitReport::default();
        for connection in self.connections() {
            match connection.initialize().await {
                Ok(()) => report.ready.push(connection.name().to_string()),
                Err(e) => {
                    log_warn!(
                        self.logger,
                        "{} '{}' failed to initialize: {}",
                        self.tag(),
                        connection.name(),
                        e
                    );
                    if self.policy == InitPolicy::AbortFleet {
                        self.cleanup_all().await;
                        return Err(StudioError::Aborted {
                            connection: connection.name().to_string(),
                            source: e,
                        });
                    }
                    report.failed.push((connection.name().to_string(), e.to_string()));
                }
            }
        }

        log_info!(
            self.logger,
            "{} {} ready, {} failed",
            self.tag(),
            report.ready.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Clean up every connection, newest first; failures are logged and skipped
    pub async fn cleanup_all(&self) {
        for connection in self.connections().into_iter().rev() {
            if let Err(e) = connection.cleanup().await {
                log_warn!(
                    self.logger,
                    "{} Cleanup of '{}' failed: {}",
                    self.tag(),
                    connection.name(),
                    e
                );
            }
        }
    }

    /// Every connection, in registration order
    pub fn connections(&self) -> Vec<Arc<C>> {
        self.connections.read().clone()
    }

    /// Connections currently in the `Ready` state
    pub fn initialized_connections(&self) -> Vec<Arc<C>> {
        self.connections
            .read()
            .iter()
            .filter(|connection| connection.is_ready())
            .cloned()
            .collect()
    }

    pub fn connection_by_name(&self, name: &str) -> Option<Arc<C>> {
        self.connections
            .read()
            .iter()
            .find(|connection| connection.name() == name)
            .cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.connections
            .read()
            .iter()
            .map(|connection| connection.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }
}

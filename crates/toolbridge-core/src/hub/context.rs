//! Orchestration context

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::Serialize;

use super::error::{HubError, HubResult};
use crate::config::ServersConfig;
use crate::logging::SharedLogger;
use crate::studio::{InitReport, NetworkStudio, SubprocessStudio};
use crate::tools::{LocalTool, ToolRegistry, ToolSummary};
use crate::{log_info, log_warn};

/// What [`ToolHub::start`] brought up
#[derive(Debug, Clone, Serialize)]
pub struct StartReport {
    pub subprocess: InitReport,
    pub network: InitReport,
    pub summary: ToolSummary,
}

/// Studios plus the registry they feed
pub struct ToolHub {
    subprocess: Arc<SubprocessStudio>,
    network: Arc<NetworkStudio>,
    registry: Arc<ToolRegistry>,
    started: AtomicBool,
    stopped: AtomicBool,
    report: OnceCell<StartReport>,
    logger: SharedLogger,
}

impl ToolHub {
    /// A hub with empty studios and a fresh registry
    pub fn new(logger: SharedLogger) -> Self {
        Self {
            subprocess: Arc::new(SubprocessStudio::new(Arc::clone(&logger))),
            network: Arc::new(NetworkStudio::new(Arc::clone(&logger))),
            registry: Arc::new(ToolRegistry::new(Arc::clone(&logger))),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            report: OnceCell::new(),
            logger,
        }
    }

    /// Load every configured server into the matching studio
    pub fn from_config(config: &ServersConfig, logger: SharedLogger) -> HubResult<Self> {
        let hub = Self::new(logger);
        hub.subprocess.load_from_config(config)?;
        hub.network.load_from_config(config)?;
        Ok(hub)
    }

    pub fn with_registry(mut self, registry: ToolRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn with_subprocess_studio(mut self, studio: SubprocessStudio) -> Self {
        self.subprocess = Arc::new(studio);
        self
    }

    pub fn with_network_studio(mut self, studio: NetworkStudio) -> Self {
        self.network = Arc::new(studio);
        self
    }

    /// Bring everything up, once
    ///
    /// Subprocess servers start first, then network servers. Ready
    /// connections are loaded into the registry, followed by `local_tools`.
    pub async fn start(
        &self,
        local_tools: impl IntoIterator<Item = LocalTool>,
    ) -> HubResult<&StartReport> {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(HubError::AlreadyStarted);
        }

        log_info!(self.logger, "[ToolHub] Starting");

        let subprocess = self.subprocess.initialize_all().await?;
        let network = match self.network.initialize_all().await {
            Ok(report) => report,
            Err(e) => {
                self.subprocess.cleanup_all().await;
                return Err(e.into());
            }
        };

        self.registry.load_from_subprocess_studio(&self.subprocess).await;
        self.registry.load_from_network_studio(&self.network).await;
        self.registry.register_local_tools(local_tools);

        let report = StartReport {
            subprocess,
            network,
            summary: self.registry.summary(),
        };
        log_info!(self.logger, "[ToolHub] Started:\n{}", report.summary);

        Ok(self.report.get_or_init(|| report))
    }

    /// The report of the first successful start
    pub fn report(&self) -> Option<&StartReport> {
        self.report.get()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Tear down network then subprocess connections and drop their tools
    pub async fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        if !self.is_started() {
            log_warn!(self.logger, "[ToolHub] Shutdown before start");
        }

        self.network.cleanup_all().await;
        self.subprocess.cleanup_all().await;
        let removed = self.registry.clear_remote();
        log_info!(self.logger, "[ToolHub] Shut down, {} remote tools removed", removed);
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn subprocess_studio(&self) -> &Arc<SubprocessStudio> {
        &self.subprocess
    }

    pub fn network_studio(&self) -> &Arc<NetworkStudio> {
        &self.network
    }
}

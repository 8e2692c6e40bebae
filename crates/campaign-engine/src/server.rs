//! # Dialer Server
//!
//! Wires the engine together — store, fabric client, selector, supervisor,
//! inbound router, HTTP API — and manages its lifecycle: startup recovery,
//! a background status monitor, and graceful shutdown that drains in-flight
//! calls within the configured grace period.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::info;

use dialflow_fabric::{FabricClient, TelephonyFabric};

use crate::agent::{AgentSelector, LoadTracker};
use crate::api::{self, ApiState, AuthVerifier, RateLimiter};
use crate::config::AppConfig;
use crate::database::DatabaseManager;
use crate::error::{EngineError, Result};
use crate::inbound::InboundRouter;
use crate::orchestrator::CampaignSupervisor;

/// A complete dialer server: engine plus HTTP surface.
pub struct DialerServer {
    config: AppConfig,
    db: DatabaseManager,
    supervisor: Arc<CampaignSupervisor>,
    state: ApiState,
    monitor_handle: Option<JoinHandle<()>>,
}

impl DialerServer {
    /// Build a server from configuration, connecting the store and fabric.
    pub async fn new(config: AppConfig) -> Result<Self> {
        let db = DatabaseManager::new(&config.database_url).await?;

        let fabric: Arc<dyn TelephonyFabric> = if config.livekit_url.is_empty() {
            return Err(EngineError::validation(
                "LIVEKIT_URL is required to reach the telephony fabric",
            ));
        } else {
            Arc::new(FabricClient::new(config.fabric_config())?)
        };

        Self::with_fabric(config, db, fabric).await
    }

    /// Build with an explicit fabric implementation (tests inject a mock).
    pub async fn with_fabric(
        config: AppConfig,
        db: DatabaseManager,
        fabric: Arc<dyn TelephonyFabric>,
    ) -> Result<Self> {
        let load = Arc::new(LoadTracker::new());
        let selector =
            Arc::new(AgentSelector::new(db.clone(), load, &config.default_agent_name));
        let supervisor = Arc::new(CampaignSupervisor::new(
            db.clone(),
            fabric,
            selector.clone(),
            config.clone(),
        ));
        let inbound = Arc::new(InboundRouter::new(
            db.clone(),
            selector,
            &config.default_agent_name,
            config.default_country_code.clone(),
        ));
        let auth = Arc::new(AuthVerifier::new(config.jwt_public_key.as_deref())?);
        let rate_limiter = Arc::new(RateLimiter::new(
            config.rate_limit_window,
            config.rate_limit_max_requests,
        ));

        let state = ApiState {
            db: db.clone(),
            supervisor: supervisor.clone(),
            inbound,
            auth,
            rate_limiter,
            config: Arc::new(config.clone()),
        };

        Ok(Self { config, db, supervisor, state, monitor_handle: None })
    }

    pub fn supervisor(&self) -> &Arc<CampaignSupervisor> {
        &self.supervisor
    }

    pub fn database(&self) -> &DatabaseManager {
        &self.db
    }

    pub fn api_state(&self) -> &ApiState {
        &self.state
    }

    /// Run startup recovery and launch background tasks.
    pub async fn start(&mut self) -> Result<()> {
        let orphaned = self.supervisor.recover().await?;
        if orphaned > 0 {
            info!("🧹 Startup recovery failed {} orphaned leads", orphaned);
        }

        let supervisor = self.supervisor.clone();
        self.monitor_handle = Some(tokio::spawn(async move {
            Self::monitor_loop(supervisor).await;
        }));

        info!("✅ Dialer engine started");
        Ok(())
    }

    /// Serve HTTP until ctrl-c, then drain campaigns and return.
    pub async fn run(mut self) -> Result<()> {
        self.start().await?;

        let addr = format!("0.0.0.0:{}", self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| EngineError::internal(format!("failed to bind {addr}: {e}")))?;
        info!("📞 Dialer API listening on {}", addr);

        let app = api::build_router(self.state.clone());
        let supervisor = self.supervisor.clone();

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                info!("🛑 Shutdown signal received");
            })
            .await
            .map_err(|e| EngineError::internal(format!("http server error: {e}")))?;

        supervisor.shutdown().await;
        self.stop();
        info!("✅ Dialer server stopped");
        Ok(())
    }

    /// Cancel background tasks.
    pub fn stop(&mut self) {
        if let Some(handle) = self.monitor_handle.take() {
            handle.abort();
        }
    }

    async fn monitor_loop(supervisor: Arc<CampaignSupervisor>) {
        let mut ticker = interval(Duration::from_secs(60));
        // First tick fires immediately; skip it so startup logs stay clean.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let active = supervisor.active_campaigns();
            if active > 0 {
                info!("📊 {} campaign(s) active", active);
            }
        }
    }
}

impl Drop for DialerServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Builder for [`DialerServer`] with a fluent API.
pub struct DialerServerBuilder {
    config: Option<AppConfig>,
    fabric: Option<Arc<dyn TelephonyFabric>>,
}

impl DialerServerBuilder {
    pub fn new() -> Self {
        Self { config: None, fabric: None }
    }

    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Inject a fabric implementation instead of the HTTP client.
    pub fn with_fabric(mut self, fabric: Arc<dyn TelephonyFabric>) -> Self {
        self.fabric = Some(fabric);
        self
    }

    pub async fn build(self) -> Result<DialerServer> {
        let config = self
            .config
            .ok_or_else(|| EngineError::validation("configuration not provided"))?;

        match self.fabric {
            Some(fabric) => {
                let db = DatabaseManager::new(&config.database_url).await?;
                DialerServer::with_fabric(config, db, fabric).await
            }
            None => DialerServer::new(config).await,
        }
    }
}

impl Default for DialerServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the forwarding handler
//! - Wire up middleware (request ID, tracing, concurrency cap, timeout, guard)
//! - Bind server to listener
//! - Apply config reloads to the guard state
//! - Stop on shutdown signal, draining in-flight requests
//!
//! # Layer order (outermost first)
//! ```text
//! SetRequestId → Trace → PropagateRequestId → ConcurrencyLimit → Timeout → XML-RPC guard → forward
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::any, Router};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::GuardServerConfig;
use crate::http::middleware::{shared, xmlrpc_guard_middleware, GuardState, SharedGuardState};
use crate::http::proxy::{forward_handler, ProxyState};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::observability::metrics;
use crate::security::RangeError;

/// Errors building the server from config.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid guard range: {0}")]
    Range(#[from] RangeError),

    #[error("invalid upstream address: {0}")]
    Upstream(#[from] axum::http::uri::InvalidUri),
}

/// HTTP front door that guards the XML-RPC endpoint.
pub struct HttpServer {
    router: Router,
    config: GuardServerConfig,
    guard_state: SharedGuardState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GuardServerConfig) -> Result<Self, ServerError> {
        let guard_state = shared(GuardState::from_config(&config.guard)?);
        let proxy_state = ProxyState::new(
            &config.upstream.address,
            Duration::from_secs(config.timeouts.connect_secs),
        )?;

        let router = Self::build_router(&config, proxy_state, guard_state.clone());
        Ok(Self {
            router,
            config,
            guard_state,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(
        config: &GuardServerConfig,
        proxy_state: ProxyState,
        guard_state: SharedGuardState,
    ) -> Router {
        Router::new()
            .route("/{*path}", any(forward_handler))
            .route("/", any(forward_handler))
            .with_state(proxy_state)
            .layer(middleware::from_fn_with_state(guard_state, xmlrpc_guard_middleware))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(GlobalConcurrencyLimitLayer::new(config.listener.max_connections))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Configs received on `config_updates` replace the guard state; other
    /// sections only take effect on restart.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GuardServerConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            ranges = self.guard_state.load().guard.ranges().len(),
            "HTTP server starting"
        );

        let guard_state = self.guard_state.clone();
        let reload_task = tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                apply_guard_config(&guard_state, &new_config);
            }
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Draining in-flight requests");
            })
            .await;

        reload_task.abort();
        tracing::info!("HTTP server stopped");
        result
    }

    /// Get a reference to the startup config.
    pub fn config(&self) -> &GuardServerConfig {
        &self.config
    }

    /// Handle to the live guard state.
    pub fn guard_state(&self) -> SharedGuardState {
        self.guard_state.clone()
    }
}

/// Swap in the guard section of a reloaded config. Returns whether it was applied.
pub fn apply_guard_config(guard_state: &SharedGuardState, config: &GuardServerConfig) -> bool {
    match GuardState::from_config(&config.guard) {
        Ok(state) => {
            let ranges = state.guard.ranges().len();
            guard_state.store(Arc::new(state));
            metrics::record_reload(true);
            tracing::info!(ranges, "Guard configuration reloaded");
            true
        }
        Err(e) => {
            metrics::record_reload(false);
            tracing::error!(error = %e, "Rejected guard configuration, keeping current one");
            false
        }
    }
}

//! Token server lifecycle

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use super::router::{AppState, create_router};
use crate::config::Config;
use crate::feeds::{AuthorizationEngine, PermissionPredicate, PolicyPredicate};
use crate::{Error, Result};

/// Standalone token server
pub struct TokenServer {
    config: Config,
    state: Arc<AppState>,
}

impl TokenServer {
    /// Build the engine and policy from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an incomplete tenant identity, a remote
    /// signer without a URL or an invalid policy pattern.
    pub fn new(config: Config) -> Result<Self> {
        let engine = Arc::new(AuthorizationEngine::from_config(&config)?);
        let policy: Arc<dyn PermissionPredicate> =
            Arc::new(PolicyPredicate::from_config(&config.policy)?);
        Ok(Self::with_parts(config, engine, policy))
    }

    /// Server around an existing engine and predicate.
    pub fn with_parts(
        config: Config,
        engine: Arc<AuthorizationEngine>,
        policy: Arc<dyn PermissionPredicate>,
    ) -> Self {
        Self {
            config,
            state: Arc::new(AppState { engine, policy }),
        }
    }

    /// Shared state handed to the router.
    #[must_use]
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Run until Ctrl+C or SIGTERM.
    pub async fn run(self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.server.host, self.config.server.port)
            .parse()
            .map_err(|e| Error::Config(format!("Invalid server address: {e}")))?;

        let app = create_router(self.state());
        let listener = TcpListener::bind(addr).await?;

        let tenant = self.state.engine.tenant();
        info!("FEEDS AUTH v{}", env!("CARGO_PKG_VERSION"));
        info!(host = %self.config.server.host, port = %self.config.server.port, "Listening");
        info!(app_id = %tenant.app_id(), key_id = %tenant.key_id(), "Tenant");
        info!(
            "  POST http://{}:{}/feeds/tokens",
            self.config.server.host, self.config.server.port
        );
        if self.config.policy.rules.is_empty() {
            warn!(default = ?self.config.policy.default, "No policy rules configured");
        }

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Token server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}

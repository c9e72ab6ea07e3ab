//! Web server for Quill.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;

use crate::config::Config;
use crate::{Database, QuillError, Result};

use super::handlers::AppState;
use super::router::create_router;

/// Interval between cleanup passes over expired auth and view state.
const CLEANUP_INTERVAL_SECS: u64 = 3600;

/// Web server for the API.
pub struct WebServer {
    /// Server address.
    addr: SocketAddr,
    /// Application state.
    app_state: Arc<AppState>,
}

impl WebServer {
    /// Create a new web server.
    pub fn new(config: &Config, db: Database) -> Result<Self> {
        let addr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .map_err(|e| QuillError::Config(format!("invalid server address: {e}")))?;

        Ok(Self::with_state(addr, Arc::new(AppState::new(db, config)?)))
    }

    /// Create a server around prepared state.
    pub fn with_state(addr: SocketAddr, app_state: Arc<AppState>) -> Self {
        Self { addr, app_state }
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Start the cleanup background task.
    ///
    /// Runs every hour and removes expired sessions, CSRF tokens,
    /// rate-limit events and stale view markers.
    fn start_cleanup_task(state: Arc<AppState>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(CLEANUP_INTERVAL_SECS));

            // Skip the first immediate tick
            interval.tick().await;

            loop {
                interval.tick().await;
                run_cleanup(&state).await;
            }
        });
    }

    async fn bind(self) -> std::io::Result<(TcpListener, axum::Router)> {
        let state = self.app_state.clone();
        let router = create_router(self.app_state).layer(CompressionLayer::new());

        let listener = TcpListener::bind(self.addr).await?;

        // Start cleanup only after a successful bind
        Self::start_cleanup_task(state);
        tracing::info!("Cleanup task started (runs every hour)");

        Ok((listener, router))
    }

    /// Run the web server.
    pub async fn run(self) -> std::io::Result<()> {
        let (listener, router) = self.bind().await?;
        tracing::info!(addr = %listener.local_addr()?, "Web server listening");

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
    }

    /// Run the server in the background and return the bound address.
    ///
    /// Useful for tests binding to port 0.
    pub async fn run_with_addr(self) -> std::io::Result<SocketAddr> {
        let (listener, router) = self.bind().await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, "Web server listening");

        tokio::spawn(async move {
            if let Err(e) = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            {
                tracing::error!(error = %e, "Web server error");
            }
        });

        Ok(local_addr)
    }
}

/// One cleanup pass. Failures are logged and the next pass retries.
async fn run_cleanup(state: &AppState) {
    let report = |what: &'static str, result: Result<u64>| match result {
        Ok(0) => tracing::debug!(what, "Nothing to clean up"),
        Ok(count) => tracing::info!(what, deleted_count = count, "Cleaned up expired records"),
        Err(e) => tracing::warn!(what, error = %e, "Cleanup failed"),
    };

    report("sessions", state.auth.cleanup_sessions().await);
    report("csrf_tokens", state.csrf.cleanup().await);
    report("rate_limit_events", state.auth.limiter().cleanup().await);
    report("post_views", state.blog.cleanup_views().await);
}

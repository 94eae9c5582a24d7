// crates/fanout-bus-cli/src/server.rs
// ============================================================================
// Module: Fanout Bus Ingress Server
// Description: HTTP ingress and config reconciliation for the fan-out engine.
// Purpose: Bind the engine to a listener and keep its routing table current.
// Dependencies: axum, fanout-bus-broker, fanout-bus-config, tokio
// ============================================================================

//! ## Overview
//! [`FanoutServer`] builds the engine from a [`FanoutBusConfig`], serves
//! inbound events over HTTP, and runs a [`ConfigReloader`] that installs
//! edited configuration files without a restart.
//! Invariants:
//! - Only `POST` requests reach the engine.
//! - The channel is resolved from the request `Host`; a request without one
//!   is audited as a routing miss.
//! - A reloader task that ends abnormally fails the server on shutdown.
//! - A config file that fails to load or build never replaces the active table.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use std::time::SystemTime;

use axum::Router;
use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::Uri;
use axum::http::header::HOST;
use fanout_bus_broker::FanoutAuditSink;
use fanout_bus_broker::FanoutOptions;
use fanout_bus_broker::FileAuditSink;
use fanout_bus_broker::HttpTransport;
use fanout_bus_broker::InboundRequest;
use fanout_bus_broker::InstallOutcome;
use fanout_bus_broker::MultiChannelFanoutHandler;
use fanout_bus_broker::NoopAuditSink;
use fanout_bus_broker::RouteAuditEvent;
use fanout_bus_broker::StderrAuditSink;
use fanout_bus_broker::SwapAuditEvent;
use fanout_bus_broker::SwappableHandler;
use fanout_bus_broker::ValidatingReceiver;
use fanout_bus_config::AuditConfig;
use fanout_bus_config::AuditSinkKind;
use fanout_bus_config::FanoutBusConfig;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Lower bound on the reload poll interval.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

// ============================================================================
// SECTION: Fanout Server
// ============================================================================

/// Ingress server wrapping a hot-swappable fan-out engine.
pub struct FanoutServer {
    /// Configuration the server was built from.
    config: FanoutBusConfig,
    /// Active engine.
    handler: Arc<SwappableHandler>,
    /// Audit sink shared with the engine.
    audit: Arc<dyn FanoutAuditSink>,
}

impl FanoutServer {
    /// Builds the engine and its initial routing table from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when the configuration is invalid or the
    /// engine cannot be initialized.
    pub fn from_config(config: FanoutBusConfig) -> Result<Self, ServerError> {
        config.validate().map_err(|err| ServerError::Config(err.to_string()))?;
        let audit = build_audit_sink(&config.audit)?;
        let transport = HttpTransport::new().map_err(|err| ServerError::Init(err.to_string()))?;
        let options = FanoutOptions::builder()
            .transport(transport)
            .receiver(ValidatingReceiver::new(config.server.max_body_bytes))
            .audit(Arc::clone(&audit))
            .timeout(config.fanout.timeout())
            .build()
            .map_err(|err| ServerError::Init(err.to_string()))?;
        let table = config.fanout_config().map_err(|err| ServerError::Config(err.to_string()))?;
        let handler = MultiChannelFanoutHandler::new(table, options)
            .map_err(|err| ServerError::Init(err.to_string()))?;
        Ok(Self {
            config,
            handler: Arc::new(SwappableHandler::new(handler)),
            audit,
        })
    }

    /// Returns the configuration the server was built from.
    #[must_use]
    pub const fn config(&self) -> &FanoutBusConfig {
        &self.config
    }

    /// Returns a shared handle to the engine.
    #[must_use]
    pub fn handler(&self) -> Arc<SwappableHandler> {
        Arc::clone(&self.handler)
    }

    /// Builds the ingress router.
    #[must_use]
    pub fn router(&self) -> Router {
        ingress_router(Arc::clone(&self.handler), self.config.server.max_body_bytes)
    }

    /// Returns the reloader for the configuration source, if reloading is
    /// enabled and the configuration came from a file.
    #[must_use]
    pub fn reloader(&self) -> Option<ConfigReloader> {
        let path = self.config.source_path.clone()?;
        let interval = self.config.reload.poll_interval()?;
        Some(ConfigReloader {
            path,
            interval,
            last_modified: self.config.source_modified_at,
            handler: Arc::clone(&self.handler),
            audit: Arc::clone(&self.audit),
        })
    }

    /// Binds the configured address and serves until `Ctrl-C`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        let addr =
            self.config.server.bind_addr().map_err(|err| ServerError::Config(err.to_string()))?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|err| ServerError::Transport(format!("bind {addr} failed: {err}")))?;
        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                trigger.cancel();
            }
        });
        self.serve_listener(listener, shutdown).await
    }

    /// Serves on an already bound listener until `shutdown` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Transport`] when the server fails.
    pub async fn serve_listener(
        self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), ServerError> {
        let reloader = self.reloader().map(|reloader| {
            let cancel = shutdown.child_token();
            tokio::spawn(reloader.run(cancel))
        });
        let app = self.router();
        let audit = Arc::clone(&self.audit);
        let signal = shutdown.clone();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move { signal.cancelled().await })
            .await
            .map_err(|err| ServerError::Transport(format!("http server failed: {err}")));
        shutdown.cancel();
        let reloaded = match reloader {
            Some(task) => join_reloader(task, audit.as_ref()).await,
            None => Ok(()),
        };
        result.and(reloaded)
    }
}

/// Waits for the reloader task and reports an abnormal exit.
async fn join_reloader(
    task: JoinHandle<()>,
    audit: &dyn FanoutAuditSink,
) -> Result<(), ServerError> {
    task.await.map_err(|err| {
        let reason = format!("config reloader stopped: {err}");
        audit.record_swap(&SwapAuditEvent::rejected(reason.clone()));
        ServerError::Transport(reason)
    })
}

/// Builds the audit sink selected by configuration.
fn build_audit_sink(config: &AuditConfig) -> Result<Arc<dyn FanoutAuditSink>, ServerError> {
    match config.sink {
        AuditSinkKind::Stderr => Ok(Arc::new(StderrAuditSink)),
        AuditSinkKind::None => Ok(Arc::new(NoopAuditSink)),
        AuditSinkKind::File => {
            let path = config.path.as_deref().ok_or_else(|| {
                ServerError::Config("audit.sink=file requires audit.path".to_string())
            })?;
            let sink = FileAuditSink::new(path)
                .map_err(|err| ServerError::Init(format!("audit log {}: {err}", path.display())))?;
            Ok(Arc::new(sink))
        }
    }
}

// ============================================================================
// SECTION: Ingress
// ============================================================================

/// Builds a router delivering every `POST` to the engine.
pub fn ingress_router(handler: Arc<SwappableHandler>, max_body_bytes: usize) -> Router {
    Router::new()
        .fallback(handle_ingress)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(handler)
}

/// Handles one inbound event.
async fn handle_ingress(
    State(handler): State<Arc<SwappableHandler>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if method != Method::POST {
        return StatusCode::METHOD_NOT_ALLOWED;
    }
    let Some(host) = request_host(&headers, &uri) else {
        let event = RouteAuditEvent::new("", "request has no host");
        handler.get_config().options().audit().record_route(&event);
        return StatusCode::BAD_REQUEST;
    };
    match handler.handle(InboundRequest::new(host, headers, body)).await {
        Ok(()) => StatusCode::OK,
        Err(err) => {
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Resolves the request host from the `Host` header or the request target.
pub fn request_host(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    let from_header = headers.get(HOST).and_then(|value| value.to_str().ok());
    let host = from_header.or_else(|| uri.authority().map(|authority| authority.as_str()))?;
    let host = host.trim();
    if host.is_empty() { None } else { Some(host.to_string()) }
}

// ============================================================================
// SECTION: Config Reloader
// ============================================================================

/// Result of a single reload poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// The file has not been modified since the last poll.
    Idle,
    /// The file changed but described the active table.
    Unchanged,
    /// A new routing table was installed.
    Installed,
    /// The file could not be loaded or installed.
    Rejected(String),
}

/// Polls the configuration file and installs edited routing tables.
///
/// Only the channel table is reconciled; server, fanout and audit settings
/// apply at startup.
pub struct ConfigReloader {
    /// Configuration file being watched.
    path: PathBuf,
    /// Poll interval.
    interval: Duration,
    /// Modification time of the last file seen.
    last_modified: Option<SystemTime>,
    /// Engine receiving new tables.
    handler: Arc<SwappableHandler>,
    /// Sink for load failures.
    audit: Arc<dyn FanoutAuditSink>,
}

impl ConfigReloader {
    /// Creates a reloader for `path`.
    #[must_use]
    pub fn new(
        path: PathBuf,
        interval: Duration,
        handler: Arc<SwappableHandler>,
        audit: Arc<dyn FanoutAuditSink>,
    ) -> Self {
        let last_modified = fs::metadata(&path).and_then(|meta| meta.modified()).ok();
        Self {
            path,
            interval,
            last_modified,
            handler,
            audit,
        }
    }

    /// Polls until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval.max(MIN_POLL_INTERVAL));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                _ = ticker.tick() => {
                    self.poll_once();
                }
            }
        }
    }

    /// Checks the file once and installs it when its modification time moved.
    pub fn poll_once(&mut self) -> ReloadOutcome {
        let modified = match fs::metadata(&self.path).and_then(|meta| meta.modified()) {
            Ok(modified) => modified,
            Err(err) => {
                let reason = format!("config {} unreadable: {err}", self.path.display());
                if self.last_modified.take().is_some() {
                    self.audit.record_swap(&SwapAuditEvent::rejected(reason.clone()));
                }
                return ReloadOutcome::Rejected(reason);
            }
        };
        if self.last_modified == Some(modified) {
            return ReloadOutcome::Idle;
        }
        self.last_modified = Some(modified);
        let table = match FanoutBusConfig::load(Some(&self.path))
            .and_then(|config| config.fanout_config())
        {
            Ok(table) => table,
            Err(err) => {
                let reason = err.to_string();
                self.audit.record_swap(&SwapAuditEvent::rejected(reason.clone()));
                return ReloadOutcome::Rejected(reason);
            }
        };
        match self.handler.install(table) {
            Ok(InstallOutcome::Unchanged) => ReloadOutcome::Unchanged,
            Ok(InstallOutcome::Installed(_)) => ReloadOutcome::Installed,
            Err(err) => ReloadOutcome::Rejected(err.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Ingress server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================

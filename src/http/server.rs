//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router and wire up middleware (tracing, request ID,
//!   timeout, response cache)
//! - Construct the forwarding engine and cache store from config
//! - Bind the server to a listener and serve with graceful shutdown
//! - Convert engine errors into 502 responses

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::cache::middleware::{self, SkipCache};
use crate::cache::store::Store;
use crate::config::ProxyConfig;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::proxy::{ForwardingEngine, InvalidTarget, Target};

/// Application state injected into handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ForwardingEngine>,
    pub store: Arc<Store>,
    pub cache_enabled: bool,
    pub max_object_bytes: usize,
}

/// HTTP server for the caching reverse proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    store: Arc<Store>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// Fails when the configured target URL does not parse; callers are
    /// expected to treat that as fatal.
    pub fn new(config: ProxyConfig) -> Result<Self, InvalidTarget> {
        let target = Target::parse(&config.upstream.target_url)?;

        let client: Client<HttpConnector, Body> =
            Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let engine = ForwardingEngine::new(
            target,
            client,
            Duration::from_millis(config.upstream.flush_interval_ms),
        );
        let store = Arc::new(Store::new(Duration::from_secs(config.cache.ttl_secs)));

        let state = AppState {
            engine,
            store: store.clone(),
            cache_enabled: config.cache.enabled,
            max_object_bytes: config.cache.max_object_bytes,
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            store,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state.clone())
            .layer(axum::middleware::from_fn_with_state(
                state,
                middleware::handle,
            ))
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let shutdown = Shutdown::new();
        {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Shutdown signal received");
                    shutdown.trigger();
                }
            });
        }

        if self.config.cache.enabled {
            self.store.clone().spawn_janitor(
                Duration::from_secs(self.config.cache.sweep_interval_secs),
                shutdown.subscribe(),
            );
        }

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        let mut stop = shutdown.subscribe();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Main proxy handler: delegates to the forwarding engine.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start_time = Instant::now();
    let method = request.method().to_string();

    match state.engine.forward(&addr.to_string(), request).await {
        Ok(response) => {
            metrics::record_request(&method, response.status().as_u16(), start_time);
            response
        }
        Err(err) => {
            let status = err.status();
            tracing::error!(error = %err, status = %status, "forwarding failed");
            metrics::record_request(&method, status.as_u16(), start_time);

            // Mark the response so the cache never stores a failed forward.
            let mut response = (status, "upstream request failed").into_response();
            response.extensions_mut().insert(SkipCache);
            response
        }
    }
}

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;
use tokengate_auth::http::{TokenState, token_handler};
use tokengate_auth::jwks::ClientJwksCache;
use tokengate_auth::oauth::TokenEndpointService;
use tokengate_auth::storage::{
    ClientStorage, InMemoryAuthorizationCodeStorage, InMemoryClientStorage, InMemoryJtiStorage,
};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use crate::{cleanup::StorageSweeper, config::AppConfig, issuer::OpaqueTokenIssuer};

pub struct TokengateServer {
    addr: SocketAddr,
    app: Router,
    service: Arc<TokenEndpointService>,
    cleanup_task: JoinHandle<()>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

pub fn build_app(cfg: &AppConfig, state: TokenState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/token", post(token_handler))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http.request",
                    http.method = %req.method(),
                    http.target = %req.uri().path(),
                )
            }),
        )
        .layer(axum::extract::DefaultBodyLimit::max(
            cfg.server.body_limit_bytes,
        ))
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    /// Seeds the configured clients and wires the token endpoint.
    pub async fn build(self) -> anyhow::Result<TokengateServer> {
        self.config.validate().map_err(anyhow::Error::msg)?;

        let clients = Arc::new(InMemoryClientStorage::new());
        for client in &self.config.clients {
            clients.create(client).await?;
            tracing::info!(
                client_id = %client.client_id,
                auth_method = %client.token_endpoint_auth_method,
                "Client registered"
            );
        }

        let key_resolver = Arc::new(ClientJwksCache::new(self.config.auth.jwks.clone())?);
        let codes = Arc::new(InMemoryAuthorizationCodeStorage::new());
        let jti = Arc::new(InMemoryJtiStorage::new());
        let service = Arc::new(TokenEndpointService::new(
            &self.config.auth,
            clients,
            codes.clone(),
            jti.clone(),
            key_resolver,
        ));
        let cleanup_task = Arc::new(StorageSweeper::new(
            codes,
            jti,
            self.config.storage.cleanup_interval,
        ))
        .start_cleanup_task();
        let issuer = Arc::new(OpaqueTokenIssuer::new(self.config.tokens.clone()));
        let app = build_app(&self.config, TokenState::new(service.clone(), issuer));

        Ok(TokengateServer {
            addr: self.addr,
            app,
            service,
            cleanup_task,
        })
    }
}

impl TokengateServer {
    pub fn router(&self) -> Router {
        self.app.clone()
    }

    /// The token endpoint service behind `/token`.
    pub fn service(&self) -> &Arc<TokenEndpointService> {
        &self.service
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        let served = axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await;
        self.cleanup_task.abort();
        served?;
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

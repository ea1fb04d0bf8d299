//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, timeout, request ID, metrics)
//! - Guard host callbacks and admin routes with bearer keys
//! - Serve on a bound listener until shutdown

use alloy::primitives::{Address, U256};
use axum::{
    extract::{MatchedPath, Request},
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::NodeConfig;
use crate::http::{auth, handlers};
use crate::observability::metrics;
use crate::router::matching::MatchingStrategy;
use crate::router::shared::SharedRouter;
use crate::streaming::memory::MemoryHost;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: SharedRouter<MemoryHost>,
    pub config: Arc<NodeConfig>,
    pub matching: Arc<dyn MatchingStrategy>,
    pub unit_scale: U256,
    /// Token assumed when a callback does not name one.
    pub token: Address,
}

impl AppState {
    pub fn new(config: Arc<NodeConfig>, router: SharedRouter<MemoryHost>) -> Self {
        Self {
            router,
            matching: Arc::from(config.matching.strategy.build()),
            unit_scale: U256::from(config.matching.unit_scale),
            token: config.router.token,
            config,
        }
    }
}

/// HTTP server for the router node.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        let router = Self::build_router(state);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState) -> Router {
        let timeout = Duration::from_secs(state.config.server.request_timeout_secs);

        let host_routes = Router::new()
            .route("/streams", post(handlers::create_stream))
            .route(
                "/streams/{contributor}",
                put(handlers::update_stream).delete(handlers::delete_stream),
            )
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::require_host_key,
            ));

        let admin_routes = Router::new()
            .route("/admin/recipients", post(handlers::register_recipient))
            .route("/admin/distribution", post(handlers::initialize_distribution))
            .route(
                "/admin/distribution/refresh",
                post(handlers::refresh_distribution),
            )
            .route("/admin/snapshot", post(handlers::save_snapshot))
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::require_admin_key,
            ));

        let query_routes = Router::new()
            .route("/flows/net", get(handlers::net_flow))
            .route("/flows/{recipient}", get(handlers::recipient_flow))
            .route("/recipients/{address}", get(handlers::recipient_info))
            .route(
                "/recipients/{address}/contributions",
                get(handlers::recipient_contributions),
            )
            .route("/anomalies", get(handlers::anomalies))
            .route("/status", get(handlers::status));

        Router::new()
            .merge(host_routes)
            .merge(admin_routes)
            .merge(query_routes)
            .with_state(state)
            .layer(middleware::from_fn(track_requests))
            .layer(TimeoutLayer::new(timeout))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The assembled router, for serving elsewhere or driving in tests.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Run the server on `listener` until `shutdown` resolves.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn track_requests(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let response = next.run(request).await;
    metrics::record_request(route, response.status().as_u16());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouterConfig;
    use crate::router::engine::RoutingEngine;
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode};
    use tower::ServiceExt;

    fn server() -> HttpServer {
        let owner = Address::with_last_byte(0xa0);
        let token = Address::with_last_byte(0xa2);
        let mut config = NodeConfig::default();
        config.router = RouterConfig {
            owner,
            address: Address::with_last_byte(0xa1),
            token,
            snapshot_path: None,
        };
        config.server.host_api_key = "host".to_string();
        let engine = RoutingEngine::new(&config.router, MemoryHost::new(token));
        HttpServer::new(AppState::new(Arc::new(config), SharedRouter::new(engine)))
    }

    #[tokio::test]
    async fn test_host_routes_require_bearer() {
        let response = server()
            .into_router()
            .oneshot(
                HttpRequest::delete("/streams/0x0000000000000000000000000000000000000001")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_queries_are_open() {
        let response = server()
            .into_router()
            .oneshot(HttpRequest::get("/flows/net").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_admin_requires_caller_header() {
        let response = server()
            .into_router()
            .oneshot(
                HttpRequest::post("/admin/distribution")
                    .header("authorization", "Bearer CHANGE_ME_ADMIN")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

//! Shared utilities for integration testing.

#![allow(dead_code)]

use alloy::primitives::Address;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use stream_router::config::{NodeConfig, RouterConfig};
use stream_router::http::{AppState, HttpServer};
use stream_router::lifecycle::Shutdown;
use stream_router::router::clock::ManualClock;
use stream_router::router::{RoutingEngine, SharedRouter};
use stream_router::streaming::MemoryHost;

pub const OWNER: Address = Address::with_last_byte(0xa0);
pub const ROUTER: Address = Address::with_last_byte(0xa1);
pub const TOKEN: Address = Address::with_last_byte(0xa2);

pub const HOST_KEY: &str = "host-test-key";
pub const ADMIN_KEY: &str = "admin-test-key";

pub fn contributor(n: u8) -> Address {
    Address::with_last_byte(n)
}

pub fn recipient(n: u8) -> Address {
    Address::with_last_byte(0x40 + n)
}

pub fn router_config() -> RouterConfig {
    RouterConfig {
        owner: OWNER,
        address: ROUTER,
        token: TOKEN,
        snapshot_path: None,
    }
}

pub fn node_config() -> NodeConfig {
    let mut config = NodeConfig::default();
    config.router = router_config();
    config.server.host_api_key = HOST_KEY.to_string();
    config.server.admin_api_key = ADMIN_KEY.to_string();
    config.observability.metrics_enabled = false;
    config
}

/// An engine with the distribution initialized and `recipients` registered.
pub fn engine_with(clock: ManualClock, recipients: &[Address]) -> RoutingEngine<MemoryHost> {
    let mut engine =
        RoutingEngine::with_clock(&router_config(), MemoryHost::new(TOKEN), Arc::new(clock));
    engine.initialize_distribution(OWNER).unwrap();
    for r in recipients {
        engine.register_recipient(OWNER, *r).unwrap();
    }
    engine
}

/// A running node on an ephemeral port.
pub struct TestNode {
    pub base_url: String,
    pub router: SharedRouter<MemoryHost>,
    pub shutdown: Shutdown,
    pub handle: tokio::task::JoinHandle<()>,
}

pub async fn start_node(config: NodeConfig, router: SharedRouter<MemoryHost>) -> TestNode {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let stopped = shutdown.signalled();
    let server = HttpServer::new(AppState::new(Arc::new(config), router.clone()));
    let handle = tokio::spawn(async move {
        server.run(listener, stopped).await.unwrap();
    });

    TestNode {
        base_url: format!("http://{addr}"),
        router,
        shutdown,
        handle,
    }
}

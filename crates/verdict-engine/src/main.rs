//! verdict engine daemon.
//!
//! Loads the strict YAML config, assembles the backend/abstraction/
//! composition/enforcement stack, and serves the decision API.

use std::net::SocketAddr;
use tracing_subscriber::{fmt, EnvFilter};

use verdict_engine::{app_state, config, router};

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cfg = config::load_from_file("verdict.yaml").expect("config load failed");
    let listen: SocketAddr = cfg
        .engine
        .listen
        .parse()
        .expect("engine.listen must be a valid SocketAddr");

    let state = app_state::AppState::new(cfg).expect("engine init failed");
    let app = router::build_router(state);

    tracing::info!(%listen, "verdict-engine starting");
    let listener = tokio::net::TcpListener::bind(listen).await.expect("failed to bind");

    axum::serve(listener, app).await.expect("server failed");
}

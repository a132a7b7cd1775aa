//! Serving-tier binary: wires the health monitor, circuit breakers,
//! admission gate, semantic cache, and retrieval index into one process
//! exposing the full HTTP surface.

use legalroute_router::config::Config;
use legalroute_router::state::AppState;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("prometheus recorder installs exactly once per process");

    let state = AppState::build(&config, metrics_handle);
    let addr = config.listen_addr;

    let listener = TcpListener::bind(addr).await.expect("failed to bind listen address");
    tracing::info!(%addr, "legalroute serving tier listening");

    axum::serve(listener, legalroute_router::app(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

/// Waits for either Ctrl-C or, on Unix, SIGTERM, so the process drains
/// in-flight requests before the listener is dropped.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install sigterm handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received, draining in-flight requests");
}

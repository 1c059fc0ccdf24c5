mod gzip;
mod handlers;

use std::sync::Arc;

use exchange_cache::{Cache, State as CacheState};
use exchange_core::config::Config;
use exchange_core::metrics::Metrics;
use exchange_dispatch::DispatchPool;
use exchange_transport::{Transport, TransportConfig};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::handlers::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = match Config::from_env() {
        Ok(config) => Arc::new(config),
        Err(err) => {
            error!(error = %err, "config parse failed");
            std::process::exit(1);
        }
    };

    let metrics = Arc::new(Metrics::new());

    let transport_config = TransportConfig {
        max_idle_conns: config.dspio_max_idle_conns,
        max_idle_conns_per_host: config.dspio_max_idle_conns_per_host,
        idle_conn_timeout: config.dspio_idle_conn_timeout,
        keep_alive: config.dspio_keep_alive,
        dial_timeout: config.dspio_timeout,
        response_header_timeout: config.dspio_response_header_timeout,
        expect_continue_timeout: config.dspio_expect_continue_timeout,
        force_http2: config.dspio_force_http2,
        insecure_skip_verify: config.dspio_insecure_skip_verify,
        tls_session_cache: config.dspio_tls_session_cache,
    };
    let transport = Transport::new(&transport_config, metrics.dspio_conn_dial_total.clone());

    let cache_state = CacheState::new();
    let cache = Arc::new(Cache::new(
        cache_state.clone(),
        config.apps_cache_path.clone(),
        config.dsps_cache_path.clone(),
    ));

    if exchange_cache::initial_load(&cache).await.is_err() {
        std::process::exit(1);
    }
    metrics.seed_dsp_config_info(&cache_state.dsps.load());

    let pool = Arc::new(DispatchPool::new(
        config.dspio_pool,
        transport,
        metrics.clone(),
    ));
    pool.start();
    cache.start(config.cache_update_interval);

    let state = AppState {
        config: config.clone(),
        cache: cache_state,
        pool: pool.clone(),
        metrics: metrics.clone(),
    };

    let app = handlers::router(state);

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!(addr = %config.listen_addr, "exchange listening");

    let shutdown_drain = config.shutdown_drain;
    let (drain_tx, drain_rx) = tokio::sync::oneshot::channel::<()>();

    let serve_task = tokio::spawn(
        axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = drain_rx.await;
        }),
    );

    shutdown_signal().await;
    info!("shutdown signal received; stopping background tasks");
    cache.stop();
    pool.stop();
    let _ = drain_tx.send(());

    match tokio::time::timeout(shutdown_drain, serve_task).await {
        Ok(Ok(Ok(()))) => info!("server drained within the shutdown window"),
        Ok(Ok(Err(err))) => error!(error = %err, "server error during shutdown"),
        Ok(Err(join_err)) => error!(error = %join_err, "server task panicked during shutdown"),
        Err(_) => warn!(drain = ?shutdown_drain, "shutdown drain window elapsed; exiting"),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl_c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

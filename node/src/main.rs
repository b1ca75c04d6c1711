use std::net::SocketAddr;

use anyhow::Context;
use pay_common::config::Config;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

fn init_logger() {
    let rust_log_filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|rust_log| rust_log.parse::<Targets>().ok())
        .unwrap_or_else(|| Targets::new().with_default(Level::INFO));

    let stdout_log = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(true)
        .with_filter(rust_log_filter);

    let _ = tracing_subscriber::registry().with(stdout_log).try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let config = Config::from_env().context("failed to load configuration")?;
    let deploy_env = config.deploy_env;
    let bind_addr: SocketAddr = std::env::var("Http__BindAddr")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        .parse()
        .context("Http__BindAddr was not a valid socket address")?;

    let ctx = node::config::build(config).await.context("failed to wire up components")?;
    info!(deploy_env = %deploy_env, %bind_addr, "starting");

    let monitor_task = ctx.monitor.start();

    let state = node::http::AppState::new(ctx.handlers);
    let app = node::http::router(state);
    let listener = TcpListener::bind(bind_addr).await.context("failed to bind http listener")?;

    let shutdown = ctx.shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received shutdown signal");
        shutdown.send();
    });

    let shutdown_signal = ctx.shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown_signal.recv().await })
        .await
        .context("http server error")?;

    ctx.shutdown.send();
    let _ = monitor_task.await;
    Ok(())
}

//! Tabscope server entry point
//!
//! Wires the debugger host bridge, the interactable engine, the cursor
//! coordinator, and the broadcast store into one execution context, then
//! answers staged RPC calls from the realtime channel until shutdown.

use std::sync::Arc;
use tabscope::{
    config::Config,
    context::ExecContext,
    gateway::{RpcResponder, WebSocketChannel},
    handlers::service_worker_dispatcher,
    transport::host::WebSocketDebuggerHost,
};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing - respect RUST_LOG environment variable
    let log_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|v| v.parse::<Level>().ok())
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    info!("Tabscope Server v{}", tabscope::VERSION);

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Configuration loaded: debugger={}, channel={}",
        config.debugger_http_endpoint(),
        config.channel_url
    );

    // Wire the execution context over the debugger bridge
    let host = Arc::new(WebSocketDebuggerHost::new(config.debugger_http_endpoint()));
    let ctx = ExecContext::new(config.clone(), host);
    info!("Execution context initialized");

    // Build the service-worker dispatcher and connect the realtime channel
    let dispatcher = Arc::new(service_worker_dispatcher(&ctx));
    let channel = WebSocketChannel::connect(config.channel_url.clone()).await?;

    let responder = Arc::new(RpcResponder::new(
        channel,
        config.channel_target.clone(),
        dispatcher,
    ));
    let serve_handle = responder.spawn();
    info!("Responder serving on target {}", config.channel_target);

    // Setup graceful shutdown
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = signal(SignalKind::terminate()).unwrap();
            let mut sigint = signal(SignalKind::interrupt()).unwrap();

            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT signal");
                }
            }
        }

        #[cfg(windows)]
        {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received Ctrl+C signal");
        }

        let _ = shutdown_tx.send(());
    });

    tokio::select! {
        _ = shutdown_rx => {
            info!("Shutdown signal received, stopping server...");
        }
        _ = serve_handle => {
            warn!("Responder loop ended");
        }
    }

    // Detach from everything before going down
    if let Err(e) = ctx.transports.detach().await {
        warn!("Failed to detach cleanly: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}

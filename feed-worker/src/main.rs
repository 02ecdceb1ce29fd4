//! Feedpost Worker - publish queue with HTTP and AMQP intake.
//!
//! Runs the in-memory publish queue, its periodic dispatcher, the intake web
//! server, and (when `CLOUDAMQP_URL` is set) the RabbitMQ intake consumer in
//! a single process.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Client;
use tokio::{net::TcpListener, signal, sync::watch};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use feedpost::intake::consumer;
use feedpost::{web, AppState, Config, FileStore, HttpPublisher, Intake, QueueHandler};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("worker_starting");

    // Load configuration from environment
    let config = Config::from_env();
    info!(
        publisher_url = %config.publisher_url,
        publisher_token_set = config.publisher_token.is_some(),
        config_path = %config.config_path,
        state_path = %config.state_path,
        port = config.port,
        intake_signing_configured = config.intake_signing_key.is_some(),
        amqp_intake_enabled = config.cloudamqp_url.is_some(),
        "config_loaded"
    );

    let client = Client::builder()
        .build()
        .context("Failed to create HTTP client")?;

    let publisher = HttpPublisher::new(
        client,
        &config.publisher_url,
        config.publisher_token.clone(),
        config.publisher_timeout(),
    )
    .context("Failed to create post publisher")?;
    info!(endpoint = %publisher.endpoint(), "post_publisher_ready");

    let store = Arc::new(
        FileStore::open(&config.config_path, &config.state_path)
            .await
            .context("Failed to open store")?,
    );
    info!(
        last_published = ?store.last_published().await,
        "store_ready"
    );

    let handler = QueueHandler::new(Arc::new(publisher), store.clone());

    let (stop_tx, stop_rx) = watch::channel(false);

    let scheduler = handler
        .start(stopped(stop_rx.clone()))
        .await
        .context("Failed to start queue handler")?;

    let intake = Intake::new(handler.clone(), store, config.default_languages.clone());

    // Start the AMQP intake if configured
    let amqp = config.cloudamqp_url.clone().map(|url| {
        let intake = intake.clone();
        let stop_rx = stop_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = consumer::run(&url, intake, stopped(stop_rx)).await {
                error!(error = %e, "amqp_intake_failed");
            }
        })
    });

    let app = web::router(AppState::new(config.clone(), intake));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");
    info!("worker_ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Stop the scheduler and the AMQP intake
    let _ = stop_tx.send(true);

    if let Err(e) = scheduler.await {
        warn!(error = %e, "queue_scheduler_join_failed");
    }
    if let Some(amqp) = amqp {
        if let Err(e) = amqp.await {
            warn!(error = %e, "amqp_intake_join_failed");
        }
    }

    let status = handler.status().await;
    if status.length > 0 {
        warn!(dropped_items = status.length, "queue_not_empty_at_shutdown");
    }

    info!("worker_shutdown_complete");
    Ok(())
}

/// Completes once the stop flag flips to `true`.
async fn stopped(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("worker_shutting_down");
}

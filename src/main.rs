use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod app;
mod common;
mod config;
mod docs;
mod infrastructure;
mod modules;
mod pipeline;
mod routes;
mod state;
mod workers;

use config::settings::AppConfig;
use infrastructure::db::pool;
use infrastructure::queue::rabbitmq::RabbitMqService;
use workers::video_worker::VideoWorker;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting keyframe...");

    let config = AppConfig::new()?;
    info!("Role: {:?}", config.role);

    let db = pool::connect_to_db(&config.database_url).await?;
    pool::run_migrations(&db).await?;

    let queue = RabbitMqService::new(&config.rabbitmq_url).await?;
    let shutdown = CancellationToken::new();

    let worker = if config.role.runs_worker() {
        let sequencer = Arc::new(workers::build_sequencer(&config, &db)?);
        let worker = VideoWorker::new(
            queue.clone(),
            config.video_queue.clone(),
            sequencer,
            config.worker.concurrency,
            config.worker.requeue_failed_jobs,
        );
        let token = shutdown.clone();
        Some(tokio::spawn(async move {
            let result = worker.run(token.clone()).await;
            // A dead worker takes the process down with it.
            token.cancel();
            result
        }))
    } else {
        None
    };

    if config.role.serves_http() {
        let addr = format!("0.0.0.0:{}", config.server_port);
        let app = app::create_app(state::AppState::new(config, db, queue));

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("Server running on http://{}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
            .await?;
    } else {
        shutdown_signal(shutdown.clone()).await;
    }

    if let Some(handle) = worker {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("❌ Video Worker exited with error: {:#}", e),
            Err(e) => error!("❌ Video Worker task failed: {}", e),
        }
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal(token: CancellationToken) {
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
        }
        _ = token.cancelled() => {}
    }
    token.cancel();
}

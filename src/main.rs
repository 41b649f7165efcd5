use std::sync::Arc;

use motorshop_pipeline::http::{self, AppState};
use motorshop_pipeline::worker::WorkerThread;
use motorshop_pipeline::{init_logging, AppConfig, Pipeline, SystemClock};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    init_logging("info");

    if let Err(err) = run().await {
        error!(error = %err, "motorshop exited with error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    let pipeline = Pipeline::wire(&config, Arc::new(SystemClock))?;

    let worker = WorkerThread::spawn(pipeline.prospect_worker());
    let state = Arc::new(AppState::new(&pipeline));

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    info!(addr = %listener.local_addr()?, "listening");

    http::serve_with_shutdown(state, listener, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown requested");
    })
    .await?;

    let stats = tokio::task::spawn_blocking(move || worker.stop()).await?;
    info!(
        acked = stats.acked,
        duplicates = stats.duplicates,
        abandoned = stats.abandoned,
        "worker stopped"
    );
    Ok(())
}

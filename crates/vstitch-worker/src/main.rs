//! Stitch/transcribe worker binary.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};

use vstitch_jobstore::{JobStoreConfig, PgJobStore};
use vstitch_media::{FfmpegConcat, FfmpegRunner};
use vstitch_storage::{S3ObjectStore, StorageGateway};
use vstitch_transcribe::TranscriptionClient;
use vstitch_worker::{init_tracing, metrics, JobProcessor, Scheduler, WorkerConfig, WorkerResult};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider already installed");
    }

    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting vstitch-worker");

    match run().await {
        Ok(requeued) => info!(requeued, "Worker shutdown complete"),
        Err(e) => {
            error!("Worker error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run() -> WorkerResult<u64> {
    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if let Some(addr) = config.metrics_addr {
        metrics::install_exporter(addr)?;
        info!("Serving metrics on {}", addr);
    }

    let store = PgJobStore::connect(&JobStoreConfig::from_env()?).await?;
    store.migrate().await?;

    let object_store = S3ObjectStore::from_env()?;
    info!(bucket = object_store.bucket(), "Object store configured");
    let gateway = StorageGateway::new(Arc::new(object_store));

    let runner = FfmpegRunner::from_env();
    if let Err(e) = runner.locate() {
        warn!("STITCH jobs will fail until ffmpeg is available: {}", e);
    }

    let transcriber = TranscriptionClient::from_env()?;

    let processor = Arc::new(JobProcessor::new(
        &config,
        Arc::new(store),
        gateway,
        Arc::new(FfmpegConcat::new(runner)),
        Arc::new(transcriber),
    ));
    let scheduler = Scheduler::new(&config, processor);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    scheduler.run(shutdown_rx).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal");
}

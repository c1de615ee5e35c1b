use std::path::Path;
use std::process::Command;

use vstitch_jobstore::{JobStoreConfig, PgJobStore};
use vstitch_storage::S3ObjectStore;
use vstitch_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("worker-selfcheck: rustls crypto provider already installed");
    }
    dotenvy::dotenv().ok();

    let config = WorkerConfig::from_env();

    println!(
        "worker-selfcheck: starting with staging_dir={}",
        config.staging_dir.display()
    );
    ensure_staging_dir(&config.staging_dir).await?;
    ensure_ffmpeg()?;
    ensure_env_present(&[
        "DATABASE_URL",
        "STORAGE_ENDPOINT_URL",
        "STORAGE_ACCESS_KEY_ID",
        "STORAGE_SECRET_ACCESS_KEY",
        "TRANSCRIPTION_BASE_URL",
    ])?;
    ensure_database().await?;
    ensure_bucket().await?;

    println!("worker-selfcheck: ok");
    Ok(())
}

async fn ensure_staging_dir(path: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path).await?;

    let probe = path.join(".selfcheck");
    tokio::fs::write(&probe, b"ok")
        .await
        .map_err(|e| anyhow::anyhow!("staging dir {} not writable: {}", path.display(), e))?;
    tokio::fs::remove_file(&probe).await?;
    Ok(())
}

fn ensure_ffmpeg() -> anyhow::Result<()> {
    let binary = std::env::var("FFMPEG_BIN").unwrap_or_else(|_| "ffmpeg".to_string());
    let output = Command::new(&binary)
        .arg("-version")
        .output()
        .map_err(|e| anyhow::anyhow!("{} not available: {}", binary, e))?;

    if !output.status.success() {
        return Err(anyhow::anyhow!(
            "{} -version failed: {:?}",
            binary,
            output.status
        ));
    }
    Ok(())
}

fn ensure_env_present(vars: &[&str]) -> anyhow::Result<()> {
    for var in vars {
        if std::env::var(var).is_err() {
            return Err(anyhow::anyhow!("missing required env var {}", var));
        }
    }
    Ok(())
}

async fn ensure_database() -> anyhow::Result<()> {
    let store = PgJobStore::connect(&JobStoreConfig::from_env()?).await?;
    store.ping().await?;
    Ok(())
}

async fn ensure_bucket() -> anyhow::Result<()> {
    let store = S3ObjectStore::from_env()?;
    store
        .check_connectivity()
        .await
        .map_err(|e| anyhow::anyhow!("bucket {} unreachable: {}", store.bucket(), e))?;
    Ok(())
}

use sy_core::SyncConfig;
use sy_server::ServerConfig;
use tracing::debug;

use super::Result;

pub async fn handle_index(cfg: SyncConfig) -> Result<()> {
    debug!(config = %config_json(&cfg), "index config");
    let report = sy_core::run(&cfg).await?;
    println!(
        "indexed {} files ({} chunks, {} new, {} bytes read)",
        report.files, report.chunks, report.new_chunks, report.bytes_read
    );
    println!(
        "uploaded {} chunks ({} bytes) in {} batches, {} already on server",
        report.upload.uploaded,
        report.upload.bytes_uploaded,
        report.upload.batches,
        report.upload.skipped_remote
    );
    Ok(())
}

pub async fn handle_server(cfg: ServerConfig) -> Result<()> {
    debug!(config = %config_json(&cfg), "server config");
    sy_server::serve(cfg).await?;
    Ok(())
}

fn config_json<T: serde::Serialize>(cfg: &T) -> String {
    serde_json::to_string(cfg).unwrap_or_default()
}

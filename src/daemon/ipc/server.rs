use super::handlers::handle_client;
use crate::common::LogLevel;
use crate::core::engine::ChangeEvent;
use crate::daemon::worker::WorkerHandle;
use anyhow::{Context, Result};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use tokio::net::UnixListener;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct IpcHandles {
    pub worker: WorkerHandle,
    pub events: broadcast::Sender<ChangeEvent>,
    pub set_log_level: Arc<dyn Fn(LogLevel) + Send + Sync>,
}

pub async fn start<P: AsRef<Path>>(path: P, h: IpcHandles) -> Result<()> {
    let path_ref = path.as_ref();
    let _ = std::fs::remove_file(path_ref);
    let listener = UnixListener::bind(path_ref)
        .context(format!("Failed to bind {}", path_ref.display()))?;
    let _ = std::fs::set_permissions(path_ref, std::fs::Permissions::from_mode(0o660));
    tracing::debug!(target: "altscreen::ipc", "IPC listening at {:?}", path_ref);

    loop {
        let (stream, _) = listener.accept().await?;
        let hc = h.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, hc).await {
                tracing::warn!(target: "altscreen::ipc", "client error: {:?}", e);
            }
        });
    }
}

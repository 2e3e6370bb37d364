use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tokio::signal::unix::{SignalKind, signal as unix_signal};
use tokio::sync::broadcast;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use crate::common::LogLevel;
use crate::core::device::AndroidDevice;
use crate::core::engine::{ChangeEvent, Engine, Notifier, Sinks};
use crate::core::sink::{ShellSink, SpoolHelper};
use crate::core::store::{ProfileStore, TomlStore};
use crate::daemon::ipc::{self, IpcHandles};
use crate::daemon::worker::{self, Request};

pub use crate::daemon::config::DaemonConfig;

const EVENT_CAPACITY: usize = 32;

pub type ReloadHandle =
    tracing_subscriber::reload::Handle<tracing_subscriber::EnvFilter, tracing_subscriber::Registry>;

fn build_sinks(cfg: &DaemonConfig) -> Sinks {
    let shell = &cfg.settings.shell;
    Sinks {
        primary: Box::new(ShellSink::new(&shell.privileged_shell, shell.timeout_ms)),
        fallback: Box::new(ShellSink::new(&shell.fallback_shell, shell.timeout_ms)),
        helper: Box::new(SpoolHelper::new(&cfg.settings.helper.spool_dir)),
    }
}

fn log_level_setter(handle: ReloadHandle) -> Arc<dyn Fn(LogLevel) + Send + Sync> {
    Arc::new(move |lvl: LogLevel| {
        match handle.reload(EnvFilter::new(lvl.to_string())) {
            Ok(_) => debug!(target: "altscreen::ipc", "Log level changed to {:?}", lvl),
            Err(e) => error!(target: "altscreen::ipc", "Failed to change log level: {}", e),
        }
    })
}

async fn shutdown_signal() {
    let term = async {
        match unix_signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!(target: "altscreen::daemon", "Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        r = signal::ctrl_c() => {
            if let Err(e) = r {
                error!(target: "altscreen::daemon", "Failed to listen for ctrl-c: {e}");
            }
        }
        _ = term => {}
    }
    info!(target: "altscreen::daemon", "Shutdown signal received");
}

pub async fn run_with_config(cfg: &DaemonConfig, filter_handle: ReloadHandle) -> Result<()> {
    let settings = &cfg.settings;
    let backend = TomlStore::open(&settings.daemon.store_dir)
        .context("Failed to open profile store")?;
    let saved_dir = backend.saved_dir();
    let store = ProfileStore::new(backend);

    let (events, _) = broadcast::channel::<ChangeEvent>(EVENT_CAPACITY);
    let tx = events.clone();
    let notifier: Notifier = Arc::new(move |event| {
        debug!(target: "altscreen::daemon", "Change event: {}", event);
        let _ = tx.send(event);
    });

    let engine = Engine::new(
        store,
        AndroidDevice::new(),
        cfg.caps.clone(),
        build_sinks(cfg),
        settings.timing,
    )
    .with_notifier(notifier);

    let handle = worker::spawn(engine, settings.timing.boot_settle_ms);
    // Covers a reboot that happened while a profile was active.
    handle.submit(Request::Reapply);

    crate::daemon::watcher::start_profile_watcher(saved_dir, events.clone());

    let ipc_handles = IpcHandles {
        worker: handle,
        events,
        set_log_level: log_level_setter(filter_handle),
    };

    let socket_path = settings.daemon.socket_path.clone();
    tokio::spawn(async move {
        debug!(target: "altscreen::daemon", "Starting IPC socket listener...");
        match ipc::start(&socket_path, ipc_handles).await {
            Ok(_) => info!(target: "altscreen::daemon", "IPC    | Listener stopped"),
            Err(e) => error!(target: "altscreen::daemon", "IPC    | Error: {:?}", e),
        }
    });

    shutdown_signal().await;
    let _ = std::fs::remove_file(&settings.daemon.socket_path);
    info!(target: "altscreen::daemon", "Exiting daemon");
    Ok(())
}

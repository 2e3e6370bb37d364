use altscreen::Result;
use altscreen::common::LogLevel;
use altscreen::daemon;
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let base_filter = EnvFilter::new("info");
    let (filter_layer, filter_handle) = reload::Layer::new(base_filter);
    let timer = fmt::time::UtcTime::new(time::macros::format_description!("[hour]:[minute]:[second]"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_level(false)
                .with_timer(timer)
                .with_writer(std::io::stderr),
        )
        .init();

    let cfg = daemon::config::DaemonConfig::load()?;
    if let Some(level) = LogLevel::from_str_ignore_case(&cfg.settings.daemon.log_level)
        && level != LogLevel::Info
    {
        filter_handle.reload(EnvFilter::new(level.to_string()))?;
    }

    tracing::info!(
        "AltScreen v{} started (api={}, secure_settings={}, store={})",
        env!("CARGO_PKG_VERSION"),
        cfg.caps.api_level,
        cfg.caps.secure_settings,
        cfg.settings.daemon.store_dir.display()
    );

    daemon::run::run_with_config(&cfg, filter_handle).await
}

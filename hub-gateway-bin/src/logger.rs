use anyhow::{Context, Result};
use hub_gateway_models::LogSettings;
use tracing::subscriber::set_global_default;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Owns the rolling-file writer guard; dropping it stops log flushing, so
/// the instance must outlive every logging call site.
pub struct Logger {
    _file_guard: WorkerGuard,
}

impl Logger {
    /// Installs the global subscriber: console output plus a daily rolling
    /// file under the configured directory.
    pub fn init(settings: &LogSettings) -> Result<Self> {
        let file_appender = rolling::daily(&settings.dir, &settings.file_prefix);
        let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);

        let filter = EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .parse_lossy(&settings.level);

        #[cfg(debug_assertions)]
        let console_layer = fmt::layer().pretty().with_writer(std::io::stdout);
        #[cfg(not(debug_assertions))]
        let console_layer = fmt::layer().with_writer(std::io::stdout);

        let file_layer = fmt::layer().with_writer(file_writer).with_ansi(false);

        let subscriber = Registry::default()
            .with(filter)
            .with(console_layer)
            .with(file_layer);
        set_global_default(subscriber).context("failed to install the log subscriber")?;

        Ok(Logger {
            _file_guard: file_guard,
        })
    }
}

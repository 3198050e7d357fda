//! Subscriber setup for the CLI: console narration plus an optional log file.

use std::path::PathBuf;

use db_infra::config::{LogFormat, LogRotation, LoggingConfig};
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Used until the logging settings resolve (or when they do not).
const FALLBACK_LEVEL: &str = "info";
/// Driver chatter stays quiet unless asked for through `RUST_LOG`.
const QUIET_DEPENDENCIES: &str = "sqlx=warn,sea_orm=warn";

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to create log directory {path}: {source}")]
    LogDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to open log file: {0}")]
    Appender(#[from] InitError),

    #[error("failed to install subscriber: {0}")]
    Subscriber(#[from] TryInitError),
}

/// Keeps the file writer alive. Drop it only at shutdown.
#[must_use = "dropping the handle stops the log file writer"]
pub struct Telemetry {
    _file_guard: Option<WorkerGuard>,
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level. Without settings only the
/// console layer is installed.
pub fn init(settings: Option<&LoggingConfig>) -> Result<Telemetry, TelemetryError> {
    let level = settings.map_or(FALLBACK_LEVEL, |s| s.level.filter_directive());
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{level},{QUIET_DEPENDENCIES}")));

    let mut layers = Vec::new();
    layers.push(
        fmt::layer()
            .with_writer(std::io::stdout)
            .without_time()
            .with_target(false)
            .boxed(),
    );

    let mut file_guard = None;
    if let Some(settings) = settings.filter(|s| s.write_to_file) {
        std::fs::create_dir_all(settings.log_dir()).map_err(|source| TelemetryError::LogDir {
            path: settings.log_dir().to_path_buf(),
            source,
        })?;

        let appender = RollingFileAppender::builder()
            .rotation(rotation(settings.rotation))
            .filename_prefix("app")
            .filename_suffix("log")
            .max_log_files(settings.retention.max(1))
            .build(settings.log_dir())?;
        let (writer, guard) = tracing_appender::non_blocking(appender);
        file_guard = Some(guard);

        let file_layer = fmt::layer().with_writer(writer).with_ansi(false);
        layers.push(match settings.format {
            LogFormat::Json => file_layer.json().boxed(),
            LogFormat::Pretty => file_layer.boxed(),
        });
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(layers)
        .try_init()?;

    Ok(Telemetry {
        _file_guard: file_guard,
    })
}

fn rotation(rotation: LogRotation) -> Rotation {
    match rotation {
        LogRotation::Minutely => Rotation::MINUTELY,
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Never => Rotation::NEVER,
    }
}

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Install the global subscriber: stdout plus a daily `logs/app.log`.
///
/// The returned guard flushes the file writer on drop, keep it alive in `main`.
pub fn init_logger(log_dir: &str) -> Result<WorkerGuard> {
    let log_level = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,docchat_server=debug,tower_http=info".to_string());

    // pretty | json
    let log_format = std::env::var("LOG_FORMAT")
        .unwrap_or_else(|_| "pretty".to_string());

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("app")
        .filename_suffix("log")
        .build(log_dir)?;
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_new(&log_level)?;

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stdout)
                        .with_target(true)
                        .with_level(true)
                        .with_thread_ids(true)
                )
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(file_writer)
                        .with_target(true)
                        .with_level(true)
                        .with_thread_ids(true)
                )
                .try_init()?;
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .pretty()
                        .with_writer(std::io::stdout)
                        .with_target(true)
                        .with_level(true)
                        .with_thread_ids(false)
                )
                .with(
                    fmt::layer()
                        .with_writer(file_writer)
                        .with_target(true)
                        .with_level(true)
                        .with_ansi(false)
                )
                .try_init()?;
        }
    }

    Ok(guard)
}

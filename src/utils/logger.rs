use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Debug, Clone, Default)]
pub struct LoggerOptions<'a> {
    pub verbose: bool,
    pub json: bool,
    /// Level for this crate's targets when RUST_LOG is unset, e.g. "warn".
    pub level: Option<&'a str>,
    /// Mirror log lines into this file (plain text, no ANSI).
    pub file: Option<&'a Path>,
}

fn default_filter(options: &LoggerOptions<'_>) -> EnvFilter {
    let directive = match (options.verbose, options.level) {
        (true, _) => "small_ingest=debug,info".to_string(),
        (false, Some(level)) => format!("small_ingest={}", level),
        (false, None) => "small_ingest=info".to_string(),
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive))
}

/// Installs the global subscriber. Keep the returned guard alive for the
/// whole run, dropping it flushes the file writer.
pub fn init_logger(options: &LoggerOptions<'_>) -> Option<WorkerGuard> {
    let console = if options.json {
        fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .json()
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .boxed()
    };

    let (file_layer, guard) = match options.file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .map(|name| name.to_os_string())
                .unwrap_or_else(|| "etl_log.log".into());
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .with(default_filter(options))
        .init();

    guard
}

use anyhow::{Context, Result};
use camino::Utf8Path;
use std::fs;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Log filter for the given mode.
///
/// `RUST_LOG` wins when set; otherwise `debug` or `info`.
fn log_filter(debug_mode: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if debug_mode {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    })
}

fn ensure_log_dir(log_dir: &str) -> Result<()> {
    let log_path = Utf8Path::new(log_dir);
    if !log_path.exists() {
        fs::create_dir_all(log_path)
            .with_context(|| format!("Failed to create log directory: {}", log_dir))?;
    }
    Ok(())
}

/// Setup logging with a daily rotating file and optional console output.
///
/// # Arguments
/// * `log_dir` - Directory for log files (e.g., "logs")
/// * `log_prefix` - Prefix for log files (e.g., "modweave")
/// * `debug_mode` - If true, use debug level; otherwise use info level
/// * `console_output` - If true, also log to stderr
///
/// # Returns
/// A guard that must be held for the duration of the program to keep logging active
pub fn setup_logging_with_console(
    log_dir: &str,
    log_prefix: &str,
    debug_mode: bool,
    console_output: bool,
) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    ensure_log_dir(log_dir)?;

    let file_appender = rolling::daily(log_dir, log_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false) // No ANSI codes in log files
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    // Stdout belongs to command output
    let console_layer = console_output.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(log_filter(debug_mode))
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::info!(
        "Logging initialized: dir={}, prefix={}, debug={}, console={}",
        log_dir,
        log_prefix,
        debug_mode,
        console_output
    );

    Ok(guard)
}

//! Logging setup for chainchat using tracing.

use anyhow::Result;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_DIRECTIVES: &str = "info,chainchat=debug,tower_http=debug";

/// Log sink options, taken from the command line.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Write the file log as JSON lines.
    pub json: bool,
    /// Directory for the rolling file (defaults to the platform data dir).
    pub dir: Option<PathBuf>,
    /// Filter used when `RUST_LOG` is unset, e.g. `warn` or `chainchat=trace`.
    pub level: Option<String>,
}

/// Filter directives: `RUST_LOG` wins, then the configured level, then the
/// defaults.
fn directives(env: Option<String>, level: Option<&str>) -> String {
    env.filter(|v| !v.trim().is_empty())
        .or_else(|| {
            level
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
        })
        .unwrap_or_else(|| DEFAULT_DIRECTIVES.to_string())
}

/// Initialize logging: a daily rolling file plus colored stderr.
///
/// The returned guard must live as long as the process, or buffered file
/// lines are lost on exit.
pub fn init(options: &LogOptions) -> Result<(WorkerGuard, PathBuf)> {
    let log_dir = match &options.dir {
        Some(dir) => dir.clone(),
        None => get_log_dir()?,
    };
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "chainchat.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_new(directives(
        std::env::var("RUST_LOG").ok(),
        options.level.as_deref(),
    ))?;

    let plain_file = (!options.json).then(|| {
        fmt::layer()
            .with_writer(writer.clone())
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
    });
    let json_file = options.json.then(|| {
        fmt::layer()
            .json()
            .with_writer(writer)
            .with_current_span(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
    });

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(plain_file)
        .with(json_file)
        .with(console_layer)
        .try_init()?;

    tracing::info!(
        json = options.json,
        "chainchat logging initialized in {}",
        log_dir.display()
    );

    Ok((guard, log_dir))
}

fn get_log_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("com", "chainchat", "chainchat")
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;

    Ok(dirs.data_dir().join("logs"))
}

/// Initialize logging for tests (captured output, no file).
#[cfg(test)]
pub fn init_test() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_test_writer())
        .try_init();
}

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Filters and file name for a cycle run's logs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter of the file log, which gets round-level detail
    pub level: String,
    /// Filter of the console, by default pass summaries and warnings only
    pub console_level: String,
    pub file_name: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "debug".to_string(),
            console_level: "warn,market=info".to_string(),
            file_name: "cycle.log".to_string(),
        }
    }
}

/// Wall clock plus milliseconds since the logger was installed
#[derive(Clone, Copy)]
struct CycleTimer {
    started: Instant,
}

impl FormatTime for CycleTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        let elapsed = self.started.elapsed().as_secs_f64() * 1000.0;
        write!(w, "{} +{:>9.3}ms", Local::now().format("%H:%M:%S%.3f"), elapsed)
    }
}

/// Logs to stdout and to `config.file_name` inside `result_dir`.
///
/// Keep the returned guard alive until the run ends or the file tail is lost.
pub fn init(
    result_dir: impl AsRef<Path>,
    config: &LogConfig,
) -> Result<WorkerGuard, Box<dyn std::error::Error>> {
    let file = std::fs::File::create(result_dir.as_ref().join(&config.file_name))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file);
    let timer = CycleTimer { started: Instant::now() };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(timer)
                .with_writer(std::io::stdout)
                .with_target(false)
                .with_filter(EnvFilter::try_new(&config.console_level)?),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(timer)
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_filter(EnvFilter::try_new(&config.level)?),
        )
        .try_init()?;

    Ok(guard)
}

//! Tracing setup shared by the binaries

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_FILTER: &str = "fieldwatch=info,tower_http=info";

#[derive(Debug, Clone, Default)]
pub struct LogOptions<'a> {
    /// JSON lines instead of the human format.
    pub json: bool,
    /// Also append to this file.
    pub file: Option<&'a Path>,
    /// Suppress stderr output (the dashboard owns the terminal).
    pub quiet: bool,
}

/// Install the global subscriber. Keep the returned guard alive for the whole
/// run, or buffered file output is lost.
pub fn init_tracing(opts: LogOptions<'_>) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    let (file_layer, guard) = match opts.file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("log file {} has no file name", path.display()))?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    let stderr = (!opts.quiet).then(|| fmt::layer().with_writer(std::io::stderr));
    if opts.json {
        registry.with(stderr.map(|l| l.json())).try_init()?;
    } else {
        registry.with(stderr).try_init()?;
    }
    Ok(guard)
}

use std::path::Path;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Installs the global tracing subscriber.
///
/// Text goes to stdout unless `log_file` is given, in which case JSON lines are
/// appended to that file. The host may load the library more than once, so an
/// already installed subscriber is left in place and `false` is returned.
pub fn setup_logging(log_level: &str, log_file: Option<&Path>, bridge_tag: Option<&str>) -> bool {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    // Format: 2024-01-12T15:30:45.123456789+03:00
    let timer = fmt::time::ChronoLocal::rfc_3339();

    let installed = match log_file {
        Some(path) => {
            let directory = path.parent().unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| "router_bridge.log".into());
            let appender = tracing_appender::rolling::never(directory, file_name);

            let layer = fmt::layer()
                .with_timer(timer)
                .json()
                .with_writer(appender);

            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init()
                .is_ok()
        }
        None => {
            let layer = fmt::layer()
                .with_timer(timer)
                .with_writer(std::io::stdout);

            tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init()
                .is_ok()
        }
    };

    if installed && let Some(tag) = bridge_tag {
        tracing::info!(bridge = %tag, "Logging initialized");
    }

    installed
}

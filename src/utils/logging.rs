// src/utils/logging.rs
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::utils::config::NodeConfig;

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
///
/// With `log_dir` set, output goes to a daily rolling file and the returned
/// guard must be held until shutdown so buffered lines get flushed.
pub fn init(node: &NodeConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&node.log_level));

    match &node.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "object-gateway.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .init();

            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_file(true)
                .with_line_number(true)
                .init();

            None
        }
    }
}

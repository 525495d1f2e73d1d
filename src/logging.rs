// src/logging.rs

//! Logging setup for `toolrun` using `tracing` + `tracing-subscriber`.
//!
//! The log filter is taken from the `TOOLRUN_LOG` environment variable
//! (e.g. "info", "debug", or a full `EnvFilter` directive string) and
//! defaults to `info`.
//!
//! Logs are sent to STDERR so that stdout stays free for tool output.

use anyhow::Result;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialise the global logging subscriber.
///
/// Safe to call once at startup; embedding applications that install their
/// own subscriber should skip this.
pub fn init_logging() -> Result<()> {
    let filter =
        EnvFilter::try_from_env("TOOLRUN_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    // Send logs to stderr; keep stdout free for tool output.
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

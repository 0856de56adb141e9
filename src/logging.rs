//! Tracing subscriber setup for the binary.
//!
//! Logs go to stderr; stdout is reserved for command output and MCP traffic.

use tracing_subscriber::EnvFilter;

/// `SHELF_LOG` wins, then `RUST_LOG`, then a level picked from `verbose`.
pub fn init(verbose: bool) {
    let default = if verbose { "shelfsense=debug,info" } else { "info" };
    let filter = std::env::var("SHELF_LOG")
        .ok()
        .and_then(|v| EnvFilter::try_new(v).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

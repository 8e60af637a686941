//! Diagnostic output setup.
//!
//! All diagnostics go to stderr so stdout stays clean for the resolved
//! image path (`feh "$(wallgrab fetch)"` must never see a log line).
//! Default level is WARN; `-v` raises it to INFO and `-vv` to DEBUG. A
//! `RUST_LOG` filter in the environment overrides the flag entirely.

use tracing_subscriber::EnvFilter;

/// Install the stderr subscriber for the given `-v` count. Safe to call
/// more than once; later calls are no-ops.
pub fn init(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}

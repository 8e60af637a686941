//! Pre-flight connectivity check.
//!
//! A collection run on a machine that just woke from suspend usually has
//! no network for a few seconds. Rather than burning the HTTP client's
//! full timeout on a dead interface, the orchestrator polls a cheap probe
//! first and only proceeds once it answers.

use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use tracing::warn;

/// Address the default probe pings.
const PROBE_ADDR: &str = "8.8.8.8";

/// Something that can answer "is the network reachable right now".
pub trait ConnectivityProbe {
    fn check(&self) -> bool;
}

/// Probe that sends a single `ping` with a one-second deadline. A missing
/// `ping` binary counts as no connection.
pub struct PingProbe;

impl ConnectivityProbe for PingProbe {
    fn check(&self) -> bool {
        let count_flag = if cfg!(windows) { "-n" } else { "-c" };
        Command::new("ping")
            .args([count_flag, "1", "-w", "1", PROBE_ADDR])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

/// Poll `probe` until it succeeds, waiting `wait` between attempts.
///
/// First attempt success, or any later success, counts; persistent
/// failure across all attempts is the only failure. A success on the
/// first try stays silent — recovering after failures is worth a warning,
/// because the run stalled visibly in the meantime.
pub fn wait_for_connection(probe: &dyn ConnectivityProbe, attempts: u32, wait: Duration) -> bool {
    for attempt in 0..attempts {
        if probe.check() {
            if attempt > 0 {
                warn!("Connection found");
            }
            return true;
        }
        warn!("Connection not found");
        if attempt + 1 < attempts {
            thread::sleep(wait);
        }
    }
    false
}

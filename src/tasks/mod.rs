// ImpactWatch — Periodic tasks
//
// Each task is a loop around a `*_cycle` function that does one update under
// the system lock. The cycles are plain functions of `(&mut System, now)` so
// they can be driven directly with injected time.

pub mod control;
pub mod fusion;
pub mod load_cell;
pub mod logger;
pub mod telemetry;
pub mod temperature;

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::SHUTDOWN_POLL;

/// Sleep for the rest of `period` measured from `tick_start`, waking at least
/// every `SHUTDOWN_POLL`. Returns `false` once `stop` is set.
pub fn pace(tick_start: Instant, period: Duration, stop: &AtomicBool) -> bool {
    loop {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let elapsed = tick_start.elapsed();
        if elapsed >= period {
            return true;
        }
        thread::sleep((period - elapsed).min(SHUTDOWN_POLL));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pace_returns_false_when_stopped() {
        let stop = AtomicBool::new(true);
        assert!(!pace(Instant::now(), Duration::from_secs(10), &stop));
    }

    #[test]
    fn pace_waits_out_the_period() {
        let stop = AtomicBool::new(false);
        let start = Instant::now();
        assert!(pace(start, Duration::from_millis(5), &stop));
        assert!(start.elapsed() >= Duration::from_millis(5));
    }
}

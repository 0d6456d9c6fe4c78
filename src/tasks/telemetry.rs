// ImpactWatch — Telemetry Task
//
// Mirrors the registered streams to a text sink (the serial console on the
// device) without consuming them. Lines are prefixed with `!` so a host tool
// can pick them out of the log output. The lock is released every few rows,
// and the whole task stands down while a recording session owns the streams.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use csv::StringRecord;

use crate::config::{TELEMETRY_PAUSE_POLL, TELEMETRY_PERIOD, TELEMETRY_ROWS_PER_LOCK, TELEMETRY_YIELD};
use crate::state::{lock, Shared};
use crate::tasks::pace;

/// Outcome of one telemetry pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dump {
    /// A session is recording; nothing was printed.
    Paused,
    Rows(usize),
}

/// Print the header and every complete row, re-taking the lock for each
/// batch of `TELEMETRY_ROWS_PER_LOCK` rows and sleeping `yield_for` between
/// batches. Stops early if a session starts mid-dump.
pub fn telemetry_dump(shared: &Shared, sink: &mut dyn Write, yield_for: Duration) -> io::Result<Dump> {
    let (header, rows) = {
        let mut guard = lock(shared);
        let sys = &mut *guard;
        if sys.session.is_active() {
            return Ok(Dump::Paused);
        }
        let registry = sys.logger.registry();
        (registry.header(&mut sys.sensors), registry.min_len(&mut sys.sensors))
    };
    print_record(sink, &header)?;

    let mut written = 0;
    while written < rows {
        let batch = {
            let mut guard = lock(shared);
            let sys = &mut *guard;
            if sys.session.is_active() {
                break;
            }
            let end = (written + TELEMETRY_ROWS_PER_LOCK).min(rows);
            let registry = sys.logger.registry();
            (written..end).map(|i| registry.row(&mut sys.sensors, i)).collect::<Vec<_>>()
        };
        for row in &batch {
            print_record(sink, row)?;
        }
        written += batch.len();
        sink.flush()?;
        if written < rows && !yield_for.is_zero() {
            thread::sleep(yield_for);
        }
    }
    Ok(Dump::Rows(written))
}

fn print_record(sink: &mut dyn Write, record: &StringRecord) -> io::Result<()> {
    let mut line = csv::Writer::from_writer(vec![b'!']);
    line.write_record(record)?;
    let bytes = line.into_inner().map_err(|e| e.into_error())?;
    sink.write_all(&bytes)
}

pub fn telemetry_task(shared: Shared, stop: Arc<AtomicBool>, mut sink: Box<dyn Write + Send>) {
    log::info!("Telemetry task started");
    loop {
        let tick_start = Instant::now();
        let period = match telemetry_dump(&shared, &mut sink, TELEMETRY_YIELD) {
            Ok(Dump::Paused) => TELEMETRY_PAUSE_POLL,
            Ok(Dump::Rows(_)) => TELEMETRY_PERIOD,
            Err(e) => {
                log::warn!("Telemetry sink error: {}", e);
                TELEMETRY_PERIOD
            }
        };
        if stop.load(Ordering::Relaxed) || !pace(tick_start, period, &stop) {
            break;
        }
    }
    log::info!("Telemetry task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::sim::SimRig;
    use crate::events::Detection;
    use crate::tasks::fusion::fusion_cycle;
    use crate::tasks::load_cell::load_cell_cycle;
    use std::sync::Mutex;

    fn shared_rig(cycles: u64) -> (tempfile::TempDir, Shared) {
        let dir = tempfile::tempdir().unwrap();
        let rig = SimRig::at_rest();
        let mut sys = rig.system(dir.path()).unwrap();
        let t0 = Instant::now();
        for i in 0..cycles {
            fusion_cycle(&mut sys, t0 + Duration::from_millis(i * 2));
            load_cell_cycle(&mut sys, t0 + Duration::from_millis(i * 2));
        }
        (dir, Arc::new(Mutex::new(sys)))
    }

    #[test]
    fn dump_is_non_destructive() {
        let (_dir, shared) = shared_rig(25);
        let mut out = Vec::new();

        assert_eq!(telemetry_dump(&shared, &mut out, Duration::ZERO).unwrap(), Dump::Rows(25));

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 26);
        assert!(text.lines().all(|l| l.starts_with('!')));
        assert!(text.starts_with("!LftShldr,RgtShldr,Concussion"));
        assert_eq!(lock(&shared).sensors.concussion.len(), 25);
    }

    #[test]
    fn dump_pauses_during_session() {
        let (_dir, shared) = shared_rig(3);
        lock(&shared).session.report(Detection::Impact, Instant::now());
        let mut out = Vec::new();
        assert_eq!(telemetry_dump(&shared, &mut out, Duration::ZERO).unwrap(), Dump::Paused);
        assert!(out.is_empty());
    }
}

// ImpactWatch — Host bench
//
// Runs the full task runtime against simulated sensors and scripts one
// helmet hit:
//   1. Rest long enough to fill the stream buffers.
//   2. A severe blow to the helmet (concussion-grade).
//   3. Back to rest until the session goes quiet and the file is closed.

use std::io;
use std::path::Path;
use std::thread;
use std::time::Duration;

use impactwatch::config::*;
use impactwatch::drivers::sim::SimRig;
use impactwatch::drivers::InitPolicy;
use impactwatch::state::lock;
use impactwatch::{BringUpPolicy, Runtime};

const REST: Duration = Duration::from_millis(500);
const HIT: Duration = Duration::from_millis(20);
const HIT_LINEAR_G: f64 = 150.0;
const HIT_RATE: f64 = 70.0; // rad/s

pub fn run() -> anyhow::Result<()> {
    let rig = SimRig::at_rest();

    // Firmware retry counts, but a short calibration so the bench starts fast.
    let shorten = |p: InitPolicy| InitPolicy { calibration_samples: 50, ..p };
    let policy = BringUpPolicy {
        imu: shorten(InitPolicy::imu()),
        accel: shorten(InitPolicy::accel()),
        load_cell: InitPolicy::load_cell(),
        thermometer: InitPolicy::thermometer(),
    };
    let system = rig.system_with(Path::new(BENCH_LOG_DIR), &policy)?;

    let telemetry: Box<dyn io::Write + Send> = if std::env::var_os("IMPACTWATCH_TELEMETRY").is_some() {
        Box::new(io::stdout())
    } else {
        Box::new(io::sink())
    };
    let runtime = Runtime::spawn(system, telemetry)?;

    thread::sleep(REST);
    log::info!("Bench: helmet hit at {} g, {} rad/s", HIT_LINEAR_G, HIT_RATE);
    rig.head_hit(HIT_LINEAR_G, HIT_RATE);
    thread::sleep(HIT);
    rig.settle();

    // Wait out the quiescence window so the session closes on its own.
    thread::sleep(SESSION_QUIESCENCE + REST);

    let shared = runtime.shutdown()?;
    let sys = lock(&shared);
    log::info!(
        "Bench done: {} session(s), impact={}, concussion={}, last file {}",
        sys.session.sessions_started(),
        sys.session.impact(),
        sys.session.concussion(),
        sys.logger.file_name(sys.logger.sequence()),
    );
    if let Some(assessment) = sys.sensors.last_assessment {
        log::info!("Last assessment: {:?}", assessment);
    }
    Ok(())
}

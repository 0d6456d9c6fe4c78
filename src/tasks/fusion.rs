// ImpactWatch — Fusion / Impact Task
//
// Reads both IMUs and both high-g accelerometers, fuses them, scores the head
// kinematics and reports impact/concussion detections to the session machine.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use crate::config::FUSION_PERIOD;
use crate::events::Detection;
use crate::scorer::{assess, is_impact, linear_peak};
use crate::state::{lock, Shared, System};
use crate::tasks::pace;

pub fn fusion_cycle(system: &mut System, now: Instant) {
    let sensors = &mut system.sensors;

    let head_sampled = sensors.head_imu.update_at(now)
        | sensors.head_accel.update_with(sensors.head_imu.rotation());
    let body_sampled = sensors.body_imu.update_at(now)
        | sensors.body_accel.update_with(sensors.body_imu.rotation());

    // Detection looks at this cycle's samples; peaks only feed the score.
    let head_linear = linear_peak(sensors.head_imu.accel_latest(), sensors.head_accel.latest());
    let body_linear = linear_peak(sensors.body_imu.accel_latest(), sensors.body_accel.latest());
    if (head_sampled && is_impact(head_linear)) || (body_sampled && is_impact(body_linear)) {
        system.session.report(Detection::Impact, now);
    }

    let assessment = assess(
        sensors.head_imu.accel_peak().sample(),
        sensors.head_accel.peak().sample(),
        sensors.head_imu.gyro_peak().sample(),
    );
    sensors.concussion.prepend(assessment.probability);
    sensors.last_assessment = Some(assessment);

    let current = assess(
        sensors.head_imu.accel_latest(),
        sensors.head_accel.latest(),
        sensors.head_imu.gyro_latest(),
    );
    if head_sampled && current.concussion {
        log::warn!("Concussion probability {:.3}", current.probability);
        system.session.report(Detection::Concussion, now);
    }
}

pub fn fusion_task(shared: Shared, stop: Arc<AtomicBool>) {
    log::info!("Fusion task started");
    loop {
        let tick_start = Instant::now();
        fusion_cycle(&mut lock(&shared), tick_start);
        if !pace(tick_start, FUSION_PERIOD, &stop) {
            break;
        }
    }
    log::info!("Fusion task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::STANDARD_GRAVITY;
    use crate::drivers::sim::SimRig;
    use crate::drivers::ImuReading;
    use crate::events::Sample3;
    use crate::session::SessionAction;
    use std::time::Duration;

    fn body_hit(g: f64) -> ImuReading {
        ImuReading {
            accel: Sample3::new(g * STANDARD_GRAVITY, 0.0, STANDARD_GRAVITY),
            gyro: Sample3::ZERO,
        }
    }

    #[test]
    fn quiet_cycle_streams_probability_without_detection() {
        let dir = tempfile::tempdir().unwrap();
        let rig = SimRig::at_rest();
        let mut sys = rig.system(dir.path()).unwrap();
        let t0 = Instant::now();

        fusion_cycle(&mut sys, t0);
        fusion_cycle(&mut sys, t0 + Duration::from_millis(2));

        assert_eq!(sys.sensors.concussion.len(), 2);
        assert!(!sys.session.is_active());
        assert!(!sys.sensors.last_assessment.unwrap().concussion);
    }

    #[test]
    fn body_hit_latches_impact_only() {
        let dir = tempfile::tempdir().unwrap();
        let rig = SimRig::at_rest();
        let mut sys = rig.system(dir.path()).unwrap();
        let t0 = Instant::now();

        rig.body_imu.set_reading(body_hit(8.0));
        fusion_cycle(&mut sys, t0);

        assert!(sys.session.impact());
        assert!(!sys.session.concussion());
        assert!(sys.session.is_active());
    }

    #[test]
    fn severe_head_hit_latches_concussion() {
        let dir = tempfile::tempdir().unwrap();
        let rig = SimRig::at_rest();
        let mut sys = rig.system(dir.path()).unwrap();

        rig.head_hit(150.0, 70.0);
        fusion_cycle(&mut sys, Instant::now());

        let assessment = sys.sensors.last_assessment.unwrap();
        assert!(assessment.concussion);
        assert!(sys.session.impact());
        assert!(sys.session.concussion());
        assert_eq!(sys.sensors.concussion.peek(0), Some(assessment.probability));
    }

    #[test]
    fn smaller_second_hit_extends_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let rig = SimRig::at_rest();
        let mut sys = rig.system(dir.path()).unwrap();
        let t0 = Instant::now();
        let ms = Duration::from_millis;

        rig.body_imu.set_reading(body_hit(10.0));
        fusion_cycle(&mut sys, t0);
        rig.settle();
        fusion_cycle(&mut sys, t0 + ms(2));
        assert_eq!(sys.session.session().unwrap().last_detection, t0);

        rig.body_imu.set_reading(body_hit(8.0));
        fusion_cycle(&mut sys, t0 + ms(1500));
        assert_eq!(sys.session.session().unwrap().last_detection, t0 + ms(1500));
        assert!(matches!(sys.session.poll(t0 + ms(2100)), SessionAction::Record { .. }));
        assert_eq!(sys.session.poll(t0 + ms(3500)), SessionAction::Finish);
    }

    #[test]
    fn concussion_retriggers_after_the_peak() {
        let dir = tempfile::tempdir().unwrap();
        let rig = SimRig::at_rest();
        let mut sys = rig.system(dir.path()).unwrap();
        let t0 = Instant::now();
        let ms = Duration::from_millis;

        rig.head_hit(200.0, 80.0);
        fusion_cycle(&mut sys, t0);
        rig.settle();
        fusion_cycle(&mut sys, t0 + ms(2));
        assert!(sys.sensors.last_assessment.unwrap().concussion);
        assert_eq!(sys.session.session().unwrap().last_detection, t0);

        fusion_cycle(&mut sys, t0 + ms(1198));
        assert_eq!(sys.session.session().unwrap().last_detection, t0);

        rig.head_hit(150.0, 70.0);
        fusion_cycle(&mut sys, t0 + ms(1200));
        assert_eq!(sys.session.session().unwrap().last_detection, t0 + ms(1200));
    }
}

// ImpactWatch — Control Panel Buttons
//
// Debounced record/reset buttons. The board polls the pins and feeds the raw
// levels in; accepted presses come out as HMI commands.

use std::sync::mpsc::Sender;
use std::time::Instant;

use crate::config::BUTTON_DEBOUNCE;
use crate::events::HmiCommand;

/// One button. A level change is accepted only if the previous accepted
/// change is older than `BUTTON_DEBOUNCE`.
#[derive(Debug, Default)]
pub struct Button {
    pressed: bool,
    last_change: Option<Instant>,
}

impl Button {
    /// Returns `true` on an accepted press edge.
    pub fn update(&mut self, raw_pressed: bool, now: Instant) -> bool {
        if raw_pressed == self.pressed {
            return false;
        }
        if let Some(last) = self.last_change {
            if now.saturating_duration_since(last) <= BUTTON_DEBOUNCE {
                return false;
            }
        }
        self.pressed = raw_pressed;
        self.last_change = Some(now);
        raw_pressed
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }
}

pub struct ControlPanel {
    record: Button,
    reset: Button,
    commands: Sender<HmiCommand>,
}

impl ControlPanel {
    pub fn new(commands: Sender<HmiCommand>) -> Self {
        Self { record: Button::default(), reset: Button::default(), commands }
    }

    /// Feed the raw levels (`true` = pressed). Returns `false` once the
    /// control task has gone away.
    pub fn update(&mut self, record: bool, reset: bool, now: Instant) -> bool {
        let mut alive = true;
        if self.record.update(record, now) {
            alive &= self.commands.send(HmiCommand::ForceRecording).is_ok();
        }
        if self.reset.update(reset, now) {
            alive &= self.commands.send(HmiCommand::ResetPeaks).is_ok();
        }
        alive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn bounce_inside_window_is_ignored() {
        let t0 = Instant::now();
        let mut b = Button::default();
        assert!(b.update(true, t0));
        assert!(!b.update(false, t0 + Duration::from_millis(20)));
        assert!(b.is_pressed());
        assert!(!b.update(false, t0 + Duration::from_millis(150)));
        assert!(!b.is_pressed());
        assert!(b.update(true, t0 + Duration::from_millis(300)));
    }

    #[test]
    fn presses_become_commands() {
        let (tx, rx) = mpsc::channel();
        let mut panel = ControlPanel::new(tx);
        let t0 = Instant::now();
        assert!(panel.update(true, false, t0));
        assert!(panel.update(true, true, t0 + Duration::from_millis(5)));
        assert_eq!(rx.try_recv(), Ok(HmiCommand::ForceRecording));
        assert_eq!(rx.try_recv(), Ok(HmiCommand::ResetPeaks));
        assert!(rx.try_recv().is_err());

        drop(rx);
        assert!(panel.update(false, false, t0 + Duration::from_millis(500)));
        assert!(!panel.update(true, false, t0 + Duration::from_millis(700)));
    }
}

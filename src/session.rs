// ImpactWatch — Recording session state machine
//
//   IDLE ──detection──▶ ACTIVE ──detection──▶ ACTIVE (extended / rotated)
//                         │
//                         └── no detection for SESSION_QUIESCENCE ──▶ IDLE
//
// Detections come from the fusion and load-cell tasks (and the HMI record
// button). The logger task polls the machine each cycle and performs the
// file work the returned action asks for.

use std::time::Instant;

use crate::config::{SESSION_QUIESCENCE, SESSION_REOPEN_COOLDOWN};
use crate::events::Detection;

/// Anything holding tracked peaks that a finished session must clear.
pub trait PeakReset {
    fn reset_all_peaks(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingSession {
    pub started_at: Instant,
    pub last_detection: Instant,
    /// Sequence number of the file currently being written.
    pub file_sequence: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    Idle,
    /// Drain destructively; `rotate` asks for the next file first.
    Record { rotate: bool },
    /// Quiescence elapsed: final drain, close, then `finish`.
    Finish,
}

#[derive(Debug, Default)]
pub struct SessionMachine {
    impact: bool,
    concussion: bool,
    session: Option<RecordingSession>,
    rotate_pending: bool,
    sessions_started: u32,
}

impl SessionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch a detection and start, extend or rotate the session.
    pub fn report(&mut self, detection: Detection, now: Instant) {
        match detection {
            Detection::Impact => self.impact = true,
            Detection::Concussion => self.concussion = true,
        }

        match self.session.as_mut() {
            None => {
                self.sessions_started += 1;
                log::info!("{:?} detected: recording session started", detection);
                self.session = Some(RecordingSession {
                    started_at: now,
                    last_detection: now,
                    file_sequence: 0,
                });
            }
            Some(session) => {
                session.last_detection = now;
                if now.saturating_duration_since(session.started_at) > SESSION_REOPEN_COOLDOWN {
                    log::info!("{:?} detected: rotating to a new log file", detection);
                    session.started_at = now;
                    self.rotate_pending = true;
                }
            }
        }
    }

    /// What the logger should do this cycle.
    pub fn poll(&mut self, now: Instant) -> SessionAction {
        match self.session {
            None => SessionAction::Idle,
            Some(s) if now.saturating_duration_since(s.last_detection) >= SESSION_QUIESCENCE => {
                SessionAction::Finish
            }
            Some(_) => SessionAction::Record { rotate: std::mem::take(&mut self.rotate_pending) },
        }
    }

    /// Record which file the session is writing.
    pub fn note_file(&mut self, sequence: u32) {
        if let Some(session) = self.session.as_mut() {
            session.file_sequence = sequence;
        }
    }

    /// End the session: clear both latches and reset every peak once.
    pub fn finish(&mut self, sensors: &mut impl PeakReset) {
        if let Some(session) = self.session.take() {
            log::info!("Recording session ended (last file sequence {})", session.file_sequence);
        }
        self.impact = false;
        self.concussion = false;
        self.rotate_pending = false;
        sensors.reset_all_peaks();
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn impact(&self) -> bool {
        self.impact
    }

    pub fn concussion(&self) -> bool {
        self.concussion
    }

    pub fn session(&self) -> Option<&RecordingSession> {
        self.session.as_ref()
    }

    pub fn sessions_started(&self) -> u32 {
        self.sessions_started
    }
}

//! Round lifecycle and touch scoring.
//!
//! One [`RoundSession`] owns a single timed round: the
//! `Idle -> Calibrating -> Running -> Finished` state machine, the
//! debounced touch counter, and the touch-duration accumulator. Elapsed
//! time is wall-clock, supplied by the caller each tick, so dropped camera
//! frames never stretch a round.
//!
//! Scoring rules:
//! - `touch_count` increments exactly once per false -> true transition of
//!   the touching state; staying in contact does not re-count.
//! - `touch_duration_accum` grows by the frame's dt on every touching
//!   frame, transition or not.

use crate::boundary::Containment;

/// Round state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RoundState {
    Idle,
    Calibrating,
    Running,
    Finished,
}

/// Round timing configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RoundConfig {
    /// Round length in seconds of wall-clock time.
    pub round_duration_s: f64,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            round_duration_s: 45.0,
        }
    }
}

/// Read-only per-tick view for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RoundSnapshot {
    pub state: RoundState,
    /// Seconds since the round started; 0 outside Running/Finished.
    pub elapsed_s: f64,
    pub touch_count: u32,
    pub touch_duration_s: f64,
}

/// Terminal round outcome handed to reporting collaborators.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RoundReport {
    pub touch_count: u32,
    pub touch_duration_seconds: f64,
}

/// One scoring round. Created per round; reset on the next start request.
#[derive(Debug, Clone)]
pub struct RoundSession {
    config: RoundConfig,
    state: RoundState,
    start_time: f64,
    last_tick: f64,
    touch_count: u32,
    touch_duration_accum: f64,
    last_frame_touching: bool,
}

impl RoundSession {
    pub fn new(config: RoundConfig) -> Self {
        Self {
            config,
            state: RoundState::Idle,
            start_time: 0.0,
            last_tick: 0.0,
            touch_count: 0,
            touch_duration_accum: 0.0,
            last_frame_touching: false,
        }
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    /// Start request from the shell. Enters Calibrating when no usable
    /// calibration exists, otherwise begins the round directly. A no-op in
    /// any state but Idle or Finished.
    pub fn request_start(&mut self, now: f64, calibrated: bool) {
        match self.state {
            RoundState::Idle | RoundState::Finished => {
                if calibrated {
                    self.begin_running(now);
                } else {
                    self.state = RoundState::Calibrating;
                }
            }
            RoundState::Calibrating | RoundState::Running => {}
        }
    }

    /// Explicit recalibration request. A no-op while already calibrating
    /// or mid-round.
    pub fn request_calibrate(&mut self) {
        match self.state {
            RoundState::Idle | RoundState::Finished => {
                self.state = RoundState::Calibrating;
            }
            RoundState::Calibrating | RoundState::Running => {}
        }
    }

    /// Abort request: drop back to Idle, discarding in-flight
    /// accumulation. Finished rounds keep their frozen report; aborting
    /// from Idle is a no-op.
    pub fn request_abort(&mut self) {
        match self.state {
            RoundState::Calibrating | RoundState::Running => {
                self.state = RoundState::Idle;
                self.touch_count = 0;
                self.touch_duration_accum = 0.0;
                self.last_frame_touching = false;
            }
            RoundState::Idle | RoundState::Finished => {}
        }
    }

    /// Calibration outcome, forwarded by the facade.
    pub fn calibration_succeeded(&mut self, now: f64) {
        if self.state == RoundState::Calibrating {
            self.begin_running(now);
        }
    }

    /// Failed calibration returns to Idle; the shell re-shows the
    /// calibration UI.
    pub fn calibration_failed(&mut self) {
        if self.state == RoundState::Calibrating {
            self.state = RoundState::Idle;
        }
    }

    fn begin_running(&mut self, now: f64) {
        self.state = RoundState::Running;
        self.start_time = now;
        self.last_tick = now;
        self.touch_count = 0;
        self.touch_duration_accum = 0.0;
        self.last_frame_touching = false;
    }

    /// Advance one frame.
    ///
    /// `containment` is the classification of the controlled point this
    /// frame, or `None` when no frame was available; a skipped frame still
    /// advances round time but neither accumulates touch duration nor
    /// changes the touching state.
    pub fn tick(&mut self, now: f64, containment: Option<Containment>) {
        if self.state != RoundState::Running {
            return;
        }

        let dt = (now - self.last_tick).max(0.0);
        self.last_tick = now;

        if let Some(c) = containment {
            let touching = c.is_touching();
            if touching && !self.last_frame_touching {
                self.touch_count += 1;
            }
            if touching {
                self.touch_duration_accum += dt;
            }
            self.last_frame_touching = touching;
        }

        if now - self.start_time >= self.config.round_duration_s {
            self.state = RoundState::Finished;
        }
    }

    /// Per-tick view for the shell.
    pub fn snapshot(&self, now: f64) -> RoundSnapshot {
        let elapsed = match self.state {
            RoundState::Running => (now - self.start_time).max(0.0),
            RoundState::Finished => (self.last_tick - self.start_time).max(0.0),
            _ => 0.0,
        };
        RoundSnapshot {
            state: self.state,
            elapsed_s: elapsed,
            touch_count: self.touch_count,
            touch_duration_s: self.touch_duration_accum,
        }
    }

    /// Frozen outcome, available once the round has finished.
    pub fn report(&self) -> Option<RoundReport> {
        if self.state != RoundState::Finished {
            return None;
        }
        Some(RoundReport {
            touch_count: self.touch_count,
            touch_duration_seconds: self.touch_duration_accum,
        })
    }
}

//! High-level per-tick pipeline.
//!
//! [`FocusSession`] is the primary entry point for the shell: it wires the
//! pupil detector, calibration, gaze mapper, boundary engine, and the round
//! state machine into one `tick` call per rendered frame.

use image::GrayImage;

use crate::boundary::{BoundaryEngine, BoundaryState, DistractorBlob};
use crate::calib::{CalibrationError, CalibrationSession, CalibrationStatus};
use crate::gaze::GazeMapper;
use crate::pupil::{PupilDetector, PupilSample};
use crate::session::{RoundReport, RoundSession, RoundSnapshot, RoundState};
use crate::{BoundaryConfig, CalibrationConfig, GazePoint, MapperConfig, PupilConfig, RoundConfig};

/// Aggregated configuration for a whole session.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct FocusConfig {
    pub pupil: PupilConfig,
    pub calibration: CalibrationConfig,
    pub mapper: MapperConfig,
    pub boundary: BoundaryConfig,
    pub round: RoundConfig,
}

/// Everything the presentation layer needs for one tick.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TickOutput {
    /// Smoothed screen-space gaze estimate.
    pub gaze: GazePoint,
    /// Renderable boundary snapshot for this timestamp.
    pub boundary: BoundaryState,
    /// Round state, elapsed time, and score counters.
    pub round: RoundSnapshot,
}

/// One player-facing session: calibration state, the current transform,
/// and the active round.
///
/// Create once, then call [`FocusSession::tick`] once per frame with the
/// wall-clock timestamp, the extracted eye region (if the camera produced
/// one), and the shell's current distractor blobs.
///
/// ```no_run
/// use focusring::{FocusConfig, FocusSession};
///
/// let mut session = FocusSession::new(FocusConfig::default());
/// session.request_start(0.0);
/// // per frame: session.tick(now, Some(&eye_frame), &blobs);
/// ```
pub struct FocusSession {
    config: FocusConfig,
    detector: PupilDetector,
    mapper: GazeMapper,
    boundary: BoundaryEngine,
    round: RoundSession,
    calibration: Option<CalibrationSession>,
    last_calibration_error: Option<CalibrationError>,
}

impl FocusSession {
    pub fn new(config: FocusConfig) -> Self {
        Self {
            detector: PupilDetector::with_config(config.pupil.clone()),
            mapper: GazeMapper::new(config.mapper.clone()),
            boundary: BoundaryEngine::new(config.boundary.clone()),
            round: RoundSession::new(config.round.clone()),
            calibration: None,
            last_calibration_error: None,
            config,
        }
    }

    pub fn config(&self) -> &FocusConfig {
        &self.config
    }

    /// Current round state.
    pub fn state(&self) -> RoundState {
        self.round.state()
    }

    /// Fitted transform, once any calibration has succeeded.
    pub fn transform(&self) -> Option<&crate::AffineTransform> {
        self.mapper.transform()
    }

    /// Calibration progress for the shell's target display, while
    /// calibrating.
    pub fn calibration_status(&self, now: f64) -> Option<CalibrationStatus> {
        self.calibration.as_ref().map(|c| c.status(now))
    }

    /// The error that ended the last failed calibration, for the
    /// "please recalibrate" surface.
    pub fn last_calibration_error(&self) -> Option<&CalibrationError> {
        self.last_calibration_error.as_ref()
    }

    /// Start a round. Runs calibration first when no transform exists.
    pub fn request_start(&mut self, now: f64) {
        let calibrated = self.mapper.transform().is_some();
        self.round.request_start(now, calibrated);
        if self.round.state() == RoundState::Calibrating && self.calibration.is_none() {
            self.begin_calibration();
        }
        if self.round.state() == RoundState::Running {
            self.mapper.reset();
        }
    }

    /// Force a fresh calibration before the next round.
    pub fn request_calibrate(&mut self) {
        self.round.request_calibrate();
        if self.round.state() == RoundState::Calibrating {
            self.begin_calibration();
        }
    }

    /// Abort the round or an in-flight calibration.
    pub fn request_abort(&mut self) {
        self.round.request_abort();
        self.calibration = None;
    }

    fn begin_calibration(&mut self) {
        self.calibration = Some(CalibrationSession::with_screen(
            self.config.mapper.screen_width,
            self.config.mapper.screen_height,
            self.config.calibration.clone(),
        ));
        self.last_calibration_error = None;
    }

    /// Advance the whole pipeline one frame.
    ///
    /// `frame` is the extracted eye region, or `None` when the camera
    /// yielded nothing this tick; round time advances either way.
    pub fn tick(
        &mut self,
        now: f64,
        frame: Option<&GrayImage>,
        blobs: &[DistractorBlob],
    ) -> TickOutput {
        let sample = frame.map(|f| self.detector.detect(f));

        if self.round.state() == RoundState::Calibrating {
            self.drive_calibration(now, sample.as_ref());
        }

        let gaze = match &sample {
            Some(s) => self.mapper.map(now, s),
            None => self.mapper.hold(now),
        };

        let boundary = self.boundary.boundary_at(now, blobs);

        // Containment is only evaluated when this tick actually observed a
        // frame and a usable gaze exists; a dropped frame advances round
        // time without touching the scoring state.
        let containment = if frame.is_some() && gaze.valid {
            Some(boundary.classify([gaze.x, gaze.y]))
        } else {
            None
        };
        self.round.tick(now, containment);

        TickOutput {
            gaze,
            boundary,
            round: self.round.snapshot(now),
        }
    }

    fn drive_calibration(&mut self, now: f64, sample: Option<&PupilSample>) {
        let Some(cal) = self.calibration.as_mut() else {
            return;
        };
        let Some(sample) = sample else {
            return;
        };

        let status = cal.record(now, sample);
        if !status.complete {
            return;
        }

        match cal.finish() {
            Ok(t) => {
                self.mapper.set_transform(t);
                self.mapper.reset();
                self.round.calibration_succeeded(now);
            }
            Err(e) => {
                self.last_calibration_error = Some(e);
                self.round.calibration_failed();
            }
        }
        self.calibration = None;
    }

    /// Frozen outcome of a finished round.
    pub fn report(&self) -> Option<RoundReport> {
        self.round.report()
    }
}

//! focusring — gaze-driven focus-boundary scoring engine.
//!
//! Turns webcam eye regions into a screen-space pointer and scores a timed
//! round against a deforming focus boundary. The per-tick pipeline stages:
//!
//! 1. **Pupil** – dark-region pupil localization in the extracted eye frame.
//! 2. **Calibration** – guided 5-target dwell protocol fitting an affine
//!    map from pupil coordinates to screen coordinates.
//! 3. **Gaze** – affine mapping with exponential smoothing and
//!    last-known-good hold through detection misses.
//! 4. **Boundary** – waveform curve deformed by moving distractor blobs,
//!    with a touch-band containment test.
//! 5. **Session** – round state machine, debounced touch count, and
//!    touch-duration accumulation over a 45 second round.
//!
//! # Public API
//! - [`FocusSession`] as the primary per-tick entry point
//! - [`PupilDetector`], [`CalibrationSession`], [`GazeMapper`], and
//!   [`BoundaryEngine`] for driving the stages individually
//! - per-stage config structs for tuning
//! - [`sim`] for synthetic eye frames in demos and tests
//!
//! Camera capture, eye-region extraction, rendering, and report storage
//! are the surrounding shell's concern; the engine is a pure per-tick
//! state machine over the data the shell feeds it.

mod api;
mod boundary;
mod calib;
mod gaze;
mod pupil;
mod session;
pub mod sim;
mod transform;

pub use api::{FocusConfig, FocusSession, TickOutput};
pub use boundary::{
    Arena, BoundaryConfig, BoundaryEngine, BoundaryState, Containment, DistractorBlob,
};
pub use calib::{CalibrationConfig, CalibrationError, CalibrationSession, CalibrationStatus};
pub use gaze::{GazeMapper, MapperConfig};
pub use pupil::{PupilConfig, PupilDetector, PupilSample};
pub use session::{RoundConfig, RoundReport, RoundSession, RoundSnapshot, RoundState};
pub use transform::{fit_affine_lsq, rms_residual, AffineFitError, AffineTransform};

/// Screen-space gaze estimate for one tick.
///
/// `valid` is false until the first successfully mapped sample exists;
/// after that the point holds the last known good position through
/// detection dropouts.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GazePoint {
    /// Screen x in pixels, clamped to the screen.
    pub x: f64,
    /// Screen y in pixels, clamped to the screen.
    pub y: f64,
    /// Wall-clock timestamp of the tick that produced the point.
    pub timestamp: f64,
    /// Whether the point derives from any successfully mapped sample.
    pub valid: bool,
}

//! Pupil-to-screen gaze mapping with smoothing and dropout hold.
//!
//! Applies the calibrated [`AffineTransform`] to valid pupil samples,
//! smooths consecutive points with an exponential moving average, and holds
//! the last known good point through detection misses so a dropout never
//! snaps the pointer to a default position.

use crate::pupil::PupilSample;
use crate::transform::AffineTransform;
use crate::GazePoint;

/// Mapper tuning.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MapperConfig {
    /// EMA factor in (0, 1]: weight of the newest mapped point. Lower is
    /// smoother but laggier.
    pub smoothing_alpha: f64,
    /// Screen width in pixels; mapped points are clamped to the screen.
    pub screen_width: f64,
    /// Screen height in pixels.
    pub screen_height: f64,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            smoothing_alpha: 0.15,
            screen_width: 1600.0,
            screen_height: 900.0,
        }
    }
}

/// Stateful per-frame gaze mapper.
///
/// Holds the current transform (if any calibration succeeded) and the last
/// produced point for smoothing and dropout hold.
#[derive(Debug, Clone, Default)]
pub struct GazeMapper {
    config: MapperConfig,
    transform: Option<AffineTransform>,
    last: Option<GazePoint>,
}

impl GazeMapper {
    pub fn new(config: MapperConfig) -> Self {
        Self {
            config,
            transform: None,
            last: None,
        }
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Install a freshly fitted transform. Replaces any previous fit
    /// wholesale.
    pub fn set_transform(&mut self, transform: AffineTransform) {
        self.transform = Some(transform);
    }

    pub fn transform(&self) -> Option<&AffineTransform> {
        self.transform.as_ref()
    }

    /// Forget held state between rounds. The calibration fit survives.
    pub fn reset(&mut self) {
        self.last = None;
    }

    /// Map one pupil sample to a screen-space gaze point.
    ///
    /// A found sample with a fitted transform produces a new smoothed,
    /// clamped point. A missed sample returns the previous point's
    /// coordinates unchanged. Before any valid point has been produced
    /// (including before calibration) the result is the screen center with
    /// `valid = false`.
    pub fn map(&mut self, now: f64, sample: &PupilSample) -> GazePoint {
        if let (Some(t), true) = (&self.transform, sample.found) {
            let raw = t.apply([sample.x, sample.y]);
            let [sx, sy] = match &self.last {
                Some(prev) if prev.valid => {
                    let a = self.config.smoothing_alpha;
                    [
                        a * raw[0] + (1.0 - a) * prev.x,
                        a * raw[1] + (1.0 - a) * prev.y,
                    ]
                }
                _ => raw,
            };
            let point = GazePoint {
                x: sx.clamp(0.0, self.config.screen_width),
                y: sy.clamp(0.0, self.config.screen_height),
                timestamp: now,
                valid: true,
            };
            self.last = Some(point);
            return point;
        }

        self.hold(now)
    }

    /// The point for a tick with no usable sample: last known good
    /// coordinates, or the screen center marked invalid if none exists.
    pub fn hold(&self, now: f64) -> GazePoint {
        match &self.last {
            Some(prev) => GazePoint {
                x: prev.x,
                y: prev.y,
                timestamp: now,
                valid: prev.valid,
            },
            None => GazePoint {
                x: self.config.screen_width / 2.0,
                y: self.config.screen_height / 2.0,
                timestamp: now,
                valid: false,
            },
        }
    }
}

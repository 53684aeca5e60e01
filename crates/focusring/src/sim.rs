//! Synthetic eye source for development, demos, and end-to-end tests.
//!
//! Renders eye-region frames with a known pupil position so the full
//! detect -> calibrate -> map -> score path can run without a camera. A
//! [`SyntheticEyeSource`] carries a ground-truth affine between screen and
//! pupil space; scripted gaze paths come from [`GazeScript`].

use image::{GrayImage, Luma};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::transform::AffineTransform;

/// Render a synthetic eye-region frame.
///
/// Light sclera background, a mid-gray iris annulus, and a dark pupil disc
/// centered at `pupil` with the given radius. Intensities are chosen so
/// that only the pupil falls under the default detection threshold.
pub fn render_eye_frame(w: u32, h: u32, pupil: [f64; 2], pupil_radius: f64) -> GrayImage {
    let iris_radius = pupil_radius * 2.2;
    let mut img = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let dx = x as f64 - pupil[0];
            let dy = y as f64 - pupil[1];
            let d = (dx * dx + dy * dy).sqrt();
            let pix = if d <= pupil_radius {
                25
            } else if d <= iris_radius {
                // Shade the iris lighter toward its rim.
                let t = (d - pupil_radius) / (iris_radius - pupil_radius);
                (110.0 + 40.0 * t) as u8
            } else {
                205
            };
            img.put_pixel(x, y, Luma([pix]));
        }
    }
    img
}

/// Scripted screen-space gaze paths.
///
/// `Fixed` and `Orbit` are pure functions of time; `Walk` is a seeded
/// random walk clamped to the screen, the simulator's stand-in for an
/// unfocused viewer.
#[derive(Debug, Clone)]
pub enum GazeScript {
    /// Stare at one screen point.
    Fixed { point: [f64; 2] },
    /// Circle a center point at constant angular velocity (rad/s).
    Orbit {
        center: [f64; 2],
        radius: f64,
        angular_velocity: f64,
    },
    /// Random walk with uniform steps of up to `step` pixels per tick.
    Walk {
        start: [f64; 2],
        step: f64,
        bounds: [f64; 2],
        rng: StdRng,
        current: [f64; 2],
    },
}

impl GazeScript {
    pub fn fixed(point: [f64; 2]) -> Self {
        Self::Fixed { point }
    }

    pub fn orbit(center: [f64; 2], radius: f64, angular_velocity: f64) -> Self {
        Self::Orbit {
            center,
            radius,
            angular_velocity,
        }
    }

    pub fn walk(start: [f64; 2], step: f64, bounds: [f64; 2], seed: u64) -> Self {
        Self::Walk {
            start,
            step,
            bounds,
            rng: StdRng::seed_from_u64(seed),
            current: start,
        }
    }

    /// Gaze position at `time`. `Walk` advances one step per call.
    pub fn position(&mut self, time: f64) -> [f64; 2] {
        match self {
            Self::Fixed { point } => *point,
            Self::Orbit {
                center,
                radius,
                angular_velocity,
            } => {
                let theta = *angular_velocity * time;
                [
                    center[0] + *radius * theta.cos(),
                    center[1] + *radius * theta.sin(),
                ]
            }
            Self::Walk {
                step,
                bounds,
                rng,
                current,
                ..
            } => {
                let dx = rng.gen_range(-*step..=*step);
                let dy = rng.gen_range(-*step..=*step);
                current[0] = (current[0] + dx).clamp(0.0, bounds[0]);
                current[1] = (current[1] + dy).clamp(0.0, bounds[1]);
                *current
            }
        }
    }
}

/// Frame generator with a known screen-to-pupil ground truth.
#[derive(Debug, Clone)]
pub struct SyntheticEyeSource {
    truth: AffineTransform,
    inverse: AffineTransform,
    frame_width: u32,
    frame_height: u32,
    pupil_radius: f64,
}

impl SyntheticEyeSource {
    /// Build a source whose pupil excursion range maps linearly onto the
    /// screen: pupil coordinates inside a margin of the frame correspond to
    /// the full screen extent.
    pub fn new(frame_width: u32, frame_height: u32, screen: [f64; 2]) -> Self {
        let margin_x = frame_width as f64 * 0.2;
        let margin_y = frame_height as f64 * 0.2;
        let span_x = frame_width as f64 - 2.0 * margin_x;
        let span_y = frame_height as f64 - 2.0 * margin_y;

        // pupil -> screen: scale the usable pupil span to the screen.
        let truth = AffineTransform {
            a: screen[0] / span_x,
            b: 0.0,
            c: -screen[0] * margin_x / span_x,
            d: 0.0,
            e: screen[1] / span_y,
            f: -screen[1] * margin_y / span_y,
        };
        let inverse = truth.invert().unwrap_or_else(AffineTransform::identity);

        Self {
            truth,
            inverse,
            frame_width,
            frame_height,
            pupil_radius: (frame_height as f64 * 0.13).max(6.0),
        }
    }

    /// The pupil-to-screen ground truth this source renders against.
    pub fn truth(&self) -> &AffineTransform {
        &self.truth
    }

    /// Pupil position that corresponds to a screen gaze point.
    pub fn pupil_for_gaze(&self, screen_xy: [f64; 2]) -> [f64; 2] {
        self.inverse.apply(screen_xy)
    }

    /// Render the eye frame for a viewer fixating `screen_xy`.
    pub fn frame_for_gaze(&self, screen_xy: [f64; 2]) -> GrayImage {
        let pupil = self.pupil_for_gaze(screen_xy);
        render_eye_frame(
            self.frame_width,
            self.frame_height,
            pupil,
            self.pupil_radius,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pupil::PupilDetector;
    use approx::assert_relative_eq;

    #[test]
    fn truth_and_inverse_round_trip() {
        let src = SyntheticEyeSource::new(120, 80, [1600.0, 900.0]);
        let screen = [400.0, 600.0];
        let pupil = src.pupil_for_gaze(screen);
        let back = src.truth().apply(pupil);
        assert_relative_eq!(back[0], screen[0], epsilon = 1e-9);
        assert_relative_eq!(back[1], screen[1], epsilon = 1e-9);
    }

    #[test]
    fn rendered_frame_detects_near_commanded_pupil() {
        let src = SyntheticEyeSource::new(120, 80, [1600.0, 900.0]);
        let screen = [800.0, 450.0];
        let expected = src.pupil_for_gaze(screen);
        let frame = src.frame_for_gaze(screen);

        let sample = PupilDetector::new().detect(&frame);
        assert!(sample.found);
        assert!((sample.x - expected[0]).abs() < 2.0);
        assert!((sample.y - expected[1]).abs() < 2.0);
    }

    #[test]
    fn walk_stays_in_bounds() {
        let mut script = GazeScript::walk([800.0, 450.0], 40.0, [1600.0, 900.0], 42);
        for i in 0..500 {
            let p = script.position(i as f64 / 30.0);
            assert!(p[0] >= 0.0 && p[0] <= 1600.0);
            assert!(p[1] >= 0.0 && p[1] <= 900.0);
        }
    }

    #[test]
    fn orbit_radius_is_constant() {
        let mut script = GazeScript::orbit([800.0, 450.0], 120.0, 1.0);
        for i in 0..50 {
            let p = script.position(i as f64 * 0.1);
            let d = ((p[0] - 800.0).powi(2) + (p[1] - 450.0).powi(2)).sqrt();
            assert_relative_eq!(d, 120.0, epsilon = 1e-9);
        }
    }
}

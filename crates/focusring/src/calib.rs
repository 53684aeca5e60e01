//! Guided 5-target calibration: dwell collection, warm-up discard, and the
//! affine fit with its degeneracy gates.
//!
//! The shell displays each target in turn (center, then the four corners)
//! and feeds every frame's pupil sample to [`CalibrationSession::record`];
//! the session tracks dwell time against the supplied wall clock and
//! advances targets itself. [`CalibrationSession::finish`] averages the
//! post-warm-up valid samples per target and fits the transform. Every
//! failure mode is an explicit, recoverable error; there is no silent
//! fallback to an identity mapping.

use crate::pupil::PupilSample;
use crate::transform::{fit_affine_lsq, AffineFitError, AffineTransform};

// ── Error type ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// A target's dwell window produced no valid pupil sample.
    TargetMissingSamples { target: usize },
    /// The fitted transform collapsed (near-singular linear part).
    DegenerateFit { det: f64 },
    /// The least-squares solve itself failed.
    FitFailed(AffineFitError),
    /// `finish` was called before all targets completed their dwell.
    Incomplete { remaining: usize },
}

impl std::fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TargetMissingSamples { target } => {
                write!(f, "no valid pupil samples for target {}", target)
            }
            Self::DegenerateFit { det } => {
                write!(f, "degenerate calibration fit (linear det = {:e})", det)
            }
            Self::FitFailed(e) => write!(f, "calibration fit failed: {}", e),
            Self::Incomplete { remaining } => {
                write!(f, "calibration incomplete: {} targets remaining", remaining)
            }
        }
    }
}

impl std::error::Error for CalibrationError {}

// ── Config ───────────────────────────────────────────────────────────────

/// Calibration protocol tuning.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CalibrationConfig {
    /// Per-target dwell duration in seconds.
    pub dwell_s: f64,
    /// Fraction of each target's collected samples discarded as warm-up,
    /// letting the eye settle after the target jump.
    pub warmup_fraction: f64,
    /// Inset of the corner targets from the screen edges, as a fraction of
    /// each screen dimension.
    pub corner_margin_fraction: f64,
    /// Reject fits whose linear-part determinant magnitude falls below this.
    pub min_linear_det: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            dwell_s: 1.2,
            warmup_fraction: 0.25,
            corner_margin_fraction: 0.05,
            min_linear_det: 1e-4,
        }
    }
}

// ── Session ──────────────────────────────────────────────────────────────

/// Dwell progress for the shell's target display.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CalibrationStatus {
    /// Index of the active target, or of the last target once complete.
    pub target_index: usize,
    /// Total number of targets.
    pub target_count: usize,
    /// Screen position of the active target.
    pub target: [f64; 2],
    /// Dwell progress for the active target in [0, 1].
    pub dwell_progress: f64,
    /// All targets have finished their dwell.
    pub complete: bool,
}

/// One guided calibration run.
///
/// Created per calibration attempt and discarded after `finish`; a failed
/// fit means a fresh session, never a partial reuse.
#[derive(Debug, Clone)]
pub struct CalibrationSession {
    config: CalibrationConfig,
    targets: Vec<[f64; 2]>,
    samples: Vec<Vec<PupilSample>>,
    current: usize,
    dwell_started: Option<f64>,
    complete: bool,
}

impl CalibrationSession {
    /// Session over an explicit target sequence.
    pub fn new(targets: Vec<[f64; 2]>, config: CalibrationConfig) -> Self {
        let n = targets.len();
        Self {
            config,
            targets,
            samples: vec![Vec::new(); n],
            current: 0,
            dwell_started: None,
            complete: n == 0,
        }
    }

    /// Standard 5-target session: screen center first, then the four
    /// corners (TL, TR, BR, BL) inset by the configured margin.
    pub fn with_screen(width: f64, height: f64, config: CalibrationConfig) -> Self {
        let mx = width * config.corner_margin_fraction;
        let my = height * config.corner_margin_fraction;
        let targets = vec![
            [width / 2.0, height / 2.0],
            [mx, my],
            [width - mx, my],
            [width - mx, height - my],
            [mx, height - my],
        ];
        Self::new(targets, config)
    }

    /// Feed one frame's pupil sample while the user fixates the active
    /// target. The dwell clock for a target starts at its first recorded
    /// frame; when `dwell_s` elapses the session advances to the next
    /// target. Returns the post-record status.
    pub fn record(&mut self, now: f64, sample: &PupilSample) -> CalibrationStatus {
        if self.complete {
            return self.status(now);
        }

        let started = *self.dwell_started.get_or_insert(now);
        self.samples[self.current].push(*sample);

        if now - started >= self.config.dwell_s {
            self.current += 1;
            self.dwell_started = None;
            if self.current >= self.targets.len() {
                self.complete = true;
                self.current = self.targets.len() - 1;
            }
        }

        self.status(now)
    }

    /// Current status for the calibration UI. Raw samples never leak to
    /// the shell.
    pub fn status(&self, now: f64) -> CalibrationStatus {
        let progress = if self.complete {
            1.0
        } else {
            match self.dwell_started {
                Some(t0) => ((now - t0) / self.config.dwell_s).clamp(0.0, 1.0),
                None => 0.0,
            }
        };
        CalibrationStatus {
            target_index: self.current,
            target_count: self.targets.len(),
            target: self.targets.get(self.current).copied().unwrap_or_default(),
            dwell_progress: progress,
            complete: self.complete,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Average the usable samples per target and fit the transform.
    pub fn finish(&self) -> Result<AffineTransform, CalibrationError> {
        if !self.complete {
            return Err(CalibrationError::Incomplete {
                remaining: self.targets.len() - self.current,
            });
        }

        let mut pupil_pts = Vec::with_capacity(self.targets.len());
        for (i, collected) in self.samples.iter().enumerate() {
            let rep = self
                .representative(collected)
                .ok_or(CalibrationError::TargetMissingSamples { target: i })?;
            pupil_pts.push(rep);
        }

        let fitted = fit_affine_lsq(&pupil_pts, &self.targets)
            .map_err(CalibrationError::FitFailed)?;

        let det = fitted.linear_det();
        if det.abs() < self.config.min_linear_det {
            return Err(CalibrationError::DegenerateFit { det });
        }

        Ok(fitted)
    }

    /// Mean of the valid samples after the warm-up discard. Falls back to
    /// the full window when the discard would remove every valid sample.
    fn representative(&self, collected: &[PupilSample]) -> Option<[f64; 2]> {
        let skip = (collected.len() as f64 * self.config.warmup_fraction) as usize;
        let settled: Vec<&PupilSample> =
            collected[skip.min(collected.len())..].iter().filter(|s| s.found).collect();
        let usable: Vec<&PupilSample> = if settled.is_empty() {
            collected.iter().filter(|s| s.found).collect()
        } else {
            settled
        };
        if usable.is_empty() {
            return None;
        }
        let n = usable.len() as f64;
        Some([
            usable.iter().map(|s| s.x).sum::<f64>() / n,
            usable.iter().map(|s| s.y).sum::<f64>() / n,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const FPS_DT: f64 = 1.0 / 30.0;

    fn found(x: f64, y: f64) -> PupilSample {
        PupilSample {
            x,
            y,
            found: true,
            confidence: 0.9,
        }
    }

    fn ground_truth() -> AffineTransform {
        AffineTransform {
            a: 22.0,
            b: 0.4,
            c: 90.0,
            d: -0.3,
            e: 16.5,
            f: 30.0,
        }
    }

    /// Drive a full session where the simulated eye fixates each target
    /// through the ground-truth inverse, optionally corrupting the warm-up
    /// frames and dropping samples.
    fn run_protocol(
        gt: &AffineTransform,
        corrupt_warmup: bool,
        miss_target: Option<usize>,
    ) -> CalibrationSession {
        let inv = gt.invert().expect("invertible ground truth");
        let mut session =
            CalibrationSession::with_screen(1600.0, 900.0, CalibrationConfig::default());
        let mut now = 0.0;
        while !session.is_complete() {
            let status = session.status(now);
            let i = status.target_index;
            let sample = if Some(i) == miss_target {
                PupilSample::not_found()
            } else if corrupt_warmup && status.dwell_progress < 0.25 {
                // Eye still in flight toward the target.
                found(999.0, 999.0)
            } else {
                let p = inv.apply(status.target);
                found(p[0], p[1])
            };
            session.record(now, &sample);
            now += FPS_DT;
        }
        session
    }

    #[test]
    fn noiseless_protocol_recovers_ground_truth() {
        let gt = ground_truth();
        let session = run_protocol(&gt, false, None);
        let fitted = session.finish().expect("calibration should succeed");
        assert_relative_eq!(fitted.a, gt.a, epsilon = 1e-6);
        assert_relative_eq!(fitted.b, gt.b, epsilon = 1e-6);
        assert_relative_eq!(fitted.c, gt.c, epsilon = 1e-3);
        assert_relative_eq!(fitted.d, gt.d, epsilon = 1e-6);
        assert_relative_eq!(fitted.e, gt.e, epsilon = 1e-6);
        assert_relative_eq!(fitted.f, gt.f, epsilon = 1e-3);
    }

    #[test]
    fn warmup_frames_do_not_poison_the_fit() {
        let gt = ground_truth();
        let session = run_protocol(&gt, true, None);
        let fitted = session.finish().expect("calibration should succeed");
        // The corrupted first quarter is discarded, so the fit stays tight.
        assert_relative_eq!(fitted.a, gt.a, epsilon = 1e-6);
        assert_relative_eq!(fitted.e, gt.e, epsilon = 1e-6);
    }

    #[test]
    fn target_with_no_valid_samples_fails() {
        let gt = ground_truth();
        let session = run_protocol(&gt, false, Some(2));
        assert_eq!(
            session.finish(),
            Err(CalibrationError::TargetMissingSamples { target: 2 })
        );
    }

    #[test]
    fn finish_before_completion_is_rejected() {
        let mut session =
            CalibrationSession::with_screen(1600.0, 900.0, CalibrationConfig::default());
        session.record(0.0, &found(10.0, 10.0));
        assert!(matches!(
            session.finish(),
            Err(CalibrationError::Incomplete { .. })
        ));
    }

    #[test]
    fn frozen_pupil_fails_the_solve() {
        // The eye never moves: every target sees the same pupil position
        // and the normal matrix collapses.
        let mut session =
            CalibrationSession::with_screen(1600.0, 900.0, CalibrationConfig::default());
        let mut now = 0.0;
        while !session.is_complete() {
            session.record(now, &found(60.0, 40.0));
            now += FPS_DT;
        }
        assert!(matches!(
            session.finish(),
            Err(CalibrationError::FitFailed(_))
        ));
    }

    #[test]
    fn near_collapsed_fit_trips_the_degeneracy_gate() {
        // Well-spread pupils mapped onto targets that all lie on one
        // horizontal line: the per-axis solves succeed but the linear part
        // is singular, which must be rejected rather than returned.
        let targets = vec![
            [100.0, 450.0],
            [400.0, 450.0],
            [800.0, 450.0],
            [1200.0, 450.0],
            [1500.0, 450.0],
        ];
        let pupils = [
            [60.0, 40.0],
            [20.0, 12.0],
            [100.0, 14.0],
            [98.0, 66.0],
            [22.0, 64.0],
        ];
        let mut session = CalibrationSession::new(targets, CalibrationConfig::default());
        let mut now = 0.0;
        let mut i = 0;
        while !session.is_complete() {
            let p = pupils[i.min(4)];
            let status = session.record(now, &found(p[0], p[1]));
            i = status.target_index;
            now += FPS_DT;
        }
        match session.finish() {
            Err(CalibrationError::DegenerateFit { det }) => {
                assert!(det.abs() < 1e-4, "det = {}", det);
            }
            other => panic!("expected DegenerateFit, got {:?}", other),
        }
    }

    #[test]
    fn targets_run_center_then_corners() {
        let session =
            CalibrationSession::with_screen(1000.0, 800.0, CalibrationConfig::default());
        let status = session.status(0.0);
        assert_eq!(status.target_count, 5);
        assert_eq!(status.target, [500.0, 400.0]);
        assert_eq!(session.targets[1], [50.0, 40.0]);
        assert_eq!(session.targets[3], [950.0, 760.0]);
    }

    #[test]
    fn dwell_progress_reported_to_shell() {
        let mut session =
            CalibrationSession::with_screen(1600.0, 900.0, CalibrationConfig::default());
        session.record(0.0, &found(10.0, 10.0));
        let status = session.record(0.6, &found(10.0, 10.0));
        assert_eq!(status.target_index, 0);
        assert_relative_eq!(status.dwell_progress, 0.5);
    }
}

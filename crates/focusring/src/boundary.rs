//! Focus-boundary geometry: waveform base curve, distractor blob
//! perturbations, and the touch-band containment classifier.
//!
//! The boundary is a closed polar curve around a fixed center. Its radius
//! at angle `theta` and time `t` is
//!
//! ```text
//! base_radius + amplitude * sin(frequency * t + lobes * theta) + bumps
//! ```
//!
//! where each well-formed distractor blob contributes a bump localized
//! around the blob's angle, inversely proportional to its angular offset
//! and its radial distance from the base curve. "Touching" is a band of
//! configurable width straddling the curve, modeling visible contact
//! rather than a strict crossing.

/// Rectangular region the distractor blobs bounce inside, usually the
/// screen.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Arena {
    pub width: f64,
    pub height: f64,
}

/// A moving perturbation source. Spawned and retired by the shell; the
/// engine only reads positions.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DistractorBlob {
    /// Position in screen pixels.
    pub pos: [f64; 2],
    /// Velocity in pixels per second.
    pub vel: [f64; 2],
    /// Blob radius in pixels; scales the perturbation footprint.
    pub radius: f64,
    /// Signed perturbation strength in pixels: positive bulges the
    /// boundary outward, negative dents it.
    pub influence: f64,
}

impl DistractorBlob {
    /// Integrate one step of the bounce kinematics: move, reflect the
    /// velocity at arena edges, clamp back inside.
    pub fn advance(&mut self, dt: f64, arena: &Arena) {
        self.pos[0] += self.vel[0] * dt;
        self.pos[1] += self.vel[1] * dt;

        if self.pos[0] < self.radius || self.pos[0] > arena.width - self.radius {
            self.vel[0] = -self.vel[0];
        }
        if self.pos[1] < self.radius || self.pos[1] > arena.height - self.radius {
            self.vel[1] = -self.vel[1];
        }
        self.pos[0] = self.pos[0].clamp(self.radius, arena.width - self.radius);
        self.pos[1] = self.pos[1].clamp(self.radius, arena.height - self.radius);
    }

    /// Shell-supplied blob data is untrusted; anything non-finite or with
    /// a non-positive radius disqualifies the perturbation set.
    pub fn is_well_formed(&self) -> bool {
        self.pos.iter().all(|v| v.is_finite())
            && self.vel.iter().all(|v| v.is_finite())
            && self.radius.is_finite()
            && self.radius > 0.0
            && self.influence.is_finite()
    }
}

/// Boundary shape tuning.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BoundaryConfig {
    /// Curve center in screen pixels.
    pub center: [f64; 2],
    /// Mean curve radius in pixels.
    pub base_radius: f64,
    /// Waveform amplitude in pixels.
    pub amplitude: f64,
    /// Waveform angular frequency over time, rad/s.
    pub frequency: f64,
    /// Number of waveform lobes around the curve.
    pub lobes: u32,
    /// Half-width of the touching band, pixels on either side of the curve.
    pub touch_tolerance: f64,
    /// Angular softening of blob bumps, radians; smaller is more local.
    pub blob_softening: f64,
    /// Points sampled for the renderable polyline.
    pub render_samples: usize,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            center: [800.0, 450.0],
            base_radius: 240.0,
            amplitude: 18.0,
            frequency: 0.8,
            lobes: 5,
            touch_tolerance: 12.0,
            blob_softening: 0.35,
            render_samples: 180,
        }
    }
}

/// Containment classification of a point against a boundary snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Containment {
    Inside,
    Touching,
    Outside,
}

impl Containment {
    pub fn is_touching(&self) -> bool {
        matches!(self, Containment::Touching)
    }
}

/// Boundary geometry frozen at one timestamp.
///
/// Recomputed every frame from elapsed time; never persisted across
/// rounds.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BoundaryState {
    /// Timestamp the curve was evaluated at.
    pub time: f64,
    /// Validated blobs whose perturbations are active this frame.
    pub blobs: Vec<DistractorBlob>,
    /// True when malformed blob input forced the unperturbed base curve.
    pub degraded: bool,
    /// Renderable closed curve, `render_samples` points.
    pub polyline: Vec<[f64; 2]>,
    params: BoundaryConfig,
}

impl BoundaryState {
    /// Curve radius at `theta` (radians, measured from the center).
    pub fn radius_at(&self, theta: f64) -> f64 {
        let p = &self.params;
        let mut r = p.base_radius
            + p.amplitude * (p.frequency * self.time + f64::from(p.lobes) * theta).sin();
        for blob in &self.blobs {
            r += blob_bump(blob, theta, p);
        }
        r
    }

    /// Classify a screen point against the touching band.
    ///
    /// A point exactly on the curve is `Touching`; the band extends
    /// `touch_tolerance` to both sides.
    pub fn classify(&self, point: [f64; 2]) -> Containment {
        let dx = point[0] - self.params.center[0];
        let dy = point[1] - self.params.center[1];
        let dist = (dx * dx + dy * dy).sqrt();
        let theta = dy.atan2(dx);
        let r = self.radius_at(theta);

        if (dist - r).abs() <= self.params.touch_tolerance {
            Containment::Touching
        } else if dist < r {
            Containment::Inside
        } else {
            Containment::Outside
        }
    }

    pub fn center(&self) -> [f64; 2] {
        self.params.center
    }
}

/// Wrap an angle difference into [-pi, pi].
fn wrap_angle(x: f64) -> f64 {
    let tau = std::f64::consts::TAU;
    let w = (x + std::f64::consts::PI).rem_euclid(tau);
    w - std::f64::consts::PI
}

/// Signed radial bump a single blob contributes at `theta`.
///
/// Radial term peaks at 1 when the blob sits on the base circle and decays
/// with the square of its distance from it; the angular term is a
/// Lorentzian around the blob's bearing.
fn blob_bump(blob: &DistractorBlob, theta: f64, p: &BoundaryConfig) -> f64 {
    let dx = blob.pos[0] - p.center[0];
    let dy = blob.pos[1] - p.center[1];
    let dist = (dx * dx + dy * dy).sqrt();
    let bearing = dy.atan2(dx);

    let r2 = blob.radius * blob.radius;
    let radial = r2 / ((dist - p.base_radius).powi(2) + r2);

    let delta = wrap_angle(theta - bearing);
    let angular = 1.0 / (1.0 + (delta / p.blob_softening).powi(2));

    blob.influence * radial * angular
}

/// Stateless boundary evaluator. Create once, query per frame.
#[derive(Debug, Clone, Default)]
pub struct BoundaryEngine {
    config: BoundaryConfig,
}

impl BoundaryEngine {
    pub fn new(config: BoundaryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BoundaryConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut BoundaryConfig {
        &mut self.config
    }

    /// Evaluate the boundary at `time` with the shell's current blobs.
    ///
    /// Malformed blob data degrades to the unperturbed base waveform
    /// instead of failing; the returned state records the degradation.
    pub fn boundary_at(&self, time: f64, blobs: &[DistractorBlob]) -> BoundaryState {
        let degraded = !blobs.iter().all(DistractorBlob::is_well_formed);
        let active: Vec<DistractorBlob> = if degraded { Vec::new() } else { blobs.to_vec() };

        let mut state = BoundaryState {
            time,
            blobs: active,
            degraded,
            polyline: Vec::new(),
            params: self.config.clone(),
        };

        let n = self.config.render_samples.max(3);
        state.polyline = (0..n)
            .map(|i| {
                let theta = i as f64 / n as f64 * std::f64::consts::TAU;
                let r = state.radius_at(theta);
                [
                    self.config.center[0] + r * theta.cos(),
                    self.config.center[1] + r * theta.sin(),
                ]
            })
            .collect();
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn engine() -> BoundaryEngine {
        BoundaryEngine::new(BoundaryConfig::default())
    }

    fn on_curve_point(state: &BoundaryState, theta: f64, offset: f64) -> [f64; 2] {
        let r = state.radius_at(theta) + offset;
        [
            state.center()[0] + r * theta.cos(),
            state.center()[1] + r * theta.sin(),
        ]
    }

    #[test]
    fn point_on_base_curve_is_touching() {
        let state = engine().boundary_at(3.7, &[]);
        for i in 0..12 {
            let theta = i as f64 / 12.0 * std::f64::consts::TAU;
            let p = on_curve_point(&state, theta, 0.0);
            assert_eq!(state.classify(p), Containment::Touching, "theta = {}", theta);
        }
    }

    #[test]
    fn band_edges_are_inclusive() {
        let state = engine().boundary_at(1.0, &[]);
        let tol = state.params.touch_tolerance;
        assert_eq!(
            state.classify(on_curve_point(&state, 0.0, tol - 1e-6)),
            Containment::Touching
        );
        assert_eq!(
            state.classify(on_curve_point(&state, 0.0, -(tol - 1e-6))),
            Containment::Touching
        );
        assert_eq!(
            state.classify(on_curve_point(&state, 0.0, tol + 0.5)),
            Containment::Outside
        );
        assert_eq!(
            state.classify(on_curve_point(&state, 0.0, -(tol + 0.5))),
            Containment::Inside
        );
    }

    #[test]
    fn center_is_inside_and_far_is_outside() {
        let state = engine().boundary_at(0.0, &[]);
        assert_eq!(state.classify(state.center()), Containment::Inside);
        assert_eq!(state.classify([5000.0, 5000.0]), Containment::Outside);
    }

    #[test]
    fn waveform_moves_with_time() {
        let e = engine();
        let a = e.boundary_at(0.0, &[]).radius_at(0.3);
        let b = e.boundary_at(1.0, &[]).radius_at(0.3);
        assert!((a - b).abs() > 1e-3, "radius should deform over time");
    }

    #[test]
    fn blob_bump_is_localized_to_its_bearing() {
        let e = engine();
        let cfg = e.config().clone();
        // Blob sitting on the base circle at bearing 0.
        let blob = DistractorBlob {
            pos: [cfg.center[0] + cfg.base_radius, cfg.center[1]],
            vel: [0.0, 0.0],
            radius: 40.0,
            influence: 25.0,
        };
        let with = e.boundary_at(0.0, &[blob]);
        let without = e.boundary_at(0.0, &[]);

        let near = with.radius_at(0.0) - without.radius_at(0.0);
        let far = with.radius_at(std::f64::consts::PI) - without.radius_at(std::f64::consts::PI);
        assert_relative_eq!(near, 25.0, epsilon = 1e-9); // full influence at the bearing
        assert!(far < near / 10.0, "bump must decay away from the blob");
    }

    #[test]
    fn malformed_blob_degrades_to_base_waveform() {
        let e = engine();
        let bad = DistractorBlob {
            pos: [f64::NAN, 100.0],
            vel: [1.0, 1.0],
            radius: 30.0,
            influence: 20.0,
        };
        let good = DistractorBlob {
            pos: [900.0, 450.0],
            vel: [0.0, 0.0],
            radius: 30.0,
            influence: 20.0,
        };
        let state = e.boundary_at(2.0, &[good, bad]);
        assert!(state.degraded);
        assert!(state.blobs.is_empty());

        let base = e.boundary_at(2.0, &[]);
        for i in 0..8 {
            let theta = i as f64 / 8.0 * std::f64::consts::TAU;
            assert_relative_eq!(state.radius_at(theta), base.radius_at(theta));
        }
    }

    #[test]
    fn zero_radius_blob_is_rejected() {
        let blob = DistractorBlob {
            pos: [10.0, 10.0],
            vel: [0.0, 0.0],
            radius: 0.0,
            influence: 5.0,
        };
        assert!(!blob.is_well_formed());
    }

    #[test]
    fn blob_reflects_at_arena_edges() {
        let arena = Arena {
            width: 1600.0,
            height: 900.0,
        };
        let mut blob = DistractorBlob {
            pos: [1590.0, 450.0],
            vel: [300.0, 0.0],
            radius: 30.0,
            influence: 10.0,
        };
        blob.advance(0.1, &arena);
        assert!(blob.vel[0] < 0.0, "x velocity should reflect");
        assert!(blob.pos[0] <= arena.width - blob.radius);

        let mut blob2 = DistractorBlob {
            pos: [800.0, 20.0],
            vel: [0.0, -200.0],
            radius: 30.0,
            influence: 10.0,
        };
        blob2.advance(0.1, &arena);
        assert!(blob2.vel[1] > 0.0, "y velocity should reflect");
        assert!(blob2.pos[1] >= blob2.radius);
    }

    #[test]
    fn polyline_lies_on_the_curve() {
        let state = engine().boundary_at(0.5, &[]);
        assert_eq!(state.polyline.len(), 180);
        for p in &state.polyline {
            assert_eq!(state.classify(*p), Containment::Touching);
        }
    }
}

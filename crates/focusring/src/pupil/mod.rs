//! Pupil localization in an extracted eye region.
//!
//! The detector looks for the darkest plausibly-pupil-shaped blob: blur,
//! threshold, label connected dark regions, gate by area and eccentricity,
//! then score the survivors by circularity and area agreement. When nothing
//! passes the gates the sample reports `found = false`; callers must
//! tolerate missing samples on any frame (glare, glasses, extreme gaze
//! angles).

mod region;

use image::{GrayImage, ImageBuffer, Luma};

use region::dark_regions;

/// Per-frame pupil estimate in eye-image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PupilSample {
    /// Pupil center x in eye-image pixels.
    pub x: f64,
    /// Pupil center y in eye-image pixels.
    pub y: f64,
    /// Whether a plausible pupil was located this frame.
    pub found: bool,
    /// Shape-based confidence in [0, 1]; 0 when not found.
    pub confidence: f64,
}

impl PupilSample {
    /// The miss sample: callers holding last-known-good treat this as
    /// "no update this frame".
    pub fn not_found() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            found: false,
            confidence: 0.0,
        }
    }
}

/// Detection tuning. Defaults assume eye crops on the order of 120x80
/// pixels as produced by common face-landmark eye extraction.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PupilConfig {
    /// Gaussian blur sigma applied before thresholding; 0 disables.
    pub blur_sigma: f32,
    /// Intensity cutoff: pixels strictly darker belong to candidate regions.
    pub intensity_threshold: u8,
    /// Minimum accepted region area in pixels.
    pub min_area_px: usize,
    /// Maximum accepted region area in pixels.
    pub max_area_px: usize,
    /// Maximum accepted second-moment eccentricity (0 disc, 1 line).
    pub max_eccentricity: f64,
    /// Expected pupil area in pixels, used for the confidence weighting.
    pub expected_area_px: f64,
}

impl Default for PupilConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 1.2,
            intensity_threshold: 55,
            min_area_px: 40,
            max_area_px: 6000,
            max_eccentricity: 0.85,
            expected_area_px: 450.0,
        }
    }
}

/// Dark-region pupil detector.
///
/// Create once, detect on many frames.
#[derive(Debug, Clone, Default)]
pub struct PupilDetector {
    config: PupilConfig,
}

impl PupilDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: PupilConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PupilConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut PupilConfig {
        &mut self.config
    }

    /// Locate the pupil in an eye-region frame.
    ///
    /// Returns `found = false` rather than an unstable guess whenever no
    /// region passes the shape gates.
    pub fn detect(&self, eye: &GrayImage) -> PupilSample {
        let (w, h) = eye.dimensions();
        if w < 4 || h < 4 {
            return PupilSample::not_found();
        }

        let blurred;
        let source = if self.config.blur_sigma > 0.0 {
            blurred = blur_gray(eye, self.config.blur_sigma);
            &blurred
        } else {
            eye
        };

        let mut best: Option<(f64, PupilSample)> = None;
        for r in dark_regions(source, self.config.intensity_threshold) {
            if r.area < self.config.min_area_px || r.area > self.config.max_area_px {
                continue;
            }
            if r.eccentricity() > self.config.max_eccentricity {
                continue;
            }

            let area = r.area as f64;
            let expected = self.config.expected_area_px.max(1.0);
            let area_agreement = (area / expected).min(expected / area);
            let confidence = (r.circularity() * area_agreement).clamp(0.0, 1.0);
            let score = confidence * area.sqrt();

            let candidate = PupilSample {
                x: r.cx,
                y: r.cy,
                found: true,
                confidence,
            };
            match &best {
                Some((s, _)) if *s >= score => {}
                _ => best = Some((score, candidate)),
            }
        }

        best.map(|(_, s)| s).unwrap_or_else(PupilSample::not_found)
    }
}

/// Gaussian-blur a `GrayImage` through an f32 buffer.
fn blur_gray(img: &GrayImage, sigma: f32) -> GrayImage {
    let (w, h) = img.dimensions();
    let mut f = ImageBuffer::<Luma<f32>, Vec<f32>>::new(w, h);
    for y in 0..h {
        for x in 0..w {
            f.put_pixel(x, y, Luma([img.get_pixel(x, y)[0] as f32 / 255.0]));
        }
    }
    let blurred = imageproc::filter::gaussian_blur_f32(&f, sigma);
    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let v = blurred.get_pixel(x, y)[0].clamp(0.0, 1.0);
            out.put_pixel(x, y, Luma([(v * 255.0).round() as u8]));
        }
    }
    out
}

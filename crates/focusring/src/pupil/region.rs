//! Connected dark-region extraction over a thresholded eye frame.
//!
//! 4-connected component labeling with an explicit stack, plus the shape
//! statistics the detector gates on: centroid, area, second-moment
//! eccentricity, and fill circularity.

use image::GrayImage;

/// Shape statistics for one connected dark region.
#[derive(Debug, Clone)]
pub(crate) struct Region {
    /// Pixel count.
    pub area: usize,
    /// Centroid x in image coordinates.
    pub cx: f64,
    /// Centroid y in image coordinates.
    pub cy: f64,
    /// Central second moments, normalized by area.
    pub mxx: f64,
    pub myy: f64,
    pub mxy: f64,
    /// Largest centroid-to-pixel distance, in pixels.
    pub max_extent: f64,
}

impl Region {
    fn from_pixels(pixels: &[(u32, u32)]) -> Self {
        let area = pixels.len();
        let n = area as f64;
        let cx = pixels.iter().map(|p| p.0 as f64).sum::<f64>() / n;
        let cy = pixels.iter().map(|p| p.1 as f64).sum::<f64>() / n;

        let mut mxx = 0.0;
        let mut myy = 0.0;
        let mut mxy = 0.0;
        let mut max_extent: f64 = 0.0;
        for &(x, y) in pixels {
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            mxx += dx * dx;
            myy += dy * dy;
            mxy += dx * dy;
            max_extent = max_extent.max((dx * dx + dy * dy).sqrt());
        }
        mxx /= n;
        myy /= n;
        mxy /= n;

        Region {
            area,
            cx,
            cy,
            mxx,
            myy,
            mxy,
            max_extent,
        }
    }

    /// Second-moment eccentricity in [0, 1]: 0 for a disc, toward 1 for a
    /// line. Computed from the eigenvalues of the covariance matrix.
    pub fn eccentricity(&self) -> f64 {
        let trace = self.mxx + self.myy;
        let diff = self.mxx - self.myy;
        let disc = (diff * diff + 4.0 * self.mxy * self.mxy).sqrt();
        let l_max = (trace + disc) / 2.0;
        let l_min = (trace - disc) / 2.0;
        if l_max <= 1e-9 {
            return 0.0;
        }
        (1.0 - (l_min / l_max).max(0.0)).sqrt()
    }

    /// Fill circularity in (0, 1]: region area relative to the disc that
    /// spans its max extent. A filled disc scores near 1, rings and
    /// irregular shadows score low.
    pub fn circularity(&self) -> f64 {
        let r = self.max_extent + 0.5;
        let disc_area = std::f64::consts::PI * r * r;
        if disc_area <= 0.0 {
            return 0.0;
        }
        (self.area as f64 / disc_area).min(1.0)
    }
}

/// Extract all 4-connected regions of pixels strictly darker than
/// `threshold`.
pub(crate) fn dark_regions(img: &GrayImage, threshold: u8) -> Vec<Region> {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return Vec::new();
    }
    let mut visited = vec![false; (w * h) as usize];
    let idx = |x: u32, y: u32| (y * w + x) as usize;

    let mut regions = Vec::new();
    let mut stack: Vec<(u32, u32)> = Vec::new();
    let mut pixels: Vec<(u32, u32)> = Vec::new();

    for y in 0..h {
        for x in 0..w {
            if visited[idx(x, y)] || img.get_pixel(x, y)[0] >= threshold {
                continue;
            }

            pixels.clear();
            stack.push((x, y));
            visited[idx(x, y)] = true;
            while let Some((px, py)) = stack.pop() {
                pixels.push((px, py));
                // wrapping_sub at the border lands outside [0, w) x [0, h)
                // and is rejected by the bounds check.
                let neighbors = [
                    (px.wrapping_sub(1), py),
                    (px + 1, py),
                    (px, py.wrapping_sub(1)),
                    (px, py + 1),
                ];
                for (nx, ny) in neighbors {
                    if nx >= w || ny >= h {
                        continue;
                    }
                    if !visited[idx(nx, ny)] && img.get_pixel(nx, ny)[0] < threshold {
                        visited[idx(nx, ny)] = true;
                        stack.push((nx, ny));
                    }
                }
            }

            regions.push(Region::from_pixels(&pixels));
        }
    }

    regions
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn frame_with_dark(w: u32, h: u32, dark: &[(u32, u32)]) -> GrayImage {
        let mut img = GrayImage::from_pixel(w, h, Luma([200]));
        for &(x, y) in dark {
            img.put_pixel(x, y, Luma([10]));
        }
        img
    }

    #[test]
    fn single_square_region() {
        let dark: Vec<(u32, u32)> = (4..8).flat_map(|y| (4..8).map(move |x| (x, y))).collect();
        let img = frame_with_dark(16, 16, &dark);
        let regions = dark_regions(&img, 128);
        assert_eq!(regions.len(), 1);
        let r = &regions[0];
        assert_eq!(r.area, 16);
        assert!((r.cx - 5.5).abs() < 1e-9);
        assert!((r.cy - 5.5).abs() < 1e-9);
        assert!(r.eccentricity() < 0.1);
    }

    #[test]
    fn diagonal_pixels_are_separate_regions() {
        // 4-connectivity: diagonal neighbors do not merge.
        let img = frame_with_dark(8, 8, &[(2, 2), (3, 3)]);
        let regions = dark_regions(&img, 128);
        assert_eq!(regions.len(), 2);
    }

    #[test]
    fn line_has_high_eccentricity() {
        let dark: Vec<(u32, u32)> = (2..14).map(|x| (x, 5)).collect();
        let img = frame_with_dark(16, 16, &dark);
        let regions = dark_regions(&img, 128);
        assert_eq!(regions.len(), 1);
        assert!(regions[0].eccentricity() > 0.95);
        assert!(regions[0].circularity() < 0.5);
    }

    #[test]
    fn bright_frame_yields_nothing() {
        let img = GrayImage::from_pixel(12, 12, Luma([220]));
        assert!(dark_regions(&img, 64).is_empty());
    }
}

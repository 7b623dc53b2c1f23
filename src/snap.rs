//! Edge snapping ("magnet") for manual tracing.

use crate::config::ViewerConfig;
use crate::geometry::Point;
use crate::raster::Raster;

const SOBEL_X: [[f64; 3]; 3] = [[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]];
const SOBEL_Y: [[f64; 3]; 3] = [[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SnapSettings {
    pub radius: u32,
    pub noise_floor: f64,
}

impl Default for SnapSettings {
    fn default() -> Self {
        Self::from(&ViewerConfig::default())
    }
}

impl From<&ViewerConfig> for SnapSettings {
    fn from(config: &ViewerConfig) -> Self {
        Self {
            radius: config.snap_radius,
            noise_floor: config.snap_noise_floor,
        }
    }
}

/// Moves a normalized point onto the strongest nearby intensity edge.
///
/// Candidates are scored as `magnitude / (1 + 0.5 * distance)` and must
/// exceed the noise floor. Without a raster, or without any edge, the input
/// comes back unchanged.
pub fn snap_to_edge(raster: Option<&Raster>, point: Point, settings: SnapSettings) -> Point {
    let Some(raster) = raster else {
        return point;
    };
    if !point.is_finite() {
        return point;
    }
    let (width, height) = (raster.width() as i64, raster.height() as i64);
    if width < 3 || height < 3 {
        return point;
    }

    let px = (point.x * width as f64).round().clamp(0.0, (width - 1) as f64) as i64;
    let py = (point.y * height as f64).round().clamp(0.0, (height - 1) as f64) as i64;
    let radius = settings.radius as i64;

    // Interior window: every candidate keeps a one-pixel halo inside the image.
    let x0 = (px - radius).max(1);
    let x1 = (px + radius).min(width - 2);
    let y0 = (py - radius).max(1);
    let y1 = (py + radius).min(height - 2);
    if x0 > x1 || y0 > y1 {
        return point;
    }

    let halo_w = (x1 - x0 + 3) as usize;
    let halo_h = (y1 - y0 + 3) as usize;
    let mut luminance = Vec::with_capacity(halo_w * halo_h);
    for y in (y0 - 1)..=(y1 + 1) {
        for x in (x0 - 1)..=(x1 + 1) {
            luminance.push(raster.luminance(x as u32, y as u32));
        }
    }
    let at = |x: i64, y: i64| luminance[(y - y0 + 1) as usize * halo_w + (x - x0 + 1) as usize];

    let mut best: Option<(f64, i64, i64)> = None;
    for y in y0..=y1 {
        for x in x0..=x1 {
            let mut gx = 0.0;
            let mut gy = 0.0;
            for (ky, row) in (-1..=1).zip(0..3) {
                for (kx, col) in (-1..=1).zip(0..3) {
                    let value = at(x + kx, y + ky);
                    gx += SOBEL_X[row][col] * value;
                    gy += SOBEL_Y[row][col] * value;
                }
            }
            let magnitude = gx.hypot(gy);
            if magnitude <= settings.noise_floor {
                continue;
            }
            let distance = ((x - px) as f64).hypot((y - py) as f64);
            let score = magnitude / (1.0 + 0.5 * distance);
            if best.map_or(true, |(top, _, _)| score > top) {
                best = Some((score, x, y));
            }
        }
    }

    match best {
        Some((score, x, y)) => {
            log::trace!("snapped ({px}, {py}) to ({x}, {y}) with score {score:.1}");
            Point::new(x as f64 / width as f64, y as f64 / height as f64)
        }
        None => point,
    }
}

use std::sync::Arc;

use image::RgbaImage;

use crate::error::RasterError;
use crate::geometry::{Point, Size};
use crate::transform::Presentation;

/// Decoded slice pixels. Never mutated once built.
#[derive(Debug, Clone)]
pub struct Raster {
    pixels: RgbaImage,
}

impl Raster {
    pub fn new(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, RasterError> {
        let expected = width as usize * height as usize * 4;
        let actual = rgba.len();
        RgbaImage::from_raw(width, height, rgba)
            .map(Self::new)
            .ok_or(RasterError::BufferSize {
                width,
                height,
                expected,
                actual,
            })
    }

    /// Single-channel convenience used by synthetic slices and tests.
    pub fn from_gray(width: u32, height: u32, gray: &[u8]) -> Result<Self, RasterError> {
        if gray.len() != width as usize * height as usize {
            return Err(RasterError::BufferSize {
                width,
                height,
                expected: width as usize * height as usize,
                actual: gray.len(),
            });
        }
        let rgba = gray.iter().flat_map(|&v| [v, v, v, 255]).collect();
        Self::from_rgba(width, height, rgba)
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn natural_size(&self) -> Size {
        Size::new(self.width() as f64, self.height() as f64)
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Mean of the colour channels at `(x, y)`.
    pub fn luminance(&self, x: u32, y: u32) -> f64 {
        let [r, g, b, _] = self.pixels.get_pixel(x, y).0;
        (r as f64 + g as f64 + b as f64) / 3.0
    }

    /// RGBA laid out in presented orientation with tone applied, ready to be
    /// uploaded as a texture.
    pub fn render_rgba(&self, presentation: Presentation, tone: Tone) -> (u32, u32, Vec<u8>) {
        let natural = self.natural_size();
        let effective = presentation.effective_size(natural);
        let (out_w, out_h) = (effective.width as u32, effective.height as u32);
        let origin = natural.center() - Point::new(effective.width / 2.0, effective.height / 2.0);
        let lut = tone.lookup_table();

        let mut rgba = Vec::with_capacity(out_w as usize * out_h as usize * 4);
        for oy in 0..out_h {
            for ox in 0..out_w {
                let presented = origin + Point::new(ox as f64 + 0.5, oy as f64 + 0.5);
                let source = presentation.from_presented(presented, natural);
                let sx = (source.x.floor().max(0.0) as u32).min(self.width().saturating_sub(1));
                let sy = (source.y.floor().max(0.0) as u32).min(self.height().saturating_sub(1));
                let [r, g, b, a] = self.pixels.get_pixel(sx, sy).0;
                rgba.extend_from_slice(&[lut[r as usize], lut[g as usize], lut[b as usize], a]);
            }
        }
        (out_w, out_h, rgba)
    }
}

/// Render-only brightness/contrast, 1.0 being neutral for both.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tone {
    pub brightness: f64,
    pub contrast: f64,
}

impl Default for Tone {
    fn default() -> Self {
        Self {
            brightness: 1.0,
            contrast: 1.0,
        }
    }
}

impl Tone {
    pub const MIN: f64 = 0.0;
    pub const MAX: f64 = 2.0;

    pub fn clamped(self) -> Self {
        let fix = |value: f64| {
            if value.is_finite() {
                value.clamp(Self::MIN, Self::MAX)
            } else {
                1.0
            }
        };
        Self {
            brightness: fix(self.brightness),
            contrast: fix(self.contrast),
        }
    }

    fn lookup_table(self) -> [u8; 256] {
        let tone = self.clamped();
        let mut table = [0u8; 256];
        for (value, slot) in table.iter_mut().enumerate() {
            let bright = value as f64 * tone.brightness;
            let contrasted = (bright - 127.5) * tone.contrast + 127.5;
            *slot = contrasted.round().clamp(0.0, 255.0) as u8;
        }
        table
    }
}

/// Decode state of one slice as seen by the viewer.
#[derive(Debug, Clone, Default)]
pub enum RasterStatus {
    #[default]
    Pending,
    Ready(Arc<Raster>),
    Failed(String),
}

impl RasterStatus {
    pub fn ready(&self) -> Option<&Arc<Raster>> {
        match self {
            Self::Ready(raster) => Some(raster),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RasterError;
    use crate::transform::Rotation;
    use assert_matches::assert_matches;

    fn gradient_2x3() -> Raster {
        // Row-major values 0..6 so every pixel is distinct.
        Raster::from_gray(2, 3, &[0, 1, 2, 3, 4, 5]).expect("raster")
    }

    fn red_channel(rgba: &[u8]) -> Vec<u8> {
        rgba.chunks(4).map(|px| px[0]).collect()
    }

    #[test]
    fn buffer_size_is_checked() {
        assert_matches!(
            Raster::from_rgba(2, 2, vec![0; 15]),
            Err(RasterError::BufferSize { expected: 16, .. })
        );
    }

    #[test]
    fn neutral_render_keeps_pixels() {
        let (w, h, rgba) = gradient_2x3().render_rgba(Presentation::default(), Tone::default());
        assert_eq!((w, h), (2, 3));
        assert_eq!(red_channel(&rgba), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn quarter_turn_render_swaps_dimensions() {
        let (w, h, rgba) = gradient_2x3()
            .render_rgba(Presentation::new(Rotation::Deg90, false), Tone::default());
        assert_eq!((w, h), (3, 2));
        // Clockwise: the bottom-left source pixel lands top-left.
        assert_eq!(red_channel(&rgba), vec![4, 2, 0, 5, 3, 1]);
    }

    #[test]
    fn flip_render_mirrors_rows() {
        let (_, _, rgba) = gradient_2x3()
            .render_rgba(Presentation::new(Rotation::Deg0, true), Tone::default());
        assert_eq!(red_channel(&rgba), vec![1, 0, 3, 2, 5, 4]);
    }

    #[test]
    fn tone_is_clamped_and_applied() {
        let tone = Tone {
            brightness: 5.0,
            contrast: f64::NAN,
        }
        .clamped();
        assert_eq!(tone.brightness, 2.0);
        assert_eq!(tone.contrast, 1.0);

        let raster = Raster::from_gray(1, 1, &[100]).expect("raster");
        let (_, _, rgba) = raster.render_rgba(Presentation::default(), tone);
        assert_eq!(rgba[0], 200);
    }
}

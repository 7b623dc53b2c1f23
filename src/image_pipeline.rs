use std::path::{Path, PathBuf};

use dicom::object::{open_file, DefaultDicomObject};
use dicom::pixeldata::{
    DecodedPixelData, PhotometricInterpretation, PixelDecoder, PlanarConfiguration,
};
use slicemark::{Raster, RasterError};

/// Separates a file path from a frame number in a slice source.
const FRAME_SEPARATOR: char = '#';

const BITMAP_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Turns slice sources (`path` or `path#frame`) into rasters.
pub struct RasterPipeline;

impl RasterPipeline {
    /// One source per slice: multi-frame DICOM files expand into one source
    /// per frame, everything else stays a single slice.
    pub fn expand_sources(paths: &[PathBuf]) -> Vec<String> {
        let mut sources = Vec::new();
        for path in paths {
            let frames = if is_bitmap(path) {
                1
            } else {
                dicom_frame_count(path).unwrap_or(1)
            };
            let display = path.display().to_string();
            if frames > 1 {
                log::info!("{display}: expanding {frames} frames into slices");
                sources.extend((0..frames).map(|frame| format!("{display}{FRAME_SEPARATOR}{frame}")));
            } else {
                sources.push(display);
            }
        }
        sources
    }

    /// Decodes one slice source, resolving relative paths against `base`.
    pub fn decode_source(source: &str, base: Option<&Path>) -> Result<Raster, RasterError> {
        let (path, frame) = split_source(source);
        let path = match base {
            Some(base) if path.is_relative() => base.join(path),
            _ => path,
        };
        log::info!("Decoding slice: {}", path.display());

        let result = if is_bitmap(&path) {
            Self::decode_bitmap(&path)
        } else {
            Self::decode_dicom(&path, frame)
        };
        if let Err(err) = &result {
            log::error!("{}: {err}", path.display());
        }
        result
    }

    fn decode_bitmap(path: &Path) -> Result<Raster, RasterError> {
        let bytes = std::fs::read(path).map_err(|source| RasterError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let image = image::load_from_memory(&bytes)
            .map_err(|err| RasterError::Decode(err.to_string()))?;
        Ok(Raster::new(image.into_rgba8()))
    }

    fn decode_dicom(path: &Path, frame: u32) -> Result<Raster, RasterError> {
        let object = open_file(path)
            .map_err(|err| RasterError::Decode(format!("failed to open DICOM file ({err})")))?;
        Self::render_frame(&object, frame)
    }

    pub fn render_frame(object: &DefaultDicomObject, frame: u32) -> Result<Raster, RasterError> {
        let decoded = object
            .decode_pixel_data()
            .map_err(|err| RasterError::Decode(format!("failed to decode pixel data: {err}")))?;

        if decoded.number_of_frames() == 0 {
            return Err(RasterError::Empty);
        }
        Self::frame_to_raster(&decoded, frame)
    }

    pub fn frame_to_raster(
        decoded: &DecodedPixelData<'_>,
        frame_idx: u32,
    ) -> Result<Raster, RasterError> {
        if frame_idx >= decoded.number_of_frames() {
            return Err(RasterError::Decode(format!(
                "requested frame {frame_idx}, but only {} frame(s) are available",
                decoded.number_of_frames()
            )));
        }

        match decoded.photometric_interpretation() {
            photometric if photometric.is_monochrome() => {
                Self::monochrome_to_raster(decoded, frame_idx)
            }
            PhotometricInterpretation::Rgb => Self::rgb_to_raster(decoded, frame_idx),
            other => Self::fallback_to_dynamic(decoded, frame_idx, other.as_str()),
        }
    }

    fn monochrome_to_raster(
        decoded: &DecodedPixelData<'_>,
        frame_idx: u32,
    ) -> Result<Raster, RasterError> {
        let invert = matches!(
            decoded.photometric_interpretation(),
            PhotometricInterpretation::Monochrome1
        );

        let gray: Vec<u8> = if decoded.bits_allocated() <= 8 {
            decoded
                .to_vec_frame::<u8>(frame_idx)
                .map_err(|err| materialize_error(&err))?
        } else {
            let samples = decoded
                .to_vec_frame::<u16>(frame_idx)
                .map_err(|err| materialize_error(&err))?;
            let (min, max) = min_max_u16(&samples).unwrap_or((0, 0));
            samples
                .iter()
                .map(|&value| normalize_u16(value, min, max))
                .collect()
        };
        let gray: Vec<u8> = if invert {
            gray.into_iter().map(|value| 255 - value).collect()
        } else {
            gray
        };
        Raster::from_gray(decoded.columns(), decoded.rows(), &gray)
    }

    fn rgb_to_raster(decoded: &DecodedPixelData<'_>, frame_idx: u32) -> Result<Raster, RasterError> {
        let width = decoded.columns();
        let height = decoded.rows();
        let pixel_count = width as usize * height as usize;

        let rgba = if decoded.bits_allocated() <= 8 {
            let samples = decoded
                .to_vec_frame::<u8>(frame_idx)
                .map_err(|err| materialize_error(&err))?;
            match decoded.planar_configuration() {
                PlanarConfiguration::Standard => rgb_interleaved_to_rgba(&samples)?,
                PlanarConfiguration::PixelFirst => rgb_planar_to_rgba(&samples, pixel_count)?,
            }
        } else {
            let samples = decoded
                .to_vec_frame::<u16>(frame_idx)
                .map_err(|err| materialize_error(&err))?;
            let samples = normalize_channels_u16(&samples, decoded.planar_configuration());
            match decoded.planar_configuration() {
                PlanarConfiguration::Standard => rgb_interleaved_to_rgba(&samples)?,
                PlanarConfiguration::PixelFirst => rgb_planar_to_rgba(&samples, pixel_count)?,
            }
        };
        Raster::from_rgba(width, height, rgba)
    }

    fn fallback_to_dynamic(
        decoded: &DecodedPixelData<'_>,
        frame_idx: u32,
        interpretation: &str,
    ) -> Result<Raster, RasterError> {
        decoded
            .to_dynamic_image(frame_idx)
            .map_err(|err| {
                RasterError::Decode(format!(
                    "unsupported photometric interpretation `{interpretation}`: {err}"
                ))
            })
            .map(|image| Raster::new(image.into_rgba8()))
    }
}

fn materialize_error(err: &dyn std::fmt::Display) -> RasterError {
    RasterError::Decode(format!("failed to materialize frame data: {err}"))
}

fn is_bitmap(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| BITMAP_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// `path#3` names frame 3; anything without a numeric suffix is frame 0.
fn split_source(source: &str) -> (PathBuf, u32) {
    if let Some((path, frame)) = source.rsplit_once(FRAME_SEPARATOR) {
        if let Ok(frame) = frame.parse() {
            return (PathBuf::from(path), frame);
        }
    }
    (PathBuf::from(source), 0)
}

fn dicom_frame_count(path: &Path) -> Option<u32> {
    let object = open_file(path).ok()?;
    object
        .element_by_name("NumberOfFrames")
        .ok()
        .and_then(|element| element.to_int::<u32>().ok())
}

fn rgb_interleaved_to_rgba(samples: &[u8]) -> Result<Vec<u8>, RasterError> {
    if !samples.len().is_multiple_of(3) {
        return Err(RasterError::Decode(format!(
            "RGB buffer length {} is not divisible by 3",
            samples.len()
        )));
    }
    let mut rgba = Vec::with_capacity(samples.len() / 3 * 4);
    for chunk in samples.chunks(3) {
        if let [r, g, b] = *chunk {
            rgba.extend_from_slice(&[r, g, b, 255]);
        }
    }
    Ok(rgba)
}

fn rgb_planar_to_rgba(samples: &[u8], pixel_count: usize) -> Result<Vec<u8>, RasterError> {
    if samples.len() < pixel_count * 3 {
        return Err(RasterError::Decode(format!(
            "RGB buffer length {} is too small for {pixel_count} pixels",
            samples.len()
        )));
    }
    let (r_plane, rest) = samples.split_at(pixel_count);
    let (g_plane, b_plane) = rest.split_at(pixel_count);

    let mut rgba = Vec::with_capacity(pixel_count * 4);
    for idx in 0..pixel_count {
        rgba.extend_from_slice(&[r_plane[idx], g_plane[idx], b_plane[idx], 255]);
    }
    Ok(rgba)
}

/// Stretches each 16-bit channel to 8 bits independently, keeping the
/// sample layout.
fn normalize_channels_u16(samples: &[u16], planar: PlanarConfiguration) -> Vec<u8> {
    let channel_of = |idx: usize| match planar {
        PlanarConfiguration::Standard => idx % 3,
        PlanarConfiguration::PixelFirst => (idx * 3) / samples.len().max(1),
    };
    let mut ranges = [(u16::MAX, u16::MIN); 3];
    for (idx, &value) in samples.iter().enumerate() {
        let (min, max) = &mut ranges[channel_of(idx).min(2)];
        *min = (*min).min(value);
        *max = (*max).max(value);
    }
    samples
        .iter()
        .enumerate()
        .map(|(idx, &value)| {
            let (min, max) = ranges[channel_of(idx).min(2)];
            normalize_u16(value, min, max)
        })
        .collect()
}

fn min_max_u16(values: &[u16]) -> Option<(u16, u16)> {
    values.iter().copied().fold(None, |acc, value| match acc {
        None => Some((value, value)),
        Some((min, max)) => Some((min.min(value), max.max(value))),
    })
}

fn normalize_u16(value: u16, min: u16, max: u16) -> u8 {
    if max <= min {
        return 0;
    }

    let range = (max - min) as f32;
    let normalized = (value.saturating_sub(min)) as f32 / range;
    (normalized * 255.0).clamp(0.0, 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sources_name_their_frame() {
        assert_eq!(split_source("/data/ct.dcm#7"), (PathBuf::from("/data/ct.dcm"), 7));
        assert_eq!(split_source("/data/ct.dcm"), (PathBuf::from("/data/ct.dcm"), 0));
        assert_eq!(split_source("scan#a.png"), (PathBuf::from("scan#a.png"), 0));
    }

    #[test]
    fn sixteen_bit_values_stretch_to_full_range() {
        assert_eq!(normalize_u16(100, 100, 300), 0);
        assert_eq!(normalize_u16(300, 100, 300), 255);
        assert_eq!(normalize_u16(5, 5, 5), 0);
    }

    #[test]
    fn planar_rgb_is_interleaved() {
        let planes = [1, 2, 10, 20, 100, 200];
        let rgba = rgb_planar_to_rgba(&planes, 2).expect("rgba");
        assert_eq!(rgba, vec![1, 10, 100, 255, 2, 20, 200, 255]);
        assert!(rgb_interleaved_to_rgba(&[1, 2]).is_err());
    }

    #[test]
    fn bitmaps_decode_through_the_image_crate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("slice.png");
        image::GrayImage::from_pixel(3, 2, image::Luma([90]))
            .save(&path)
            .expect("png");

        let raster = RasterPipeline::decode_source("slice.png", Some(dir.path())).expect("raster");
        assert_eq!((raster.width(), raster.height()), (3, 2));
        assert_eq!(raster.luminance(2, 1), 90.0);
        assert!(RasterPipeline::decode_source("missing.png", Some(dir.path())).is_err());
    }
}

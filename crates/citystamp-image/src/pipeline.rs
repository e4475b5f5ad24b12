//! Capture processing pipeline.
//!
//! Each capture runs the same four stages: decode the raw bytes, constrain
//! to the maximum bounding dimension, composite the zone stamp when a zone
//! matched, and re-encode as a JPEG data URI ready for submission.

use std::path::Path;

use ab_glyph::FontArc;
use base64::{Engine as _, engine::general_purpose};
use citystamp_core::Zone;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};
use thiserror::Error;
use tracing::debug;

use crate::stamp;

/// Maximum bounding dimension after the constrain stage, in pixels.
pub const MAX_DIMENSION: u32 = 1200;

/// Quality factor for the lossy re-encode.
pub const JPEG_QUALITY: u8 = 70;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The capture bytes are not a decodable raster image. Unrecoverable for
    /// this capture; the user must retake.
    #[error("image decode failed: {0}")]
    Decode(#[source] image::ImageError),
    #[error("image encode failed: {0}")]
    Encode(#[source] image::ImageError),
    #[error("caption font unusable: {0}")]
    Font(String),
}

/// Result of one pipeline run. Superseded by any newer run for the same
/// session; the caller discards stale outputs by capture sequence.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// `data:image/jpeg;base64,…` payload, self-contained and ready to post.
    pub encoded_image: String,
    /// The zone whose stamp was composited, if the capture matched one.
    pub source_zone: Option<Zone>,
}

/// Stateless capture processor holding the caption font and tuning knobs.
pub struct StampPipeline {
    font: FontArc,
    max_dimension: u32,
    jpeg_quality: u8,
}

impl StampPipeline {
    pub fn new(font: FontArc) -> Self {
        Self {
            font,
            max_dimension: MAX_DIMENSION,
            jpeg_quality: JPEG_QUALITY,
        }
    }

    /// Run all stages on one capture.
    ///
    /// With `zone` present the stamp is composited after the constrain
    /// stage; without it the photo passes through untinted.
    pub fn process(
        &self,
        image_bytes: &[u8],
        zone: Option<&Zone>,
    ) -> Result<PipelineOutput, PipelineError> {
        let decoded = image::load_from_memory(image_bytes).map_err(PipelineError::Decode)?;
        let constrained = constrain(decoded, self.max_dimension);
        debug!(
            width = constrained.width(),
            height = constrained.height(),
            zone = zone.map(|z| z.id.as_str()),
            "processing capture"
        );

        let mut canvas = constrained.to_rgba8();
        if let Some(zone) = zone {
            stamp::apply_stamp(&mut canvas, zone, &self.font);
        }

        let encoded_image = encode_data_uri(&canvas, self.jpeg_quality)?;
        Ok(PipelineOutput {
            encoded_image,
            source_zone: zone.cloned(),
        })
    }
}

/// Load a TrueType/OpenType caption font from disk.
pub fn load_font(path: &Path) -> Result<FontArc, PipelineError> {
    let bytes = std::fs::read(path)
        .map_err(|e| PipelineError::Font(format!("read {}: {e}", path.display())))?;
    FontArc::try_from_vec(bytes)
        .map_err(|e| PipelineError::Font(format!("parse {}: {e}", path.display())))
}

/// Scale down so the larger dimension equals `bound`, preserving aspect
/// ratio with nearest-integer rounding. Images already within bounds pass
/// through unchanged.
fn constrain(img: DynamicImage, bound: u32) -> DynamicImage {
    let (w, h) = (img.width(), img.height());
    if w <= bound && h <= bound {
        return img;
    }
    let scale = bound as f64 / w.max(h) as f64;
    let nw = (w as f64 * scale).round().max(1.0) as u32;
    let nh = (h as f64 * scale).round().max(1.0) as u32;
    img.resize_exact(nw, nh, FilterType::Triangle)
}

fn encode_data_uri(canvas: &RgbaImage, quality: u8) -> Result<String, PipelineError> {
    let rgb = DynamicImage::ImageRgba8(canvas.clone()).to_rgb8();
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality)
        .encode_image(&rgb)
        .map_err(PipelineError::Encode)?;
    Ok(format!(
        "data:image/jpeg;base64,{}",
        general_purpose::STANDARD.encode(&jpeg)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use citystamp_core::Coordinate;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    /// Flat midtone test photo, PNG-encoded in memory.
    fn photo_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([120, 140, 160]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn decode_data_uri(uri: &str) -> DynamicImage {
        let payload = uri
            .strip_prefix("data:image/jpeg;base64,")
            .expect("data URI prefix");
        let jpeg = general_purpose::STANDARD.decode(payload).unwrap();
        image::load_from_memory(&jpeg).unwrap()
    }

    fn system_font() -> Option<FontArc> {
        const CANDIDATES: &[&str] = &[
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/TTF/DejaVuSans.ttf",
            "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
            "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
            "/Library/Fonts/Arial Unicode.ttf",
            "/System/Library/Fonts/Helvetica.ttc",
        ];
        CANDIDATES
            .iter()
            .map(Path::new)
            .find(|p| p.exists())
            .and_then(|p| load_font(p).ok())
    }

    fn test_zone() -> Zone {
        Zone {
            id: "central-park".into(),
            name: "Central Park".into(),
            coordinates: Coordinate {
                lat: 40.785091,
                lng: -73.968285,
            },
            radius: 200.0,
            filter_image: "central-park".into(),
            description: "The green heart of Manhattan".into(),
        }
    }

    #[test]
    fn constrain_scales_landscape_to_bound() {
        let img = DynamicImage::new_rgb8(2400, 1200);
        let out = constrain(img, 1200);
        assert_eq!((out.width(), out.height()), (1200, 600));
    }

    #[test]
    fn constrain_scales_portrait_to_bound() {
        let img = DynamicImage::new_rgb8(800, 3000);
        let out = constrain(img, 1200);
        assert_eq!((out.width(), out.height()), (320, 1200));
    }

    #[test]
    fn constrain_rounds_to_nearest_pixel() {
        let img = DynamicImage::new_rgb8(1999, 1234);
        let out = constrain(img, 1200);
        // 1234 * 1200 / 1999 = 740.77…
        assert_eq!((out.width(), out.height()), (1200, 741));
    }

    #[test]
    fn constrain_passes_small_images_through() {
        let img = DynamicImage::new_rgb8(640, 480);
        let out = constrain(img, 1200);
        assert_eq!((out.width(), out.height()), (640, 480));
    }

    #[test]
    fn constrain_exact_bound_is_untouched() {
        let img = DynamicImage::new_rgb8(1200, 900);
        let out = constrain(img, 1200);
        assert_eq!((out.width(), out.height()), (1200, 900));
    }

    #[test]
    fn corrupt_bytes_fail_to_decode() {
        let Some(font) = system_font() else {
            eprintln!("no system font available, skipping");
            return;
        };
        let pipeline = StampPipeline::new(font);
        let result = pipeline.process(b"definitely not an image", None);
        assert!(matches!(result, Err(PipelineError::Decode(_))));
    }

    #[test]
    fn unmatched_capture_encodes_without_stamp() {
        let Some(font) = system_font() else {
            eprintln!("no system font available, skipping");
            return;
        };
        let pipeline = StampPipeline::new(font);
        let out = pipeline.process(&photo_bytes(640, 480), None).unwrap();
        assert!(out.source_zone.is_none());

        let decoded = decode_data_uri(&out.encoded_image);
        assert_eq!((decoded.width(), decoded.height()), (640, 480));
    }

    #[test]
    fn oversized_capture_is_constrained_in_output() {
        let Some(font) = system_font() else {
            eprintln!("no system font available, skipping");
            return;
        };
        let pipeline = StampPipeline::new(font);
        let out = pipeline.process(&photo_bytes(2400, 1800), None).unwrap();
        let decoded = decode_data_uri(&out.encoded_image);
        assert_eq!((decoded.width(), decoded.height()), (1200, 900));
    }

    #[test]
    fn stamped_capture_differs_from_unstamped() {
        let Some(font) = system_font() else {
            eprintln!("no system font available, skipping");
            return;
        };
        let pipeline = StampPipeline::new(font);
        let bytes = photo_bytes(400, 300);
        let zone = test_zone();

        let plain = pipeline.process(&bytes, None).unwrap();
        let stamped = pipeline.process(&bytes, Some(&zone)).unwrap();
        assert_eq!(stamped.source_zone.as_ref().map(|z| z.id.as_str()), Some("central-park"));
        assert_ne!(plain.encoded_image, stamped.encoded_image);

        // The tint shifts the average color toward the zone's green pair.
        let plain_img = decode_data_uri(&plain.encoded_image).to_rgb8();
        let stamped_img = decode_data_uri(&stamped.encoded_image).to_rgb8();
        let mean_green = |img: &RgbImage| {
            img.pixels().map(|p| p.0[1] as u64).sum::<u64>() / (img.width() * img.height()) as u64
        };
        assert!(mean_green(&stamped_img) >= mean_green(&plain_img));
    }
}

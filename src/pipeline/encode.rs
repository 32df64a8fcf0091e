//! Image preparation for inference requests: downscale, then encode.
//!
//! Analysis and audit only need to *see* the images, so they get JPEG at a
//! bounded size. Beautify sends PNG: the model edits that image, and JPEG
//! artefacts around text would be copied into the result.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Shrink `img` so its longest side is at most `max_dimension`.
///
/// Aspect ratio is preserved and images already within bounds are returned
/// unchanged (never upscaled).
pub fn downscale(img: &DynamicImage, max_dimension: u32) -> DynamicImage {
    let (w, h) = (img.width(), img.height());
    if w.max(h) <= max_dimension {
        return img.clone();
    }
    let (tw, th) = bounded_size(w, h, max_dimension);
    img.resize_exact(tw, th, FilterType::Triangle)
}

/// Target size for a longest-side cap, each side at least 1px.
pub fn bounded_size(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_dimension {
        return (width, height);
    }
    let scale = f64::from(max_dimension) / f64::from(longest);
    let tw = ((f64::from(width) * scale).round() as u32).clamp(1, max_dimension);
    let th = ((f64::from(height) * scale).round() as u32).clamp(1, max_dimension);
    (tw, th)
}

/// Encode as base64 JPEG at `quality` (1–100).
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    rgb.write_with_encoder(encoder)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded {}x{} JPEG → {} bytes base64", img.width(), img.height(), b64.len());
    Ok(ImageData::new(b64, "image/jpeg"))
}

/// Encode as base64 PNG.
pub fn encode_png(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded {}x{} PNG → {} bytes base64", img.width(), img.height(), b64.len());
    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

/// Downscale then JPEG-encode; the common path for "look at this" images.
pub fn prepare_jpeg(
    img: &DynamicImage,
    max_dimension: u32,
    quality: u8,
) -> Result<ImageData, image::ImageError> {
    encode_jpeg(&downscale(img, max_dimension), quality)
}

/// Downscale then PNG-encode; used for images the model edits or imitates.
pub fn prepare_png(img: &DynamicImage, max_dimension: u32) -> Result<ImageData, image::ImageError> {
    encode_png(&downscale(img, max_dimension))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn solid(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([10, 200, 30, 255])))
    }

    #[test]
    fn downscale_caps_longest_side() {
        let out = downscale(&solid(2000, 1000), 1024);
        assert_eq!((out.width(), out.height()), (1024, 512));
    }

    #[test]
    fn downscale_never_upscales() {
        let out = downscale(&solid(300, 200), 1024);
        assert_eq!((out.width(), out.height()), (300, 200));
    }

    #[test]
    fn bounded_size_keeps_sides_positive() {
        assert_eq!(bounded_size(4000, 2, 100), (100, 1));
        assert_eq!(bounded_size(1080, 1440, 512), (384, 512));
    }

    #[test]
    fn jpeg_encoding_is_valid_base64() {
        let data = encode_jpeg(&solid(20, 10), 85).expect("encode");
        assert_eq!(data.mime_type, "image/jpeg");
        let bytes = STANDARD.decode(&data.data).expect("valid base64");
        let back = image::load_from_memory(&bytes).expect("decodable jpeg");
        assert_eq!((back.width(), back.height()), (20, 10));
    }

    #[test]
    fn png_encoding_round_trips_dimensions() {
        let data = prepare_png(&solid(3000, 1500), 1536).expect("encode");
        assert_eq!(data.mime_type, "image/png");
        let bytes = STANDARD.decode(&data.data).unwrap();
        let back = image::load_from_memory(&bytes).unwrap();
        assert_eq!((back.width(), back.height()), (1536, 768));
    }
}

//! Image decoding and normalization.
//!
//! Turns uploaded images of any size into the fixed-size grayscale
//! [`PixelVector`] the scorer works on, and produces the JPEG renditions
//! shown to users and sent to the analysis model.

use crate::types::PixelVector;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use thiserror::Error;

/// Side of the square preview stored for each registered face.
pub const PREVIEW_SIZE: u32 = 400;
/// JPEG quality of stored previews.
pub const PREVIEW_QUALITY: u8 = 85;
/// JPEG quality of query images sent for comparison.
pub const QUERY_QUALITY: u8 = 80;
/// Width of the thumbnail echoed back after recognition.
pub const THUMBNAIL_WIDTH: u32 = 400;
const THUMBNAIL_QUALITY: u8 = 85;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("could not decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("could not encode image: {0}")]
    Encode(#[source] image::ImageError),
    #[error("image is empty")]
    Empty,
}

/// Decode an encoded image (JPEG, PNG, WebP, ...).
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, PreprocessError> {
    if bytes.is_empty() {
        return Err(PreprocessError::Empty);
    }
    image::load_from_memory(bytes).map_err(PreprocessError::Decode)
}

/// Cover-fit to `size`×`size` (centered crop) and convert to grayscale.
pub fn to_pixel_vector(image: &DynamicImage, size: u32) -> PixelVector {
    let fitted = image.resize_to_fill(size, size, FilterType::Lanczos3);
    PixelVector::new(fitted.to_luma8().into_raw())
}

/// Decode and reduce an encoded image to a `size`×`size` pixel vector.
pub fn pixel_vector_from_bytes(bytes: &[u8], size: u32) -> Result<PixelVector, PreprocessError> {
    let image = decode(bytes)?;
    tracing::debug!(
        width = image.width(),
        height = image.height(),
        size,
        "preprocessing image"
    );
    Ok(to_pixel_vector(&image, size))
}

/// Cover-fit to `size`×`size` and encode as JPEG.
pub fn square_jpeg(image: &DynamicImage, size: u32, quality: u8) -> Result<Vec<u8>, PreprocessError> {
    let fitted = image.resize_to_fill(size, size, FilterType::Lanczos3);
    encode_jpeg(&fitted, quality)
}

/// Scale to `width` preserving aspect ratio and encode as JPEG.
pub fn thumbnail_jpeg(image: &DynamicImage, width: u32) -> Result<Vec<u8>, PreprocessError> {
    let w = image.width().max(1);
    let height = ((image.height() as u64 * width as u64) / w as u64).max(1) as u32;
    let scaled = image.resize_exact(width, height, FilterType::Lanczos3);
    encode_jpeg(&scaled, THUMBNAIL_QUALITY)
}

/// Everything registration needs from one upload.
pub struct RegistrationImages {
    pub vector: PixelVector,
    /// 400×400 JPEG preview.
    pub preview: Vec<u8>,
}

/// Produce the stored pixel vector and preview for a newly registered face.
pub fn prepare_registration(bytes: &[u8], size: u32) -> Result<RegistrationImages, PreprocessError> {
    let image = decode(bytes)?;
    Ok(RegistrationImages {
        vector: to_pixel_vector(&image, size),
        preview: square_jpeg(&image, PREVIEW_SIZE, PREVIEW_QUALITY)?,
    })
}

/// JPEG renditions of a recognition query.
pub struct QueryImages {
    /// 400×400 JPEG sent to the comparison model.
    pub query: Vec<u8>,
    /// Width-400 JPEG echoed back to the caller.
    pub thumbnail: Vec<u8>,
}

pub fn prepare_query(bytes: &[u8]) -> Result<QueryImages, PreprocessError> {
    let image = decode(bytes)?;
    Ok(QueryImages {
        query: square_jpeg(&image, PREVIEW_SIZE, QUERY_QUALITY)?,
        thumbnail: thumbnail_jpeg(&image, THUMBNAIL_WIDTH)?,
    })
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, PreprocessError> {
    // JPEG has no alpha channel.
    let rgb = image.to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(&rgb)
        .map_err(PreprocessError::Encode)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_pixel_vector_has_fixed_length() {
        let v = pixel_vector_from_bytes(&png_bytes(320, 240), 100).unwrap();
        assert_eq!(v.len(), 100 * 100);
    }

    #[test]
    fn test_uniform_image_stays_uniform() {
        let img = RgbImage::from_pixel(50, 80, Rgb([90, 90, 90]));
        let v = to_pixel_vector(&DynamicImage::ImageRgb8(img), 100);
        assert!(v.as_slice().iter().all(|&p| (p as i32 - 90).abs() <= 1));
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(matches!(
            pixel_vector_from_bytes(b"not an image", 100),
            Err(PreprocessError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_empty_fails() {
        assert!(matches!(decode(&[]), Err(PreprocessError::Empty)));
    }

    #[test]
    fn test_registration_preview_is_square_jpeg() {
        let prepared = prepare_registration(&png_bytes(640, 480), 100).unwrap();
        assert_eq!(prepared.vector.len(), 10_000);
        let preview = image::load_from_memory(&prepared.preview).unwrap();
        assert_eq!((preview.width(), preview.height()), (PREVIEW_SIZE, PREVIEW_SIZE));
        assert_eq!(
            image::guess_format(&prepared.preview).unwrap(),
            ImageFormat::Jpeg
        );
    }

    #[test]
    fn test_thumbnail_keeps_aspect() {
        let q = prepare_query(&png_bytes(800, 600)).unwrap();
        let thumb = image::load_from_memory(&q.thumbnail).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (400, 300));
        let query = image::load_from_memory(&q.query).unwrap();
        assert_eq!((query.width(), query.height()), (400, 400));
    }
}

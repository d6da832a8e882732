use crate::error::{BotError, Result};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tracing::debug;

fn format_for(mime: &str, bytes: &[u8]) -> Result<ImageFormat> {
    match mime {
        "image/jpeg" | "image/jpg" => Ok(ImageFormat::Jpeg),
        "image/png" => Ok(ImageFormat::Png),
        "image/avif" => Ok(ImageFormat::Avif),
        // servers often label images as octet-stream; trust the magic bytes then
        _ => match image::guess_format(bytes) {
            Ok(format @ (ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Avif)) => Ok(format),
            _ => Err(BotError::UnsupportedImage(mime.to_string())),
        },
    }
}

/// Decode a JPEG, PNG or AVIF image, scale it to `width` pixels keeping the
/// aspect ratio, and re-encode it as JPEG.
///
/// AVIF decoding needs the `avif` cargo feature.
pub fn thumbnail(bytes: &[u8], mime: &str, width: u32) -> Result<Vec<u8>> {
    let format = format_for(mime, bytes)?;
    let src = image::load_from_memory_with_format(bytes, format)?;
    let height = scaled_height(src.width(), src.height(), width);
    debug!(?format, from_w = src.width(), from_h = src.height(), width, height, "Resizing image");

    let resized = src.resize_exact(width, height, FilterType::Nearest);
    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());
    let mut out = Cursor::new(Vec::new());
    rgb.write_to(&mut out, ImageFormat::Jpeg)?;
    Ok(out.into_inner())
}

fn scaled_height(src_width: u32, src_height: u32, width: u32) -> u32 {
    if src_width == 0 {
        return 1;
    }
    let ratio = f64::from(src_height) / f64::from(src_width);
    ((f64::from(width) * ratio).round() as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgba, RgbaImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([200, 10, 10, 128]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_scaled_height_rounds() {
        assert_eq!(scaled_height(1200, 800, 600), 400);
        assert_eq!(scaled_height(1000, 333, 600), 200);
        assert_eq!(scaled_height(3000, 1, 600), 1);
    }

    #[test]
    fn test_png_with_alpha_becomes_jpeg_of_requested_width() {
        let jpeg = thumbnail(&png(1200, 900), "image/png", 600).unwrap();

        assert_eq!(image::guess_format(&jpeg).unwrap(), ImageFormat::Jpeg);
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.dimensions(), (600, 450));
    }

    #[test]
    fn test_mislabelled_png_is_detected_from_content() {
        let jpeg = thumbnail(&png(300, 300), "application/octet-stream", 600).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.dimensions(), (600, 600));
    }

    #[test]
    fn test_unknown_content_is_rejected() {
        let err = thumbnail(b"<svg/>", "image/svg+xml", 600).unwrap_err();
        assert!(matches!(err, BotError::UnsupportedImage(_)));
    }
}

use image::{ImageFormat, ImageReader, RgbImage, codecs::jpeg::JpegEncoder};
use std::io::Cursor;
use tracing::debug;

/// Default JPEG quality of the encoded result.
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

// Maps an upload's declared content type to a decoder, used only when the
// bytes themselves don't identify the format.
fn format_from_content_type(content_type: &str) -> Option<ImageFormat> {
    let mime: mime::Mime = content_type.parse().ok()?;
    if mime.type_() != mime::IMAGE {
        return None;
    }
    match mime.subtype().as_str() {
        "jpeg" | "jpg" | "pjpeg" => Some(ImageFormat::Jpeg),
        "png" | "x-png" => Some(ImageFormat::Png),
        "webp" => Some(ImageFormat::WebP),
        _ => None,
    }
}

/// Decodes uploaded bytes into a 3-channel RGB buffer.
///
/// The format is detected from the data; the optional content type is a
/// fallback hint. Alpha and grayscale inputs are converted to RGB.
pub fn decode_input_image(data: &[u8], content_type: Option<&str>) -> Result<RgbImage, String> {
    if data.is_empty() {
        return Err("empty payload".to_string());
    }

    let mut reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| format!("failed to read image header: {}", e))?;

    if reader.format().is_none() {
        match content_type.and_then(format_from_content_type) {
            Some(format) => reader.set_format(format),
            None => return Err("unrecognized image format".to_string()),
        }
    }

    let format = reader.format();
    let image = reader
        .decode()
        .map_err(|e| format!("failed to decode image (format: {:?}): {}", format, e))?;

    debug!(
        "Decoded {:?} image: {}x{} {:?}",
        format,
        image.width(),
        image.height(),
        image.color()
    );

    Ok(image.to_rgb8())
}

/// Encodes an RGB buffer as baseline JPEG.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let mut buffer = Cursor::new(Vec::new());
    let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    encoder.encode_image(image)?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
pub(crate) fn encode_png(image: &RgbImage) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png).unwrap();
    buffer.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgba, RgbaImage};

    #[test]
    fn test_decode_png() {
        let image = RgbImage::from_fn(5, 3, |x, y| Rgb([x as u8 * 40, y as u8 * 80, 9]));
        let decoded = decode_input_image(&encode_png(&image), None).unwrap();
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_decode_ignores_wrong_content_type() {
        let image = RgbImage::from_pixel(4, 4, Rgb([1, 2, 3]));
        let decoded = decode_input_image(&encode_png(&image), Some("image/jpeg")).unwrap();
        assert_eq!(decoded.dimensions(), (4, 4));
    }

    #[test]
    fn test_decode_drops_alpha() {
        let rgba = RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 128]));
        let mut png = Cursor::new(Vec::new());
        rgba.write_to(&mut png, ImageFormat::Png).unwrap();
        let decoded = decode_input_image(png.get_ref(), Some("image/png")).unwrap();
        assert_eq!(decoded.get_pixel(1, 1), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_decode_jpeg_round_trip_dimensions() {
        let image = RgbImage::from_pixel(17, 9, Rgb([200, 100, 50]));
        let jpeg = encode_jpeg(&image, DEFAULT_JPEG_QUALITY).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let decoded = decode_input_image(&jpeg, Some("image/jpeg")).unwrap();
        assert_eq!(decoded.dimensions(), (17, 9));
    }

    #[test]
    fn test_decode_rejects_empty_payload() {
        assert!(decode_input_image(&[], Some("image/png")).is_err());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let garbage: Vec<u8> = (0..512u32).map(|i| (i * 7 + 3) as u8).collect();
        assert!(decode_input_image(&garbage, None).is_err());
        assert!(decode_input_image(&garbage, Some("application/octet-stream")).is_err());
    }

    #[test]
    fn test_decode_rejects_truncated_png() {
        let png = encode_png(&RgbImage::from_pixel(32, 32, Rgb([5, 5, 5])));
        assert!(decode_input_image(&png[..png.len() / 2], None).is_err());
    }

    #[test]
    fn test_higher_quality_is_larger() {
        let image = RgbImage::from_fn(64, 64, |x, y| Rgb([(x * 4) as u8, (y * 4) as u8, ((x ^ y) * 4) as u8]));
        let low = encode_jpeg(&image, 20).unwrap();
        let high = encode_jpeg(&image, 98).unwrap();
        assert!(high.len() > low.len());
    }

    #[test]
    fn test_content_type_hint() {
        assert_eq!(format_from_content_type("image/png"), Some(ImageFormat::Png));
        assert_eq!(
            format_from_content_type("image/jpeg; charset=binary"),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(format_from_content_type("text/plain"), None);
        assert_eq!(format_from_content_type("not a mime"), None);
    }
}

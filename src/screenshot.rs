// screenshot.rs: PNG/data-URL encoding of read-back frames

use base64::Engine;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, RgbaImage};

pub fn encode_png(frame: &RgbaImage) -> Result<Vec<u8>, image::ImageError> {
    let mut bytes = Vec::new();
    let (width, height) = frame.dimensions();
    PngEncoder::new(&mut bytes).write_image(frame.as_raw(), width, height, ColorType::Rgba8)?;
    Ok(bytes)
}

pub fn png_data_url(frame: &RgbaImage) -> Result<String, image::ImageError> {
    let png = encode_png(frame)?;
    Ok(format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png)
    ))
}

/// Inverse of [`png_data_url`], used when saving a screenshot to disk.
pub fn decode_data_url(url: &str) -> Option<Vec<u8>> {
    let payload = url.strip_prefix("data:image/png;base64,")?;
    base64::engine::general_purpose::STANDARD.decode(payload).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_carries_a_png() {
        let frame = RgbaImage::from_pixel(3, 2, image::Rgba([200, 10, 10, 255]));
        let url = png_data_url(&frame).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));

        let bytes = decode_data_url(&url).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
        let back = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(back, frame);
    }

    #[test]
    fn other_urls_are_not_decoded() {
        assert!(decode_data_url("https://example.com/a.png").is_none());
    }
}

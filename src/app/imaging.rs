use anyhow::{anyhow, Result};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// Decodes any supported upload and re-encodes it as a baseline JPEG.
/// Alpha channels are dropped since JPEG cannot carry them.
pub fn convert_to_jpeg(data: &[u8]) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory(data)
        .map_err(|err| anyhow!("failed to decode image: {}", err))?;
    let rgb = DynamicImage::ImageRgb8(decoded.to_rgb8());

    let mut out = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut out), ImageFormat::Jpeg)
        .map_err(|err| anyhow!("failed to encode jpeg: {}", err))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    fn png_with_alpha() -> Vec<u8> {
        let img = ImageBuffer::from_pixel(4, 3, Rgba([200u8, 10, 10, 128]));
        let mut out = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn png_becomes_jpeg_with_same_dimensions() {
        let jpeg = convert_to_jpeg(&png_with_alpha()).unwrap();
        assert_eq!(&jpeg[..2], &[0xff, 0xd8]);

        let decoded = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 3));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(convert_to_jpeg(b"definitely not an image").is_err());
    }
}

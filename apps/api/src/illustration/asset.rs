//! Illustration values as they travel through the service: raw bytes from the model,
//! `data:` URLs for the UI, and flattened RGB pixels for PDF embedding.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageDecodeError {
    #[error("unsupported or corrupt image data: {0}")]
    Image(#[from] image::ImageError),

    #[error("image has zero width or height")]
    Empty,
}

/// An encoded image (PNG, JPEG, ...) exactly as the illustration model returned it.
#[derive(Debug, Clone, PartialEq)]
pub struct Illustration {
    pub mime_type: String,
    pub data: Bytes,
}

impl Illustration {
    pub fn new(mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// `data:<mime>;base64,<payload>`, directly usable as an `<img src>`.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.data))
    }

    /// Decodes into 8-bit RGB, compositing any alpha channel onto white paper.
    pub fn decode(&self) -> Result<DecodedImage, ImageDecodeError> {
        let rgba = image::load_from_memory(&self.data)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return Err(ImageDecodeError::Empty);
        }

        let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
        for pixel in rgba.pixels() {
            let [r, g, b, a] = pixel.0;
            let alpha = a as u16;
            for channel in [r, g, b] {
                let blended = (channel as u16 * alpha + 255 * (255 - alpha)) / 255;
                rgb.push(blended as u8);
            }
        }

        Ok(DecodedImage {
            width,
            height,
            rgb: Arc::new(rgb),
        })
    }
}

/// Raw pixels ready to be written as a PDF image XObject.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    /// Row-major RGB triplets, `width * height * 3` bytes.
    pub rgb: Arc<Vec<u8>>,
}

/// Encodes a solid-colour PNG. Shared fixture for tests across modules.
#[cfg(test)]
pub(crate) fn test_png(width: u32, height: u32, rgba: [u8; 4]) -> Illustration {
    use std::io::Cursor;

    let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    Illustration::new("image/png", buf.into_inner())
}

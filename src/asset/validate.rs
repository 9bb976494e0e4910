/// Skin and cape image validation
use crate::{
    asset::AssetKind,
    error::{YggError, YggResult},
};
use image::{DynamicImage, ImageFormat, ImageReader};
use sha2::{Digest, Sha256};
use std::io::Cursor;

/// Limits applied to every skin and cape
#[derive(Debug, Clone, Copy)]
pub struct ValidationRules {
    /// Maximum width in pixels
    pub size_limit: u32,
    /// Maximum encoded size in bytes
    pub byte_limit: usize,
}

/// An image that passed validation, in canonical PNG form
#[derive(Debug, Clone)]
pub struct ValidImage {
    pub kind: AssetKind,
    pub width: u32,
    pub height: u32,
    bytes: Vec<u8>,
}

impl ValidImage {
    /// Canonical PNG bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// SHA-256 of the canonical bytes, hex encoded
    pub fn content_hash(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }
}

/// Validate `data` as a `kind` image and normalise it
///
/// Accepts PNG only. Skins must be square or twice as wide as tall, capes
/// twice as wide as tall; widths are multiples of 64 up to the size limit.
pub fn validate_image(kind: AssetKind, data: &[u8], rules: &ValidationRules) -> YggResult<ValidImage> {
    let field = kind.as_str();

    if data.is_empty() {
        return Err(YggError::validation(field, "image is empty"));
    }

    if data.len() > rules.byte_limit {
        return Err(YggError::validation(
            field,
            format!("image must be {} bytes or less", rules.byte_limit),
        ));
    }

    match image::guess_format(data) {
        Ok(ImageFormat::Png) => {}
        _ => return Err(YggError::validation(field, "image must be a PNG")),
    }

    // Check the header before decoding any pixel data
    let (width, height) = ImageReader::with_format(Cursor::new(data), ImageFormat::Png)
        .into_dimensions()
        .map_err(|e| YggError::validation(field, format!("could not read image: {}", e)))?;

    check_shape(kind, width, height, rules)?;

    let decoded = image::load_from_memory_with_format(data, ImageFormat::Png)
        .map_err(|e| YggError::validation(field, format!("could not decode image: {}", e)))?;

    let mut canonical = Vec::new();
    DynamicImage::ImageRgba8(decoded.to_rgba8())
        .write_to(&mut Cursor::new(&mut canonical), ImageFormat::Png)
        .map_err(|e| YggError::Internal(format!("Failed to encode {}: {}", field, e)))?;

    Ok(ValidImage {
        kind,
        width,
        height,
        bytes: canonical,
    })
}

fn check_shape(kind: AssetKind, width: u32, height: u32, rules: &ValidationRules) -> YggResult<()> {
    let field = kind.as_str();

    match kind {
        AssetKind::Skin => {
            if width != height && width != 2 * height {
                return Err(YggError::validation(
                    field,
                    "width must be equal to the height or twice the height",
                ));
            }
        }
        AssetKind::Cape => {
            if width != 2 * height {
                return Err(YggError::validation(field, "width must be twice the height"));
            }
        }
    }

    if width == 0 || width % 64 != 0 {
        return Err(YggError::validation(field, "width must be a multiple of 64"));
    }

    if width > rules.size_limit {
        return Err(YggError::validation(
            field,
            format!("width must be {} or less", rules.size_limit),
        ));
    }

    Ok(())
}

/// Encode a blank RGBA PNG of the given size
#[cfg(test)]
pub fn test_png(width: u32, height: u32, fill: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba(fill));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
    buf
}

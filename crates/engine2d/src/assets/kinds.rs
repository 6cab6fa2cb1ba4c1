//! Built-in asset classes

use log::{debug, warn};

use super::handle::Asset;
use super::AssetError;

/// Side of the checkerboard used for missing images
pub const PLACEHOLDER_SIZE: u32 = 64;

/// Decoded image ready for a render backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    /// Raw RGBA pixel data
    pub data: Vec<u8>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl ImageAsset {
    /// Decode PNG bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AssetError> {
        let rgba = image::load_from_memory(bytes)
            .map_err(|e| AssetError::LoadFailed(format!("Failed to decode image: {e}")))?
            .to_rgba8();
        let (width, height) = rgba.dimensions();
        debug!("decoded image {width}x{height}");
        Ok(Self {
            data: rgba.into_raw(),
            width,
            height,
        })
    }

    /// Magenta and black checkerboard with 8 pixel squares
    pub fn checkerboard(size: u32) -> Self {
        let mut data = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let pixel = if (x / 8 + y / 8) % 2 == 0 {
                    [255, 0, 255, 255]
                } else {
                    [0, 0, 0, 255]
                };
                data.extend_from_slice(&pixel);
            }
        }
        Self {
            data,
            width: size,
            height: size,
        }
    }

    /// RGBA of the pixel at `(x, y)`, origin top-left
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let start = ((y * self.width + x) * 4) as usize;
        let bytes = self.data.get(start..start + 4)?;
        Some([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

impl Asset for ImageAsset {
    const CLASS: &'static str = "Image";

    fn parse(_name: &str, bytes: &[u8]) -> Result<Self, AssetError> {
        Self::from_bytes(bytes)
    }

    fn file_missing(name: &str) -> Option<Self> {
        warn!("image '{name}' not found, using a placeholder");
        Some(Self::checkerboard(PLACEHOLDER_SIZE))
    }
}

/// UTF-8 text file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextAsset(pub String);

impl Asset for TextAsset {
    const CLASS: &'static str = "Text";

    fn parse(name: &str, bytes: &[u8]) -> Result<Self, AssetError> {
        String::from_utf8(bytes.to_vec())
            .map(Self)
            .map_err(|e| AssetError::InvalidData(format!("{name}: {e}")))
    }
}

/// Undecoded sound file, handed to whatever audio service is installed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundAsset(pub Vec<u8>);

impl Asset for SoundAsset {
    const CLASS: &'static str = "Sound";

    fn parse(name: &str, bytes: &[u8]) -> Result<Self, AssetError> {
        if bytes.is_empty() {
            return Err(AssetError::InvalidData(format!("{name} is empty")));
        }
        Ok(Self(bytes.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(image)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .expect("png encoded");
        bytes
    }

    #[test]
    fn test_image_decodes() {
        let image = ImageAsset::parse("a.png", &png(3, 2)).expect("decoded");
        assert_eq!((image.width, image.height), (3, 2));
        assert_eq!(image.pixel(2, 1), Some([10, 20, 30, 255]));
        assert_eq!(image.pixel(3, 0), None);
    }

    #[test]
    fn test_bad_image_is_an_error() {
        assert!(matches!(
            ImageAsset::parse("a.png", b"not a png"),
            Err(AssetError::LoadFailed(_))
        ));
    }

    #[test]
    fn test_placeholder() {
        let image = ImageAsset::file_missing("gone.png").expect("placeholder");
        assert_eq!(image.width, PLACEHOLDER_SIZE);
        assert_eq!(image.pixel(0, 0), Some([255, 0, 255, 255]));
        assert_eq!(image.pixel(8, 0), Some([0, 0, 0, 255]));
        assert!(TextAsset::file_missing("gone.txt").is_none());
    }

    #[test]
    fn test_text_must_be_utf8() {
        assert_eq!(TextAsset::parse("a", b"hi"), Ok(TextAsset("hi".into())));
        assert!(TextAsset::parse("a", &[0xff, 0xfe]).is_err());
    }
}

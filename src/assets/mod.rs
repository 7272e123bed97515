//! Raw resource transport for theme descriptors and textures.

mod file;
mod memory;

use std::sync::Arc;

use futures::future::LocalBoxFuture;
use image::RgbaImage;

use crate::error::{Result, ViewerError};

pub use file::{FileAssetSource, CACHED_IMAGES};
pub use memory::{Gate, MemoryAssetSource};

/// Resolves asset paths (relative, `/` separated) to text or decoded images.
///
/// Futures are `'static` so they can be joined and driven on the viewer's
/// local executor after the call returns.
pub trait AssetSource {
    fn fetch_text(&self, path: &str) -> LocalBoxFuture<'static, Result<String>>;

    fn fetch_image(&self, path: &str) -> LocalBoxFuture<'static, Result<Arc<DecodedImage>>>;
}

/// RGBA8 pixels ready for texture upload.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pixels: RgbaImage,
}

impl DecodedImage {
    /// Decodes PNG or JPEG bytes. `path` is only used for the error.
    pub fn from_encoded(path: &str, bytes: &[u8]) -> Result<Self> {
        let decoded =
            image::load_from_memory(bytes).map_err(|err| ViewerError::asset(path, err))?;
        Ok(Self {
            pixels: decoded.into_rgba8(),
        })
    }

    pub fn from_rgba(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    /// Single colour image, mostly useful as a placeholder.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self {
            pixels: RgbaImage::from_pixel(width.max(1), height.max(1), image::Rgba(rgba)),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &[u8] {
        self.pixels.as_raw()
    }
}

/// Rejects absolute paths and parent traversal so sources stay inside their root.
pub(crate) fn validate_path(path: &str) -> Result<()> {
    let escapes = path.starts_with('/')
        || path.contains('\\')
        || path.split('/').any(|segment| segment == "..");
    if path.is_empty() || escapes {
        return Err(ViewerError::asset(path, "path escapes the asset root"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = DecodedImage::from_encoded("img/broken.png", b"not an image").unwrap_err();
        assert!(matches!(err, ViewerError::AssetLoad { ref path, .. } if path == "img/broken.png"));
    }

    #[test]
    fn png_bytes_decode_to_rgba() {
        let source = RgbaImage::from_pixel(3, 2, image::Rgba([1, 2, 3, 4]));
        let mut bytes = Vec::new();
        source
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        let decoded = DecodedImage::from_encoded("img/tiny.png", &bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (3, 2));
        assert_eq!(&decoded.pixels()[..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn traversal_is_rejected() {
        assert!(validate_path("img/earth.jpg").is_ok());
        assert!(validate_path("../secret").is_err());
        assert!(validate_path("img/../../secret").is_err());
        assert!(validate_path("/etc/passwd").is_err());
        assert!(validate_path("").is_err());
    }
}

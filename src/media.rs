//! Image attachment seam.
//!
//! Encoding contract, honored by any real encoder plugged in here: re-orient
//! the image per its metadata, constrain it to a 1344x1344 bounding box
//! preserving aspect ratio, never upscale, and emit base64. The in-crate
//! default encoder only reads and base64-encodes; callers wanting resampling
//! supply their own implementation.

use crate::Result;
use base64::Engine as _;
use std::path::Path;

/// Maximum edge length (pixels) a conforming encoder may emit.
pub const MAX_IMAGE_EDGE: u32 = 1344;

/// One encoded image attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Base64-encoded image bytes.
    pub data: String,
    pub media_type: Option<String>,
}

/// Path-or-bytes to base64, behind a trait so the resize/re-orient step can
/// live outside this crate.
pub trait ImageEncoder: Send + Sync {
    fn encode_path(&self, path: &Path) -> Result<EncodedImage>;
    fn encode_bytes(&self, bytes: &[u8], media_type: Option<String>) -> Result<EncodedImage>;
}

/// Default encoder: reads the file, guesses the media type from the
/// extension, base64-encodes. No resampling.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineImageEncoder;

impl ImageEncoder for InlineImageEncoder {
    fn encode_path(&self, path: &Path) -> Result<EncodedImage> {
        let bytes = std::fs::read(path)?;
        self.encode_bytes(&bytes, guess_media_type(path))
    }

    fn encode_bytes(&self, bytes: &[u8], media_type: Option<String>) -> Result<EncodedImage> {
        Ok(EncodedImage {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            media_type,
        })
    }
}

fn guess_media_type(path: &Path) -> Option<String> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();
    let mt = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => return None,
    };
    Some(mt.to_string())
}

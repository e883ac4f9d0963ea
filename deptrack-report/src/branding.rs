//! Optional branding image placed above the report title.
//!
//! Any problem with the asset (missing file, unknown format) is logged and the
//! image is dropped; it never fails a render.

use std::path::Path;

use tracing::warn;

/// EMUs per pixel at 96 DPI.
const EMU_PER_PX: u64 = 9_525;
/// Two inches.
const MAX_WIDTH_EMU: u64 = 1_828_800;
/// Box used when pixel dimensions are not cheaply readable (JPEG).
const FALLBACK_EXTENT: (u64, u64) = (1_828_800, 609_600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
}

impl ImageFormat {
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(ImageFormat::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageFormat::Jpeg)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(ImageFormat::Gif)
        } else {
            None
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Gif => "gif",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
        }
    }

    fn pixel_size(self, bytes: &[u8]) -> Option<(u32, u32)> {
        match self {
            ImageFormat::Png => {
                let w = u32::from_be_bytes(bytes.get(16..20)?.try_into().ok()?);
                let h = u32::from_be_bytes(bytes.get(20..24)?.try_into().ok()?);
                Some((w, h))
            }
            ImageFormat::Gif => {
                let w = u16::from_le_bytes(bytes.get(6..8)?.try_into().ok()?);
                let h = u16::from_le_bytes(bytes.get(8..10)?.try_into().ok()?);
                Some((u32::from(w), u32::from(h)))
            }
            ImageFormat::Jpeg => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandingImage {
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
    pub width_emu: u64,
    pub height_emu: u64,
}

impl BrandingImage {
    /// Recognize the image format and size it to at most two inches wide.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let Some(format) = ImageFormat::sniff(bytes) else {
            warn!(len = bytes.len(), "branding image has an unrecognized format; omitting");
            return None;
        };

        let (width_emu, height_emu) = match format.pixel_size(bytes) {
            Some((w, h)) if w > 0 && h > 0 => {
                let w = u64::from(w) * EMU_PER_PX;
                let h = u64::from(h) * EMU_PER_PX;
                if w <= MAX_WIDTH_EMU {
                    (w, h)
                } else if let Some(scaled) = h.checked_mul(MAX_WIDTH_EMU) {
                    (MAX_WIDTH_EMU, scaled / w)
                } else {
                    warn!(w, h, "branding image dimensions out of range; omitting");
                    return None;
                }
            }
            _ => FALLBACK_EXTENT,
        };

        Some(Self {
            format,
            bytes: bytes.to_vec(),
            width_emu,
            height_emu,
        })
    }

    pub fn part_name(&self) -> String {
        format!("branding.{}", self.format.extension())
    }
}

/// Read a branding asset from disk, logging and returning `None` on failure.
pub fn load_branding(path: &Path) -> Option<Vec<u8>> {
    match std::fs::read(path) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not load branding image; omitting");
            None
        }
    }
}

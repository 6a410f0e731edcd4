//! Basic image facts read from file headers.
//!
//! Only the bytes needed to find format, dimensions and color mode are
//! inspected; nothing is decoded.

use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Upper bound on bytes read while looking for dimensions. JPEG metadata
/// segments can push the frame header well past the first few kilobytes.
const HEADER_READ_LIMIT: u64 = 512 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ImageInfoError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("unrecognized image format")]
    UnsupportedFormat,

    #[error("{format} header is truncated or malformed")]
    Truncated { format: ImageFormat },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    WebP,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Png => "PNG",
            Self::Jpeg => "JPEG",
            Self::Gif => "GIF",
            Self::WebP => "WEBP",
        }
    }

    /// Subtype used in `data:image/<subtype>;base64,` URLs.
    pub fn mime_subtype(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Gif => "gif",
            Self::WebP => "webp",
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    /// PIL-style mode name: "L", "LA", "P", "RGB", "RGBA", "CMYK".
    pub color_mode: &'static str,
    pub byte_size: u64,
}

impl ImageInfo {
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            0.0
        } else {
            self.width as f64 / self.height as f64
        }
    }

    pub fn total_pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Reads format, dimensions and color mode of the image at `path`.
pub fn read_image_info(path: &Path) -> Result<ImageInfo, ImageInfoError> {
    let byte_size = std::fs::metadata(path)?.len();
    let mut head = Vec::new();
    File::open(path)?
        .take(HEADER_READ_LIMIT)
        .read_to_end(&mut head)?;
    let (format, width, height, color_mode) = sniff(&head)?;
    Ok(ImageInfo {
        format,
        width,
        height,
        color_mode,
        byte_size,
    })
}

type Sniffed = (ImageFormat, u32, u32, &'static str);

fn sniff(data: &[u8]) -> Result<Sniffed, ImageInfoError> {
    if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        sniff_png(data).ok_or(ImageInfoError::Truncated {
            format: ImageFormat::Png,
        })
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        sniff_gif(data).ok_or(ImageInfoError::Truncated {
            format: ImageFormat::Gif,
        })
    } else if data.starts_with(&[0xFF, 0xD8]) {
        sniff_jpeg(data).ok_or(ImageInfoError::Truncated {
            format: ImageFormat::Jpeg,
        })
    } else if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        sniff_webp(data).ok_or(ImageInfoError::Truncated {
            format: ImageFormat::WebP,
        })
    } else {
        Err(ImageInfoError::UnsupportedFormat)
    }
}

fn be_u16(d: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_be_bytes(d.get(at..at + 2)?.try_into().ok()?))
}

fn be_u32(d: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_be_bytes(d.get(at..at + 4)?.try_into().ok()?))
}

fn le_u16(d: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_le_bytes(d.get(at..at + 2)?.try_into().ok()?))
}

fn le_u24(d: &[u8], at: usize) -> Option<u32> {
    let b = d.get(at..at + 3)?;
    Some(b[0] as u32 | (b[1] as u32) << 8 | (b[2] as u32) << 16)
}

fn sniff_png(d: &[u8]) -> Option<Sniffed> {
    if d.get(12..16)? != b"IHDR" {
        return None;
    }
    let width = be_u32(d, 16)?;
    let height = be_u32(d, 20)?;
    let mode = match *d.get(25)? {
        0 => "L",
        2 => "RGB",
        3 => "P",
        4 => "LA",
        6 => "RGBA",
        _ => return None,
    };
    Some((ImageFormat::Png, width, height, mode))
}

fn sniff_gif(d: &[u8]) -> Option<Sniffed> {
    let width = le_u16(d, 6)? as u32;
    let height = le_u16(d, 8)? as u32;
    Some((ImageFormat::Gif, width, height, "P"))
}

fn sniff_jpeg(d: &[u8]) -> Option<Sniffed> {
    let mut pos = 2;
    loop {
        // Markers may be padded with any number of 0xFF fill bytes.
        if *d.get(pos)? != 0xFF {
            return None;
        }
        while *d.get(pos)? == 0xFF {
            pos += 1;
        }
        let marker = *d.get(pos)?;
        pos += 1;
        match marker {
            0x01 | 0xD0..=0xD7 => continue,
            0xD9 | 0xDA => return None,
            _ => {}
        }
        let len = be_u16(d, pos)? as usize;
        let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            let height = be_u16(d, pos + 3)? as u32;
            let width = be_u16(d, pos + 5)? as u32;
            let mode = match *d.get(pos + 7)? {
                1 => "L",
                3 => "RGB",
                4 => "CMYK",
                _ => return None,
            };
            return Some((ImageFormat::Jpeg, width, height, mode));
        }
        if len < 2 {
            return None;
        }
        pos += len;
    }
}

fn sniff_webp(d: &[u8]) -> Option<Sniffed> {
    match d.get(12..16)? {
        b"VP8 " => {
            if d.get(23..26)? != [0x9D, 0x01, 0x2A] {
                return None;
            }
            let width = (le_u16(d, 26)? & 0x3FFF) as u32;
            let height = (le_u16(d, 28)? & 0x3FFF) as u32;
            Some((ImageFormat::WebP, width, height, "RGB"))
        }
        b"VP8L" => {
            if *d.get(20)? != 0x2F {
                return None;
            }
            let b = d.get(21..25)?;
            let bits = u32::from_le_bytes(b.try_into().ok()?);
            let width = (bits & 0x3FFF) + 1;
            let height = ((bits >> 14) & 0x3FFF) + 1;
            let mode = if bits & (1 << 28) != 0 { "RGBA" } else { "RGB" };
            Some((ImageFormat::WebP, width, height, mode))
        }
        b"VP8X" => {
            let flags = *d.get(20)?;
            let width = le_u24(d, 24)? + 1;
            let height = le_u24(d, 27)? + 1;
            let mode = if flags & 0x10 != 0 { "RGBA" } else { "RGB" };
            Some((ImageFormat::WebP, width, height, mode))
        }
        _ => None,
    }
}

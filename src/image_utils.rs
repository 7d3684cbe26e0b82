//! Pixel access for texture probing and merging, backed by the `image` crate.

use std::io::Cursor;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, GenericImageView, ImageEncoder, ImageFormat};

use crate::raw::TextureOcclusion;

/// Quality used for every JPEG this crate writes.
pub const JPEG_QUALITY: u8 = 80;

/// Size and opacity of an image on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageProperties {
    pub width: u32,
    pub height: u32,
    pub occlusion: TextureOcclusion,
}

impl Default for ImageProperties {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            occlusion: TextureOcclusion::Opaque,
        }
    }
}

/// Row-major, channel-interleaved, 8 bits per channel.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    /// Pixel at `(x, y)` as normalized RGBA; absent channels read as
    /// `(0, 0, 0, 1)` defaults.
    pub fn sample(&self, x: u32, y: u32) -> [f32; 4] {
        let mut out = [0.0, 0.0, 0.0, 1.0];
        let channels = self.channels as usize;
        let start = (y as usize * self.width as usize + x as usize) * channels;
        for (c, value) in out.iter_mut().enumerate().take(channels.min(4)) {
            if let Some(byte) = self.pixels.get(start + c) {
                *value = *byte as f32 / 255.0;
            }
        }
        // grey / grey+alpha
        if channels <= 2 {
            out[1] = out[0];
            out[2] = out[0];
            if channels == 2 {
                out[3] = self.pixels.get(start + 1).map_or(1.0, |b| *b as f32 / 255.0);
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeFormat {
    Png,
    Jpeg,
}

impl EncodeFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            EncodeFormat::Png => "image/png",
            EncodeFormat::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            EncodeFormat::Png => "png",
            EncodeFormat::Jpeg => "jpg",
        }
    }
}

/// Probe width, height and whether any pixel is not fully opaque.
/// Unreadable or missing files report a 1x1 opaque image.
pub fn image_properties(path: &Path) -> ImageProperties {
    let img = match image::open(path) {
        Ok(img) => img,
        Err(_) => return ImageProperties::default(),
    };
    let (width, height) = img.dimensions();
    let occlusion = if img.color().has_alpha() && img.to_rgba8().pixels().any(|p| p.0[3] < 255) {
        TextureOcclusion::Transparent
    } else {
        TextureOcclusion::Opaque
    };
    ImageProperties {
        width,
        height,
        occlusion,
    }
}

/// Decode an image file, keeping its native channel count (1-4).
pub fn decode(path: &Path) -> Result<DecodedImage> {
    let img = image::open(path).with_context(|| format!("Failed to decode image: {}", path.display()))?;
    let (width, height) = img.dimensions();
    let channels = img.color().channel_count().clamp(1, 4);
    let pixels = match channels {
        1 => img.to_luma8().into_raw(),
        2 => img.to_luma_alpha8().into_raw(),
        3 => img.to_rgb8().into_raw(),
        _ => img.to_rgba8().into_raw(),
    };
    Ok(DecodedImage {
        width,
        height,
        channels,
        pixels,
    })
}

/// Encode interleaved 8-bit pixels. JPEG drops any alpha channel.
pub fn encode(format: EncodeFormat, width: u32, height: u32, channels: u8, pixels: &[u8]) -> Result<Vec<u8>> {
    let color = match channels {
        1 => ExtendedColorType::L8,
        2 => ExtendedColorType::La8,
        3 => ExtendedColorType::Rgb8,
        4 => ExtendedColorType::Rgba8,
        n => return Err(anyhow!("Unsupported channel count: {}", n)),
    };
    let expected = width as usize * height as usize * channels as usize;
    if pixels.len() != expected {
        return Err(anyhow!(
            "Pixel buffer is {} bytes, expected {} for {}x{}x{}",
            pixels.len(),
            expected,
            width,
            height,
            channels
        ));
    }

    let mut buf = Vec::new();
    match format {
        EncodeFormat::Png => {
            PngEncoder::new(&mut buf)
                .write_image(pixels, width, height, color)
                .map_err(|e| anyhow!("Failed to encode PNG: {}", e))?;
        }
        EncodeFormat::Jpeg => {
            let (rgb, color) = match channels {
                2 => (strip_alpha(pixels, channels), ExtendedColorType::L8),
                4 => (strip_alpha(pixels, channels), ExtendedColorType::Rgb8),
                _ => (pixels.to_vec(), color),
            };
            JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY)
                .write_image(&rgb, width, height, color)
                .map_err(|e| anyhow!("Failed to encode JPEG: {}", e))?;
        }
    }
    Ok(buf)
}

fn strip_alpha(pixels: &[u8], channels: u8) -> Vec<u8> {
    let channels = channels as usize;
    pixels
        .chunks_exact(channels)
        .flat_map(|px| px[..channels - 1].iter().copied())
        .collect()
}

/// glTF mime type for a file, judged by extension. `None` for anything
/// other than PNG or JPEG.
pub fn gltf_mime_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        _ => None,
    }
}

/// Decode any supported format from memory and re-encode it as PNG.
pub fn reencode_as_png(bytes: &[u8]) -> Result<Vec<u8>> {
    let img = image::load_from_memory(bytes).context("Failed to decode texture")?;
    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .context("Failed to encode texture as PNG")?;
    Ok(png)
}

// ============================================================================
// Tests
// ============================================================================

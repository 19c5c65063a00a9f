//! Raster image load/save for texture sources (PNG, TGA, BMP).

use anyhow::{Context, Result, bail};
use std::path::Path;

/// Decoded source image, always RGBA8.
pub struct SourceImage {
    pub pixels: Vec<u8>,
    pub width: usize,
    pub height: usize,
}

pub fn load(path: &Path) -> Result<SourceImage> {
    let image = image::open(path)
        .with_context(|| format!("failed to load image {}", path.display()))?
        .to_rgba8();
    let (width, height) = image.dimensions();
    Ok(SourceImage {
        pixels: image.into_raw(),
        width: width as usize,
        height: height as usize,
    })
}

pub fn save(path: &Path, pixels: &[u8], width: usize, height: usize) -> Result<()> {
    let format = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => image::ImageFormat::Png,
        Some("tga") => image::ImageFormat::Tga,
        Some("bmp") => image::ImageFormat::Bmp,
        other => bail!("unsupported image extension {other:?} (png, tga, bmp)"),
    };
    image::save_buffer_with_format(
        path,
        pixels,
        width as u32,
        height as u32,
        image::ColorType::Rgba8,
        format,
    )
    .with_context(|| format!("failed to save image {}", path.display()))
}

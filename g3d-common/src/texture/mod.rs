//! Texture pixel codec: formats, palettization, platform bit layouts, and
//! the compiled texture payload.
//!
//! The canonical working form is unpacked RGBA8, one mip level per buffer.
//! Compiling retargets the requested format to the platform, builds the mip
//! chain, palettizes or quantizes as the format demands, and applies the
//! platform's address permutation. Decompiling reverses every step.
//!
//! # Payload layout (little-endian)
//! ```text
//! 0x00: width u16
//! 0x02: height u16
//! 0x04: mip_count u8
//! 0x05: flags u8
//! 0x06: lod_bias i8
//! 0x07: format u8
//! 0x08: source_hash u32 (first 4 bytes of the envelope digest)
//! 0x0C: palette entries (palette_len * 4 bytes, indexed formats only)
//!       codebook (u16 count + 16-byte entries, VQ textures only)
//!       mip pixel buffers, largest first
//! ```

pub mod buffer;
pub mod format;
pub mod palette;
pub mod pixel;
pub mod swizzle;
pub mod vq;
pub mod yiq;

use tracing::warn;

use crate::error::{CodecError, Result};
use crate::io::{ByteReader, ByteWriter};
use crate::target::TargetPlatform;
use format::PixelFormat;
use palette::{alpha_from_half_range, alpha_to_half_range};
use swizzle::{GS_SWIZZLE4_MIN, GS_SWIZZLE_MIN};
use yiq::YiqTable;

pub const MIN_DIMENSION: usize = 8;
pub const MAX_DIMENSION: usize = 1024;

const PAYLOAD_HEADER_SIZE: usize = 12;

/// Both axes must be powers of two within the legal range.
pub fn validate_dimensions(width: usize, height: usize) -> Result<()> {
    for dim in [width, height] {
        if !dim.is_power_of_two() || !(MIN_DIMENSION..=MAX_DIMENSION).contains(&dim) {
            return Err(CodecError::format(format!(
                "illegal texture dimension {dim} (want a power of two in {MIN_DIMENSION}..={MAX_DIMENSION})"
            )));
        }
    }
    Ok(())
}

/// Pixel dimensions of mip `level`.
pub fn mip_dimensions(width: usize, height: usize, level: usize) -> (usize, usize) {
    ((width >> level).max(1), (height >> level).max(1))
}

/// Levels available before either axis would drop below the minimum.
pub fn max_mip_count(width: usize, height: usize) -> usize {
    let mut count = 1;
    while (width >> count) >= MIN_DIMENSION && (height >> count) >= MIN_DIMENSION {
        count += 1;
    }
    count
}

/// Boolean texture properties, packed into one byte in the payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextureFlags {
    pub has_alpha: bool,
    pub clamp_u: bool,
    pub clamp_v: bool,
    pub swizzled: bool,
    pub twiddled: bool,
    pub small_vq: bool,
    pub large_vq: bool,
}

impl TextureFlags {
    pub fn to_bits(self) -> u8 {
        (self.has_alpha as u8)
            | (self.clamp_u as u8) << 1
            | (self.clamp_v as u8) << 2
            | (self.swizzled as u8) << 3
            | (self.twiddled as u8) << 4
            | (self.small_vq as u8) << 5
            | (self.large_vq as u8) << 6
    }

    pub fn from_bits(bits: u8) -> TextureFlags {
        TextureFlags {
            has_alpha: bits & 1 != 0,
            clamp_u: bits & 2 != 0,
            clamp_v: bits & 4 != 0,
            swizzled: bits & 8 != 0,
            twiddled: bits & 16 != 0,
            small_vq: bits & 32 != 0,
            large_vq: bits & 64 != 0,
        }
    }

    pub fn is_vq(self) -> bool {
        self.small_vq || self.large_vq
    }
}

/// A compiled texture: packed mip buffers plus palette or codebook.
///
/// Palette and codebook entries are kept in canonical RGBA8; format-specific
/// conventions (GS half-range alpha) apply only at payload serialization.
#[derive(Debug, Clone)]
pub struct Texture {
    pub width: usize,
    pub height: usize,
    pub format: PixelFormat,
    pub flags: TextureFlags,
    pub lod_bias: i8,
    pub source_hash: u32,
    pub palette: Option<Vec<[u8; 4]>>,
    pub codebook: Option<Vec<vq::VqEntry>>,
    /// Packed pixel buffers, mip 0 first.
    pub mips: Vec<Vec<u8>>,
}

/// Compile-time options from the asset metadata.
#[derive(Debug, Clone)]
pub struct TextureOptions {
    pub format: PixelFormat,
    pub mip_count: usize,
    pub clamp_u: bool,
    pub clamp_v: bool,
    /// Apply the platform's address permutation (GS swizzle, PVR twiddle,
    /// Xbox swizzle). GameCube tiling is mandatory and always applied.
    pub reorder: bool,
    /// Dreamcast vector quantization.
    pub vq: bool,
    pub lod_bias: i8,
    pub yiq_table: YiqTable,
}

impl Default for TextureOptions {
    fn default() -> Self {
        TextureOptions {
            format: PixelFormat::Rgba8888,
            mip_count: 1,
            clamp_u: false,
            clamp_v: false,
            reorder: true,
            vq: false,
            lod_bias: 0,
            yiq_table: YiqTable::default_table(),
        }
    }
}

/// Byte size of one packed mip buffer.
fn packed_mip_size(texture: &Texture, level: usize) -> usize {
    let (w, h) = mip_dimensions(texture.width, texture.height, level);
    if texture.flags.is_vq() {
        (w / 2) * (h / 2)
    } else {
        (w * h * texture.format.bits_per_pixel()).div_ceil(8)
    }
}

impl Texture {
    pub fn mip_count(&self) -> usize {
        self.mips.len()
    }

    /// Compile an RGBA8 source image for `platform`.
    pub fn compile(
        rgba: &[u8],
        width: usize,
        height: usize,
        platform: TargetPlatform,
        options: &TextureOptions,
        source_hash: u32,
    ) -> Result<Texture> {
        validate_dimensions(width, height)?;
        if rgba.len() != width * height * 4 {
            return Err(CodecError::format(format!(
                "pixel buffer is {} bytes, {}x{} needs {}",
                rgba.len(),
                width,
                height,
                width * height * 4
            )));
        }
        let format = options.format.retarget(platform);
        let levels = options.mip_count.clamp(1, max_mip_count(width, height));
        let mips_rgba = generate_mips(rgba, width, height, levels);

        let has_alpha =
            format.has_alpha() && rgba.chunks_exact(4).any(|p| p[3] != 255);
        let use_vq = options.vq && platform == TargetPlatform::Dreamcast && !format.is_indexed();

        let mut texture = Texture {
            width,
            height,
            format,
            flags: TextureFlags {
                has_alpha,
                clamp_u: options.clamp_u,
                clamp_v: options.clamp_v,
                small_vq: use_vq && width.min(height) <= 64,
                large_vq: use_vq && width.min(height) > 64,
                ..TextureFlags::default()
            },
            lod_bias: options.lod_bias,
            source_hash,
            palette: None,
            codebook: None,
            mips: Vec::with_capacity(levels),
        };

        if use_vq {
            compile_vq(&mut texture, &mips_rgba)?;
        } else if format == PixelFormat::ArcadeYiq {
            for mip in &mips_rgba {
                texture.mips.push(yiq::encode_pixels(mip, &options.yiq_table));
            }
        } else if format.is_indexed() {
            compile_indexed(&mut texture, &mips_rgba, platform, options.reorder)?;
        } else {
            compile_direct(&mut texture, &mips_rgba, platform, options.reorder)?;
        }
        Ok(texture)
    }

    /// Unpack mip `level` back to RGBA8.
    pub fn decompile(&self, level: usize, yiq_table: &YiqTable) -> Result<Vec<u8>> {
        let (w, h) = mip_dimensions(self.width, self.height, level);
        let data = self
            .mips
            .get(level)
            .ok_or_else(|| CodecError::format(format!("mip level {level} not present")))?;

        if self.flags.is_vq() {
            let codebook = self
                .codebook
                .as_ref()
                .ok_or_else(|| CodecError::format("VQ texture without codebook"))?;
            let encoded = vq::VqEncoded {
                codebook: codebook.clone(),
                indices: data.clone(),
            };
            return Ok(vq::reconstruct(&encoded, w, h));
        }
        if self.format == PixelFormat::ArcadeYiq {
            return Ok(yiq::decode_pixels(data, yiq_table));
        }
        if self.format.is_indexed() {
            return self.decompile_indexed(data, w, h);
        }
        self.decompile_direct(data, w, h)
    }

    fn decompile_indexed(&self, data: &[u8], w: usize, h: usize) -> Result<Vec<u8>> {
        let palette = self
            .palette
            .as_ref()
            .ok_or_else(|| CodecError::format("indexed texture without palette"))?;
        let four_bit = self.format.palette_len() == 16;
        let mut indices = if four_bit {
            swizzle::unpack_nibbles(data)
        } else {
            data.to_vec()
        };
        indices.truncate(w * h);
        if indices.len() < w * h {
            return Err(CodecError::truncated(w * h, indices.len()));
        }
        if let Some(order) = indexed_order(self, w, h) {
            indices = swizzle::invert_order(&indices, &order);
        }
        let mut out = Vec::with_capacity(w * h * 4);
        for &i in &indices {
            let entry = palette.get(i as usize).copied().unwrap_or([0; 4]);
            out.extend_from_slice(&entry);
        }
        Ok(out)
    }

    fn decompile_direct(&self, data: &[u8], w: usize, h: usize) -> Result<Vec<u8>> {
        let bpp = self.format.bits_per_pixel();
        let mut data = data.to_vec();
        if self.format.platform() == Some(TargetPlatform::GameCube) && bpp == 16 {
            swizzle::swap_u16_bytes(&mut data);
        }
        let mut rgba = pixel::unpack_direct(&data, self.format, w * h)?;
        if let Some(order) = direct_order(self, w, h) {
            rgba = reorder_rgba(&rgba, &order, true);
        }
        Ok(rgba)
    }
}

fn compile_vq(texture: &mut Texture, mips_rgba: &[Vec<u8>]) -> Result<()> {
    let codebook_len = if texture.flags.small_vq { 64 } else { 256 };
    let encoded = vq::quantize(&mips_rgba[0], texture.width, texture.height, codebook_len);
    texture.mips.push(encoded.indices.clone());
    for (level, mip) in mips_rgba.iter().enumerate().skip(1) {
        let (w, h) = mip_dimensions(texture.width, texture.height, level);
        texture
            .mips
            .push(vq::map_to_codebook(mip, w, h, &encoded.codebook));
    }
    texture.codebook = Some(encoded.codebook);
    Ok(())
}

fn compile_indexed(
    texture: &mut Texture,
    mips_rgba: &[Vec<u8>],
    platform: TargetPlatform,
    reorder: bool,
) -> Result<()> {
    // one palette across the whole chain
    let combined: Vec<u8> = mips_rgba.iter().flatten().copied().collect();
    let palettized = palette::palettize(&combined, texture.format.palette_len());
    texture.palette = Some(palettized.palette);

    let four_bit = texture.format.palette_len() == 16;
    let mut offset = 0;
    for level in 0..mips_rgba.len() {
        let (w, h) = mip_dimensions(texture.width, texture.height, level);
        let mut indices = palettized.indices[offset..offset + w * h].to_vec();
        offset += w * h;
        if reorder {
            if let Some(order) = indexed_order_for(texture.format, platform, four_bit, w, h) {
                indices = swizzle::apply_order(&indices, &order);
                texture.flags.swizzled = platform == TargetPlatform::Ps2;
                texture.flags.twiddled = platform == TargetPlatform::Dreamcast;
            }
        }
        texture.mips.push(if four_bit {
            swizzle::pack_nibbles(&pad_even(indices))
        } else {
            indices
        });
    }
    Ok(())
}

fn compile_direct(
    texture: &mut Texture,
    mips_rgba: &[Vec<u8>],
    platform: TargetPlatform,
    reorder: bool,
) -> Result<()> {
    for (level, mip) in mips_rgba.iter().enumerate() {
        let (w, h) = mip_dimensions(texture.width, texture.height, level);
        let mut rgba = mip.clone();
        if let Some(order) = direct_order_for(texture.format, platform, reorder, w, h) {
            rgba = reorder_rgba(&rgba, &order, false);
            texture.flags.twiddled = platform == TargetPlatform::Dreamcast;
            texture.flags.swizzled = platform == TargetPlatform::Xbox;
        }
        let mut data = pixel::pack_direct(&rgba, texture.format)?;
        // GameCube is big-endian
        if platform == TargetPlatform::GameCube && texture.format.bits_per_pixel() == 16 {
            swizzle::swap_u16_bytes(&mut data);
        }
        texture.mips.push(data);
    }
    Ok(())
}

/// Address permutation for an indexed mip, from the texture's own flags.
fn indexed_order(texture: &Texture, w: usize, h: usize) -> Option<swizzle::Order> {
    let platform = texture.format.platform()?;
    let four_bit = texture.format.palette_len() == 16;
    if !(texture.flags.swizzled || texture.flags.twiddled)
        && platform != TargetPlatform::GameCube
    {
        return None;
    }
    indexed_order_for(texture.format, platform, four_bit, w, h)
}

fn indexed_order_for(
    format: PixelFormat,
    platform: TargetPlatform,
    four_bit: bool,
    w: usize,
    h: usize,
) -> Option<swizzle::Order> {
    let _ = format;
    match platform {
        TargetPlatform::Ps2 => {
            // mips below the pattern size stay linear
            if four_bit {
                (w % GS_SWIZZLE4_MIN == 0 && h % GS_SWIZZLE4_MIN == 0)
                    .then(|| swizzle::gs_order4(w, h))
            } else {
                (w >= GS_SWIZZLE_MIN && h >= GS_SWIZZLE_MIN).then(|| swizzle::gs_order8(w, h))
            }
        }
        TargetPlatform::Dreamcast => Some(swizzle::twiddle_order(w, h)),
        TargetPlatform::GameCube => {
            let (tw, th) = swizzle::gc_tile_shape(if four_bit { 4 } else { 8 });
            (w % tw == 0 && h % th == 0).then(|| swizzle::tile_order(w, h, tw, th))
        }
        _ => None,
    }
}

fn direct_order(texture: &Texture, w: usize, h: usize) -> Option<swizzle::Order> {
    let platform = texture.format.platform()?;
    let wants = texture.flags.swizzled
        || texture.flags.twiddled
        || platform == TargetPlatform::GameCube;
    if !wants {
        return None;
    }
    direct_order_for(texture.format, platform, true, w, h)
}

fn direct_order_for(
    format: PixelFormat,
    platform: TargetPlatform,
    reorder: bool,
    w: usize,
    h: usize,
) -> Option<swizzle::Order> {
    match platform {
        // tiling is part of the format, not optional
        TargetPlatform::GameCube => {
            let (tw, th) = swizzle::gc_tile_shape(format.bits_per_pixel());
            (w % tw == 0 && h % th == 0).then(|| swizzle::tile_order(w, h, tw, th))
        }
        TargetPlatform::Dreamcast if reorder => Some(swizzle::twiddle_order(w, h)),
        TargetPlatform::Xbox if reorder => Some(swizzle::morton_order(w, h)),
        _ => None,
    }
}

/// Permute RGBA pixels (4 bytes each) by a texel order table.
fn reorder_rgba(rgba: &[u8], order: &[u32], inverse: bool) -> Vec<u8> {
    let texels: &[[u8; 4]] = bytemuck::cast_slice(rgba);
    let reordered = if inverse {
        swizzle::invert_order(texels, order)
    } else {
        swizzle::apply_order(texels, order)
    };
    bytemuck::cast_slice(&reordered).to_vec()
}

fn pad_even(mut v: Vec<u8>) -> Vec<u8> {
    if v.len() % 2 != 0 {
        v.push(0);
    }
    v
}

/// Box-filtered mip chain, level 0 being the source image.
pub fn generate_mips(rgba: &[u8], width: usize, height: usize, levels: usize) -> Vec<Vec<u8>> {
    let mut mips = vec![rgba.to_vec()];
    for level in 1..levels {
        let (pw, _) = mip_dimensions(width, height, level - 1);
        let (w, h) = mip_dimensions(width, height, level);
        let prev = &mips[level - 1];
        let mut mip = Vec::with_capacity(w * h * 4);
        for y in 0..h {
            for x in 0..w {
                let mut sum = [0u32; 4];
                for (dy, dx) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
                    let sx = (x * 2 + dx).min(pw - 1);
                    let sy = y * 2 + dy;
                    let p = &prev[(sy * pw + sx) * 4..][..4];
                    for ch in 0..4 {
                        sum[ch] += p[ch] as u32;
                    }
                }
                mip.extend(sum.map(|s| (s / 4) as u8));
            }
        }
        mips.push(mip);
    }
    mips
}

// ---------------------------------------------------------------------------
// Payload serialization
// ---------------------------------------------------------------------------

impl Texture {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.write_u16(self.width as u16);
        w.write_u16(self.height as u16);
        w.write_u8(self.mips.len() as u8);
        w.write_u8(self.flags.to_bits());
        w.write_i8(self.lod_bias);
        w.write_u8(self.format as u8);
        w.write_u32(self.source_hash);

        if let Some(palette) = &self.palette {
            let half_range = self.format.platform() == Some(TargetPlatform::Ps2);
            for entry in palette.iter().chain(std::iter::repeat(&[0u8; 4])).take(
                self.format.palette_len(),
            ) {
                w.write_u8(entry[0]);
                w.write_u8(entry[1]);
                w.write_u8(entry[2]);
                w.write_u8(if half_range {
                    alpha_to_half_range(entry[3])
                } else {
                    entry[3]
                });
            }
        }
        if let Some(codebook) = &self.codebook {
            w.write_u16(codebook.len() as u16);
            for entry in codebook {
                for px in entry {
                    w.write_bytes(px);
                }
            }
        }
        for mip in &self.mips {
            w.write_bytes(mip);
        }
        w.into_bytes()
    }

    /// Parse a texture payload. Running out of data on mip level 0 is a
    /// hard failure; on deeper levels the chain is truncated with a
    /// warning and the mips already read are kept.
    pub fn from_bytes(bytes: &[u8]) -> Result<Texture> {
        let mut r = ByteReader::new(bytes);
        if r.remaining() < PAYLOAD_HEADER_SIZE {
            return Err(CodecError::truncated(PAYLOAD_HEADER_SIZE, r.remaining()));
        }
        let width = r.read_u16()? as usize;
        let height = r.read_u16()? as usize;
        let mip_count = r.read_u8()? as usize;
        let flags = TextureFlags::from_bits(r.read_u8()?);
        let lod_bias = r.read_i8()?;
        let format = PixelFormat::from_u8(r.read_u8()?)?;
        let source_hash = r.read_u32()?;
        validate_dimensions(width, height)?;

        let mut texture = Texture {
            width,
            height,
            format,
            flags,
            lod_bias,
            source_hash,
            palette: None,
            codebook: None,
            mips: Vec::with_capacity(mip_count),
        };

        if format.is_indexed() {
            let half_range = format.platform() == Some(TargetPlatform::Ps2);
            let mut palette = Vec::with_capacity(format.palette_len());
            for _ in 0..format.palette_len() {
                let entry = r.read_bytes(4)?;
                palette.push([
                    entry[0],
                    entry[1],
                    entry[2],
                    if half_range {
                        alpha_from_half_range(entry[3])
                    } else {
                        entry[3]
                    },
                ]);
            }
            texture.palette = Some(palette);
        }
        if flags.is_vq() {
            let count = r.read_u16()? as usize;
            let mut codebook = Vec::with_capacity(count);
            for _ in 0..count {
                let raw = r.read_bytes(16)?;
                let mut entry: vq::VqEntry = [[0; 4]; 4];
                for (px, chunk) in entry.iter_mut().zip(raw.chunks_exact(4)) {
                    px.copy_from_slice(chunk);
                }
                codebook.push(entry);
            }
            texture.codebook = Some(codebook);
        }

        for level in 0..mip_count {
            let size = packed_mip_size(&texture, level);
            match r.read_bytes(size) {
                Ok(data) => texture.mips.push(data.to_vec()),
                Err(err) if level > 0 && err.is_truncation() => {
                    warn!(
                        level,
                        kept = texture.mips.len(),
                        "texture payload ends early, keeping lower mips"
                    );
                    break;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(texture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: usize, height: usize) -> Vec<u8> {
        let mut rgba = Vec::with_capacity(width * height * 4);
        for y in 0..height {
            for x in 0..width {
                rgba.extend_from_slice(&[
                    (x * 255 / (width - 1)) as u8,
                    (y * 255 / (height - 1)) as u8,
                    128,
                    255,
                ]);
            }
        }
        rgba
    }

    #[test]
    fn test_dimension_validation() {
        assert!(validate_dimensions(256, 64).is_ok());
        assert!(validate_dimensions(8, 1024).is_ok());
        assert!(validate_dimensions(4, 64).is_err());
        assert!(validate_dimensions(2048, 64).is_err());
        assert!(validate_dimensions(100, 64).is_err());
    }

    #[test]
    fn test_mip_math() {
        assert_eq!(mip_dimensions(256, 64, 0), (256, 64));
        assert_eq!(mip_dimensions(256, 64, 3), (32, 8));
        assert_eq!(max_mip_count(256, 64), 4);
        assert_eq!(max_mip_count(8, 8), 1);
    }

    #[test]
    fn test_flag_bits_round_trip() {
        let flags = TextureFlags {
            has_alpha: true,
            clamp_v: true,
            twiddled: true,
            ..TextureFlags::default()
        };
        assert_eq!(TextureFlags::from_bits(flags.to_bits()), flags);
    }

    #[test]
    fn test_mip_generation_box_filter() {
        // 2x2 blocks of a flat color average to themselves
        let rgba = vec![100u8; 32 * 32 * 4];
        let mips = generate_mips(&rgba, 32, 32, 3);
        assert_eq!(mips.len(), 3);
        assert_eq!(mips[1].len(), 16 * 16 * 4);
        assert!(mips[2].iter().all(|&b| b == 100));
    }

    #[test]
    fn test_compile_direct_round_trip() {
        let rgba = gradient(32, 32);
        let options = TextureOptions {
            format: PixelFormat::Psmct32,
            mip_count: 1,
            ..TextureOptions::default()
        };
        let tex = Texture::compile(&rgba, 32, 32, TargetPlatform::Ps2, &options, 0).unwrap();
        let back = tex.decompile(0, &YiqTable::default_table()).unwrap();
        for (a, b) in rgba.chunks_exact(4).zip(back.chunks_exact(4)) {
            for ch in 0..3 {
                assert_eq!(a[ch], b[ch]);
            }
            assert!((a[3] as i32 - b[3] as i32).abs() <= 1);
        }
    }

    #[test]
    fn test_compile_indexed_swizzles_and_inverts() {
        // 17 colors forces an indexed path through k-means or exact
        let mut rgba = Vec::new();
        for i in 0..32 * 32 {
            let v = (i % 8 * 32) as u8;
            rgba.extend_from_slice(&[v, 255 - v, 0, 255]);
        }
        let options = TextureOptions {
            format: PixelFormat::Psmt8,
            mip_count: 1,
            ..TextureOptions::default()
        };
        let tex = Texture::compile(&rgba, 32, 32, TargetPlatform::Ps2, &options, 0).unwrap();
        assert!(tex.flags.swizzled);
        let back = tex.decompile(0, &YiqTable::default_table()).unwrap();
        assert_eq!(back, rgba); // 8 distinct colors palettize exactly
    }

    #[test]
    fn test_payload_round_trip() {
        let rgba = gradient(64, 32);
        let options = TextureOptions {
            format: PixelFormat::DcArgb4444,
            mip_count: 3,
            ..TextureOptions::default()
        };
        let tex =
            Texture::compile(&rgba, 64, 32, TargetPlatform::Dreamcast, &options, 7).unwrap();
        let parsed = Texture::from_bytes(&tex.to_bytes()).unwrap();
        assert_eq!(parsed.width, 64);
        assert_eq!(parsed.mip_count(), 3);
        assert_eq!(parsed.format, tex.format);
        assert_eq!(parsed.source_hash, 7);
        assert_eq!(parsed.mips, tex.mips);
    }

    #[test]
    fn test_truncated_first_mip_fails() {
        let rgba = gradient(32, 32);
        let options = TextureOptions {
            format: PixelFormat::XboxR5G6B5,
            ..TextureOptions::default()
        };
        let tex = Texture::compile(&rgba, 32, 32, TargetPlatform::Xbox, &options, 0).unwrap();
        let bytes = tex.to_bytes();
        let err = Texture::from_bytes(&bytes[..PAYLOAD_HEADER_SIZE + 10]).unwrap_err();
        assert!(err.is_truncation());
    }

    #[test]
    fn test_truncated_deep_mip_degrades() {
        let rgba = gradient(64, 64);
        let options = TextureOptions {
            format: PixelFormat::XboxR5G6B5,
            mip_count: 3,
            ..TextureOptions::default()
        };
        let tex = Texture::compile(&rgba, 64, 64, TargetPlatform::Xbox, &options, 0).unwrap();
        let bytes = tex.to_bytes();
        // cut halfway through mip 2
        let cut = bytes.len() - tex.mips[2].len() / 2;
        let parsed = Texture::from_bytes(&bytes[..cut]).unwrap();
        assert_eq!(parsed.mip_count(), 2);
        assert_eq!(parsed.mips[1], tex.mips[1]);
    }

    #[test]
    fn test_vq_compile_shares_codebook() {
        let rgba = gradient(64, 64);
        let options = TextureOptions {
            format: PixelFormat::DcRgb565,
            mip_count: 2,
            vq: true,
            ..TextureOptions::default()
        };
        let tex =
            Texture::compile(&rgba, 64, 64, TargetPlatform::Dreamcast, &options, 0).unwrap();
        assert!(tex.flags.small_vq);
        assert!(tex.codebook.is_some());
        assert_eq!(tex.mips[0].len(), 32 * 32);
        assert_eq!(tex.mips[1].len(), 16 * 16);
        let parsed = Texture::from_bytes(&tex.to_bytes()).unwrap();
        assert_eq!(parsed.codebook, tex.codebook);
    }

    #[test]
    fn test_arcade_compile() {
        let rgba = gradient(32, 32);
        let options = TextureOptions {
            format: PixelFormat::Rgba8888,
            ..TextureOptions::default()
        };
        let tex = Texture::compile(&rgba, 32, 32, TargetPlatform::Arcade, &options, 0).unwrap();
        assert_eq!(tex.format, PixelFormat::ArcadeYiq);
        assert_eq!(tex.mips[0].len(), 32 * 32);
    }
}

//! GPU command-stream codec.
//!
//! Serializes stripified geometry into the tagged data-stream format the
//! PS2-class GPU consumes directly, and reads the same format back into
//! editable mesh data.
//!
//! # Block layout
//! ```text
//! 0x00: data_type u8    - what the block carries (geometry header,
//!                         positions, normals, colors, UVs)
//! 0x01: flags u8        - reserved, written 0
//! 0x02: count u8        - element count (includes the padding vertex)
//! 0x03: storage u8      - element encoding, or strip terminator kind
//! 0x04: count * element, zero-padded to a 4-byte boundary
//! ```
//!
//! A strip is a geometry header block, one block per vertex attribute, and
//! a geometry terminator block. Every attribute block carries one trailing
//! padding vertex (a repeat of the last real one) that the decoder
//! discards. The terminator's storage value says whether this strip was
//! force-split off the previous one and continues its parity chain.
//!
//! # Geometry header element (12 bytes)
//! ```text
//! 0x00: tri_count u16   - drawn triangles in the strip
//! 0x02: face_flags u8   - bit 0: base winding flip
//! 0x03: pad u8          - 0
//! 0x04: u32             - constant 0x2D314100, copied from retail data
//! 0x08: f32             - always -1.0, copied from retail data
//! ```
//! The last two fields have no confirmed meaning; both are written and
//! checked byte-for-byte.

mod decode;
mod encode;
#[cfg(test)]
mod tests;

pub use decode::{DecodedGroup, decode};
pub use encode::encode;

use crate::error::{CodecError, Result};

/// Fixed-point scale for positions.
pub const POSITION_SCALE: f32 = 256.0;
/// Fixed-point scale for diffuse UVs.
pub const UV_SCALE: f32 = 128.0;
/// Fixed-point scale for lightmap UVs in the combined quad encoding.
pub const LIGHTMAP_UV_SCALE: f32 = 32768.0;

/// Constant word in every geometry header, preserved verbatim from retail
/// streams.
pub const GEOMETRY_UNKNOWN_WORD: u32 = 0x2D31_4100;
/// Trailing float in every geometry header, preserved verbatim.
pub const GEOMETRY_TRAILER: f32 = -1.0;

/// What a stream block carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DataType {
    /// Strip header / strip terminator.
    Geometry = 0x10,
    Position = 0x20,
    Normal = 0x30,
    Color = 0x40,
    Uv = 0x50,
}

impl DataType {
    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            0x10 => Ok(DataType::Geometry),
            0x20 => Ok(DataType::Position),
            0x30 => Ok(DataType::Normal),
            0x40 => Ok(DataType::Color),
            0x50 => Ok(DataType::Uv),
            other => Err(CodecError::format(format!(
                "unknown stream data type 0x{other:02X}"
            ))),
        }
    }
}

/// Element encoding of a block, or the terminator kind for geometry blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StorageType {
    /// Signed 8-bit fixed point.
    S8 = 0x01,
    /// Signed 16-bit fixed point.
    S16 = 0x02,
    /// Signed 32-bit fixed point.
    S32 = 0x03,
    /// 16-bit word: three 5-bit channels plus a high bit.
    Packed16 = 0x05,
    /// Four signed 16-bit values: diffuse + lightmap UV pair.
    Quad16 = 0x06,
    /// Geometry block opening a strip.
    Header = 0x10,
    /// Terminator: the next strip (if any) starts a fresh parity chain.
    Strip0End = 0x20,
    /// Terminator: the next strip continues this strip's parity chain.
    StripNEnd = 0x21,
}

impl StorageType {
    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            0x01 => Ok(StorageType::S8),
            0x02 => Ok(StorageType::S16),
            0x03 => Ok(StorageType::S32),
            0x05 => Ok(StorageType::Packed16),
            0x06 => Ok(StorageType::Quad16),
            0x10 => Ok(StorageType::Header),
            0x20 => Ok(StorageType::Strip0End),
            0x21 => Ok(StorageType::StripNEnd),
            other => Err(CodecError::format(format!(
                "unknown stream storage type 0x{other:02X}"
            ))),
        }
    }

    /// Integer width selected by the largest scaled magnitude an attribute
    /// block has to hold.
    pub fn for_magnitude(max_scaled: i64) -> StorageType {
        if max_scaled <= i8::MAX as i64 {
            StorageType::S8
        } else if max_scaled <= i16::MAX as i64 {
            StorageType::S16
        } else {
            StorageType::S32
        }
    }
}

/// Pack a unit normal and a draw suppression flag into the 16-bit wire
/// word: `[dont_draw:1][z:5][y:5][x:5]`.
pub fn pack_normal_word(n: [f32; 3], dont_draw: bool) -> u16 {
    use crate::math::pack_normal5;
    let x = pack_normal5(n[0]) as u16;
    let y = pack_normal5(n[1]) as u16;
    let z = pack_normal5(n[2]) as u16;
    ((dont_draw as u16) << 15) | (z << 10) | (y << 5) | x
}

/// Inverse of [`pack_normal_word`]; returns the normal and the flag.
pub fn unpack_normal_word(word: u16) -> ([f32; 3], bool) {
    use crate::math::NORMAL_UNPACK;
    let x = NORMAL_UNPACK[(word & 0x1F) as usize];
    let y = NORMAL_UNPACK[((word >> 5) & 0x1F) as usize];
    let z = NORMAL_UNPACK[((word >> 10) & 0x1F) as usize];
    ([x, y, z], word & 0x8000 != 0)
}

/// Pack an RGBA color into the 16-bit wire word: `[a:1][b:5][g:5][r:5]`.
pub fn pack_color_word(c: [f32; 4]) -> u16 {
    use crate::math::pack_color5;
    let r = pack_color5(c[0]) as u16;
    let g = pack_color5(c[1]) as u16;
    let b = pack_color5(c[2]) as u16;
    let a = (c[3] >= 0.5) as u16;
    (a << 15) | (b << 10) | (g << 5) | r
}

/// Inverse of [`pack_color_word`].
pub fn unpack_color_word(word: u16) -> [f32; 4] {
    use crate::math::COLOR_UNPACK;
    let r = COLOR_UNPACK[(word & 0x1F) as usize];
    let g = COLOR_UNPACK[((word >> 5) & 0x1F) as usize];
    let b = COLOR_UNPACK[((word >> 10) & 0x1F) as usize];
    let a = if word & 0x8000 != 0 { 1.0 } else { 0.0 };
    [r, g, b, a]
}

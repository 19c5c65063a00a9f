//! Stream-to-mesh deserialization.

use super::{
    DataType, GEOMETRY_UNKNOWN_WORD, LIGHTMAP_UV_SCALE, POSITION_SCALE, StorageType, UV_SCALE,
    unpack_color_word, unpack_normal_word,
};
use crate::error::{CodecError, Result};
use crate::io::ByteReader;
use crate::math::dequantize;

/// Mesh data recovered from one material group's GPU stream.
///
/// Vertices are emitted in strip order (shared vertices duplicated across
/// strips); triangle indices point into these arrays.
#[derive(Debug, Clone, Default)]
pub struct DecodedGroup {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub colors: Vec<[f32; 4]>,
    pub uvs: Vec<[f32; 2]>,
    pub lightmap_uvs: Option<Vec<[f32; 2]>>,
    pub triangles: Vec<[u32; 3]>,
}

/// One strip's worth of blocks between a geometry header and terminator.
#[derive(Default)]
struct StripState {
    tri_count: u16,
    flip_start: bool,
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    dont_draw: Vec<bool>,
    colors: Vec<[f32; 4]>,
    uvs: Vec<[f32; 2]>,
    lightmap_uvs: Vec<[f32; 2]>,
    has_lightmap: bool,
}

/// Decode a GPU stream back into mesh data.
///
/// The stream is read sequentially; a truncated block payload is a hard
/// parse failure, and any attribute block outside an open strip context is
/// a format error.
pub fn decode(bytes: &[u8]) -> Result<DecodedGroup> {
    let mut r = ByteReader::new(bytes);
    let mut out = DecodedGroup::default();
    let mut open: Option<StripState> = None;
    // winding parity the next strip starts on if its terminator marks it
    // as a continuation of the chain
    let mut carry = false;

    while !r.is_empty() {
        // quadword padding after the final terminator is all zeroes
        if open.is_none() && r.remaining() < 4 || peek_zero_padding(&r, bytes) {
            consume_padding(&mut r)?;
            break;
        }

        let data_type = DataType::from_u8(r.read_u8()?)?;
        let _flags = r.read_u8()?;
        let count = r.read_u8()? as usize;
        let storage = StorageType::from_u8(r.read_u8()?)?;

        match (data_type, storage) {
            (DataType::Geometry, StorageType::Header) => {
                if open.is_some() {
                    return Err(CodecError::format("geometry header inside open strip"));
                }
                let tri_count = r.read_u16()?;
                let face_flags = r.read_u8()?;
                let _pad = r.read_u8()?;
                let unknown = r.read_u32()?;
                if unknown != GEOMETRY_UNKNOWN_WORD {
                    return Err(CodecError::format(format!(
                        "geometry header constant mismatch: 0x{unknown:08X}"
                    )));
                }
                let _trailer = r.read_f32()?;
                open = Some(StripState {
                    tri_count,
                    flip_start: face_flags & 1 != 0,
                    ..Default::default()
                });
            }
            (DataType::Geometry, StorageType::Strip0End | StorageType::StripNEnd) => {
                let mut strip = open.take().ok_or_else(|| {
                    CodecError::format("strip terminator without open strip")
                })?;
                // StripNEnd marks the strip just read as continuing the
                // previous strip's parity chain, overriding the header bit
                if storage == StorageType::StripNEnd {
                    strip.flip_start = carry;
                }
                carry = chain_parity(&strip);
                assemble(&mut out, strip)?;
            }
            (DataType::Geometry, other) => {
                return Err(CodecError::format(format!(
                    "geometry block with storage {other:?}"
                )));
            }
            (attr, storage) => {
                let strip = open.as_mut().ok_or_else(|| {
                    CodecError::format("attribute block outside strip context")
                })?;
                if count < 2 {
                    return Err(CodecError::format("attribute block too short"));
                }
                read_attribute(&mut r, strip, attr, storage, count)?;
                r.align4()?;
            }
        }
    }

    if open.is_some() {
        return Err(CodecError::format("stream ended inside open strip"));
    }
    Ok(out)
}

/// Winding parity the chain would use at the position right after this
/// strip's last vertex (the padding vertex excluded).
fn chain_parity(strip: &StripState) -> bool {
    let n = strip.positions.len().saturating_sub(1);
    if n < 2 {
        strip.flip_start
    } else {
        ((n - 2) % 2 == 1) ^ strip.flip_start
    }
}

fn peek_zero_padding(r: &ByteReader<'_>, bytes: &[u8]) -> bool {
    bytes[r.position()..].iter().all(|&b| b == 0) && !r.is_empty()
}

fn consume_padding(r: &mut ByteReader<'_>) -> Result<()> {
    while !r.is_empty() {
        if r.read_u8()? != 0 {
            return Err(CodecError::format("nonzero stream padding"));
        }
    }
    Ok(())
}

fn read_attribute(
    r: &mut ByteReader<'_>,
    strip: &mut StripState,
    attr: DataType,
    storage: StorageType,
    count: usize,
) -> Result<()> {
    match (attr, storage) {
        (DataType::Position, StorageType::S8 | StorageType::S16 | StorageType::S32) => {
            for _ in 0..count {
                let mut p = [0.0f32; 3];
                for c in &mut p {
                    *c = dequantize(read_scaled(r, storage)?, POSITION_SCALE);
                }
                strip.positions.push(p);
            }
        }
        (DataType::Normal, StorageType::Packed16) => {
            for _ in 0..count {
                let (n, dont_draw) = unpack_normal_word(r.read_u16()?);
                strip.normals.push(n);
                strip.dont_draw.push(dont_draw);
            }
        }
        (DataType::Color, StorageType::Packed16) => {
            for _ in 0..count {
                strip.colors.push(unpack_color_word(r.read_u16()?));
            }
        }
        (DataType::Uv, StorageType::S8 | StorageType::S16 | StorageType::S32) => {
            for _ in 0..count {
                let u = dequantize(read_scaled(r, storage)?, UV_SCALE);
                let v = dequantize(read_scaled(r, storage)?, UV_SCALE);
                strip.uvs.push([u, v]);
            }
        }
        (DataType::Uv, StorageType::Quad16) => {
            strip.has_lightmap = true;
            for _ in 0..count {
                let u = dequantize(r.read_i16()? as i32, UV_SCALE);
                let v = dequantize(r.read_i16()? as i32, UV_SCALE);
                let lu = dequantize(r.read_i16()? as i32, LIGHTMAP_UV_SCALE);
                let lv = dequantize(r.read_i16()? as i32, LIGHTMAP_UV_SCALE);
                strip.uvs.push([u, v]);
                strip.lightmap_uvs.push([lu, lv]);
            }
        }
        (attr, storage) => {
            return Err(CodecError::format(format!(
                "attribute {attr:?} with storage {storage:?}"
            )));
        }
    }
    Ok(())
}

fn read_scaled(r: &mut ByteReader<'_>, storage: StorageType) -> Result<i32> {
    Ok(match storage {
        StorageType::S8 => r.read_i8()? as i32,
        StorageType::S16 => r.read_i16()? as i32,
        _ => r.read_i32()?,
    })
}

/// Fold a completed strip into the output arrays, dropping the padding
/// vertex and expanding drawn triangles with alternating winding.
fn assemble(out: &mut DecodedGroup, strip: StripState) -> Result<()> {
    let counts = [
        strip.positions.len(),
        strip.normals.len(),
        strip.colors.len(),
        strip.uvs.len(),
    ];
    let n_padded = counts[0];
    if counts.iter().any(|&c| c != n_padded) || n_padded < 3 + 1 {
        return Err(CodecError::format(format!(
            "inconsistent attribute counts in strip: {counts:?}"
        )));
    }
    // the lone padding vertex is discarded
    let n = n_padded - 1;

    let base = out.positions.len() as u32;
    out.positions.extend_from_slice(&strip.positions[..n]);
    out.normals.extend_from_slice(&strip.normals[..n]);
    out.colors.extend_from_slice(&strip.colors[..n]);
    out.uvs.extend_from_slice(&strip.uvs[..n]);
    if strip.has_lightmap {
        out.lightmap_uvs
            .get_or_insert_with(Vec::new)
            .extend_from_slice(&strip.lightmap_uvs[..n]);
    }

    let mut drawn = 0u16;
    for i in 2..n {
        if strip.dont_draw[i] {
            continue;
        }
        drawn += 1;
        let (a, b, c) = (base + i as u32 - 2, base + i as u32 - 1, base + i as u32);
        let flipped = ((i - 2) % 2 == 1) ^ strip.flip_start;
        if flipped {
            out.triangles.push([b, a, c]);
        } else {
            out.triangles.push([a, b, c]);
        }
    }
    if drawn != strip.tri_count {
        return Err(CodecError::format(format!(
            "strip draws {drawn} triangles, header declared {}",
            strip.tri_count
        )));
    }
    Ok(())
}

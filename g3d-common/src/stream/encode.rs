//! Strip-to-stream serialization.

use super::{
    DataType, GEOMETRY_TRAILER, GEOMETRY_UNKNOWN_WORD, LIGHTMAP_UV_SCALE, POSITION_SCALE,
    StorageType, UV_SCALE, pack_color_word, pack_normal_word,
};
use crate::io::ByteWriter;
use crate::math::quantize;
use crate::mesh::Mesh;
use crate::strip::Strip;

/// Serialize a material group's strips into one GPU stream.
///
/// `has_lightmap` selects the combined diffuse+lightmap UV quad encoding.
/// The result is quadword (16-byte) padded, ready to be embedded in a
/// model payload.
pub fn encode(mesh: &Mesh, strips: &[Strip], has_lightmap: bool) -> Vec<u8> {
    let mut w = ByteWriter::new();
    for strip in strips {
        encode_strip(&mut w, mesh, strip, has_lightmap);
    }
    w.align16();
    w.into_bytes()
}

fn block_header(w: &mut ByteWriter, data_type: DataType, count: u8, storage: StorageType) {
    w.write_u8(data_type as u8);
    w.write_u8(0); // flags
    w.write_u8(count);
    w.write_u8(storage as u8);
}

fn encode_strip(w: &mut ByteWriter, mesh: &Mesh, strip: &Strip, has_lightmap: bool) {
    // geometry header
    block_header(w, DataType::Geometry, 1, StorageType::Header);
    w.write_u16(strip.triangle_count() as u16);
    w.write_u8(strip.flip_start as u8);
    w.write_u8(0);
    w.write_u32(GEOMETRY_UNKNOWN_WORD);
    w.write_f32(GEOMETRY_TRAILER);

    // every attribute block repeats the final vertex once as padding;
    // counts include it and the decoder drops it
    let Some(last) = strip.indices.last().copied() else {
        return;
    };
    let count = (strip.len() + 1) as u8;
    let padded = strip.indices.iter().copied().chain(std::iter::once(last));

    // positions, width picked from the strip's magnitude
    let pos_storage = StorageType::for_magnitude(quantize(strip.max_position, POSITION_SCALE) as i64);
    block_header(w, DataType::Position, count, pos_storage);
    for idx in padded.clone() {
        let p = mesh.positions[idx as usize];
        for c in p {
            write_scaled(w, c, POSITION_SCALE, pos_storage);
        }
    }
    w.align4();

    // normals carry the don't-draw flag on the high bit; the padding
    // vertex is always suppressed
    block_header(w, DataType::Normal, count, StorageType::Packed16);
    for (i, idx) in padded.clone().enumerate() {
        let dont_draw = i >= strip.len() || !strip.draw[i];
        w.write_u16(pack_normal_word(mesh.normals[idx as usize], dont_draw));
    }
    w.align4();

    block_header(w, DataType::Color, count, StorageType::Packed16);
    for idx in padded.clone() {
        w.write_u16(pack_color_word(mesh.colors[idx as usize]));
    }
    w.align4();

    if has_lightmap {
        block_header(w, DataType::Uv, count, StorageType::Quad16);
        for idx in padded.clone() {
            let uv = mesh.uvs[idx as usize];
            let lm = mesh.lightmap_uvs[idx as usize];
            w.write_i16(clamp16(quantize(uv[0], UV_SCALE)));
            w.write_i16(clamp16(quantize(uv[1], UV_SCALE)));
            w.write_i16(clamp16(quantize(lm[0], LIGHTMAP_UV_SCALE)));
            w.write_i16(clamp16(quantize(lm[1], LIGHTMAP_UV_SCALE)));
        }
    } else {
        let uv_storage = StorageType::for_magnitude(quantize(strip.max_uv, UV_SCALE) as i64);
        block_header(w, DataType::Uv, count, uv_storage);
        for idx in padded.clone() {
            let uv = mesh.uvs[idx as usize];
            write_scaled(w, uv[0], UV_SCALE, uv_storage);
            write_scaled(w, uv[1], UV_SCALE, uv_storage);
        }
    }
    w.align4();

    // strip-link terminator
    let end = if strip.continuation {
        StorageType::StripNEnd
    } else {
        StorageType::Strip0End
    };
    block_header(w, DataType::Geometry, 0, end);
}

#[inline]
fn clamp16(v: i32) -> i16 {
    v.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

fn write_scaled(w: &mut ByteWriter, v: f32, scale: f32, storage: StorageType) {
    let q = quantize(v, scale);
    match storage {
        StorageType::S8 => w.write_i8(q as i8),
        StorageType::S16 => w.write_i16(q as i16),
        _ => w.write_i32(q),
    }
}

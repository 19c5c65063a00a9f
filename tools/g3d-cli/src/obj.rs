//! Extended Wavefront OBJ import/export.
//!
//! On top of the standard `v`/`vn`/`vt`/`f`/`usemtl` records the pipeline
//! reads and writes four comment extensions:
//!
//! - `#$lod_k <int>` - LOD coefficient for the current material group
//! - `#$lm_name <name>` - lightmap texture for following faces,
//!   percent-encoded so names survive whitespace-splitting editors
//! - `#lmvt <u> <v>` - lightmap UV, parallel to the `vt` list
//! - `#vc <r> <g> <b> <a>` - vertex color, parallel to the `v` list
//!
//! Face indices are 1-based. The X axis is sign-flipped in both
//! directions to convert between the editor's and the engine's
//! coordinate systems.

use anyhow::{Context, Result, anyhow, bail};
use hashbrown::HashMap;
use std::fmt::Write as _;

use g3d_common::math::flat_normal;
use g3d_common::{GeometryGroup, MaterialKey, Mesh};

/// Parse extended OBJ text into a mesh.
pub fn import(text: &str) -> Result<Mesh> {
    let mut positions = Vec::new();
    let mut colors = Vec::new();
    let mut normals = Vec::new();
    let mut uvs = Vec::new();
    let mut lm_uvs = Vec::new();

    let mut mesh = Mesh::default();
    // (position, uv, normal) triple to unified vertex index
    let mut vertex_map: HashMap<(usize, Option<usize>, Option<usize>), u32> = HashMap::new();
    let mut texture = String::new();
    let mut lightmap = String::new();
    let mut lod_k: i16 = 0;
    let mut group: Option<usize> = None;

    for (line_no, raw) in text.lines().enumerate() {
        let line = raw.trim();
        let mut fields = line.split_whitespace();
        let Some(keyword) = fields.next() else {
            continue;
        };
        let context = || format!("line {}: {raw:?}", line_no + 1);
        match keyword {
            "v" => {
                let [x, y, z] = read_floats(&mut fields).with_context(context)?;
                positions.push([-x, y, z]);
            }
            "#vc" => {
                let rgba: [f32; 4] = read_floats(&mut fields).with_context(context)?;
                grow_to(&mut colors, positions.len(), [1.0, 1.0, 1.0, 1.0]);
                colors.push(rgba);
            }
            "vn" => {
                let [x, y, z] = read_floats(&mut fields).with_context(context)?;
                normals.push([-x, y, z]);
            }
            "vt" => {
                let [u, v] = read_floats(&mut fields).with_context(context)?;
                uvs.push([u, v]);
            }
            "#lmvt" => {
                let [u, v] = read_floats(&mut fields).with_context(context)?;
                grow_to(&mut lm_uvs, uvs.len(), [0.0, 0.0]);
                lm_uvs.push([u, v]);
            }
            "usemtl" => {
                texture = fields.next().unwrap_or("").to_owned();
                lightmap.clear();
                lod_k = 0;
                group = None;
            }
            "#$lm_name" => {
                let encoded = fields.next().ok_or_else(|| anyhow!("missing name"))?;
                lightmap = percent_decode(encoded).with_context(context)?;
                group = None;
            }
            "#$lod_k" => {
                let value = fields.next().ok_or_else(|| anyhow!("missing value"))?;
                lod_k = value.parse().with_context(context)?;
                if let Some(g) = group {
                    mesh.groups[g].lod_k = lod_k;
                }
            }
            "f" => {
                let corners: Vec<&str> = fields.collect();
                if corners.len() < 3 {
                    bail!("face needs at least 3 corners ({})", context());
                }
                let g = *group.get_or_insert_with(|| {
                    mesh.groups.push(GeometryGroup {
                        key: MaterialKey::new(texture.clone(), lightmap.clone()),
                        lod_k,
                        triangles: Vec::new(),
                    });
                    mesh.groups.len() - 1
                });
                let mut keys = Vec::with_capacity(corners.len());
                for corner in corners {
                    keys.push(
                        parse_corner(corner, positions.len(), uvs.len(), normals.len())
                            .with_context(context)?,
                    );
                }
                // corners without an explicit `vn` reference take the
                // face's flat normal
                let face_flat = flat_normal(
                    positions[keys[0].0],
                    positions[keys[1].0],
                    positions[keys[2].0],
                );
                let mut unified = Vec::with_capacity(keys.len());
                for key in keys {
                    let next = vertex_map.len() as u32;
                    let index = *vertex_map.entry(key).or_insert(next);
                    if index == next {
                        let (vi, ti, ni) = key;
                        mesh.positions.push(positions[vi]);
                        mesh.colors
                            .push(colors.get(vi).copied().unwrap_or([1.0, 1.0, 1.0, 1.0]));
                        mesh.normals
                            .push(ni.map_or(face_flat, |n| normals[n]));
                        mesh.uvs.push(ti.map_or([0.0, 0.0], |t| uvs[t]));
                        mesh.lightmap_uvs.push(
                            ti.and_then(|t| lm_uvs.get(t).copied())
                                .unwrap_or([0.0, 0.0]),
                        );
                    }
                    unified.push(index);
                }
                // fan triangulation for quads and larger polygons
                for i in 1..unified.len() - 1 {
                    mesh.groups[g]
                        .triangles
                        .push([unified[0], unified[i], unified[i + 1]]);
                }
            }
            _ => {}
        }
    }

    mesh.prune_empty_groups();
    mesh.validate()?;
    Ok(mesh)
}

/// Serialize a mesh to extended OBJ text.
pub fn export(mesh: &Mesh) -> Result<String> {
    mesh.validate()?;
    let mut out = String::new();
    let has_lightmaps = mesh.groups.iter().any(|g| g.key.has_lightmap());

    for (i, p) in mesh.positions.iter().enumerate() {
        writeln!(out, "v {} {} {}", -p[0], p[1], p[2])?;
        let c = mesh.colors[i];
        if c != [1.0, 1.0, 1.0, 1.0] {
            writeln!(out, "#vc {} {} {} {}", c[0], c[1], c[2], c[3])?;
        }
    }
    for t in &mesh.uvs {
        writeln!(out, "vt {} {}", t[0], t[1])?;
    }
    if has_lightmaps {
        for t in &mesh.lightmap_uvs {
            writeln!(out, "#lmvt {} {}", t[0], t[1])?;
        }
    }
    for n in &mesh.normals {
        writeln!(out, "vn {} {} {}", -n[0], n[1], n[2])?;
    }

    for group in &mesh.groups {
        writeln!(out, "usemtl {}", group.key.texture)?;
        if group.key.has_lightmap() {
            writeln!(out, "#$lm_name {}", percent_encode(&group.key.lightmap))?;
        }
        if group.lod_k != 0 {
            writeln!(out, "#$lod_k {}", group.lod_k)?;
        }
        for tri in &group.triangles {
            let [a, b, c] = tri.map(|i| i + 1);
            writeln!(out, "f {a}/{a}/{a} {b}/{b}/{b} {c}/{c}/{c}")?;
        }
    }
    Ok(out)
}

fn read_floats<'a, const N: usize>(
    fields: &mut impl Iterator<Item = &'a str>,
) -> Result<[f32; N]> {
    let mut out = [0.0f32; N];
    for slot in &mut out {
        *slot = fields
            .next()
            .ok_or_else(|| anyhow!("expected {N} numeric fields"))?
            .parse()?;
    }
    Ok(out)
}

fn grow_to<T: Copy>(list: &mut Vec<T>, len: usize, fill: T) {
    while list.len() + 1 < len {
        list.push(fill);
    }
}

/// Parse one face corner `v[/vt[/vn]]` into 0-based indices.
fn parse_corner(
    corner: &str,
    v_len: usize,
    t_len: usize,
    n_len: usize,
) -> Result<(usize, Option<usize>, Option<usize>)> {
    let mut parts = corner.split('/');
    let vi = parse_index(parts.next().unwrap_or(""), v_len)?
        .ok_or_else(|| anyhow!("face corner {corner:?} has no position index"))?;
    let ti = parse_index(parts.next().unwrap_or(""), t_len)?;
    let ni = parse_index(parts.next().unwrap_or(""), n_len)?;
    Ok((vi, ti, ni))
}

fn parse_index(field: &str, len: usize) -> Result<Option<usize>> {
    if field.is_empty() {
        return Ok(None);
    }
    let index: usize = field.parse()?;
    if index == 0 || index > len {
        bail!("1-based index {index} out of range ({len} entries)");
    }
    Ok(Some(index - 1))
}

/// Encode a texture name so it survives whitespace splitting: bytes
/// outside `[A-Za-z0-9._-]` become `%XX`.
pub fn percent_encode(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || b"._-".contains(&byte) {
            out.push(byte as char);
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}

pub fn percent_decode(encoded: &str) -> Result<String> {
    let mut bytes = Vec::with_capacity(encoded.len());
    let mut rest = encoded.bytes();
    while let Some(byte) = rest.next() {
        if byte != b'%' {
            bytes.push(byte);
            continue;
        }
        let hi = rest.next().ok_or_else(|| anyhow!("truncated escape"))?;
        let lo = rest.next().ok_or_else(|| anyhow!("truncated escape"))?;
        let pair = [hi, lo];
        let hex = std::str::from_utf8(&pair)?;
        bytes.push(u8::from_str_radix(hex, 16)?);
    }
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
v 1 0 0
#vc 1 0 0 1
v 0 1 0
v 0 0 1
vt 0 0
vt 1 0
vt 0 1
#lmvt 0.5 0.5
#lmvt 0.25 0.25
#lmvt 0 0
vn 0 0 1
usemtl stone
#$lm_name room%201_lm
#$lod_k -2
f 1/1/1 2/2/1 3/3/1
";

    #[test]
    fn test_import_extensions() {
        let mesh = import(SAMPLE).unwrap();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.groups.len(), 1);
        let group = &mesh.groups[0];
        assert_eq!(group.key.texture, "stone");
        assert_eq!(group.key.lightmap, "room 1_lm");
        assert_eq!(group.lod_k, -2);
        assert_eq!(group.triangles, vec![[0, 1, 2]]);
        assert_eq!(mesh.colors[0], [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(mesh.colors[1], [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(mesh.lightmap_uvs[0], [0.5, 0.5]);
    }

    #[test]
    fn test_x_axis_flips_on_import() {
        let mesh = import(SAMPLE).unwrap();
        assert_eq!(mesh.positions[0], [-1.0, 0.0, 0.0]);
        assert_eq!(mesh.normals[0], [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_round_trip() {
        let mesh = import(SAMPLE).unwrap();
        let text = export(&mesh).unwrap();
        let back = import(&text).unwrap();
        assert_eq!(back.positions, mesh.positions);
        assert_eq!(back.normals, mesh.normals);
        assert_eq!(back.colors, mesh.colors);
        assert_eq!(back.uvs, mesh.uvs);
        assert_eq!(back.lightmap_uvs, mesh.lightmap_uvs);
        assert_eq!(back.groups[0].key, mesh.groups[0].key);
        assert_eq!(back.groups[0].lod_k, mesh.groups[0].lod_k);
        assert_eq!(back.groups[0].triangles, mesh.groups[0].triangles);
    }

    #[test]
    fn test_quad_fan_triangulation() {
        let text = "\
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
usemtl m
f 1 2 3 4
";
        let mesh = import(text).unwrap();
        assert_eq!(mesh.groups[0].triangles, vec![[0, 1, 2], [0, 2, 3]]);
    }

    #[test]
    fn test_missing_vn_takes_face_normal() {
        let text = "\
v 0 0 0
v 1 0 0
v 0 1 0
usemtl m
f 1 2 3
";
        let mesh = import(text).unwrap();
        // positions are X-flipped on import, so the face winds toward -Z
        for n in &mesh.normals {
            assert_eq!(*n, [0.0, 0.0, -1.0]);
        }
    }

    #[test]
    fn test_zero_index_rejected() {
        let text = "v 0 0 0\nusemtl m\nf 0 1 1\n";
        assert!(import(text).is_err());
    }

    #[test]
    fn test_out_of_range_index_rejected() {
        let text = "v 0 0 0\nusemtl m\nf 1 2 1\n";
        assert!(import(text).is_err());
    }

    #[test]
    fn test_percent_coding() {
        assert_eq!(percent_encode("a b%c"), "a%20b%25c");
        assert_eq!(percent_decode("a%20b%25c").unwrap(), "a b%c");
        assert!(percent_decode("bad%2").is_err());
    }
}

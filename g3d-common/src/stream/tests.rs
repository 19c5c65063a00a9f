use super::*;
use crate::error::CodecError;
use crate::mesh::Mesh;
use crate::strip::stripify;

const POS_TOL: f32 = 1.0 / 256.0;
const UV_TOL: f32 = 1.0 / 128.0;

fn test_mesh(positions: Vec<[f32; 3]>, uvs: Vec<[f32; 2]>) -> Mesh {
    let n = positions.len();
    Mesh {
        positions,
        normals: vec![[0.0, 0.0, 1.0]; n],
        colors: vec![[1.0, 1.0, 1.0, 1.0]; n],
        uvs,
        lightmap_uvs: vec![[0.0; 2]; n],
        groups: Vec::new(),
    }
}

fn quad_mesh() -> (Mesh, Vec<[u32; 3]>) {
    let mesh = test_mesh(
        vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ],
        vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
    );
    (mesh, vec![[0, 1, 2], [0, 2, 3]])
}

fn zigzag(tris: usize) -> (Mesh, Vec<[u32; 3]>) {
    let verts = tris + 2;
    let mut positions = Vec::with_capacity(verts);
    let mut uvs = Vec::with_capacity(verts);
    for i in 0..verts {
        let x = (i / 2) as f32;
        let y = (i % 2) as f32;
        positions.push([x, y, 0.0]);
        uvs.push([x * 0.25, y * 0.25]);
    }
    let mut triangles = Vec::with_capacity(tris);
    for i in 0..tris as u32 {
        if i % 2 == 0 {
            triangles.push([i, i + 1, i + 2]);
        } else {
            triangles.push([i + 1, i, i + 2]);
        }
    }
    (test_mesh(positions, uvs), triangles)
}

/// Quantized oriented triangle key: positions rounded to the storage grid,
/// rotated so the lexicographically smallest vertex comes first. Cyclic
/// rotation preserves winding, so equal keys mean equal oriented faces.
fn oriented_key(p: [[f32; 3]; 3]) -> [[i32; 3]; 3] {
    let q: Vec<[i32; 3]> = p
        .iter()
        .map(|v| [
            crate::math::quantize(v[0], POSITION_SCALE),
            crate::math::quantize(v[1], POSITION_SCALE),
            crate::math::quantize(v[2], POSITION_SCALE),
        ])
        .collect();
    let start = (0..3).min_by_key(|&i| q[i]).unwrap();
    [q[start], q[(start + 1) % 3], q[(start + 2) % 3]]
}

fn face_keys(positions: &[[f32; 3]], triangles: &[[u32; 3]]) -> Vec<[[i32; 3]; 3]> {
    let mut keys: Vec<_> = triangles
        .iter()
        .map(|t| {
            oriented_key([
                positions[t[0] as usize],
                positions[t[1] as usize],
                positions[t[2] as usize],
            ])
        })
        .collect();
    keys.sort();
    keys
}

fn round_trip(mesh: &Mesh, triangles: &[[u32; 3]], max_len: usize) -> DecodedGroup {
    let strips = stripify(mesh, triangles, max_len);
    let bytes = encode(mesh, &strips, false);
    assert_eq!(bytes.len() % 16, 0, "stream must be quadword padded");
    decode(&bytes).unwrap()
}

#[test]
fn test_quad_round_trip_preserves_faces_and_winding() {
    let (mesh, triangles) = quad_mesh();
    let decoded = round_trip(&mesh, &triangles, 30);
    assert_eq!(decoded.triangles.len(), 2);
    assert_eq!(
        face_keys(&decoded.positions, &decoded.triangles),
        face_keys(&mesh.positions, &triangles),
    );
}

#[test]
fn test_quad_attributes_within_tolerance() {
    let (mesh, triangles) = quad_mesh();
    let decoded = round_trip(&mesh, &triangles, 30);
    // the quad strips into a single 4-vertex run, so decoded vertices map
    // onto source vertices by position
    assert_eq!(decoded.positions.len(), 4);
    for (i, dp) in decoded.positions.iter().enumerate() {
        let src = mesh
            .positions
            .iter()
            .position(|sp| {
                sp.iter().zip(dp).all(|(a, b)| (a - b).abs() <= POS_TOL)
            })
            .unwrap_or_else(|| panic!("decoded vertex {i} matches no source vertex"));
        for (a, b) in mesh.uvs[src].iter().zip(&decoded.uvs[i]) {
            assert!((a - b).abs() <= UV_TOL);
        }
        assert_eq!(decoded.colors[i], [1.0, 1.0, 1.0, 1.0]);
        let n = decoded.normals[i];
        assert!((n[2] - 1.0).abs() <= 1.0 / 15.0 && n[0].abs() <= 1.0 / 15.0);
    }
    assert!(decoded.lightmap_uvs.is_none());
}

#[test]
fn test_forced_split_round_trip() {
    // 20 triangles with a limit of 10 forces continuation strips; every
    // face must come back with its original winding
    let (mesh, triangles) = zigzag(20);
    let decoded = round_trip(&mesh, &triangles, 10);
    assert_eq!(decoded.triangles.len(), 20);
    assert_eq!(
        face_keys(&decoded.positions, &decoded.triangles),
        face_keys(&mesh.positions, &triangles),
    );
}

#[test]
fn test_continuation_winding_follows_terminator_type() {
    // a continuation strip's winding comes from the StripNEnd terminator
    // of its predecessor, not from its own header flip byte
    let (mesh, triangles) = zigzag(20);
    let strips = stripify(&mesh, &triangles, 10);
    assert!(
        strips.iter().any(|s| s.continuation),
        "split must produce a continuation strip"
    );
    let bytes = encode(&mesh, &strips, false);
    let expected = decode(&bytes).unwrap();

    // geometry headers are the only blocks carrying the constant word;
    // the flip byte sits two bytes before it
    let word = GEOMETRY_UNKNOWN_WORD.to_le_bytes();
    let headers: Vec<usize> = bytes
        .windows(4)
        .enumerate()
        .filter(|(_, w)| *w == word)
        .map(|(at, _)| at)
        .collect();
    assert!(headers.len() >= 2, "expected at least two strips");

    let mut tampered = bytes.clone();
    tampered[headers[1] - 2] ^= 1;
    let decoded = decode(&tampered).unwrap();
    assert_eq!(
        face_keys(&decoded.positions, &decoded.triangles),
        face_keys(&expected.positions, &expected.triangles),
    );
}

#[test]
fn test_large_fan_round_trip() {
    let hub = [0.0f32, 0.0, 0.0];
    let mut positions = vec![hub];
    let mut uvs = vec![[0.5f32, 0.5]];
    let rim = 40usize;
    for i in 0..rim {
        let a = i as f32 * 0.15;
        positions.push([a.cos(), a.sin(), 0.0]);
        uvs.push([a.cos() * 0.4 + 0.5, a.sin() * 0.4 + 0.5]);
    }
    let triangles: Vec<[u32; 3]> = (0..rim as u32 - 1)
        .map(|i| [0, i + 1, i + 2])
        .collect();
    let mesh = test_mesh(positions, uvs);
    let decoded = round_trip(&mesh, &triangles, 30);
    assert_eq!(decoded.triangles.len(), triangles.len());
    assert_eq!(
        face_keys(&decoded.positions, &decoded.triangles),
        face_keys(&mesh.positions, &triangles),
    );
}

#[test]
fn test_lightmap_quad_storage() {
    let (mut mesh, triangles) = quad_mesh();
    mesh.lightmap_uvs = vec![[0.1, 0.2], [0.3, 0.2], [0.3, 0.4], [0.1, 0.4]];
    let strips = stripify(&mesh, &triangles, 30);
    let bytes = encode(&mesh, &strips, true);
    let decoded = decode(&bytes).unwrap();
    let lm = decoded.lightmap_uvs.expect("lightmap channel present");
    assert_eq!(lm.len(), decoded.positions.len());
    for v in &lm {
        assert!(v.iter().all(|c| (0.1 - 1e-3..=0.4 + 1e-3).contains(c)));
    }
}

#[test]
fn test_truncated_stream_is_error() {
    let (mesh, triangles) = quad_mesh();
    let strips = stripify(&mesh, &triangles, 30);
    let bytes = encode(&mesh, &strips, false);
    // cut inside the geometry header payload
    let err = decode(&bytes[..9]).unwrap_err();
    assert!(err.is_truncation(), "expected truncation, got {err}");
}

#[test]
fn test_corrupt_header_constant_is_error() {
    let (mesh, triangles) = quad_mesh();
    let strips = stripify(&mesh, &triangles, 30);
    let mut bytes = encode(&mesh, &strips, false);
    // geometry header payload word lives at offset 8 of the stream
    bytes[8] ^= 0xFF;
    assert!(matches!(
        decode(&bytes).unwrap_err(),
        CodecError::FormatValidation(_)
    ));
}

#[test]
fn test_attribute_block_outside_strip_is_error() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&[DataType::Position as u8, 0, 4, StorageType::S16 as u8]);
    bytes.extend_from_slice(&[0u8; 24]);
    assert!(matches!(
        decode(&bytes).unwrap_err(),
        CodecError::FormatValidation(_)
    ));
}

#[test]
fn test_empty_stream_decodes_empty() {
    let decoded = decode(&[]).unwrap();
    assert!(decoded.triangles.is_empty());
    assert!(decoded.positions.is_empty());
}

#[test]
fn test_storage_width_tracks_magnitude() {
    assert_eq!(StorageType::for_magnitude(100), StorageType::S8);
    assert_eq!(StorageType::for_magnitude(129), StorageType::S16);
    assert_eq!(StorageType::for_magnitude(40_000), StorageType::S32);
}

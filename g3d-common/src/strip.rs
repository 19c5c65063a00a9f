//! Triangle strip generation.
//!
//! Converts a material group's triangle soup into linked strips bounded by
//! the target platform's maximum strip length. Growth is greedy: extend
//! from the strip's trailing edge while an unused adjacent triangle
//! continues the winding, then link the closed run to the next seed with
//! repeated-vertex bridge triangles instead of starting a fresh strip,
//! until the length cap forces one.
//!
//! A strip records a parallel draw-flag sequence: position `i` draws the
//! triangle `(i-2, i-1, i)` unless flagged, and the first two positions are
//! never drawable.

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::mesh::Mesh;

/// Number of bridge vertices inserted ahead of a linked seed run.
const BRIDGE_LEN: usize = 2;

/// One generated triangle strip.
#[derive(Debug, Clone, Default)]
pub struct Strip {
    /// Ordered vertex references into the mesh attribute arrays.
    pub indices: Vec<u32>,
    /// Parallel flags; `draw[i]` means triangle `(i-2, i-1, i)` is drawn.
    /// `draw[0]` and `draw[1]` are always false.
    pub draw: Vec<bool>,
    /// Base winding of the triangle at position 2.
    pub flip_start: bool,
    /// True when this strip continues the parity chain of the strip
    /// force-split immediately before it.
    pub continuation: bool,
    /// Largest absolute position component referenced by the strip.
    pub max_position: f32,
    /// Largest absolute diffuse-UV component referenced by the strip.
    pub max_uv: f32,
}

impl Strip {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Positions (≥ 2) whose triangle is suppressed.
    pub fn degenerate_indices(&self) -> Vec<usize> {
        self.draw
            .iter()
            .enumerate()
            .skip(2)
            .filter_map(|(i, &d)| (!d).then_some(i))
            .collect()
    }

    /// Number of drawn triangles.
    pub fn triangle_count(&self) -> usize {
        self.draw.iter().filter(|&&d| d).count()
    }

    /// Winding flip for the triangle ending at position `i`.
    #[inline]
    pub fn flipped_at(&self, i: usize) -> bool {
        ((i - 2) % 2 == 1) ^ self.flip_start
    }

    /// Expand back to an indexed triangle list, winding applied.
    pub fn triangles(&self) -> Vec<[u32; 3]> {
        let mut out = Vec::with_capacity(self.triangle_count());
        for i in 2..self.indices.len() {
            if !self.draw[i] {
                continue;
            }
            let (a, b, c) = (self.indices[i - 2], self.indices[i - 1], self.indices[i]);
            if self.flipped_at(i) {
                out.push([b, a, c]);
            } else {
                out.push([a, b, c]);
            }
        }
        out
    }

    fn push(&mut self, index: u32, drawn: bool) {
        self.indices.push(index);
        self.draw.push(drawn);
    }

    fn finalize(&mut self, mesh: &Mesh) {
        let mut max_pos = 0.0f32;
        let mut max_uv = 0.0f32;
        for &idx in &self.indices {
            let p = mesh.positions[idx as usize];
            max_pos = max_pos.max(p[0].abs()).max(p[1].abs()).max(p[2].abs());
            let uv = mesh.uvs[idx as usize];
            max_uv = max_uv.max(uv[0].abs()).max(uv[1].abs());
        }
        self.max_position = max_pos;
        self.max_uv = max_uv;
    }
}

type Adjacency = HashMap<(u32, u32), SmallVec<[usize; 2]>>;

/// Generate strips for one material group's triangles.
///
/// `max_len` is the platform strip limit (`TargetPlatform::max_strip_len`).
/// An empty triangle list yields no strips.
pub fn stripify(mesh: &Mesh, triangles: &[[u32; 3]], max_len: usize) -> Vec<Strip> {
    debug_assert!(max_len >= 3);
    if triangles.is_empty() {
        return Vec::new();
    }

    // undirected edge -> triangles sharing it
    let mut adjacency: Adjacency = HashMap::new();
    for (t, tri) in triangles.iter().enumerate() {
        for e in 0..3 {
            let key = edge_key(tri[e], tri[(e + 1) % 3]);
            adjacency.entry(key).or_default().push(t);
        }
    }

    let mut used = vec![false; triangles.len()];
    let mut remaining = triangles.len();
    let mut strips: Vec<Strip> = Vec::new();
    let mut current = Strip::default();
    let mut next_seed = 0usize;

    while remaining > 0 || !current.is_empty() {
        if current.is_empty() {
            while used[next_seed] {
                next_seed += 1;
            }
            let rot = seed_rotation(triangles, &adjacency, &used, triangles[next_seed]);
            used[next_seed] = true;
            remaining -= 1;
            current.push(rot[0], false);
            current.push(rot[1], false);
            current.push(rot[2], true);
            continue;
        }

        if remaining == 0 {
            close(&mut current, mesh, &mut strips);
            continue;
        }

        // force a split at the platform limit; the follow-up strip repeats
        // the trailing edge and carries the winding parity onward
        if current.len() + 1 > max_len {
            let split = split_continuation(&current);
            close(&mut current, mesh, &mut strips);
            current = split;
            continue;
        }

        let len = current.len();
        let y = current.indices[len - 2];
        let z = current.indices[len - 1];
        let flipped = current.flipped_at(len);

        if let Some((t, w)) = find_extension(triangles, &adjacency, &used, y, z, flipped) {
            used[t] = true;
            remaining -= 1;
            current.push(w, true);
            continue;
        }

        // no winding-preserving continuation across the trailing edge:
        // link to the next seed run if the bridge still fits
        while used[next_seed] {
            next_seed += 1;
        }
        if len + BRIDGE_LEN + 3 <= max_len {
            let tri = triangles[next_seed];
            used[next_seed] = true;
            remaining -= 1;
            append_bridged(&mut current, triangles, &adjacency, &used, z, tri);
        } else {
            close(&mut current, mesh, &mut strips);
        }
    }

    strips
}

fn close(current: &mut Strip, mesh: &Mesh, strips: &mut Vec<Strip>) {
    let mut done = std::mem::take(current);
    // a continuation stub that never attached a triangle is dropped
    if done.triangle_count() > 0 {
        done.finalize(mesh);
        strips.push(done);
    }
}

#[inline]
fn edge_key(a: u32, b: u32) -> (u32, u32) {
    if a < b { (a, b) } else { (b, a) }
}

/// True when `tri` equals `(a, b, c)` up to cyclic rotation.
fn cyclic_eq(tri: [u32; 3], a: u32, b: u32, c: u32) -> bool {
    tri == [a, b, c] || tri == [b, c, a] || tri == [c, a, b]
}

/// Find an unused triangle extending the trailing edge `(y, z)` without a
/// winding flip.
///
/// `flipped` is the parity at the position the new vertex would occupy; the
/// drawn order there is `(y, z, w)` on even parity and `(z, y, w)` on odd,
/// and the candidate's authored order must match it.
fn find_extension(
    triangles: &[[u32; 3]],
    adjacency: &Adjacency,
    used: &[bool],
    y: u32,
    z: u32,
    flipped: bool,
) -> Option<(usize, u32)> {
    for &t in adjacency.get(&edge_key(y, z))? {
        if used[t] {
            continue;
        }
        let tri = triangles[t];
        let Some(w) = third_vertex(tri, y, z) else {
            continue;
        };
        let ok = if flipped {
            cyclic_eq(tri, z, y, w)
        } else {
            cyclic_eq(tri, y, z, w)
        };
        if ok {
            return Some((t, w));
        }
    }
    None
}

fn third_vertex(tri: [u32; 3], y: u32, z: u32) -> Option<u32> {
    tri.iter().copied().find(|&v| v != y && v != z)
}

/// Pick the cyclic rotation of a fresh seed whose trailing edge can extend.
///
/// Rotations preserve the authored winding, so any of the three is valid;
/// preferring one with a live continuation avoids an immediate bridge. The
/// triangle lands at positions 0..2, so the first extension sits at parity
/// 1 (flipped).
fn seed_rotation(
    triangles: &[[u32; 3]],
    adjacency: &Adjacency,
    used: &[bool],
    tri: [u32; 3],
) -> [u32; 3] {
    let [p, q, r] = tri;
    let rotations = [[p, q, r], [q, r, p], [r, p, q]];
    for rot in rotations {
        if find_extension(triangles, adjacency, used, rot[1], rot[2], true).is_some() {
            return rot;
        }
    }
    rotations[0]
}

/// Start the continuation strip produced by a forced split: the trailing
/// edge is repeated so the surface chain keeps going, and the base winding
/// is chosen so parity carries over exactly.
fn split_continuation(prev: &Strip) -> Strip {
    let len = prev.len();
    let mut next = Strip {
        // winding the previous strip would have used at its next position
        flip_start: prev.flipped_at(len),
        continuation: true,
        ..Default::default()
    };
    next.push(prev.indices[len - 2], false);
    next.push(prev.indices[len - 1], false);
    next
}

/// Link a closed run to a new seed triangle with repeated-vertex bridge
/// triangles: `..., z` + `z, a` + `a, b, c`. Every bridge position is
/// flagged don't-draw; the seed is oriented so its first drawn triangle
/// lands on the right parity and, when possible, so the strip can keep
/// growing past it.
fn append_bridged(
    current: &mut Strip,
    triangles: &[[u32; 3]],
    adjacency: &Adjacency,
    used: &[bool],
    z: u32,
    tri: [u32; 3],
) {
    let base = current.len();
    // positions base..base+3 complete degenerate triangles, base+4 draws,
    // and the next extension after that sits on the opposite parity
    let flipped_c = current.flipped_at(base + 4);
    let [p, q, r] = tri;
    let rotations = [[p, q, r], [q, r, p], [r, p, q]];
    let mut choice = orient_seed(rotations[0], flipped_c);
    for rot in rotations {
        let (a, b, c) = orient_seed(rot, flipped_c);
        if find_extension(triangles, adjacency, used, b, c, !flipped_c).is_some() {
            choice = (a, b, c);
            break;
        }
    }
    let (a, b, c) = choice;
    current.push(z, false);
    current.push(a, false);
    current.push(a, false);
    current.push(b, false);
    current.push(c, true);
}

/// Orientation of a seed rotation whose drawn order matches the required
/// parity: drawn is `(a, b, c)` on even parity and `(b, a, c)` on odd.
fn orient_seed(rot: [u32; 3], flipped: bool) -> (u32, u32, u32) {
    let [p, q, r] = rot;
    if flipped { (q, p, r) } else { (p, q, r) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{GeometryGroup, MaterialKey};

    fn grid_mesh(tris: Vec<[u32; 3]>, vert_count: usize) -> Mesh {
        Mesh {
            positions: (0..vert_count)
                .map(|i| [i as f32, (i / 4) as f32, 0.0])
                .collect(),
            normals: vec![[0.0, 0.0, 1.0]; vert_count],
            colors: vec![[1.0; 4]; vert_count],
            uvs: vec![[0.25, 0.75]; vert_count],
            lightmap_uvs: vec![[0.0, 0.0]; vert_count],
            groups: vec![GeometryGroup {
                key: MaterialKey::new("t", ""),
                lod_k: 0,
                triangles: tris,
            }],
        }
    }

    fn sorted_tris(mut tris: Vec<[u32; 3]>) -> Vec<[u32; 3]> {
        // canonicalize rotation so connectivity compares ignore start vertex
        for tri in &mut tris {
            while tri[0] != *tri.iter().min().unwrap() {
                tri.rotate_left(1);
            }
        }
        tris.sort();
        tris
    }

    #[test]
    fn test_quad_single_strip_no_degenerates() {
        let mesh = grid_mesh(vec![[0, 1, 2], [0, 2, 3]], 4);
        let strips = stripify(&mesh, &mesh.groups[0].triangles, 30);
        assert_eq!(strips.len(), 1);
        let strip = &strips[0];
        assert_eq!(strip.len(), 4);
        assert!(strip.degenerate_indices().is_empty());
        assert_eq!(strip.triangle_count(), 2);
        assert_eq!(
            sorted_tris(strip.triangles()),
            sorted_tris(vec![[0, 1, 2], [0, 2, 3]])
        );
    }

    #[test]
    fn test_first_two_positions_not_drawable() {
        let mesh = grid_mesh(vec![[0, 1, 2], [0, 2, 3]], 4);
        for strip in stripify(&mesh, &mesh.groups[0].triangles, 30) {
            assert!(!strip.draw[0]);
            assert!(!strip.draw[1]);
        }
    }

    #[test]
    fn test_empty_group_yields_no_strips() {
        let mesh = grid_mesh(vec![[0, 1, 2]], 3);
        assert!(stripify(&mesh, &[], 30).is_empty());
    }

    #[test]
    fn test_strip_length_bound() {
        // fan around vertex 0; consecutive triangles share a spoke edge
        let tris: Vec<[u32; 3]> = (1..40).map(|i| [0, i, i + 1]).collect();
        let mesh = grid_mesh(tris.clone(), 41);
        let strips = stripify(&mesh, &tris, 30);
        for strip in &strips {
            assert!(strip.len() <= 30, "strip len {}", strip.len());
        }
        let total: usize = strips.iter().map(|s| s.triangle_count()).sum();
        assert_eq!(total, tris.len());
    }

    #[test]
    fn test_disconnected_runs_are_bridged() {
        // two islands; the bridge keeps them in one strip under the cap
        let tris = vec![[0, 1, 2], [3, 4, 5]];
        let mesh = grid_mesh(tris.clone(), 6);
        let strips = stripify(&mesh, &tris, 30);
        assert_eq!(strips.len(), 1);
        let strip = &strips[0];
        assert_eq!(strip.triangle_count(), 2);
        assert!(!strip.degenerate_indices().is_empty());
        assert_eq!(sorted_tris(strip.triangles()), sorted_tris(tris));
    }

    #[test]
    fn test_connectivity_preserved_on_grid() {
        // 3x3 vertex grid, 8 triangles, consistent winding
        let mut tris = Vec::new();
        for y in 0..2u32 {
            for x in 0..2u32 {
                let i = y * 3 + x;
                tris.push([i, i + 1, i + 4]);
                tris.push([i, i + 4, i + 3]);
            }
        }
        let mesh = grid_mesh(tris.clone(), 9);
        let strips = stripify(&mesh, &tris, 189);
        let mut recovered = Vec::new();
        for strip in &strips {
            recovered.extend(strip.triangles());
        }
        assert_eq!(sorted_tris(recovered), sorted_tris(tris));
    }

    #[test]
    fn test_winding_never_reflected() {
        let mut tris = Vec::new();
        for y in 0..2u32 {
            for x in 0..2u32 {
                let i = y * 3 + x;
                tris.push([i, i + 1, i + 4]);
                tris.push([i, i + 4, i + 3]);
            }
        }
        let mesh = grid_mesh(tris.clone(), 9);
        for strip in stripify(&mesh, &tris, 30) {
            for t in strip.triangles() {
                assert!(
                    tris.iter().any(|&[a, b, c]| cyclic_eq(t, a, b, c)),
                    "reflected triangle {t:?}"
                );
            }
        }
    }

    #[test]
    fn test_split_continuation_parity() {
        // a long zigzag ribbon forces a split; the continuation strip must
        // keep the same drawn winding for the triangles after the cut
        let mut tris = Vec::new();
        for i in 0..20u32 {
            if i % 2 == 0 {
                tris.push([i, i + 1, i + 2]);
            } else {
                tris.push([i + 1, i, i + 2]);
            }
        }
        let mesh = grid_mesh(tris.clone(), 22);
        let strips = stripify(&mesh, &tris, 10);
        assert!(strips.len() > 1);
        assert!(strips[1..].iter().any(|s| s.continuation));
        let mut recovered = Vec::new();
        for strip in &strips {
            recovered.extend(strip.triangles());
        }
        assert_eq!(sorted_tris(recovered), sorted_tris(tris));
    }

    #[test]
    fn test_max_magnitudes_tracked() {
        let mesh = grid_mesh(vec![[0, 1, 2]], 3);
        let strips = stripify(&mesh, &mesh.groups[0].triangles, 30);
        assert_eq!(strips[0].max_position, 2.0);
        assert_eq!(strips[0].max_uv, 0.75);
    }
}

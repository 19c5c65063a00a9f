//! In-memory mesh representation.
//!
//! This is the working form between source-asset import and stream
//! compilation: flat vertex attribute arrays shared by all geometry groups,
//! with triangles grouped by (diffuse texture, lightmap texture) key.

use crate::error::{CodecError, Result};

/// Grouping key for triangles: which diffuse texture and which lightmap
/// they are drawn with. Empty lightmap name means no lightmap channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct MaterialKey {
    pub texture: String,
    pub lightmap: String,
}

impl MaterialKey {
    pub fn new(texture: impl Into<String>, lightmap: impl Into<String>) -> Self {
        Self {
            texture: texture.into(),
            lightmap: lightmap.into(),
        }
    }

    pub fn has_lightmap(&self) -> bool {
        !self.lightmap.is_empty()
    }
}

/// One material's worth of triangles plus its LOD coefficient.
#[derive(Debug, Clone, Default)]
pub struct GeometryGroup {
    pub key: MaterialKey,
    /// Signed scale hint controlling level-of-detail culling distance.
    pub lod_k: i16,
    /// Triangles as triples of indices into the shared vertex arrays.
    pub triangles: Vec<[u32; 3]>,
}

/// Editable mesh with shared vertex arrays and material-grouped triangles.
///
/// All attribute arrays are the same length; `colors` defaults to opaque
/// white and `lightmap_uvs` to zero when the source asset lacks them.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub colors: Vec<[f32; 4]>,
    pub uvs: Vec<[f32; 2]>,
    pub lightmap_uvs: Vec<[f32; 2]>,
    pub groups: Vec<GeometryGroup>,
}

impl Mesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Drop groups with no triangles. Runs before strip generation; a key
    /// with an empty triangle list must not produce an (empty) strip set.
    pub fn prune_empty_groups(&mut self) {
        self.groups.retain(|g| !g.triangles.is_empty());
    }

    /// Check the structural invariants: parallel attribute arrays and
    /// in-range triangle indices.
    pub fn validate(&self) -> Result<()> {
        let n = self.positions.len();
        for (name, len) in [
            ("normals", self.normals.len()),
            ("colors", self.colors.len()),
            ("uvs", self.uvs.len()),
            ("lightmap_uvs", self.lightmap_uvs.len()),
        ] {
            if len != n {
                return Err(CodecError::InvalidSource(format!(
                    "attribute array {name} has {len} entries, expected {n}"
                )));
            }
        }
        for group in &self.groups {
            for tri in &group.triangles {
                for &idx in tri {
                    if idx as usize >= n {
                        return Err(CodecError::InvalidSource(format!(
                            "triangle index {idx} out of range in group '{}' ({n} vertices)",
                            group.key.texture
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

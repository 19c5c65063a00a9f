//! Compiled model payload.
//!
//! A model is a texture-name table plus one compiled GPU stream per
//! geometry group. The payload stores no container offsets; each group's
//! stream length is recoverable from its quadword count.
//!
//! # Payload layout (little-endian)
//! ```text
//! 0x00: name_count u16, group_count u16
//! 0x04: name_count NUL-terminated texture names, then 4-byte alignment
//! per group:
//!       quadword_count u16 (stream bytes / 16)
//!       lod_k i16
//!       texture_index u16 (0xFFFF = none)
//!       lightmap_index u16 (0xFFFF = none)
//!       quadword_count * 16 stream bytes
//! ```

use tracing::warn;

use crate::error::{CodecError, Result};
use crate::io::{ByteReader, ByteWriter};
use crate::mesh::{GeometryGroup, MaterialKey, Mesh};
use crate::stream;
use crate::strip::stripify;
use crate::target::TargetPlatform;

/// Index value marking a group with no texture or lightmap reference.
pub const NO_TEXTURE: u16 = 0xFFFF;

/// One geometry group of a compiled model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelGroup {
    /// Index into [`Model::texture_names`], `None` for untextured.
    pub texture: Option<usize>,
    /// Index into [`Model::texture_names`], `None` when unlit.
    pub lightmap: Option<usize>,
    pub lod_k: i16,
    /// Compiled GPU stream, always a whole number of quadwords.
    pub stream: Vec<u8>,
}

/// A compiled model: shared texture-name table plus per-group streams.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    pub texture_names: Vec<String>,
    pub groups: Vec<ModelGroup>,
}

impl Model {
    /// Compile an editable mesh into per-group GPU streams for `platform`.
    ///
    /// Groups with no triangles are dropped. An empty texture name in a
    /// material key compiles to the placeholder index with a warning so
    /// the rest of the batch proceeds.
    pub fn compile(mesh: &Mesh, platform: TargetPlatform) -> Result<Model> {
        Self::compile_with_strip_len(mesh, platform, platform.max_strip_len())
    }

    /// [`Model::compile`] with an explicit strip length cap. A cap of 3
    /// disables strip optimization, one triangle per strip.
    pub fn compile_with_strip_len(
        mesh: &Mesh,
        platform: TargetPlatform,
        max_len: usize,
    ) -> Result<Model> {
        mesh.validate()?;
        let mut model = Model::default();
        let max_len = max_len.min(platform.max_strip_len());
        for group in mesh.groups.iter().filter(|g| !g.triangles.is_empty()) {
            let texture = model.intern_name(&group.key.texture);
            if texture.is_none() {
                warn!("geometry group has no texture name, writing placeholder");
            }
            let lightmap = model.intern_name(&group.key.lightmap);
            let strips = stripify(mesh, &group.triangles, max_len);
            let bytes = stream::encode(mesh, &strips, group.key.has_lightmap());
            model.groups.push(ModelGroup {
                texture,
                lightmap,
                lod_k: group.lod_k,
                stream: bytes,
            });
        }
        Ok(model)
    }

    /// Recover an editable mesh. Group vertices are emitted in strip
    /// order, so shared vertices come back duplicated across groups.
    pub fn decompile(&self) -> Result<Mesh> {
        let mut mesh = Mesh::default();
        for group in &self.groups {
            let decoded = stream::decode(&group.stream)?;
            let base = mesh.vertex_count() as u32;
            let count = decoded.positions.len();
            mesh.positions.extend(decoded.positions);
            mesh.normals.extend(decoded.normals);
            mesh.colors.extend(decoded.colors);
            mesh.uvs.extend(decoded.uvs);
            match decoded.lightmap_uvs {
                Some(uvs) => mesh.lightmap_uvs.extend(uvs),
                None => mesh.lightmap_uvs.extend(vec![[0.0, 0.0]; count]),
            }
            mesh.groups.push(GeometryGroup {
                key: MaterialKey::new(self.name_at(group.texture), self.name_at(group.lightmap)),
                lod_k: group.lod_k,
                triangles: decoded
                    .triangles
                    .iter()
                    .map(|t| t.map(|i| i + base))
                    .collect(),
            });
        }
        mesh.validate()?;
        Ok(mesh)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.write_u16(self.texture_names.len() as u16);
        w.write_u16(self.groups.len() as u16);
        for name in &self.texture_names {
            w.write_cstring(name);
        }
        w.align4();
        for group in &self.groups {
            debug_assert_eq!(group.stream.len() % 16, 0);
            w.write_u16((group.stream.len() / 16) as u16);
            w.write_i16(group.lod_k);
            w.write_u16(index_word(group.texture));
            w.write_u16(index_word(group.lightmap));
            w.write_bytes(&group.stream);
        }
        w.into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Model> {
        let mut r = ByteReader::new(bytes);
        let name_count = r.read_u16()? as usize;
        let group_count = r.read_u16()? as usize;
        let mut texture_names = Vec::with_capacity(name_count);
        for _ in 0..name_count {
            texture_names.push(r.read_cstring()?);
        }
        r.align4()?;
        let mut groups = Vec::with_capacity(group_count);
        for _ in 0..group_count {
            let quadwords = r.read_u16()? as usize;
            let lod_k = r.read_i16()?;
            let texture = read_index(&mut r, name_count, "texture")?;
            let lightmap = read_index(&mut r, name_count, "lightmap")?;
            let stream = r.read_bytes(quadwords * 16)?.to_vec();
            groups.push(ModelGroup {
                texture,
                lightmap,
                lod_k,
                stream,
            });
        }
        Ok(Model {
            texture_names,
            groups,
        })
    }

    /// Index of `name` in the name table, interning it when new. Empty
    /// names stay out of the table.
    fn intern_name(&mut self, name: &str) -> Option<usize> {
        if name.is_empty() {
            return None;
        }
        match self.texture_names.iter().position(|n| n == name) {
            Some(i) => Some(i),
            None => {
                self.texture_names.push(name.to_owned());
                Some(self.texture_names.len() - 1)
            }
        }
    }

    fn name_at(&self, index: Option<usize>) -> &str {
        index.map_or("", |i| self.texture_names[i].as_str())
    }
}

fn index_word(index: Option<usize>) -> u16 {
    index.map_or(NO_TEXTURE, |i| i as u16)
}

fn read_index(r: &mut ByteReader<'_>, name_count: usize, what: &str) -> Result<Option<usize>> {
    match r.read_u16()? {
        NO_TEXTURE => Ok(None),
        i if (i as usize) < name_count => Ok(Some(i as usize)),
        i => Err(CodecError::format(format!(
            "{what} index {i} outside name table of {name_count}"
        ))),
    }
}

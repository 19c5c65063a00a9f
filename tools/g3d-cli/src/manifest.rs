//! g3d.toml manifest parsing.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use g3d_common::TargetPlatform;
use g3d_common::envelope::CacheKind;

/// Top-level manifest structure.
#[derive(Debug, Deserialize)]
pub struct Manifest {
    pub project: ProjectSection,
    #[serde(default)]
    pub models: Vec<ModelEntry>,
    #[serde(default)]
    pub textures: Vec<TextureEntry>,
    #[serde(default)]
    pub animations: Vec<AnimEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectSection {
    pub name: String,
    /// Target platform name (ps2, xbox, gamecube, dreamcast, arcade).
    pub target: String,
    #[serde(default = "default_out_dir")]
    pub out_dir: String,
}

#[derive(Debug, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    pub path: String,
    /// Strip optimization; off emits one strip per triangle.
    #[serde(default = "default_true")]
    pub optimize: bool,
}

#[derive(Debug, Deserialize)]
pub struct TextureEntry {
    pub id: String,
    pub path: String,
    /// Pixel format name; defaults to rgba8888 retargeted per platform.
    #[serde(default)]
    pub format: Option<String>,
    /// Mip levels to generate; 0 means the full chain.
    #[serde(default)]
    pub mips: usize,
    #[serde(default)]
    pub clamp_u: bool,
    #[serde(default)]
    pub clamp_v: bool,
    /// Platform address reorder (GS swizzle / PVR twiddle / Xbox swizzle).
    #[serde(default = "default_true")]
    pub reorder: bool,
    /// Dreamcast vector quantization.
    #[serde(default)]
    pub vq: bool,
    #[serde(default)]
    pub lod_bias: i8,
}

#[derive(Debug, Deserialize)]
pub struct AnimEntry {
    pub id: String,
    pub path: String,
}

fn default_out_dir() -> String {
    "build".into()
}

fn default_true() -> bool {
    true
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Manifest> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest {}", path.display()))?;
        let manifest: Manifest = toml::from_str(&content)
            .with_context(|| format!("failed to parse manifest {}", path.display()))?;
        Ok(manifest)
    }

    pub fn target(&self) -> Result<TargetPlatform> {
        Ok(self.project.target.parse()?)
    }

    /// Output path for one asset id, under the manifest's out_dir.
    pub fn output_path(&self, project_dir: &Path, id: &str, kind: CacheKind) -> PathBuf {
        project_dir
            .join(&self.project.out_dir)
            .join(format!("{id}.{}", cache_extension(kind)))
    }

    pub fn asset_count(&self) -> usize {
        self.models.len() + self.textures.len() + self.animations.len()
    }
}

/// Cache file extension per asset class.
pub fn cache_extension(kind: CacheKind) -> &'static str {
    match kind {
        CacheKind::Model => "g3m",
        CacheKind::Texture => "g3t",
        CacheKind::Animation => "g3a",
    }
}

//! Decompile command: cache file back to an editable asset.

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};

use g3d_common::anim::{AnimationTree, split_visibility_nodes};
use g3d_common::envelope::{CacheEnvelope, CacheKind};
use g3d_common::texture::mip_dimensions;
use g3d_common::texture::yiq::YiqTable;
use g3d_common::{Model, Texture};

use crate::anim_doc::AnimDoc;
use crate::{obj, texture_io};

#[derive(Args)]
pub struct DecompileArgs {
    /// Cache file (.g3m, .g3t, .g3a)
    pub input: PathBuf,

    /// Output path (defaults to the input with an editable extension)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Texture mip level to extract
    #[arg(long, default_value_t = 0)]
    pub level: usize,
}

pub fn execute(args: DecompileArgs) -> Result<()> {
    let bytes = std::fs::read(&args.input)
        .with_context(|| format!("failed to read cache {}", args.input.display()))?;
    let envelope = CacheEnvelope::from_bytes(&bytes)?;
    let payload = &bytes[CacheEnvelope::SIZE..];

    let output = match envelope.kind {
        CacheKind::Model => {
            let output = output_or_default(&args.input, args.output, "obj");
            let mesh = Model::from_bytes(payload)?.decompile()?;
            std::fs::write(&output, obj::export(&mesh)?)
                .with_context(|| format!("failed to write {}", output.display()))?;
            output
        }
        CacheKind::Texture => {
            let output = output_or_default(&args.input, args.output, "png");
            let texture = Texture::from_bytes(payload)?;
            let rgba = texture.decompile(args.level, &YiqTable::default_table())?;
            let (w, h) = mip_dimensions(texture.width, texture.height, args.level);
            texture_io::save(&output, &rgba, w, h)?;
            output
        }
        CacheKind::Animation => {
            let output = output_or_default(&args.input, args.output, "toml");
            let mut tree = AnimationTree::from_bytes(payload)?;
            for sequence in 0..tree.sequences.len() {
                split_visibility_nodes(&mut tree, sequence)?;
            }
            let doc = AnimDoc::decompile(&tree)?;
            std::fs::write(&output, doc.to_toml()?)
                .with_context(|| format!("failed to write {}", output.display()))?;
            output
        }
    };
    println!("Decompiled {} -> {}", args.input.display(), output.display());
    Ok(())
}

fn output_or_default(input: &Path, output: Option<PathBuf>, ext: &str) -> PathBuf {
    output.unwrap_or_else(|| input.with_extension(ext))
}

//! Compile commands: single-asset drivers plus the manifest batch build.
//!
//! Every compile is gated on the cache envelope: when the output file
//! already holds an envelope whose digest matches the current source
//! bytes, the asset is skipped. Batch builds fan out over a worker pool;
//! a failed asset is logged and the rest of the batch continues.

use anyhow::{Context, Result, bail};
use clap::Args;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use g3d_common::envelope::{CacheEnvelope, CacheKind};
use g3d_common::texture::format::PixelFormat;
use g3d_common::{Model, TargetPlatform, Texture, TextureOptions};

use crate::anim_doc::AnimDoc;
use crate::manifest::{Manifest, TextureEntry, cache_extension};
use crate::{obj, texture_io};

pub const MODEL_VERSION: u16 = 1;
pub const TEXTURE_VERSION: u16 = 1;
pub const ANIM_VERSION: u16 = 1;

#[derive(Args)]
pub struct BuildArgs {
    /// Path to g3d.toml manifest file
    #[arg(short, long, default_value = "g3d.toml")]
    pub manifest: PathBuf,

    /// Recompile even when the cache digest matches
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct CheckArgs {
    /// Path to g3d.toml manifest file
    #[arg(short, long, default_value = "g3d.toml")]
    pub manifest: PathBuf,
}

#[derive(Args)]
pub struct MeshArgs {
    /// Source .obj file
    pub input: PathBuf,

    /// Output cache path (defaults to the input with a .g3m extension)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Target platform (ps2, xbox, gamecube, dreamcast, arcade)
    #[arg(short, long)]
    pub target: TargetPlatform,

    /// Emit one strip per triangle instead of optimizing
    #[arg(long)]
    pub no_optimize: bool,

    /// Recompile even when the cache digest matches
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct TextureArgs {
    /// Source image (png, tga, bmp)
    pub input: PathBuf,

    /// Output cache path (defaults to the input with a .g3t extension)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Target platform (ps2, xbox, gamecube, dreamcast, arcade)
    #[arg(short, long)]
    pub target: TargetPlatform,

    /// Pixel format name (defaults to rgba8888, retargeted per platform)
    #[arg(short, long)]
    pub format: Option<String>,

    /// Mip levels to generate (0 = full chain)
    #[arg(long, default_value_t = 0)]
    pub mips: usize,

    #[arg(long)]
    pub clamp_u: bool,

    #[arg(long)]
    pub clamp_v: bool,

    /// Skip the platform address reorder (store linear rows)
    #[arg(long)]
    pub no_reorder: bool,

    /// Dreamcast vector quantization
    #[arg(long)]
    pub vq: bool,

    #[arg(long, default_value_t = 0)]
    pub lod_bias: i8,

    /// Recompile even when the cache digest matches
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct AnimArgs {
    /// Source animation document (.anim.toml)
    pub input: PathBuf,

    /// Output cache path (defaults to the input with a .g3a extension)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Recompile even when the cache digest matches
    #[arg(long)]
    pub force: bool,
}

/// Whether a compile ran or the cache was already current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Compiled,
    UpToDate,
}

pub fn mesh(args: MeshArgs) -> Result<()> {
    let output = output_or_default(&args.input, args.output, CacheKind::Model);
    let max_len = strip_len(args.target, !args.no_optimize);
    let outcome = compile_model(&args.input, &output, args.target, max_len, args.force)?;
    report_single(&output, outcome);
    Ok(())
}

pub fn texture(args: TextureArgs) -> Result<()> {
    let output = output_or_default(&args.input, args.output.clone(), CacheKind::Texture);
    let options = TextureOptions {
        format: parse_format(args.format.as_deref())?,
        mip_count: mip_count(args.mips),
        clamp_u: args.clamp_u,
        clamp_v: args.clamp_v,
        reorder: !args.no_reorder,
        vq: args.vq,
        lod_bias: args.lod_bias,
        ..TextureOptions::default()
    };
    let outcome = compile_texture(&args.input, &output, args.target, &options, args.force)?;
    report_single(&output, outcome);
    Ok(())
}

pub fn anim(args: AnimArgs) -> Result<()> {
    let output = output_or_default(&args.input, args.output, CacheKind::Animation);
    let outcome = compile_anim(&args.input, &output, args.force)?;
    report_single(&output, outcome);
    Ok(())
}

/// One batch job, closed over everything it needs so the pool shares no
/// mutable state.
enum Job {
    Model {
        source: PathBuf,
        output: PathBuf,
        max_strip_len: usize,
    },
    Texture {
        source: PathBuf,
        output: PathBuf,
        options: Box<TextureOptions>,
    },
    Anim {
        source: PathBuf,
        output: PathBuf,
    },
}

pub fn build(args: BuildArgs) -> Result<()> {
    let manifest = Manifest::load(&args.manifest)?;
    let target = manifest.target()?;
    let project_dir = args
        .manifest
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();

    println!(
        "Building {} ({} assets, target {target})",
        manifest.project.name,
        manifest.asset_count()
    );

    let mut jobs: Vec<(String, Job)> = Vec::new();
    for entry in &manifest.models {
        jobs.push((
            entry.id.clone(),
            Job::Model {
                source: project_dir.join(&entry.path),
                output: manifest.output_path(&project_dir, &entry.id, CacheKind::Model),
                max_strip_len: strip_len(target, entry.optimize),
            },
        ));
    }
    for entry in &manifest.textures {
        jobs.push((
            entry.id.clone(),
            Job::Texture {
                source: project_dir.join(&entry.path),
                output: manifest.output_path(&project_dir, &entry.id, CacheKind::Texture),
                options: Box::new(texture_options(entry)?),
            },
        ));
    }
    for entry in &manifest.animations {
        jobs.push((
            entry.id.clone(),
            Job::Anim {
                source: project_dir.join(&entry.path),
                output: manifest.output_path(&project_dir, &entry.id, CacheKind::Animation),
            },
        ));
    }

    let results: Vec<(String, Result<Outcome>)> = jobs
        .par_iter()
        .map(|(id, job)| {
            let outcome = match job {
                Job::Model {
                    source,
                    output,
                    max_strip_len,
                } => compile_model(source, output, target, *max_strip_len, args.force),
                Job::Texture {
                    source,
                    output,
                    options,
                } => compile_texture(source, output, target, options, args.force),
                Job::Anim { source, output } => compile_anim(source, output, args.force),
            };
            (id.clone(), outcome)
        })
        .collect();

    let mut compiled = 0usize;
    let mut skipped = 0usize;
    let mut failed = 0usize;
    for (id, result) in &results {
        match result {
            Ok(Outcome::Compiled) => compiled += 1,
            Ok(Outcome::UpToDate) => skipped += 1,
            Err(e) => {
                failed += 1;
                error!("asset {id} failed: {e:#}");
            }
        }
    }
    println!("  {compiled} compiled, {skipped} up to date, {failed} failed");
    if failed > 0 {
        bail!("{failed} of {} assets failed", results.len());
    }
    Ok(())
}

pub fn check(args: CheckArgs) -> Result<()> {
    let manifest = Manifest::load(&args.manifest)?;
    manifest.target()?;
    let project_dir = args.manifest.parent().unwrap_or_else(|| Path::new("."));

    let mut stale = 0usize;
    let mut report = |id: &str, source: &str, kind: CacheKind| -> Result<()> {
        let source = project_dir.join(source);
        let output = manifest.output_path(project_dir, id, kind);
        let bytes = std::fs::read(&source)
            .with_context(|| format!("failed to read source {}", source.display()))?;
        if is_up_to_date(&output, &bytes) {
            println!("  {id}: up to date");
        } else {
            println!("  {id}: needs compile");
            stale += 1;
        }
        Ok(())
    };
    for entry in &manifest.models {
        report(&entry.id, &entry.path, CacheKind::Model)?;
    }
    for entry in &manifest.textures {
        report(&entry.id, &entry.path, CacheKind::Texture)?;
    }
    for entry in &manifest.animations {
        report(&entry.id, &entry.path, CacheKind::Animation)?;
    }
    println!("  {stale} stale");
    Ok(())
}

pub fn compile_model(
    source: &Path,
    output: &Path,
    target: TargetPlatform,
    max_strip_len: usize,
    force: bool,
) -> Result<Outcome> {
    let bytes = std::fs::read(source)
        .with_context(|| format!("failed to read source {}", source.display()))?;
    if !force && is_up_to_date(output, &bytes) {
        return Ok(Outcome::UpToDate);
    }
    let text = String::from_utf8(bytes.clone()).context("source is not UTF-8 text")?;
    let mesh = obj::import(&text)?;
    let model = Model::compile_with_strip_len(&mesh, target, max_strip_len)?;
    write_cache(output, CacheKind::Model, MODEL_VERSION, &bytes, &model.to_bytes())?;
    Ok(Outcome::Compiled)
}

pub fn compile_texture(
    source: &Path,
    output: &Path,
    target: TargetPlatform,
    options: &TextureOptions,
    force: bool,
) -> Result<Outcome> {
    let bytes = std::fs::read(source)
        .with_context(|| format!("failed to read source {}", source.display()))?;
    if !force && is_up_to_date(output, &bytes) {
        return Ok(Outcome::UpToDate);
    }
    let envelope = CacheEnvelope::for_source(CacheKind::Texture, TEXTURE_VERSION, &bytes);
    let image = texture_io::load(source)?;
    let hash = short_hash(&envelope);
    let texture = Texture::compile(
        &image.pixels,
        image.width,
        image.height,
        target,
        options,
        hash,
    )?;
    write_envelope_and_payload(output, envelope, &texture.to_bytes())?;
    Ok(Outcome::Compiled)
}

pub fn compile_anim(source: &Path, output: &Path, force: bool) -> Result<Outcome> {
    let bytes = std::fs::read(source)
        .with_context(|| format!("failed to read source {}", source.display()))?;
    if !force && is_up_to_date(output, &bytes) {
        return Ok(Outcome::UpToDate);
    }
    let text = String::from_utf8(bytes.clone()).context("source is not UTF-8 text")?;
    let tree = AnimDoc::parse(&text)?.compile()?;
    write_cache(
        output,
        CacheKind::Animation,
        ANIM_VERSION,
        &bytes,
        &tree.to_bytes(),
    )?;
    Ok(Outcome::Compiled)
}

/// True when `output` already carries an envelope digest matching the
/// current source bytes. Any unreadable or malformed cache counts as
/// stale rather than an error.
pub fn is_up_to_date(output: &Path, source: &[u8]) -> bool {
    let Ok(existing) = std::fs::read(output) else {
        return false;
    };
    match CacheEnvelope::from_bytes(&existing) {
        Ok(envelope) => envelope.matches_source(source),
        Err(_) => false,
    }
}

fn write_cache(
    output: &Path,
    kind: CacheKind,
    version: u16,
    source: &[u8],
    payload: &[u8],
) -> Result<()> {
    let envelope = CacheEnvelope::for_source(kind, version, source);
    write_envelope_and_payload(output, envelope, payload)
}

fn write_envelope_and_payload(
    output: &Path,
    envelope: CacheEnvelope,
    payload: &[u8],
) -> Result<()> {
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let mut bytes = envelope.to_bytes().to_vec();
    bytes.extend_from_slice(payload);
    std::fs::write(output, &bytes)
        .with_context(|| format!("failed to write {}", output.display()))?;
    info!("wrote {} ({} bytes)", output.display(), bytes.len());
    Ok(())
}

/// Texture-header hash: the first four digest bytes, little-endian.
fn short_hash(envelope: &CacheEnvelope) -> u32 {
    u32::from_le_bytes([
        envelope.digest[0],
        envelope.digest[1],
        envelope.digest[2],
        envelope.digest[3],
    ])
}

fn texture_options(entry: &TextureEntry) -> Result<TextureOptions> {
    Ok(TextureOptions {
        format: parse_format(entry.format.as_deref())?,
        mip_count: mip_count(entry.mips),
        clamp_u: entry.clamp_u,
        clamp_v: entry.clamp_v,
        reorder: entry.reorder,
        vq: entry.vq,
        lod_bias: entry.lod_bias,
        ..TextureOptions::default()
    })
}

fn parse_format(name: Option<&str>) -> Result<PixelFormat> {
    match name {
        None => Ok(PixelFormat::Rgba8888),
        Some(name) => Ok(name.parse()?),
    }
}

fn mip_count(declared: usize) -> usize {
    if declared == 0 { usize::MAX } else { declared }
}

fn strip_len(target: TargetPlatform, optimize: bool) -> usize {
    if optimize { target.max_strip_len() } else { 3 }
}

fn output_or_default(input: &Path, output: Option<PathBuf>, kind: CacheKind) -> PathBuf {
    output.unwrap_or_else(|| input.with_extension(cache_extension(kind)))
}

fn report_single(output: &Path, outcome: Outcome) {
    match outcome {
        Outcome::Compiled => println!("Compiled {}", output.display()),
        Outcome::UpToDate => println!("{} is up to date", output.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD_OBJ: &str = "\
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
usemtl stone
f 1/1/1 2/2/1 3/3/1
f 1/1/1 3/3/1 4/4/1
";

    #[test]
    fn test_model_compile_writes_valid_cache() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("quad.obj");
        let output = dir.path().join("quad.g3m");
        std::fs::write(&source, QUAD_OBJ).unwrap();

        let outcome =
            compile_model(&source, &output, TargetPlatform::Ps2, 30, false).unwrap();
        assert_eq!(outcome, Outcome::Compiled);

        let bytes = std::fs::read(&output).unwrap();
        let envelope = CacheEnvelope::from_bytes(&bytes).unwrap();
        assert_eq!(envelope.kind, CacheKind::Model);
        assert!(envelope.matches_source(QUAD_OBJ.as_bytes()));
        let model = Model::from_bytes(&bytes[CacheEnvelope::SIZE..]).unwrap();
        assert_eq!(model.texture_names, vec!["stone"]);
    }

    #[test]
    fn test_unchanged_source_skips_recompile() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("quad.obj");
        let output = dir.path().join("quad.g3m");
        std::fs::write(&source, QUAD_OBJ).unwrap();

        let first = compile_model(&source, &output, TargetPlatform::Ps2, 30, false).unwrap();
        assert_eq!(first, Outcome::Compiled);
        let second =
            compile_model(&source, &output, TargetPlatform::Ps2, 30, false).unwrap();
        assert_eq!(second, Outcome::UpToDate);

        // single-byte source change invalidates the cache
        std::fs::write(&source, QUAD_OBJ.replace("stone", "stonf")).unwrap();
        let third = compile_model(&source, &output, TargetPlatform::Ps2, 30, false).unwrap();
        assert_eq!(third, Outcome::Compiled);
    }

    #[test]
    fn test_force_recompiles_current_cache() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("quad.obj");
        let output = dir.path().join("quad.g3m");
        std::fs::write(&source, QUAD_OBJ).unwrap();

        compile_model(&source, &output, TargetPlatform::Ps2, 30, false).unwrap();
        let forced = compile_model(&source, &output, TargetPlatform::Ps2, 30, true).unwrap();
        assert_eq!(forced, Outcome::Compiled);
    }

    #[test]
    fn test_texture_compile_writes_valid_cache() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("wall.png");
        let output = dir.path().join("wall.g3t");
        let pixels = vec![128u8; 8 * 8 * 4];
        texture_io::save(&source, &pixels, 8, 8).unwrap();

        let options = TextureOptions::default();
        let outcome =
            compile_texture(&source, &output, TargetPlatform::Ps2, &options, false).unwrap();
        assert_eq!(outcome, Outcome::Compiled);

        let bytes = std::fs::read(&output).unwrap();
        let envelope = CacheEnvelope::from_bytes(&bytes).unwrap();
        assert_eq!(envelope.kind, CacheKind::Texture);
        let texture = Texture::from_bytes(&bytes[CacheEnvelope::SIZE..]).unwrap();
        assert_eq!(texture.width, 8);
        assert_eq!(texture.source_hash, short_hash(&envelope));
    }

    #[test]
    fn test_mip_count_mapping() {
        assert_eq!(mip_count(0), usize::MAX);
        assert_eq!(mip_count(3), 3);
    }
}

//! g3d CLI - asset compiler for G3D engine cache formats
//!
//! # Commands
//!
//! - `g3d build` - Compile every asset in a g3d.toml manifest
//! - `g3d check` - Report which manifest assets are up to date
//! - `g3d mesh` - Compile a single mesh (.obj) to a model cache
//! - `g3d texture` - Compile a single image to a texture cache
//! - `g3d anim` - Compile a single animation document to a keyframe cache
//! - `g3d decompile` - Turn a cache file back into an editable asset
//!
//! # Usage
//!
//! In a project directory:
//! ```bash
//! # Compile everything the manifest declares
//! g3d build --manifest g3d.toml
//!
//! # One-off compiles
//! g3d mesh level.obj -o level.g3m --target ps2
//! g3d texture wall.png -o wall.g3t --target dreamcast --format dc_pal8
//!
//! # Back to editable form
//! g3d decompile level.g3m -o level.obj
//! ```

mod anim_doc;
mod compile;
mod decompile;
mod manifest;
mod obj;
mod texture_io;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// g3d CLI - asset compiler for G3D engine cache formats
#[derive(Parser)]
#[command(name = "g3d")]
#[command(about = "Asset compiler for G3D engine cache formats")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile every asset declared in a manifest
    Build(compile::BuildArgs),

    /// Report which manifest assets are up to date
    Check(compile::CheckArgs),

    /// Compile a single mesh (.obj) to a model cache
    Mesh(compile::MeshArgs),

    /// Compile a single image to a texture cache
    Texture(compile::TextureArgs),

    /// Compile a single animation document to a keyframe cache
    Anim(compile::AnimArgs),

    /// Turn a cache file back into an editable asset
    Decompile(decompile::DecompileArgs),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build(args) => compile::build(args),
        Commands::Check(args) => compile::check(args),
        Commands::Mesh(args) => compile::mesh(args),
        Commands::Texture(args) => compile::texture(args),
        Commands::Anim(args) => compile::anim(args),
        Commands::Decompile(args) => decompile::execute(args),
    }
}

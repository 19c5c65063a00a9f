//! Shared asset codecs for the g3dkit pipeline
//!
//! This crate holds everything the compile and decompile tools share:
//! the editable mesh/texture/animation models, the binary payload codecs
//! for each asset class, and the cache envelope that gates recompilation.
//!
//! # Modules
//!
//! - [`mesh`] / [`strip`] / [`stream`] - editable mesh, triangle strip
//!   generation, and the tagged GPU vertex stream codec
//! - [`texture`] - pixel formats, palettization, platform reorders, VQ,
//!   and the GPU texture-buffer block allocator
//! - [`anim`] - animation tree payloads, shared-table compression, and
//!   visibility-window synthesis
//! - [`model`] - the compiled model payload tying groups to streams
//! - [`envelope`] - the checksum-carrying cache header

pub mod anim;
pub mod envelope;
pub mod error;
pub mod io;
pub mod math;
pub mod mesh;
pub mod model;
pub mod strip;
pub mod stream;
pub mod target;
pub mod texture;

pub use envelope::{CacheEnvelope, CacheKind};
pub use error::{CodecError, Result};
pub use mesh::{GeometryGroup, MaterialKey, Mesh};
pub use model::Model;
pub use strip::{Strip, stripify};
pub use target::TargetPlatform;
pub use texture::{Texture, TextureFlags, TextureOptions};

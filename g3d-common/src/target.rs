//! Target platform identifiers and per-platform limits.

use std::fmt;
use std::str::FromStr;

use crate::error::CodecError;

/// Platforms the compiler can target.
///
/// Each shipped build of the engine consumes the same cache envelope but a
/// platform-specific payload; every codec takes one of these to select
/// limits, pixel-format support, and bit-rearrangement rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetPlatform {
    /// GPU-register-addressed console, strip-limited display lists.
    Ps2,
    /// GPU-register-addressed console, long strips.
    Xbox,
    /// Console variant, big-endian tiled textures.
    GameCube,
    /// Console variant, twiddled / vector-quantized textures.
    Dreamcast,
    /// Fixed-function arcade/embedded board, lookup-table color.
    Arcade,
}

impl TargetPlatform {
    /// Maximum vertex count of a single triangle strip on this platform.
    pub const fn max_strip_len(self) -> usize {
        match self {
            TargetPlatform::Ps2 => 30,
            _ => 189,
        }
    }

    /// Short tag used in manifests and diagnostics.
    pub const fn tag(self) -> &'static str {
        match self {
            TargetPlatform::Ps2 => "ps2",
            TargetPlatform::Xbox => "xbox",
            TargetPlatform::GameCube => "gc",
            TargetPlatform::Dreamcast => "dc",
            TargetPlatform::Arcade => "arcade",
        }
    }
}

impl fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for TargetPlatform {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ps2" => Ok(TargetPlatform::Ps2),
            "xbox" => Ok(TargetPlatform::Xbox),
            "gc" | "gamecube" => Ok(TargetPlatform::GameCube),
            "dc" | "dreamcast" => Ok(TargetPlatform::Dreamcast),
            "arcade" => Ok(TargetPlatform::Arcade),
            other => Err(CodecError::format(format!("unknown platform: {other}"))),
        }
    }
}

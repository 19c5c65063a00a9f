//! Pixel format catalogue and platform retargeting.
//!
//! Every format the five runtime targets accept is named here, together with
//! its bit depth, palette size, and owning platform. The retarget table maps
//! a requested format onto the closest format a given platform can actually
//! load; when alpha precision and color depth cannot both survive, alpha
//! precision wins.

use crate::error::{CodecError, Result};
use crate::target::TargetPlatform;

/// Named pixel format across all supported targets.
///
/// `Rgba8888`/`Rgb888` are the platform-neutral authoring formats; the rest
/// are native storage formats grouped by platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PixelFormat {
    // platform-neutral
    Rgba8888 = 0x00,
    Rgb888 = 0x01,

    // PS2-class GS storage modes
    Psmct32 = 0x10,
    Psmct24 = 0x11,
    Psmct16 = 0x12,
    Psmct16s = 0x13,
    Psmt8 = 0x14,
    Psmt8h = 0x15,
    Psmt4 = 0x16,
    Psmt4hl = 0x17,
    Psmt4hh = 0x18,

    // Xbox
    XboxA8R8G8B8 = 0x20,
    XboxX8R8G8B8 = 0x21,
    XboxR5G6B5 = 0x22,
    XboxA1R5G5B5 = 0x23,
    XboxA4R4G4B4 = 0x24,
    XboxP8 = 0x25,

    // GameCube
    GcRgba8 = 0x30,
    GcRgb565 = 0x31,
    GcRgb5A3 = 0x32,
    GcC8 = 0x33,
    GcC4 = 0x34,
    GcI8 = 0x35,
    GcI4 = 0x36,
    GcIa4 = 0x37,
    GcIa8 = 0x38,

    // Dreamcast
    DcArgb1555 = 0x40,
    DcRgb565 = 0x41,
    DcArgb4444 = 0x42,
    DcPal8 = 0x43,
    DcPal4 = 0x44,

    // fixed-function arcade board
    ArcadeYiq = 0x50,
}

impl PixelFormat {
    pub const ALL: [PixelFormat; 32] = [
        PixelFormat::Rgba8888,
        PixelFormat::Rgb888,
        PixelFormat::Psmct32,
        PixelFormat::Psmct24,
        PixelFormat::Psmct16,
        PixelFormat::Psmct16s,
        PixelFormat::Psmt8,
        PixelFormat::Psmt8h,
        PixelFormat::Psmt4,
        PixelFormat::Psmt4hl,
        PixelFormat::Psmt4hh,
        PixelFormat::XboxA8R8G8B8,
        PixelFormat::XboxX8R8G8B8,
        PixelFormat::XboxR5G6B5,
        PixelFormat::XboxA1R5G5B5,
        PixelFormat::XboxA4R4G4B4,
        PixelFormat::XboxP8,
        PixelFormat::GcRgba8,
        PixelFormat::GcRgb565,
        PixelFormat::GcRgb5A3,
        PixelFormat::GcC8,
        PixelFormat::GcC4,
        PixelFormat::GcI8,
        PixelFormat::GcI4,
        PixelFormat::GcIa4,
        PixelFormat::GcIa8,
        PixelFormat::DcArgb1555,
        PixelFormat::DcRgb565,
        PixelFormat::DcArgb4444,
        PixelFormat::DcPal8,
        PixelFormat::DcPal4,
        PixelFormat::ArcadeYiq,
    ];

    pub fn from_u8(v: u8) -> Result<Self> {
        PixelFormat::ALL
            .into_iter()
            .find(|f| *f as u8 == v)
            .ok_or_else(|| CodecError::format(format!("unknown pixel format id 0x{v:02X}")))
    }

    /// Storage bits per pixel. PSMCT24 pixels occupy a full 32-bit word.
    pub fn bits_per_pixel(self) -> usize {
        use PixelFormat::*;
        match self {
            Rgba8888 | Psmct32 | Psmct24 | XboxA8R8G8B8 | XboxX8R8G8B8 | GcRgba8 => 32,
            Rgb888 => 24,
            Psmct16 | Psmct16s | XboxR5G6B5 | XboxA1R5G5B5 | XboxA4R4G4B4 | GcRgb565
            | GcRgb5A3 | GcIa8 | DcArgb1555 | DcRgb565 | DcArgb4444 => 16,
            Psmt8 | Psmt8h | XboxP8 | GcC8 | GcI8 | GcIa4 | DcPal8 | ArcadeYiq => 8,
            Psmt4 | Psmt4hl | Psmt4hh | GcC4 | GcI4 | DcPal4 => 4,
        }
    }

    /// Palette entry count for indexed formats, 0 otherwise.
    pub fn palette_len(self) -> usize {
        use PixelFormat::*;
        match self {
            Psmt8 | Psmt8h | XboxP8 | GcC8 | DcPal8 => 256,
            Psmt4 | Psmt4hl | Psmt4hh | GcC4 | DcPal4 => 16,
            _ => 0,
        }
    }

    pub fn is_indexed(self) -> bool {
        self.palette_len() > 0
    }

    pub fn has_alpha(self) -> bool {
        use PixelFormat::*;
        !matches!(
            self,
            Rgb888 | Psmct24 | XboxX8R8G8B8 | XboxR5G6B5 | GcRgb565 | GcI8 | GcI4 | DcRgb565
                | ArcadeYiq
        )
    }

    /// Platform a native format belongs to; `None` for the neutral formats.
    pub fn platform(self) -> Option<TargetPlatform> {
        use PixelFormat::*;
        match self {
            Rgba8888 | Rgb888 => None,
            Psmct32 | Psmct24 | Psmct16 | Psmct16s | Psmt8 | Psmt8h | Psmt4 | Psmt4hl
            | Psmt4hh => Some(TargetPlatform::Ps2),
            XboxA8R8G8B8 | XboxX8R8G8B8 | XboxR5G6B5 | XboxA1R5G5B5 | XboxA4R4G4B4 | XboxP8 => {
                Some(TargetPlatform::Xbox)
            }
            GcRgba8 | GcRgb565 | GcRgb5A3 | GcC8 | GcC4 | GcI8 | GcI4 | GcIa4 | GcIa8 => {
                Some(TargetPlatform::GameCube)
            }
            DcArgb1555 | DcRgb565 | DcArgb4444 | DcPal8 | DcPal4 => {
                Some(TargetPlatform::Dreamcast)
            }
            ArcadeYiq => Some(TargetPlatform::Arcade),
        }
    }

    /// Nearest format `platform` can load.
    ///
    /// A format native to the platform passes through unchanged. Otherwise
    /// the mapping keeps the indexed/direct split and, for direct color,
    /// prefers alpha fidelity over color depth.
    pub fn retarget(self, platform: TargetPlatform) -> PixelFormat {
        use PixelFormat::*;
        if self.platform() == Some(platform) {
            return self;
        }
        match platform {
            TargetPlatform::Ps2 => match (self.is_indexed(), self.palette_len()) {
                (true, 16) => Psmt4,
                (true, _) => Psmt8,
                _ => {
                    if self.bits_per_pixel() >= 24 {
                        Psmct32
                    } else if self.has_alpha() {
                        Psmct16
                    } else {
                        Psmct16s
                    }
                }
            },
            TargetPlatform::Xbox => {
                if self.is_indexed() {
                    XboxP8
                } else if self.bits_per_pixel() >= 24 {
                    XboxA8R8G8B8
                } else if self.has_alpha() {
                    XboxA4R4G4B4
                } else {
                    XboxR5G6B5
                }
            }
            TargetPlatform::GameCube => match (self.is_indexed(), self.palette_len()) {
                (true, 16) => GcC4,
                (true, _) => GcC8,
                _ => {
                    if self.bits_per_pixel() >= 24 {
                        GcRgba8
                    } else if self.has_alpha() {
                        GcRgb5A3
                    } else {
                        GcRgb565
                    }
                }
            },
            TargetPlatform::Dreamcast => match (self.is_indexed(), self.palette_len()) {
                (true, 16) => DcPal4,
                (true, _) => DcPal8,
                // 4444 keeps usable alpha; 1555 would keep color depth
                _ => {
                    if self.has_alpha() {
                        DcArgb4444
                    } else {
                        DcRgb565
                    }
                }
            },
            // the arcade board only speaks its lookup-table format
            TargetPlatform::Arcade => ArcadeYiq,
        }
    }

    pub fn name(self) -> &'static str {
        use PixelFormat::*;
        match self {
            Rgba8888 => "rgba8888",
            Rgb888 => "rgb888",
            Psmct32 => "psmct32",
            Psmct24 => "psmct24",
            Psmct16 => "psmct16",
            Psmct16s => "psmct16s",
            Psmt8 => "psmt8",
            Psmt8h => "psmt8h",
            Psmt4 => "psmt4",
            Psmt4hl => "psmt4hl",
            Psmt4hh => "psmt4hh",
            XboxA8R8G8B8 => "xbox_a8r8g8b8",
            XboxX8R8G8B8 => "xbox_x8r8g8b8",
            XboxR5G6B5 => "xbox_r5g6b5",
            XboxA1R5G5B5 => "xbox_a1r5g5b5",
            XboxA4R4G4B4 => "xbox_a4r4g4b4",
            XboxP8 => "xbox_p8",
            GcRgba8 => "gc_rgba8",
            GcRgb565 => "gc_rgb565",
            GcRgb5A3 => "gc_rgb5a3",
            GcC8 => "gc_c8",
            GcC4 => "gc_c4",
            GcI8 => "gc_i8",
            GcI4 => "gc_i4",
            GcIa4 => "gc_ia4",
            GcIa8 => "gc_ia8",
            DcArgb1555 => "dc_argb1555",
            DcRgb565 => "dc_rgb565",
            DcArgb4444 => "dc_argb4444",
            DcPal8 => "dc_pal8",
            DcPal4 => "dc_pal4",
            ArcadeYiq => "arcade_yiq",
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for PixelFormat {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        PixelFormat::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| CodecError::format(format!("unknown pixel format name {s:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_id_round_trip() {
        for f in PixelFormat::ALL {
            assert_eq!(PixelFormat::from_u8(f as u8).unwrap(), f);
            assert_eq!(f.name().parse::<PixelFormat>().unwrap(), f);
        }
    }

    #[test]
    fn test_unknown_format_rejected() {
        assert!(PixelFormat::from_u8(0xEE).is_err());
        assert!("psmt9".parse::<PixelFormat>().is_err());
    }

    #[test]
    fn test_native_format_passes_through() {
        assert_eq!(
            PixelFormat::Psmt8.retarget(TargetPlatform::Ps2),
            PixelFormat::Psmt8
        );
        assert_eq!(
            PixelFormat::GcRgb5A3.retarget(TargetPlatform::GameCube),
            PixelFormat::GcRgb5A3
        );
    }

    #[test]
    fn test_retarget_prefers_alpha_over_depth() {
        // true color with alpha onto a 16-bit-only platform keeps the
        // 4-bit-alpha format, not the deeper-color 1-bit-alpha one
        assert_eq!(
            PixelFormat::Rgba8888.retarget(TargetPlatform::Dreamcast),
            PixelFormat::DcArgb4444
        );
        assert_eq!(
            PixelFormat::Rgb888.retarget(TargetPlatform::Dreamcast),
            PixelFormat::DcRgb565
        );
    }

    #[test]
    fn test_retarget_keeps_index_width() {
        assert_eq!(
            PixelFormat::DcPal4.retarget(TargetPlatform::Ps2),
            PixelFormat::Psmt4
        );
        assert_eq!(
            PixelFormat::GcC8.retarget(TargetPlatform::Dreamcast),
            PixelFormat::DcPal8
        );
        // no 4-bit palette on this platform
        assert_eq!(
            PixelFormat::Psmt4.retarget(TargetPlatform::Xbox),
            PixelFormat::XboxP8
        );
    }

    #[test]
    fn test_arcade_always_yiq() {
        for f in PixelFormat::ALL {
            assert_eq!(f.retarget(TargetPlatform::Arcade), PixelFormat::ArcadeYiq);
        }
    }

    #[test]
    fn test_palette_metadata() {
        assert_eq!(PixelFormat::Psmt8.palette_len(), 256);
        assert_eq!(PixelFormat::Psmt4hl.palette_len(), 16);
        assert!(!PixelFormat::Psmct32.is_indexed());
        assert_eq!(PixelFormat::Psmt4.bits_per_pixel(), 4);
        assert_eq!(PixelFormat::Psmct24.bits_per_pixel(), 32);
    }
}

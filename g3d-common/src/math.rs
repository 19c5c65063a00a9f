//! Math helpers shared by the codecs.
//!
//! The 5-bit unpack tables mirror the tables the engine bakes into its
//! display-list reader. They are `const`, built once at compile time, and
//! indexed directly by the packed field value.

use glam::Vec3;

/// Unpack table for 5-bit two's-complement normal components.
///
/// Index is the raw 5-bit field; value is the component in [-1, 1].
/// `-16/15` is clamped to -1 so the table stays symmetric.
pub const NORMAL_UNPACK: [f32; 32] = build_normal_table();

/// Unpack table for 5-bit unsigned color components, mapping 0..31 to [0, 1].
pub const COLOR_UNPACK: [f32; 32] = build_color_table();

const fn build_normal_table() -> [f32; 32] {
    let mut table = [0.0f32; 32];
    let mut i = 0;
    while i < 32 {
        // sign-extend the 5-bit value
        let signed = if i < 16 { i as i32 } else { i as i32 - 32 };
        let mut v = signed as f32 / 15.0;
        if v < -1.0 {
            v = -1.0;
        }
        table[i] = v;
        i += 1;
    }
    table
}

const fn build_color_table() -> [f32; 32] {
    let mut table = [0.0f32; 32];
    let mut i = 0;
    while i < 32 {
        table[i] = i as f32 / 31.0;
        i += 1;
    }
    table
}

/// Pack a normal component in [-1, 1] into a 5-bit field.
#[inline]
pub fn pack_normal5(v: f32) -> u8 {
    let q = (v.clamp(-1.0, 1.0) * 15.0).round() as i32;
    (q & 0x1F) as u8
}

/// Pack a color component in [0, 1] into a 5-bit field.
#[inline]
pub fn pack_color5(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 31.0).round() as u8
}

/// Quantize a float with round-to-nearest into a signed 32-bit value.
///
/// All stream fixed-point writes go through this so the accumulation width
/// matches the engine's reader exactly.
#[inline]
pub fn quantize(v: f32, scale: f32) -> i32 {
    (v * scale).round() as i32
}

/// Inverse of [`quantize`].
#[inline]
pub fn dequantize(v: i32, scale: f32) -> f32 {
    v as f32 / scale
}

/// Face normal of a triangle, not normalized.
#[inline]
pub fn face_normal(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    (b - a).cross(c - a)
}

/// Unit face normal of a triangle as a plain array, zero when the
/// triangle is degenerate.
pub fn flat_normal(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> [f32; 3] {
    face_normal(Vec3::from(a), Vec3::from(b), Vec3::from(c))
        .normalize_or_zero()
        .to_array()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_table_endpoints() {
        assert_eq!(NORMAL_UNPACK[0], 0.0);
        assert_eq!(NORMAL_UNPACK[15], 1.0);
        assert_eq!(NORMAL_UNPACK[16], -1.0); // -16/15 clamped
        assert_eq!(NORMAL_UNPACK[31], -1.0 / 15.0);
    }

    #[test]
    fn test_color_table_endpoints() {
        assert_eq!(COLOR_UNPACK[0], 0.0);
        assert_eq!(COLOR_UNPACK[31], 1.0);
    }

    #[test]
    fn test_normal_pack_roundtrip() {
        for i in 0..32u8 {
            let unpacked = NORMAL_UNPACK[i as usize];
            // -16 is unreachable from packing (clamped to -15), skip it
            if i == 16 {
                continue;
            }
            assert_eq!(pack_normal5(unpacked), i);
        }
    }

    #[test]
    fn test_color_pack_roundtrip() {
        for i in 0..32u8 {
            assert_eq!(pack_color5(COLOR_UNPACK[i as usize]), i);
        }
    }

    #[test]
    fn test_quantize_rounds_to_nearest() {
        assert_eq!(quantize(1.0, 256.0), 256);
        assert_eq!(quantize(0.501 / 256.0, 256.0), 1);
        assert_eq!(quantize(-0.501 / 256.0, 256.0), -1);
        assert_eq!(quantize(0.499 / 256.0, 256.0), 0);
    }

    #[test]
    fn test_face_normal_direction() {
        let n = face_normal(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        );
        assert!(n.z > 0.0);
    }

    #[test]
    fn test_flat_normal_unit_and_degenerate() {
        let n = flat_normal([0.0; 3], [2.0, 0.0, 0.0], [0.0, 2.0, 0.0]);
        assert_eq!(n, [0.0, 0.0, 1.0]);
        // collinear points have no plane
        let z = flat_normal([0.0; 3], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]);
        assert_eq!(z, [0.0; 3]);
    }
}

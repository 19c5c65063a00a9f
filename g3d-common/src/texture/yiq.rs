//! Fixed-function YIQ lookup-table color reduction.
//!
//! The arcade board stores one byte per texel: a 4-bit luma code that
//! interpolates along a 4-entry luma curve, and two 2-bit chroma codes
//! indexing 4-entry in-phase and quadrature tables directly. The 12-entry
//! table ships with the board data; a neutral default is provided for
//! authoring.
//!
//! Texel byte: `[luma:4][i:2][q:2]` (luma in the high nibble).

/// The board's 12-entry color table: 4 luma + 4 in-phase + 4 quadrature.
#[derive(Debug, Clone, PartialEq)]
pub struct YiqTable {
    pub luma: [f32; 4],
    pub inphase: [f32; 4],
    pub quadrature: [f32; 4],
}

impl YiqTable {
    /// Neutral table spanning the representable YIQ range.
    pub fn default_table() -> YiqTable {
        YiqTable {
            luma: [0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0],
            inphase: [-0.5957, 0.0, 0.2979, 0.5957],
            quadrature: [-0.5226, -0.2613, 0.0, 0.5226],
        }
    }

    /// Table from 12 raw floats in luma, in-phase, quadrature order.
    pub fn from_entries(entries: &[f32; 12]) -> YiqTable {
        let mut t = YiqTable {
            luma: [0.0; 4],
            inphase: [0.0; 4],
            quadrature: [0.0; 4],
        };
        t.luma.copy_from_slice(&entries[0..4]);
        t.inphase.copy_from_slice(&entries[4..8]);
        t.quadrature.copy_from_slice(&entries[8..12]);
        t
    }

    /// Luma value for a 4-bit code, interpolated along the curve.
    pub fn luma_value(&self, code: u8) -> f32 {
        let t = code as f32 * 3.0 / 15.0;
        let lo = (t as usize).min(2);
        let frac = t - lo as f32;
        self.luma[lo] + (self.luma[lo + 1] - self.luma[lo]) * frac
    }
}

/// RGB (0..1) to YIQ.
fn rgb_to_yiq(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    (
        0.299 * r + 0.587 * g + 0.114 * b,
        0.596 * r - 0.274 * g - 0.322 * b,
        0.211 * r - 0.523 * g + 0.312 * b,
    )
}

/// YIQ back to RGB (0..1), unclamped.
fn yiq_to_rgb(y: f32, i: f32, q: f32) -> (f32, f32, f32) {
    (
        y + 0.956 * i + 0.621 * q,
        y - 0.272 * i - 0.647 * q,
        y - 1.106 * i + 1.703 * q,
    )
}

fn nearest4(table: &[f32; 4], v: f32) -> u8 {
    let mut best = 0u8;
    let mut best_d = f32::INFINITY;
    for (k, &e) in table.iter().enumerate() {
        let d = (e - v).abs();
        if d < best_d {
            best_d = d;
            best = k as u8;
        }
    }
    best
}

/// Quantize RGBA8 pixels to one table-indexed byte each. Alpha is
/// discarded; the board has no alpha channel.
pub fn encode_pixels(rgba: &[u8], table: &YiqTable) -> Vec<u8> {
    rgba.chunks_exact(4)
        .map(|px| {
            let (y, i, q) = rgb_to_yiq(
                px[0] as f32 / 255.0,
                px[1] as f32 / 255.0,
                px[2] as f32 / 255.0,
            );
            let mut yc = 0u8;
            let mut best = f32::INFINITY;
            for code in 0..16u8 {
                let d = (table.luma_value(code) - y).abs();
                if d < best {
                    best = d;
                    yc = code;
                }
            }
            let ic = nearest4(&table.inphase, i);
            let qc = nearest4(&table.quadrature, q);
            (yc << 4) | (ic << 2) | qc
        })
        .collect()
}

/// Expand table-indexed bytes back to RGBA8 (opaque alpha).
pub fn decode_pixels(texels: &[u8], table: &YiqTable) -> Vec<u8> {
    let mut out = Vec::with_capacity(texels.len() * 4);
    for &t in texels {
        let y = table.luma_value(t >> 4);
        let i = table.inphase[(t >> 2) as usize & 3];
        let q = table.quadrature[(t & 3) as usize];
        let (r, g, b) = yiq_to_rgb(y, i, q);
        out.push((r.clamp(0.0, 1.0) * 255.0).round() as u8);
        out.push((g.clamp(0.0, 1.0) * 255.0).round() as u8);
        out.push((b.clamp(0.0, 1.0) * 255.0).round() as u8);
        out.push(255);
    }
    out
}

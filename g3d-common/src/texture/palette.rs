//! Palette construction and pixel-to-index mapping.
//!
//! Images with no more distinct colors than the palette holds get an exact
//! palette with zero quantization error. Anything richer is clustered with
//! k-means. The whole pass is deterministic: the color census is sorted by
//! packed RGBA value, seeds are evenly spaced along it, and the iteration
//! count is capped, so identical pixel data always yields identical output.

use hashbrown::HashMap;

/// One RGBA8 palette entry.
pub type PaletteColor = [u8; 4];

/// Result of palettizing one mip chain against a single palette.
#[derive(Debug, Clone)]
pub struct Palettized {
    pub palette: Vec<PaletteColor>,
    /// One index per input pixel, in input order.
    pub indices: Vec<u8>,
    /// True when every pixel maps to its exact source color.
    pub exact: bool,
}

const KMEANS_MAX_ITERS: usize = 16;

/// Build a palette of at most `palette_len` colors for `pixels` (RGBA8,
/// 4 bytes per pixel) and map every pixel to its nearest entry.
pub fn palettize(pixels: &[u8], palette_len: usize) -> Palettized {
    debug_assert!(pixels.len() % 4 == 0);
    debug_assert!((1..=256).contains(&palette_len));

    let census = color_census(pixels);
    if census.len() <= palette_len {
        return exact_palette(pixels, &census);
    }
    kmeans_palette(pixels, &census, palette_len)
}

/// Distinct colors with their pixel counts, sorted by packed RGBA value.
fn color_census(pixels: &[u8]) -> Vec<(PaletteColor, u32)> {
    let mut counts: HashMap<u32, u32> = HashMap::new();
    for px in pixels.chunks_exact(4) {
        *counts.entry(pack(px)).or_insert(0) += 1;
    }
    let mut census: Vec<(u32, u32)> = counts.into_iter().collect();
    census.sort_unstable();
    census.into_iter().map(|(c, n)| (unpack(c), n)).collect()
}

fn exact_palette(pixels: &[u8], census: &[(PaletteColor, u32)]) -> Palettized {
    let palette: Vec<PaletteColor> = census.iter().map(|(c, _)| *c).collect();
    let lookup: HashMap<u32, u8> = palette
        .iter()
        .enumerate()
        .map(|(i, c)| (pack(c), i as u8))
        .collect();
    let indices = pixels.chunks_exact(4).map(|px| lookup[&pack(px)]).collect();
    Palettized {
        palette,
        indices,
        exact: true,
    }
}

fn kmeans_palette(
    pixels: &[u8],
    census: &[(PaletteColor, u32)],
    palette_len: usize,
) -> Palettized {
    // evenly spaced seeds along the sorted census
    let mut centers: Vec<[f32; 4]> = (0..palette_len)
        .map(|k| {
            let idx = k * (census.len() - 1) / (palette_len - 1).max(1);
            to_f32(census[idx].0)
        })
        .collect();

    let mut assignment = vec![0usize; census.len()];
    for _ in 0..KMEANS_MAX_ITERS {
        let mut moved = false;
        for (i, (color, _)) in census.iter().enumerate() {
            let best = nearest_center(&centers, to_f32(*color));
            if assignment[i] != best {
                assignment[i] = best;
                moved = true;
            }
        }
        if !moved {
            break;
        }

        // weighted centroid update; an orphaned center keeps its position
        let mut sums = vec![[0.0f64; 4]; palette_len];
        let mut weights = vec![0.0f64; palette_len];
        for (i, (color, count)) in census.iter().enumerate() {
            let k = assignment[i];
            let c = to_f32(*color);
            let w = *count as f64;
            for ch in 0..4 {
                sums[k][ch] += c[ch] as f64 * w;
            }
            weights[k] += w;
        }
        for k in 0..palette_len {
            if weights[k] > 0.0 {
                for ch in 0..4 {
                    centers[k][ch] = (sums[k][ch] / weights[k]) as f32;
                }
            }
        }
    }

    let palette: Vec<PaletteColor> = centers
        .iter()
        .map(|c| {
            [
                c[0].round().clamp(0.0, 255.0) as u8,
                c[1].round().clamp(0.0, 255.0) as u8,
                c[2].round().clamp(0.0, 255.0) as u8,
                c[3].round().clamp(0.0, 255.0) as u8,
            ]
        })
        .collect();

    let lookup: HashMap<u32, u8> = census
        .iter()
        .enumerate()
        .map(|(i, (c, _))| (pack(c), assignment[i] as u8))
        .collect();
    let indices = pixels.chunks_exact(4).map(|px| lookup[&pack(px)]).collect();
    Palettized {
        palette,
        indices,
        exact: false,
    }
}

fn nearest_center(centers: &[[f32; 4]], c: [f32; 4]) -> usize {
    let mut best = 0;
    let mut best_d = f32::INFINITY;
    for (k, center) in centers.iter().enumerate() {
        let d: f32 = center
            .iter()
            .zip(&c)
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        if d < best_d {
            best_d = d;
            best = k;
        }
    }
    best
}

/// 0..255 alpha to the 0x80-centered convention (128 = fully opaque) used
/// by PS2-class palette entries.
pub fn alpha_to_half_range(a: u8) -> u8 {
    ((a as u16 + 1) / 2) as u8
}

/// Inverse of [`alpha_to_half_range`], saturating at 255.
pub fn alpha_from_half_range(a: u8) -> u8 {
    (a as u16 * 2).min(255) as u8
}

fn pack(px: &[u8]) -> u32 {
    u32::from_le_bytes([px[0], px[1], px[2], px[3]])
}

fn unpack(c: u32) -> PaletteColor {
    c.to_le_bytes()
}

fn to_f32(c: PaletteColor) -> [f32; 4] {
    [c[0] as f32, c[1] as f32, c[2] as f32, c[3] as f32]
}

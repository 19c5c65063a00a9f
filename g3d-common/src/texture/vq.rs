//! Dreamcast vector quantization.
//!
//! VQ textures replace every 2x2 texel block with one byte indexing a
//! codebook of up to 256 block entries. Quantization runs in RGBA space
//! before 16-bit packing and follows the same deterministic clustering
//! scheme as the palettizer: distinct blocks sorted by packed value,
//! evenly spaced seeds, capped iterations.

use hashbrown::HashMap;

/// One codebook entry: a 2x2 RGBA8 block, texels in column order
/// (0,0) (0,1) (1,0) (1,1).
pub type VqEntry = [[u8; 4]; 4];

#[derive(Debug, Clone)]
pub struct VqEncoded {
    pub codebook: Vec<VqEntry>,
    /// One codebook index per 2x2 block, block-row-major.
    pub indices: Vec<u8>,
}

const KMEANS_MAX_ITERS: usize = 12;

/// Quantize an RGBA8 image to `codebook_len` 2x2 block entries. Width and
/// height must be even (all legal texture dimensions are).
pub fn quantize(rgba: &[u8], width: usize, height: usize, codebook_len: usize) -> VqEncoded {
    debug_assert!(width % 2 == 0 && height % 2 == 0);
    debug_assert!((1..=256).contains(&codebook_len));
    let blocks = gather_blocks(rgba, width, height);

    // census of distinct blocks, sorted for determinism
    let mut counts: HashMap<VqEntry, u32> = HashMap::new();
    for b in &blocks {
        *counts.entry(*b).or_insert(0) += 1;
    }
    let mut census: Vec<(VqEntry, u32)> = counts.into_iter().collect();
    census.sort_unstable_by_key(|(b, _)| *b);

    if census.len() <= codebook_len {
        let codebook: Vec<VqEntry> = census.iter().map(|(b, _)| *b).collect();
        let lookup: HashMap<VqEntry, u8> = codebook
            .iter()
            .enumerate()
            .map(|(i, b)| (*b, i as u8))
            .collect();
        let indices = blocks.iter().map(|b| lookup[b]).collect();
        return VqEncoded { codebook, indices };
    }

    let mut centers: Vec<[f32; 16]> = (0..codebook_len)
        .map(|k| {
            let idx = k * (census.len() - 1) / (codebook_len - 1).max(1);
            to_f32(census[idx].0)
        })
        .collect();

    let mut assignment = vec![0usize; census.len()];
    for _ in 0..KMEANS_MAX_ITERS {
        let mut moved = false;
        for (i, (block, _)) in census.iter().enumerate() {
            let best = nearest(&centers, to_f32(*block));
            if assignment[i] != best {
                assignment[i] = best;
                moved = true;
            }
        }
        if !moved {
            break;
        }
        let mut sums = vec![[0.0f64; 16]; codebook_len];
        let mut weights = vec![0.0f64; codebook_len];
        for (i, (block, count)) in census.iter().enumerate() {
            let k = assignment[i];
            let v = to_f32(*block);
            for ch in 0..16 {
                sums[k][ch] += v[ch] as f64 * *count as f64;
            }
            weights[k] += *count as f64;
        }
        for k in 0..codebook_len {
            if weights[k] > 0.0 {
                for ch in 0..16 {
                    centers[k][ch] = (sums[k][ch] / weights[k]) as f32;
                }
            }
        }
    }

    let codebook: Vec<VqEntry> = centers.iter().map(from_f32).collect();
    let lookup: HashMap<VqEntry, u8> = census
        .iter()
        .enumerate()
        .map(|(i, (b, _))| (*b, assignment[i] as u8))
        .collect();
    let indices = blocks.iter().map(|b| lookup[b]).collect();
    VqEncoded { codebook, indices }
}

/// Map an image's 2x2 blocks onto an existing codebook (used for mip
/// levels past the first, which share mip 0's codebook).
pub fn map_to_codebook(rgba: &[u8], width: usize, height: usize, codebook: &[VqEntry]) -> Vec<u8> {
    let centers: Vec<[f32; 16]> = codebook.iter().map(|b| to_f32(*b)).collect();
    gather_blocks(rgba, width, height)
        .iter()
        .map(|b| nearest(&centers, to_f32(*b)) as u8)
        .collect()
}

/// Expand VQ data back to an RGBA8 image.
pub fn reconstruct(encoded: &VqEncoded, width: usize, height: usize) -> Vec<u8> {
    let mut out = vec![0u8; width * height * 4];
    let blocks_x = width / 2;
    for (bi, &idx) in encoded.indices.iter().enumerate() {
        let bx = bi % blocks_x;
        let by = bi / blocks_x;
        let entry = &encoded.codebook[idx as usize];
        for (t, px) in entry.iter().enumerate() {
            let x = bx * 2 + t / 2;
            let y = by * 2 + t % 2;
            out[(y * width + x) * 4..][..4].copy_from_slice(px);
        }
    }
    out
}

fn gather_blocks(rgba: &[u8], width: usize, height: usize) -> Vec<VqEntry> {
    let mut blocks = Vec::with_capacity(width * height / 4);
    for by in 0..height / 2 {
        for bx in 0..width / 2 {
            let mut entry: VqEntry = [[0; 4]; 4];
            for (t, px) in entry.iter_mut().enumerate() {
                let x = bx * 2 + t / 2;
                let y = by * 2 + t % 2;
                px.copy_from_slice(&rgba[(y * width + x) * 4..][..4]);
            }
            blocks.push(entry);
        }
    }
    blocks
}

fn nearest(centers: &[[f32; 16]], v: [f32; 16]) -> usize {
    let mut best = 0;
    let mut best_d = f32::INFINITY;
    for (k, c) in centers.iter().enumerate() {
        let d: f32 = c.iter().zip(&v).map(|(a, b)| (a - b) * (a - b)).sum();
        if d < best_d {
            best_d = d;
            best = k;
        }
    }
    best
}

fn to_f32(b: VqEntry) -> [f32; 16] {
    let mut out = [0.0f32; 16];
    for (i, px) in b.iter().enumerate() {
        for ch in 0..4 {
            out[i * 4 + ch] = px[ch] as f32;
        }
    }
    out
}

fn from_f32(v: &[f32; 16]) -> VqEntry {
    let mut out: VqEntry = [[0; 4]; 4];
    for (i, px) in out.iter_mut().enumerate() {
        for ch in 0..4 {
            px[ch] = v[i * 4 + ch].round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_image(colors: &[[u8; 4]], width: usize, height: usize) -> Vec<u8> {
        (0..width * height)
            .flat_map(|i| colors[(i / 2 + i / (width * 2)) % colors.len()])
            .collect()
    }

    #[test]
    fn test_exact_when_blocks_fit_codebook() {
        // two flat block patterns, codebook of 16
        let img = flat_image(&[[255, 0, 0, 255], [0, 0, 255, 255]], 8, 8);
        let encoded = quantize(&img, 8, 8, 16);
        assert!(encoded.codebook.len() <= 16);
        assert_eq!(reconstruct(&encoded, 8, 8), img);
    }

    #[test]
    fn test_index_per_block() {
        let img = vec![128u8; 16 * 16 * 4];
        let encoded = quantize(&img, 16, 16, 256);
        assert_eq!(encoded.indices.len(), 8 * 8);
        assert_eq!(encoded.codebook.len(), 1);
    }

    #[test]
    fn test_quantize_is_deterministic() {
        let img: Vec<u8> = (0..32 * 32 * 4).map(|i| (i * 37 % 251) as u8).collect();
        let a = quantize(&img, 32, 32, 64);
        let b = quantize(&img, 32, 32, 64);
        assert_eq!(a.codebook, b.codebook);
        assert_eq!(a.indices, b.indices);
    }

    #[test]
    fn test_lossy_reconstruction_stays_close() {
        // vertical gradient: blocks differ only in one channel
        let mut img = Vec::new();
        for y in 0..32 {
            for _ in 0..32 {
                img.extend_from_slice(&[(y * 8) as u8, 0, 0, 255]);
            }
        }
        let encoded = quantize(&img, 32, 32, 8);
        let out = reconstruct(&encoded, 32, 32);
        for (a, b) in img.chunks_exact(4).zip(out.chunks_exact(4)) {
            assert!((a[0] as i32 - b[0] as i32).abs() <= 32);
            assert_eq!(b[3], 255);
        }
    }
}

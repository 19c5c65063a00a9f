//! Pixel address permutations and bit-level repacking.
//!
//! Each platform's texture memory wants pixels in its own order. Every
//! permutation here is expressed as an order table mapping the linear
//! texel index `y * width + x` to the stored index, built once per
//! (mode, size) and applied forward (CPU order to GPU order) or inverted
//! (GPU order back to CPU order). All tables are bijections, so apply
//! followed by invert is the identity on any buffer.

/// order[linear_index] = stored_index
pub type Order = Vec<u32>;

/// Reorder one pixel buffer forward: `out[order[i]] = in[i]`.
pub fn apply_order<T: Copy + Default>(pixels: &[T], order: &[u32]) -> Vec<T> {
    debug_assert_eq!(pixels.len(), order.len());
    let mut out = vec![T::default(); pixels.len()];
    for (i, &dst) in order.iter().enumerate() {
        out[dst as usize] = pixels[i];
    }
    out
}

/// Reorder one pixel buffer backward: `out[i] = in[order[i]]`.
pub fn invert_order<T: Copy + Default>(pixels: &[T], order: &[u32]) -> Vec<T> {
    debug_assert_eq!(pixels.len(), order.len());
    let mut out = vec![T::default(); pixels.len()];
    for (i, &src) in order.iter().enumerate() {
        out[i] = pixels[src as usize];
    }
    out
}

// ---------------------------------------------------------------------------
// PS2-class GS swizzle
// ---------------------------------------------------------------------------

/// Minimum size at which the GS 8-bit swizzle pattern applies. Smaller
/// mips are stored linearly.
pub const GS_SWIZZLE_MIN: usize = 16;

/// 8-bit GS swizzle order. Caller must check [`GS_SWIZZLE_MIN`] first.
pub fn gs_order8(width: usize, height: usize) -> Order {
    debug_assert!(width >= GS_SWIZZLE_MIN && height >= GS_SWIZZLE_MIN);
    let mut order = vec![0u32; width * height];
    for y in 0..height {
        for x in 0..width {
            let block = (y & !0xF) * width + (x & !0xF) * 2;
            let swap = ((y + 2) & 4) << 2;
            let pos_y = (((y & !3) >> 1) + (y & 1)) & 0x7;
            let column = pos_y * width * 2 + ((x + swap) & 0x7) * 4;
            let byte = ((y >> 1) & 1) + ((x >> 2) & 2);
            order[y * width + x] = (block + column + byte) as u32;
        }
    }
    order
}

/// Minimum size at which the GS 4-bit swizzle pattern applies: the block
/// permutation spans a full 128x128 page.
pub const GS_SWIZZLE4_MIN: usize = 128;

/// 4-bit GS swizzle order over nibble positions. One 128x128 page holds
/// 32 blocks of 32x16 texels whose addresses follow the PSMT4 block
/// table; texels stay row-major inside a block. Caller must check
/// [`GS_SWIZZLE4_MIN`] first.
pub fn gs_order4(width: usize, height: usize) -> Order {
    debug_assert!(width % GS_SWIZZLE4_MIN == 0 && height % GS_SWIZZLE4_MIN == 0);
    let pages_x = width / 128;
    let mut order = vec![0u32; width * height];
    for y in 0..height {
        for x in 0..width {
            let page = (y / 128) * pages_x + x / 128;
            let (lx, ly) = (x % 128, y % 128);
            let block = super::buffer::PSMT4_BLOCK_TABLE[ly / 16][lx / 32] as usize;
            let within = (ly % 16) * 32 + lx % 32;
            order[y * width + x] = (page * 128 * 128 + block * 512 + within) as u32;
        }
    }
    order
}

// ---------------------------------------------------------------------------
// Dreamcast twiddle
// ---------------------------------------------------------------------------

/// Dreamcast PVR twiddle order: x/y bit-interleave with y in the low bit,
/// applied per square of the smaller dimension, squares laid out along the
/// longer axis.
pub fn twiddle_order(width: usize, height: usize) -> Order {
    let side = width.min(height);
    let square = side * side;
    let mut order = vec![0u32; width * height];
    for y in 0..height {
        for x in 0..width {
            let (sq, lx, ly) = if width >= height {
                (x / side, x % side, y)
            } else {
                (y / side, x, y % side)
            };
            let idx = sq * square + interleave2(ly, lx);
            order[y * width + x] = idx as u32;
        }
    }
    order
}

// ---------------------------------------------------------------------------
// Xbox Morton swizzle
// ---------------------------------------------------------------------------

/// Xbox swizzle order: x/y bit-interleave with x in the low bit; the
/// excess bits of the longer axis stay linear above the interleaved part.
pub fn morton_order(width: usize, height: usize) -> Order {
    let side = width.min(height);
    let square = side * side;
    let mut order = vec![0u32; width * height];
    for y in 0..height {
        for x in 0..width {
            let (sq, lx, ly) = if width >= height {
                (x / side, x % side, y)
            } else {
                (y / side, x, y % side)
            };
            let idx = sq * square + interleave2(lx, ly);
            order[y * width + x] = idx as u32;
        }
    }
    order
}

/// Interleave the bits of `lo` (even positions) and `hi` (odd positions).
fn interleave2(lo: usize, hi: usize) -> usize {
    let mut out = 0usize;
    for bit in 0..usize::BITS as usize / 2 {
        out |= ((lo >> bit) & 1) << (2 * bit);
        out |= ((hi >> bit) & 1) << (2 * bit + 1);
    }
    out
}

// ---------------------------------------------------------------------------
// GameCube tiling
// ---------------------------------------------------------------------------

/// GameCube texture tile order: `tile_w`×`tile_h` texel tiles, row-major
/// inside each tile, tiles row-major across the image. Tile shape depends
/// on bit depth (8×8 at 4 bpp, 8×4 at 8 bpp, 4×4 at 16/32 bpp).
pub fn tile_order(width: usize, height: usize, tile_w: usize, tile_h: usize) -> Order {
    debug_assert!(width % tile_w == 0 && height % tile_h == 0);
    let tiles_x = width / tile_w;
    let mut order = vec![0u32; width * height];
    for y in 0..height {
        for x in 0..width {
            let tile = (y / tile_h) * tiles_x + x / tile_w;
            let within = (y % tile_h) * tile_w + x % tile_w;
            order[y * width + x] = (tile * tile_w * tile_h + within) as u32;
        }
    }
    order
}

/// Tile shape for a GameCube format of the given bit depth.
pub fn gc_tile_shape(bits_per_pixel: usize) -> (usize, usize) {
    match bits_per_pixel {
        4 => (8, 8),
        8 => (8, 4),
        _ => (4, 4),
    }
}

// ---------------------------------------------------------------------------
// Bit and byte repacking
// ---------------------------------------------------------------------------

/// Expand packed 4-bit indices to one byte each, low nibble first.
pub fn unpack_nibbles(packed: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(packed.len() * 2);
    for &b in packed {
        out.push(b & 0xF);
        out.push(b >> 4);
    }
    out
}

/// Pack one-index-per-byte data back into 4-bit pairs, low nibble first.
pub fn pack_nibbles(indices: &[u8]) -> Vec<u8> {
    debug_assert!(indices.len() % 2 == 0);
    indices
        .chunks_exact(2)
        .map(|pair| (pair[0] & 0xF) | (pair[1] << 4))
        .collect()
}

/// Swap the red and blue channels of an RGBA8 buffer in place. The two
/// channel orderings across the targets differ only in this swap.
pub fn swap_red_blue(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
}

/// Byte-swap every 16-bit word of a packed buffer in place.
pub fn swap_u16_bytes(data: &mut [u8]) {
    for pair in data.chunks_exact_mut(2) {
        pair.swap(0, 1);
    }
}

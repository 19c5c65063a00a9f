//! GS texture buffer packing.
//!
//! The GS addresses texture memory in 256-byte blocks grouped 32 to a
//! page. Block addresses inside a page do not run row-major; each storage
//! mode has a fixed permutation table mapping the page-local block grid to
//! addresses. The packer places mip levels (largest first) and then the
//! palette into the lowest free region of the buffer's block grid and
//! records, per region, the block address of its top-left block and the
//! buffer row stride in blocks.
//!
//! # Block geometry per storage mode
//! ```text
//! mode     block px   page px    page grid
//! PSMCT32   8 x  8    64 x  32   8 x 4 blocks
//! PSMCT16  16 x  8    64 x  64   4 x 8 blocks
//! PSMT8    16 x 16   128 x  64   8 x 4 blocks
//! PSMT4    32 x 16   128 x 128   4 x 8 blocks
//! ```

use tracing::warn;

use super::format::PixelFormat;
use crate::error::{CodecError, Result};

pub const BLOCKS_PER_PAGE: usize = 32;

/// Page-local block addresses for PSMCT32 and PSMT8 (8 columns, 4 rows).
pub(crate) const PSMCT32_BLOCK_TABLE: [[u8; 8]; 4] = [
    [0, 1, 4, 5, 16, 17, 20, 21],
    [2, 3, 6, 7, 18, 19, 22, 23],
    [8, 9, 12, 13, 24, 25, 28, 29],
    [10, 11, 14, 15, 26, 27, 30, 31],
];

/// Page-local block addresses for PSMCT16 and PSMT4 (4 columns, 8 rows).
pub(crate) const PSMT4_BLOCK_TABLE: [[u8; 4]; 8] = [
    [0, 2, 8, 10],
    [1, 3, 9, 11],
    [4, 6, 12, 14],
    [5, 7, 13, 15],
    [16, 18, 24, 26],
    [17, 19, 25, 27],
    [20, 22, 28, 30],
    [21, 23, 29, 31],
];

/// GS pixel storage mode, reduced to its block geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    Psmct32,
    Psmct16,
    Psmt8,
    Psmt4,
}

impl StorageMode {
    pub fn for_format(format: PixelFormat) -> Result<StorageMode> {
        use PixelFormat::*;
        match format {
            Psmct32 | Psmct24 => Ok(StorageMode::Psmct32),
            Psmct16 | Psmct16s => Ok(StorageMode::Psmct16),
            Psmt8 | Psmt8h => Ok(StorageMode::Psmt8),
            Psmt4 | Psmt4hl | Psmt4hh => Ok(StorageMode::Psmt4),
            other => Err(CodecError::format(format!(
                "{other} is not a GS storage mode"
            ))),
        }
    }

    /// Block size in pixels.
    pub fn block_size(self) -> (usize, usize) {
        match self {
            StorageMode::Psmct32 => (8, 8),
            StorageMode::Psmct16 => (16, 8),
            StorageMode::Psmt8 => (16, 16),
            StorageMode::Psmt4 => (32, 16),
        }
    }

    /// Page size in blocks.
    pub fn page_grid(self) -> (usize, usize) {
        match self {
            StorageMode::Psmct32 | StorageMode::Psmt8 => (8, 4),
            StorageMode::Psmct16 | StorageMode::Psmt4 => (4, 8),
        }
    }

    /// Page-local block address for grid cell (`bx`, `by`).
    pub fn block_address(self, bx: usize, by: usize) -> u32 {
        match self {
            StorageMode::Psmct32 | StorageMode::Psmt8 => PSMCT32_BLOCK_TABLE[by][bx] as u32,
            StorageMode::Psmct16 | StorageMode::Psmt4 => PSMT4_BLOCK_TABLE[by][bx] as u32,
        }
    }

    /// Inverse of [`block_address`](Self::block_address).
    pub fn block_cell(self, address: u32) -> (usize, usize) {
        let (cols, rows) = self.page_grid();
        for by in 0..rows {
            for bx in 0..cols {
                if self.block_address(bx, by) == address {
                    return (bx, by);
                }
            }
        }
        unreachable!("page-local address out of range")
    }
}

/// What a packed region holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    Mip(usize),
    Palette,
}

impl std::fmt::Display for RegionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegionKind::Mip(level) => write!(f, "mip {level}"),
            RegionKind::Palette => f.write_str("palette"),
        }
    }
}

/// One allocated region of the buffer.
#[derive(Debug, Clone)]
pub struct PackedRegion {
    pub kind: RegionKind,
    /// Block address of the region's first block.
    pub base_block: u32,
    /// Buffer row stride in blocks (rectangular regions) or 0 for
    /// address-linear runs.
    pub stride_blocks: u32,
    pub width_blocks: usize,
    pub height_blocks: usize,
}

impl PackedRegion {
    pub fn block_count(&self) -> usize {
        self.width_blocks * self.height_blocks
    }
}

/// Known region placement, as read from retail data.
#[derive(Debug, Clone, Copy)]
pub struct RegionInfo {
    pub kind: RegionKind,
    pub base_block: u32,
    pub stride_blocks: u32,
    pub width_blocks: usize,
    pub height_blocks: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PackOptions {
    /// Merge overlapping regions with a warning instead of failing.
    /// Used when validating retail data that packs loosely.
    pub allow_overlap: bool,
}

/// Summary of an occupied buffer, for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct PackReport {
    pub occupied_blocks: usize,
    pub capacity_blocks: usize,
    /// occupied / capacity, in [0, 1].
    pub efficiency: f32,
}

/// Write-once block allocator over a GS texture buffer.
///
/// The buffer is `pages_wide` pages across (fixed by the mip 0 width) and
/// grows downward a page row at a time. Freeing is not supported.
pub struct TextureBuffer {
    mode: StorageMode,
    pages_wide: usize,
    /// Block grid width (pages_wide * page columns).
    grid_w: usize,
    /// Block grid height currently allocated.
    grid_h: usize,
    /// Occupancy by grid cell, row-major; holds the owning region index
    /// + 1, or 0 when free.
    cells: Vec<u32>,
    regions: Vec<PackedRegion>,
}

impl TextureBuffer {
    /// Buffer for a texture whose mip 0 is `width` pixels across.
    pub fn new(mode: StorageMode, width: usize) -> TextureBuffer {
        let (page_w, _) = page_pixels(mode);
        let (cols, _) = mode.page_grid();
        let pages_wide = width.div_ceil(page_w).max(1);
        TextureBuffer {
            mode,
            pages_wide,
            grid_w: pages_wide * cols,
            grid_h: 0,
            cells: Vec::new(),
            regions: Vec::new(),
        }
    }

    pub fn mode(&self) -> StorageMode {
        self.mode
    }

    pub fn regions(&self) -> &[PackedRegion] {
        &self.regions
    }

    pub fn capacity_blocks(&self) -> usize {
        self.grid_w * self.grid_h
    }

    pub fn allocated_pages(&self) -> usize {
        let (_, page_rows) = self.mode.page_grid();
        self.grid_h / page_rows * self.pages_wide
    }

    /// Grow the backing store by `n` pages. Growth is rounded up to whole
    /// page rows so the block grid stays rectangular.
    pub fn allocate_pages(&mut self, n: usize) {
        let (_, page_rows) = self.mode.page_grid();
        let rows = n.div_ceil(self.pages_wide);
        self.grid_h += rows * page_rows;
        self.cells.resize(self.grid_w * self.grid_h, 0);
    }

    /// Pack mip levels (largest first) and then the palette.
    ///
    /// `mip_dims` are pixel dimensions per level; `palette_blocks` is the
    /// palette's block footprint (width, height) or `None`. Regions of at
    /// least 2 blocks in both axes get the lowest free rectangle; narrower
    /// regions get the lowest free run of consecutive block addresses.
    pub fn pack(
        &mut self,
        mip_dims: &[(usize, usize)],
        palette_blocks: Option<(usize, usize)>,
        options: PackOptions,
    ) -> Result<PackReport> {
        let (block_w, block_h) = self.mode.block_size();
        for (level, &(w, h)) in mip_dims.iter().enumerate() {
            let bw = w.div_ceil(block_w);
            let bh = h.div_ceil(block_h);
            self.place(RegionKind::Mip(level), bw, bh, options)?;
        }
        if let Some((bw, bh)) = palette_blocks {
            self.place(RegionKind::Palette, bw, bh, options)?;
        }
        Ok(self.report())
    }

    pub fn report(&self) -> PackReport {
        let occupied = self.cells.iter().filter(|&&c| c != 0).count();
        let capacity = self.capacity_blocks();
        PackReport {
            occupied_blocks: occupied,
            capacity_blocks: capacity,
            efficiency: if capacity == 0 {
                0.0
            } else {
                occupied as f32 / capacity as f32
            },
        }
    }

    /// Rebuild the occupancy map from known placements, validating that
    /// the regions do not collide (unless `options.allow_overlap`).
    pub fn load_from_buffer_info(
        &mut self,
        regions: &[RegionInfo],
        options: PackOptions,
    ) -> Result<()> {
        for info in regions {
            let cells: Vec<(usize, usize)> = if info.stride_blocks == 0 {
                (0..info.width_blocks * info.height_blocks)
                    .map(|i| self.address_to_cell(info.base_block + i as u32))
                    .collect()
            } else {
                let (x0, y0) = self.address_to_cell(info.base_block);
                if x0 + info.width_blocks > self.grid_w {
                    return Err(CodecError::format(format!(
                        "region {} at block {} is {} blocks wide, crossing the \
                         {}-block grid edge at column {x0}",
                        info.kind, info.base_block, info.width_blocks, self.grid_w
                    )));
                }
                (0..info.height_blocks)
                    .flat_map(|ry| (0..info.width_blocks).map(move |rx| (x0 + rx, y0 + ry)))
                    .collect()
            };
            let needed_rows = cells.iter().map(|&(_, y)| y + 1).max().unwrap_or(0);
            self.grow_to_rows(needed_rows);
            let region = PackedRegion {
                kind: info.kind,
                base_block: info.base_block,
                stride_blocks: info.stride_blocks,
                width_blocks: info.width_blocks,
                height_blocks: info.height_blocks,
            };
            self.claim(&cells, region, options)?;
        }
        Ok(())
    }

    /// Block address of grid cell (`gx`, `gy`).
    pub fn cell_to_address(&self, gx: usize, gy: usize) -> u32 {
        let (cols, rows) = self.mode.page_grid();
        let page = (gy / rows) * self.pages_wide + gx / cols;
        (page * BLOCKS_PER_PAGE) as u32 + self.mode.block_address(gx % cols, gy % rows)
    }

    fn address_to_cell(&self, address: u32) -> (usize, usize) {
        let (cols, rows) = self.mode.page_grid();
        let page = address as usize / BLOCKS_PER_PAGE;
        let (bx, by) = self.mode.block_cell(address % BLOCKS_PER_PAGE as u32);
        (
            page % self.pages_wide * cols + bx,
            page / self.pages_wide * rows + by,
        )
    }

    fn grow_to_rows(&mut self, rows: usize) {
        while self.grid_h < rows {
            self.allocate_pages(self.pages_wide);
        }
    }

    fn place(
        &mut self,
        kind: RegionKind,
        bw: usize,
        bh: usize,
        options: PackOptions,
    ) -> Result<()> {
        let (cells, base, stride) = if bw >= 2 && bh >= 2 {
            self.find_rect(bw, bh)
        } else {
            self.find_run(bw * bh)
        };
        let region = PackedRegion {
            kind,
            base_block: base,
            stride_blocks: stride,
            width_blocks: bw,
            height_blocks: bh,
        };
        self.claim(&cells, region, options)
    }

    /// Lowest free `bw` x `bh` rectangle, scanning row-major and growing
    /// the buffer when nothing fits.
    fn find_rect(&mut self, bw: usize, bh: usize) -> (Vec<(usize, usize)>, u32, u32) {
        loop {
            for gy in 0..self.grid_h.saturating_sub(bh - 1) {
                for gx in 0..=self.grid_w.saturating_sub(bw) {
                    let cells: Vec<(usize, usize)> = (0..bh)
                        .flat_map(|ry| (0..bw).map(move |rx| (gx + rx, gy + ry)))
                        .collect();
                    if cells.iter().all(|&(x, y)| self.cell(x, y) == 0) {
                        let base = self.cell_to_address(gx, gy);
                        return (cells, base, self.grid_w as u32);
                    }
                }
            }
            self.allocate_pages(self.pages_wide);
        }
    }

    /// Lowest free run of `n` consecutive block addresses.
    fn find_run(&mut self, n: usize) -> (Vec<(usize, usize)>, u32, u32) {
        loop {
            let capacity = self.capacity_blocks();
            let mut start = 0u32;
            let mut run: Vec<(usize, usize)> = Vec::new();
            for addr in 0..capacity as u32 {
                let (x, y) = self.address_to_cell(addr);
                if self.cell(x, y) == 0 {
                    if run.is_empty() {
                        start = addr;
                    }
                    run.push((x, y));
                    if run.len() == n {
                        return (run, start, 0);
                    }
                } else {
                    run.clear();
                }
            }
            self.allocate_pages(self.pages_wide);
        }
    }

    fn claim(
        &mut self,
        cells: &[(usize, usize)],
        region: PackedRegion,
        options: PackOptions,
    ) -> Result<()> {
        let id = self.regions.len() as u32 + 1;
        for &(x, y) in cells {
            let owner = self.cell(x, y);
            if owner != 0 {
                let other = self.regions[owner as usize - 1].kind;
                if !options.allow_overlap {
                    return Err(CodecError::BufferOverlap {
                        block: self.cell_to_address(x, y),
                        region_a: other.to_string(),
                        region_b: region.kind.to_string(),
                    });
                }
                warn!(
                    block = self.cell_to_address(x, y),
                    "merging overlap between {} and {}", other, region.kind
                );
            }
            self.cells[y * self.grid_w + x] = id;
        }
        self.regions.push(region);
        Ok(())
    }

    fn cell(&self, gx: usize, gy: usize) -> u32 {
        self.cells[gy * self.grid_w + gx]
    }
}

/// Page size in pixels for a storage mode.
pub fn page_pixels(mode: StorageMode) -> (usize, usize) {
    let (block_w, block_h) = mode.block_size();
    let (cols, rows) = mode.page_grid();
    (block_w * cols, block_h * rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(buf: &TextureBuffer, kind: RegionKind) -> &PackedRegion {
        buf.regions()
            .iter()
            .find(|r| r.kind == kind)
            .unwrap_or_else(|| panic!("missing region {kind}"))
    }

    #[test]
    fn test_block_tables_are_page_permutations() {
        for mode in [
            StorageMode::Psmct32,
            StorageMode::Psmct16,
            StorageMode::Psmt8,
            StorageMode::Psmt4,
        ] {
            let (cols, rows) = mode.page_grid();
            let mut seen = [false; BLOCKS_PER_PAGE];
            for by in 0..rows {
                for bx in 0..cols {
                    let addr = mode.block_address(bx, by) as usize;
                    assert!(!seen[addr]);
                    seen[addr] = true;
                    assert_eq!(mode.block_cell(addr as u32), (bx, by));
                }
            }
            assert!(seen.iter().all(|&s| s));
        }
    }

    /// The documented retail layout: 256x256 PSMT8 with a full mip chain
    /// and a 256-entry PSMCT32 palette (16x16 px = 2x2 blocks here).
    #[test]
    fn test_psmt8_256_reference_layout() {
        let mips = [
            (256, 256),
            (128, 128),
            (64, 64),
            (32, 32),
            (16, 16),
            (8, 8),
        ];
        let mut buf = TextureBuffer::new(StorageMode::Psmt8, 256);
        let report = buf
            .pack(&mips, Some((2, 2)), PackOptions::default())
            .unwrap();

        let expect = [
            (RegionKind::Mip(0), 0, 16),
            (RegionKind::Mip(1), 256, 16),
            (RegionKind::Mip(2), 288, 16),
            (RegionKind::Mip(3), 304, 16),
            (RegionKind::Mip(4), 308, 0),
            (RegionKind::Mip(5), 309, 0),
            (RegionKind::Palette, 310, 16),
        ];
        for (kind, base, stride) in expect {
            let r = region(&buf, kind);
            assert_eq!(r.base_block, base, "{kind} base");
            assert_eq!(r.stride_blocks, stride, "{kind} stride");
        }

        // 2 pages wide, 6 page rows tall
        assert_eq!(buf.allocated_pages(), 12);
        assert_eq!(report.occupied_blocks, 256 + 64 + 16 + 4 + 1 + 1 + 4);
        assert!((0.0..=1.0).contains(&report.efficiency));
    }

    #[test]
    fn test_regions_are_disjoint() {
        let mips = [(128, 128), (64, 64), (32, 32)];
        let mut buf = TextureBuffer::new(StorageMode::Psmt8, 128);
        buf.pack(&mips, Some((2, 2)), PackOptions::default()).unwrap();

        let mut owners = hashbrown::HashMap::new();
        for (i, r) in buf.regions().iter().enumerate() {
            let count = r.block_count();
            for b in 0..count as u32 {
                let addr = if r.stride_blocks == 0 {
                    r.base_block + b
                } else {
                    let (x0, y0) = buf.address_to_cell(r.base_block);
                    let rx = b as usize % r.width_blocks;
                    let ry = b as usize / r.width_blocks;
                    buf.cell_to_address(x0 + rx, y0 + ry)
                };
                assert!(owners.insert(addr, i).is_none(), "block {addr} shared");
            }
        }
    }

    #[test]
    fn test_overlap_rejected_unless_relaxed() {
        let known = [
            RegionInfo {
                kind: RegionKind::Mip(0),
                base_block: 0,
                stride_blocks: 16,
                width_blocks: 4,
                height_blocks: 4,
            },
            RegionInfo {
                kind: RegionKind::Palette,
                base_block: 0,
                stride_blocks: 0,
                width_blocks: 2,
                height_blocks: 2,
            },
        ];
        let mut strict = TextureBuffer::new(StorageMode::Psmt8, 256);
        let err = strict
            .load_from_buffer_info(&known, PackOptions::default())
            .unwrap_err();
        assert!(matches!(err, CodecError::BufferOverlap { block: 0, .. }));

        let mut relaxed = TextureBuffer::new(StorageMode::Psmt8, 256);
        relaxed
            .load_from_buffer_info(&known, PackOptions { allow_overlap: true })
            .unwrap();
        assert_eq!(relaxed.regions().len(), 2);
    }

    #[test]
    fn test_load_region_crossing_grid_edge_rejected() {
        // PSMT8 at 64 pixels wide is one page column, 8 blocks across;
        // block 21 sits in the rightmost column, so a 4-wide rect from it
        // would spill past the grid edge.
        let mut buf = TextureBuffer::new(StorageMode::Psmt8, 64);
        let info = RegionInfo {
            kind: RegionKind::Mip(0),
            base_block: 21,
            stride_blocks: 8,
            width_blocks: 4,
            height_blocks: 2,
        };
        let err = buf
            .load_from_buffer_info(&[info], PackOptions::default())
            .unwrap_err();
        assert!(matches!(err, CodecError::FormatValidation(_)));
        assert!(buf.regions().is_empty());
    }

    #[test]
    fn test_load_matches_pack() {
        let mips = [(256, 256), (128, 128)];
        let mut packed = TextureBuffer::new(StorageMode::Psmt8, 256);
        packed.pack(&mips, None, PackOptions::default()).unwrap();

        let infos: Vec<RegionInfo> = packed
            .regions()
            .iter()
            .map(|r| RegionInfo {
                kind: r.kind,
                base_block: r.base_block,
                stride_blocks: r.stride_blocks,
                width_blocks: r.width_blocks,
                height_blocks: r.height_blocks,
            })
            .collect();
        let mut loaded = TextureBuffer::new(StorageMode::Psmt8, 256);
        loaded
            .load_from_buffer_info(&infos, PackOptions::default())
            .unwrap();
        assert_eq!(
            loaded.report().occupied_blocks,
            packed.report().occupied_blocks
        );
    }

    #[test]
    fn test_narrow_mip_uses_linear_run() {
        // a 256x16 strip is 16x1 blocks in PSMT8
        let mut buf = TextureBuffer::new(StorageMode::Psmt8, 256);
        buf.pack(&[(256, 16)], None, PackOptions::default()).unwrap();
        let r = &buf.regions()[0];
        assert_eq!(r.stride_blocks, 0);
        assert_eq!(r.base_block, 0);
        assert_eq!(r.block_count(), 16);
    }
}

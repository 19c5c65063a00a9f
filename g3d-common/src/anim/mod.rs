//! Animation keyframe codec.
//!
//! An animation tree is a node hierarchy plus three shared float tables
//! (angles, positions, scales) deduplicated across every node in the tree.
//! A skeletal node's track stores, per sequence, either raw floats per
//! frame or a compressed stream of one byte index per enabled channel per
//! explicit frame; frames without explicit data are linearly interpolated
//! from their neighbors on decode.

mod codec;
mod reduce;
mod visibility;

pub use codec::{decompress_track, AnimationTree};
pub use reduce::reduce_tables;
pub use visibility::{visibility_windows, split_visibility_nodes, VisibilityWindow};

use crate::error::{CodecError, Result};

/// What a node animates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeKind {
    Null = 0,
    Skeletal = 1,
    Object = 2,
    Texture = 3,
    ParticleSystem = 4,
}

impl NodeKind {
    pub fn from_u8(v: u8) -> Result<NodeKind> {
        match v {
            0 => Ok(NodeKind::Null),
            1 => Ok(NodeKind::Skeletal),
            2 => Ok(NodeKind::Object),
            3 => Ok(NodeKind::Texture),
            4 => Ok(NodeKind::ParticleSystem),
            other => Err(CodecError::format(format!("unknown node kind {other}"))),
        }
    }
}

/// One node of the animation tree. `parent` is `None` for roots; the tree
/// has no cycles by construction (parents always precede children).
#[derive(Debug, Clone, PartialEq)]
pub struct AnimNode {
    pub name: String,
    pub parent: Option<usize>,
    pub kind: NodeKind,
    pub initial_position: [f32; 3],
}

/// Transform channel enable mask: bits 0-2 rotation xyz, 3-5 position
/// xyz, 6-8 scale xyz. The set bits determine the per-frame record stride.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelMask(pub u16);

/// Which shared table a channel dereferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelTable {
    Angles,
    Positions,
    Scales,
}

impl ChannelMask {
    pub const ROTATION: ChannelMask = ChannelMask(0b000_000_111);
    pub const POSITION: ChannelMask = ChannelMask(0b000_111_000);
    pub const SCALE: ChannelMask = ChannelMask(0b111_000_000);

    pub fn count(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn contains(self, bit: usize) -> bool {
        self.0 & (1 << bit) != 0
    }

    /// Enabled channel bits, low to high.
    pub fn channels(self) -> impl Iterator<Item = usize> {
        (0..9).filter(move |&bit| self.contains(bit))
    }

    /// Table owning a channel bit.
    pub fn table_for(bit: usize) -> ChannelTable {
        match bit / 3 {
            0 => ChannelTable::Angles,
            1 => ChannelTable::Positions,
            _ => ChannelTable::Scales,
        }
    }
}

/// The tree-wide deduplicated value tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SharedTables {
    pub angles: Vec<f32>,
    pub positions: Vec<f32>,
    pub scales: Vec<f32>,
}

impl SharedTables {
    pub fn table(&self, which: ChannelTable) -> &[f32] {
        match which {
            ChannelTable::Angles => &self.angles,
            ChannelTable::Positions => &self.positions,
            ChannelTable::Scales => &self.scales,
        }
    }

    /// Index of `value` in a table, appending it when absent. Matching is
    /// by bit pattern so reduction stays byte-identical.
    pub fn intern(&mut self, which: ChannelTable, value: f32) -> Result<u8> {
        let table = match which {
            ChannelTable::Angles => &mut self.angles,
            ChannelTable::Positions => &mut self.positions,
            ChannelTable::Scales => &mut self.scales,
        };
        if let Some(i) = table.iter().position(|v| v.to_bits() == value.to_bits()) {
            return Ok(i as u8);
        }
        if table.len() >= 256 {
            return Err(CodecError::format("shared value table overflow"));
        }
        table.push(value);
        Ok((table.len() - 1) as u8)
    }
}

/// Keyframe data of one node in one sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackData {
    /// One float per enabled channel per frame.
    Raw { values: Vec<f32> },
    /// Byte indices into the shared tables for explicit frames only.
    Compressed {
        /// One flag per frame; false frames interpolate.
        explicit: Vec<bool>,
        /// Raw floats for frame 0, when the sequence carries them.
        initial: Option<Vec<f32>>,
        /// explicit_frame_count * channel_count indices.
        indices: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeTrack {
    pub node: usize,
    pub channels: ChannelMask,
    pub data: TrackData,
}

/// One animation sequence over the tree's nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    pub frame_count: usize,
    /// Sequence type stores a raw initial frame before the indexed stream.
    pub has_initial_frame: bool,
    pub tracks: Vec<NodeTrack>,
}

//! Shared table reduction.
//!
//! Authoring tools intern liberally, so a tree's tables accumulate values
//! no surviving track references (trimmed sequences, raw-form tracks that
//! were once compressed). Reduction rebuilds each table from the indices
//! still in use and rewrites every compressed track to match. Decoded
//! frame values are bit-identical before and after.

use super::{AnimationTree, ChannelMask, ChannelTable, SharedTables, TrackData};
use crate::error::{CodecError, Result};

/// Drop unreferenced entries from the tree's shared tables, rewriting
/// track indices in place. Entries keep their first-use order, so a
/// second pass is a no-op.
pub fn reduce_tables(tree: &mut AnimationTree) -> Result<()> {
    let mut reduced = SharedTables::default();
    let mut remap_angles = vec![None; tree.tables.angles.len()];
    let mut remap_positions = vec![None; tree.tables.positions.len()];
    let mut remap_scales = vec![None; tree.tables.scales.len()];

    for seq in &mut tree.sequences {
        for track in &mut seq.tracks {
            let TrackData::Compressed { indices, .. } = &mut track.data else {
                continue;
            };
            let stride = track.channels.count();
            if stride == 0 {
                if indices.is_empty() {
                    continue;
                }
                return Err(CodecError::format("track has no enabled channels"));
            }
            if indices.len() % stride != 0 {
                return Err(CodecError::format(format!(
                    "track on node {} holds {} indices, not a multiple of {stride}",
                    track.node,
                    indices.len()
                )));
            }
            for (slot, index) in indices.iter_mut().enumerate() {
                let bit = track
                    .channels
                    .channels()
                    .nth(slot % stride)
                    .ok_or_else(|| CodecError::format("track has no enabled channels"))?;
                let which = ChannelMask::table_for(bit);
                let (source, remap) = match which {
                    ChannelTable::Angles => (&tree.tables.angles, &mut remap_angles),
                    ChannelTable::Positions => {
                        (&tree.tables.positions, &mut remap_positions)
                    }
                    ChannelTable::Scales => (&tree.tables.scales, &mut remap_scales),
                };
                let old = *index as usize;
                let value = *source.get(old).ok_or_else(|| {
                    CodecError::format(format!(
                        "index {old} outside shared table of {}",
                        source.len()
                    ))
                })?;
                *index = match remap[old] {
                    Some(new) => new,
                    None => {
                        let new = reduced.intern(which, value)?;
                        remap[old] = Some(new);
                        new
                    }
                };
            }
        }
    }

    tree.tables = reduced;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anim::{decompress_track, AnimNode, NodeKind, NodeTrack, Sequence};

    fn tree_with_slack() -> AnimationTree {
        let mut tables = SharedTables::default();
        for v in [0.0, 0.25, 0.5, 0.75, 1.0] {
            tables.intern(ChannelTable::Angles, v).unwrap();
        }
        for v in [10.0, 20.0] {
            tables.intern(ChannelTable::Positions, v).unwrap();
        }
        AnimationTree {
            nodes: vec![AnimNode {
                name: "root".into(),
                parent: None,
                kind: NodeKind::Skeletal,
                initial_position: [0.0; 3],
            }],
            tables,
            sequences: vec![Sequence {
                frame_count: 2,
                has_initial_frame: false,
                tracks: vec![NodeTrack {
                    node: 0,
                    channels: ChannelMask(0b000_001_001),
                    data: TrackData::Compressed {
                        explicit: vec![true, true],
                        initial: None,
                        indices: vec![4, 1, 0, 1],
                    },
                }],
            }],
        }
    }

    fn decoded_frames(tree: &AnimationTree) -> Vec<Vec<f32>> {
        decompress_track(&tree.sequences[0].tracks[0], &tree.tables, 2).unwrap()
    }

    #[test]
    fn test_unused_entries_dropped() {
        let mut tree = tree_with_slack();
        reduce_tables(&mut tree).unwrap();
        assert_eq!(tree.tables.angles, vec![1.0, 0.0]);
        assert_eq!(tree.tables.positions, vec![20.0]);
        assert!(tree.tables.scales.is_empty());
    }

    #[test]
    fn test_decode_unchanged_by_reduction() {
        let mut tree = tree_with_slack();
        let before = decoded_frames(&tree);
        reduce_tables(&mut tree).unwrap();
        assert_eq!(decoded_frames(&tree), before);
    }

    #[test]
    fn test_reduction_is_idempotent() {
        let mut tree = tree_with_slack();
        reduce_tables(&mut tree).unwrap();
        let once = tree.clone();
        reduce_tables(&mut tree).unwrap();
        assert_eq!(tree, once);
    }

    #[test]
    fn test_bad_index_rejected() {
        let mut tree = tree_with_slack();
        if let TrackData::Compressed { indices, .. } =
            &mut tree.sequences[0].tracks[0].data
        {
            indices[0] = 200;
        }
        assert!(reduce_tables(&mut tree).is_err());
    }
}

//! Object-visibility window synthesis.
//!
//! Editors express "hide this object" as a scale of zero on all three
//! axes; one node in the compiled tree can therefore blink in and out
//! several times over a sequence. Editable exports want the opposite
//! shape: one node per contiguous visible span, each with frame-explicit
//! data, so a tool can select and retime a single appearance.

use super::{decompress_track, AnimNode, AnimationTree, ChannelMask, NodeTrack, TrackData};
use crate::error::{CodecError, Result};

/// A contiguous span of visible frames, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityWindow {
    pub first: usize,
    pub last: usize,
}

impl VisibilityWindow {
    pub fn len(&self) -> usize {
        self.last - self.first + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, frame: usize) -> bool {
        (self.first..=self.last).contains(&frame)
    }
}

/// Contiguous visible spans of a per-frame scale triple. A frame is
/// hidden exactly when all three axes are zero.
pub fn visibility_windows(scales: &[[f32; 3]]) -> Vec<VisibilityWindow> {
    let mut windows = Vec::new();
    let mut open: Option<usize> = None;
    for (frame, scale) in scales.iter().enumerate() {
        let hidden = scale.iter().all(|&axis| axis == 0.0);
        match (hidden, open) {
            (false, None) => open = Some(frame),
            (true, Some(first)) => {
                windows.push(VisibilityWindow {
                    first,
                    last: frame - 1,
                });
                open = None;
            }
            _ => {}
        }
    }
    if let Some(first) = open {
        windows.push(VisibilityWindow {
            first,
            last: scales.len() - 1,
        });
    }
    windows
}

/// Convert every blinking node of one sequence to per-window nodes.
///
/// A node qualifies when its track carries all three scale channels and
/// its decoded scales are hidden on at least one frame and visible on at
/// least one other. Each window `k` becomes a new node `{name}_w{k}`
/// under the same parent, holding a raw track whose values match the
/// original inside the window and zero all scales outside it. The
/// original track is removed; the original node stays as the untracked
/// parent anchor. Returns the number of nodes added.
pub fn split_visibility_nodes(tree: &mut AnimationTree, sequence: usize) -> Result<usize> {
    let frame_count = tree
        .sequences
        .get(sequence)
        .ok_or_else(|| {
            CodecError::format(format!(
                "sequence {sequence} outside tree of {}",
                tree.sequences.len()
            ))
        })?
        .frame_count;

    struct Split {
        track_index: usize,
        node: usize,
        channels: ChannelMask,
        windows: Vec<VisibilityWindow>,
        frames: Vec<Vec<f32>>,
        scale_slots: [usize; 3],
    }

    let mut splits = Vec::new();
    for (track_index, track) in tree.sequences[sequence].tracks.iter().enumerate() {
        if track.channels.0 & ChannelMask::SCALE.0 != ChannelMask::SCALE.0 {
            continue;
        }
        let frames = decompress_track(track, &tree.tables, frame_count)?;
        let scale_slots = scale_slot_indices(track.channels);
        let scales: Vec<[f32; 3]> = frames
            .iter()
            .map(|frame| scale_slots.map(|slot| frame[slot]))
            .collect();
        let windows = visibility_windows(&scales);
        let hidden_somewhere = scales.iter().any(|s| s.iter().all(|&a| a == 0.0));
        if windows.is_empty() || !hidden_somewhere {
            continue;
        }
        splits.push(Split {
            track_index,
            node: track.node,
            channels: track.channels,
            windows,
            frames,
            scale_slots,
        });
    }

    let mut added = 0;
    for split in splits.iter().rev() {
        tree.sequences[sequence].tracks.remove(split.track_index);
        let source = tree.nodes[split.node].clone();
        for (k, window) in split.windows.iter().enumerate() {
            let mut values = Vec::with_capacity(frame_count * split.channels.count());
            for (frame, record) in split.frames.iter().enumerate() {
                let mut record = record.clone();
                if !window.contains(frame) {
                    for &slot in &split.scale_slots {
                        record[slot] = 0.0;
                    }
                }
                values.append(&mut record);
            }
            tree.nodes.push(AnimNode {
                name: format!("{}_w{k}", source.name),
                parent: Some(split.node),
                kind: source.kind,
                initial_position: source.initial_position,
            });
            tree.sequences[sequence].tracks.push(NodeTrack {
                node: tree.nodes.len() - 1,
                channels: split.channels,
                data: TrackData::Raw { values },
            });
            added += 1;
        }
    }
    Ok(added)
}

/// Record slots of the three scale channels within an enabled-channel
/// record. Caller guarantees all three scale bits are set.
fn scale_slot_indices(channels: ChannelMask) -> [usize; 3] {
    let mut slots = [0usize; 3];
    for (slot, bit) in channels.channels().enumerate() {
        if bit >= 6 {
            slots[bit - 6] = slot;
        }
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anim::{NodeKind, Sequence, SharedTables};

    #[test]
    fn test_windows_from_scales() {
        let scales = [
            [1.0, 1.0, 1.0],
            [1.0, 1.0, 1.0],
            [0.0, 0.0, 0.0],
            [2.0, 2.0, 2.0],
            [2.0, 2.0, 2.0],
        ];
        let windows = visibility_windows(&scales);
        assert_eq!(
            windows,
            vec![
                VisibilityWindow { first: 0, last: 1 },
                VisibilityWindow { first: 3, last: 4 },
            ]
        );
        assert_eq!(windows[0].len(), 2);
        assert!(windows[1].contains(4));
        assert!(!windows[1].contains(2));
    }

    #[test]
    fn test_partial_zero_scale_stays_visible() {
        let windows = visibility_windows(&[[0.0, 1.0, 0.0], [0.0, 0.0, 0.0]]);
        assert_eq!(windows, vec![VisibilityWindow { first: 0, last: 0 }]);
    }

    #[test]
    fn test_all_hidden_yields_no_windows() {
        assert!(visibility_windows(&[[0.0; 3]; 4]).is_empty());
    }

    fn blinking_tree() -> AnimationTree {
        AnimationTree {
            nodes: vec![AnimNode {
                name: "prop".into(),
                parent: None,
                kind: NodeKind::Object,
                initial_position: [0.0; 3],
            }],
            tables: SharedTables::default(),
            sequences: vec![Sequence {
                frame_count: 5,
                has_initial_frame: false,
                tracks: vec![NodeTrack {
                    node: 0,
                    channels: ChannelMask::SCALE,
                    data: TrackData::Raw {
                        values: vec![
                            1.0, 1.0, 1.0, //
                            1.0, 1.0, 1.0, //
                            0.0, 0.0, 0.0, //
                            2.0, 2.0, 2.0, //
                            2.0, 2.0, 2.0,
                        ],
                    },
                }],
            }],
        }
    }

    #[test]
    fn test_split_creates_window_nodes() {
        let mut tree = blinking_tree();
        let added = split_visibility_nodes(&mut tree, 0).unwrap();
        assert_eq!(added, 2);
        assert_eq!(tree.nodes.len(), 3);
        assert_eq!(tree.nodes[1].name, "prop_w0");
        assert_eq!(tree.nodes[2].name, "prop_w1");
        assert_eq!(tree.nodes[1].parent, Some(0));

        // Original track is gone; each window track zeroes outside its span.
        assert_eq!(tree.sequences[0].tracks.len(), 2);
        let w0 = decompress_track(&tree.sequences[0].tracks[0], &tree.tables, 5).unwrap();
        assert_eq!(w0[0], vec![1.0, 1.0, 1.0]);
        assert_eq!(w0[3], vec![0.0, 0.0, 0.0]);
        let w1 = decompress_track(&tree.sequences[0].tracks[1], &tree.tables, 5).unwrap();
        assert_eq!(w1[0], vec![0.0, 0.0, 0.0]);
        assert_eq!(w1[4], vec![2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_always_visible_node_untouched() {
        let mut tree = blinking_tree();
        if let TrackData::Raw { values } = &mut tree.sequences[0].tracks[0].data {
            values[6] = 1.0;
        }
        let added = split_visibility_nodes(&mut tree, 0).unwrap();
        assert_eq!(added, 0);
        assert_eq!(tree.nodes.len(), 1);
        assert_eq!(tree.sequences[0].tracks.len(), 1);
    }
}

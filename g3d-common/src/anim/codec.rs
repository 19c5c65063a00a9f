//! Animation tree payload serialization and track decompression.
//!
//! # Payload layout (little-endian)
//! ```text
//! 0x00: node_count u16
//! 0x02: sequence_count u16
//! 0x04: angle table    (count u16 + count * f32)
//!       position table (count u16 + count * f32)
//!       scale table    (count u16 + count * f32)
//! nodes * node_count:
//!       name NUL-terminated, parent i16 (-1 = root), kind u8, pad u8,
//!       initial_position 3 * f32
//! sequences * sequence_count:
//!       frame_count u16, flags u8 (bit 0 = raw initial frame), pad u8,
//!       track_count u16, pad u16
//!       per track: node u16, channels u16, form u8 (0 raw, 1 compressed),
//!       pad u8, then the frame data:
//!         raw:        frame_count * channel_count * f32
//!         compressed: explicit bitfield (frame_count bits, byte-rounded,
//!                     padded to 4), initial frame floats when the
//!                     sequence flag says so, explicit_count *
//!                     channel_count index bytes, 4-byte aligned
//! ```

use super::{
    AnimNode, ChannelMask, ChannelTable, NodeKind, NodeTrack, Sequence, SharedTables, TrackData,
};
use crate::error::{CodecError, Result};
use crate::io::{ByteReader, ByteWriter};

/// A complete animation tree: nodes, shared tables, sequences.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationTree {
    pub nodes: Vec<AnimNode>,
    pub tables: SharedTables,
    pub sequences: Vec<Sequence>,
}

/// Bitfield byte length for `frames` flags: bit per frame, byte-rounded,
/// padded to a 4-byte multiple.
pub(crate) fn bitfield_len(frames: usize) -> usize {
    frames.div_ceil(8).div_ceil(4) * 4
}

impl AnimationTree {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.write_u16(self.nodes.len() as u16);
        w.write_u16(self.sequences.len() as u16);
        for table in [
            &self.tables.angles,
            &self.tables.positions,
            &self.tables.scales,
        ] {
            w.write_u16(table.len() as u16);
            for &v in table.iter() {
                w.write_f32(v);
            }
        }
        for node in &self.nodes {
            w.write_cstring(&node.name);
            w.write_i16(node.parent.map_or(-1, |p| p as i16));
            w.write_u8(node.kind as u8);
            w.write_u8(0);
            for c in node.initial_position {
                w.write_f32(c);
            }
        }
        for seq in &self.sequences {
            w.write_u16(seq.frame_count as u16);
            w.write_u8(seq.has_initial_frame as u8);
            w.write_u8(0);
            w.write_u16(seq.tracks.len() as u16);
            w.write_u16(0);
            for track in &seq.tracks {
                write_track(&mut w, track, seq.frame_count);
            }
        }
        w.into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<AnimationTree> {
        let mut r = ByteReader::new(bytes);
        let node_count = r.read_u16()? as usize;
        let sequence_count = r.read_u16()? as usize;

        let mut tables = SharedTables::default();
        for table in [
            &mut tables.angles,
            &mut tables.positions,
            &mut tables.scales,
        ] {
            let count = r.read_u16()? as usize;
            table.reserve(count);
            for _ in 0..count {
                table.push(r.read_f32()?);
            }
        }

        let mut nodes = Vec::with_capacity(node_count);
        for index in 0..node_count {
            let name = r.read_cstring()?;
            let parent = match r.read_i16()? {
                -1 => None,
                p if (0..index as i16).contains(&p) => Some(p as usize),
                p => {
                    return Err(CodecError::format(format!(
                        "node {index} has out-of-order parent {p}"
                    )));
                }
            };
            let kind = NodeKind::from_u8(r.read_u8()?)?;
            let _pad = r.read_u8()?;
            let mut initial_position = [0.0f32; 3];
            for c in &mut initial_position {
                *c = r.read_f32()?;
            }
            nodes.push(AnimNode {
                name,
                parent,
                kind,
                initial_position,
            });
        }

        let mut sequences = Vec::with_capacity(sequence_count);
        for _ in 0..sequence_count {
            let frame_count = r.read_u16()? as usize;
            let has_initial_frame = r.read_u8()? & 1 != 0;
            let _pad = r.read_u8()?;
            let track_count = r.read_u16()? as usize;
            let _pad = r.read_u16()?;
            let mut tracks = Vec::with_capacity(track_count);
            for _ in 0..track_count {
                tracks.push(read_track(
                    &mut r,
                    frame_count,
                    has_initial_frame,
                    node_count,
                )?);
            }
            sequences.push(Sequence {
                frame_count,
                has_initial_frame,
                tracks,
            });
        }
        Ok(AnimationTree {
            nodes,
            tables,
            sequences,
        })
    }
}

fn write_track(w: &mut ByteWriter, track: &NodeTrack, frame_count: usize) {
    w.write_u16(track.node as u16);
    w.write_u16(track.channels.0);
    match &track.data {
        TrackData::Raw { values } => {
            w.write_u8(0);
            w.write_u8(0);
            for &v in values {
                w.write_f32(v);
            }
        }
        TrackData::Compressed {
            explicit,
            initial,
            indices,
        } => {
            w.write_u8(1);
            w.write_u8(0);
            let mut bits = vec![0u8; bitfield_len(frame_count)];
            for (f, &e) in explicit.iter().enumerate() {
                if e {
                    bits[f / 8] |= 1 << (f % 8);
                }
            }
            w.write_bytes(&bits);
            if let Some(initial) = initial {
                for &v in initial {
                    w.write_f32(v);
                }
            }
            w.write_bytes(indices);
            w.align4();
        }
    }
}

fn read_track(
    r: &mut ByteReader<'_>,
    frame_count: usize,
    has_initial_frame: bool,
    node_count: usize,
) -> Result<NodeTrack> {
    let node = r.read_u16()? as usize;
    if node >= node_count {
        return Err(CodecError::format(format!(
            "track references node {node} of {node_count}"
        )));
    }
    let channels = ChannelMask(r.read_u16()?);
    let form = r.read_u8()?;
    let _pad = r.read_u8()?;
    let stride = channels.count();

    let data = match form {
        0 => {
            let mut values = Vec::with_capacity(frame_count * stride);
            for _ in 0..frame_count * stride {
                values.push(r.read_f32()?);
            }
            TrackData::Raw { values }
        }
        1 => {
            let bits = r.read_bytes(bitfield_len(frame_count))?;
            let explicit: Vec<bool> = (0..frame_count)
                .map(|f| bits[f / 8] & (1 << (f % 8)) != 0)
                .collect();
            let initial = if has_initial_frame {
                let mut vals = Vec::with_capacity(stride);
                for _ in 0..stride {
                    vals.push(r.read_f32()?);
                }
                Some(vals)
            } else {
                None
            };
            let explicit_count = explicit.iter().filter(|&&e| e).count();
            let indices = r.read_bytes(explicit_count * stride)?.to_vec();
            r.align4()?;
            TrackData::Compressed {
                explicit,
                initial,
                indices,
            }
        }
        other => {
            return Err(CodecError::format(format!("unknown track form {other}")));
        }
    };
    Ok(NodeTrack {
        node,
        channels,
        data,
    })
}

/// Expand one track to per-frame channel values (one `Vec<f32>` of enabled
/// channel values per frame, in channel-bit order).
///
/// Compressed tracks dereference each index through the owning shared
/// table; frames without explicit data interpolate linearly between their
/// nearest explicit neighbors, holding at both ends.
pub fn decompress_track(
    track: &NodeTrack,
    tables: &SharedTables,
    frame_count: usize,
) -> Result<Vec<Vec<f32>>> {
    let stride = track.channels.count();
    match &track.data {
        TrackData::Raw { values } => {
            if values.len() != frame_count * stride {
                return Err(CodecError::format(format!(
                    "raw track holds {} values, expected {}",
                    values.len(),
                    frame_count * stride
                )));
            }
            Ok(values.chunks_exact(stride).map(<[f32]>::to_vec).collect())
        }
        TrackData::Compressed {
            explicit,
            initial,
            indices,
        } => {
            if explicit.len() != frame_count {
                return Err(CodecError::format("explicit bitfield length mismatch"));
            }
            let mut known: Vec<Option<Vec<f32>>> = vec![None; frame_count];
            if let Some(initial) = initial {
                if initial.len() != stride {
                    return Err(CodecError::format("initial frame stride mismatch"));
                }
                known[0] = Some(initial.clone());
            }
            let mut cursor = 0usize;
            for (f, &e) in explicit.iter().enumerate() {
                if !e {
                    continue;
                }
                let record = indices.get(cursor..cursor + stride).ok_or_else(|| {
                    CodecError::truncated(cursor + stride, indices.len())
                })?;
                cursor += stride;
                let mut values = Vec::with_capacity(stride);
                for (slot, bit) in track.channels.channels().enumerate() {
                    let table = tables.table(ChannelMask::table_for(bit));
                    let index = record[slot] as usize;
                    let value = *table.get(index).ok_or_else(|| {
                        CodecError::format(format!(
                            "index {index} outside shared table of {}",
                            table.len()
                        ))
                    })?;
                    values.push(value);
                }
                known[f] = Some(values);
            }
            interpolate_gaps(known, stride)
        }
    }
}

fn interpolate_gaps(known: Vec<Option<Vec<f32>>>, stride: usize) -> Result<Vec<Vec<f32>>> {
    let anchors: Vec<usize> = known
        .iter()
        .enumerate()
        .filter_map(|(f, v)| v.as_ref().map(|_| f))
        .collect();
    if anchors.is_empty() {
        return Err(CodecError::format("compressed track has no explicit frames"));
    }
    let mut out = Vec::with_capacity(known.len());
    for f in 0..known.len() {
        if let Some(values) = &known[f] {
            out.push(values.clone());
            continue;
        }
        let next = anchors.iter().find(|&&a| a > f);
        let prev = anchors.iter().rev().find(|&&a| a < f);
        let values = match (prev, next) {
            (Some(&p), Some(&n)) => {
                let t = (f - p) as f32 / (n - p) as f32;
                let a = known[p].as_ref().map(Vec::as_slice).unwrap_or(&[]);
                let b = known[n].as_ref().map(Vec::as_slice).unwrap_or(&[]);
                (0..stride).map(|c| a[c] + (b[c] - a[c]) * t).collect()
            }
            (Some(&p), None) => known[p].clone().unwrap_or_default(),
            (None, Some(&n)) => known[n].clone().unwrap_or_default(),
            (None, None) => unreachable!("anchors checked non-empty"),
        };
        out.push(values);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple_tree() -> AnimationTree {
        let mut tables = SharedTables::default();
        let a0 = tables.intern(ChannelTable::Angles, 0.0).unwrap();
        let a1 = tables.intern(ChannelTable::Angles, 1.0).unwrap();
        AnimationTree {
            nodes: vec![
                AnimNode {
                    name: "root".into(),
                    parent: None,
                    kind: NodeKind::Null,
                    initial_position: [0.0; 3],
                },
                AnimNode {
                    name: "arm".into(),
                    parent: Some(0),
                    kind: NodeKind::Skeletal,
                    initial_position: [0.0, 1.0, 0.0],
                },
            ],
            tables,
            sequences: vec![Sequence {
                frame_count: 5,
                has_initial_frame: false,
                tracks: vec![NodeTrack {
                    node: 1,
                    channels: ChannelMask::ROTATION,
                    data: TrackData::Compressed {
                        explicit: vec![true, false, false, false, true],
                        initial: None,
                        indices: vec![a0, a0, a0, a1, a1, a1],
                    },
                }],
            }],
        }
    }

    #[test]
    fn test_bitfield_padding() {
        assert_eq!(bitfield_len(1), 4);
        assert_eq!(bitfield_len(32), 4);
        assert_eq!(bitfield_len(33), 8);
        assert_eq!(bitfield_len(64), 8);
    }

    #[test]
    fn test_payload_round_trip() {
        let tree = simple_tree();
        let parsed = AnimationTree::from_bytes(&tree.to_bytes()).unwrap();
        assert_eq!(parsed, tree);
    }

    #[test]
    fn test_interpolation_between_explicit_frames() {
        let tree = simple_tree();
        let frames =
            decompress_track(&tree.sequences[0].tracks[0], &tree.tables, 5).unwrap();
        assert_eq!(frames[0], vec![0.0, 0.0, 0.0]);
        assert_eq!(frames[4], vec![1.0, 1.0, 1.0]);
        assert_eq!(frames[2], vec![0.5, 0.5, 0.5]);
        assert_eq!(frames[1], vec![0.25, 0.25, 0.25]);
    }

    #[test]
    fn test_edges_hold_nearest_explicit() {
        let mut tree = simple_tree();
        if let TrackData::Compressed { explicit, .. } =
            &mut tree.sequences[0].tracks[0].data
        {
            *explicit = vec![false, true, false, true, false];
        }
        let frames =
            decompress_track(&tree.sequences[0].tracks[0], &tree.tables, 5).unwrap();
        assert_eq!(frames[0], frames[1]);
        assert_eq!(frames[4], frames[3]);
    }

    #[test]
    fn test_initial_frame_supplies_frame_zero() {
        let mut tables = SharedTables::default();
        let a1 = tables.intern(ChannelTable::Positions, 4.0).unwrap();
        let track = NodeTrack {
            node: 0,
            channels: ChannelMask(0b000_001_000),
            data: TrackData::Compressed {
                explicit: vec![false, false, true],
                initial: Some(vec![2.0]),
                indices: vec![a1],
            },
        };
        let frames = decompress_track(&track, &tables, 3).unwrap();
        assert_eq!(frames[0], vec![2.0]);
        assert_eq!(frames[1], vec![3.0]);
        assert_eq!(frames[2], vec![4.0]);
    }

    #[test]
    fn test_raw_track_pass_through() {
        let track = NodeTrack {
            node: 0,
            channels: ChannelMask(0b000_000_011),
            data: TrackData::Raw {
                values: vec![1.0, 2.0, 3.0, 4.0],
            },
        };
        let frames = decompress_track(&track, &SharedTables::default(), 2).unwrap();
        assert_eq!(frames, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    }

    #[test]
    fn test_bad_table_index_rejected() {
        let track = NodeTrack {
            node: 0,
            channels: ChannelMask(0b000_000_001),
            data: TrackData::Compressed {
                explicit: vec![true],
                initial: None,
                indices: vec![9],
            },
        };
        assert!(decompress_track(&track, &SharedTables::default(), 1).is_err());
    }

    #[test]
    fn test_truncated_payload_is_error() {
        let bytes = simple_tree().to_bytes();
        assert!(AnimationTree::from_bytes(&bytes[..bytes.len() - 3]).is_err());
    }
}

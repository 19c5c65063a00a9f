//! Editable animation document (TOML) to animation tree and back.
//!
//! The document is the frame-explicit editable form: every track lists
//! one row of floats per frame. Compilation interns values into the
//! tree's shared tables and falls back to raw tracks when a table would
//! overflow; decompilation decompresses every track back to full rows.

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};

use g3d_common::anim::{
    AnimNode, AnimationTree, ChannelMask, ChannelTable, NodeKind, NodeTrack, Sequence,
    SharedTables, TrackData, decompress_track, reduce_tables,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct AnimDoc {
    #[serde(rename = "node")]
    pub nodes: Vec<NodeDoc>,
    #[serde(rename = "sequence")]
    pub sequences: Vec<SequenceDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NodeDoc {
    pub name: String,
    /// Parent node name; absent for roots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub position: [f32; 3],
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SequenceDoc {
    pub frames: usize,
    #[serde(rename = "track")]
    pub tracks: Vec<TrackDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrackDoc {
    pub node: String,
    /// Channel names among rx ry rz px py pz sx sy sz, in bit order.
    pub channels: Vec<String>,
    /// One row of channel values per frame.
    pub frames: Vec<Vec<f32>>,
}

fn default_kind() -> String {
    "skeletal".into()
}

const CHANNEL_NAMES: [&str; 9] = ["rx", "ry", "rz", "px", "py", "pz", "sx", "sy", "sz"];

fn channel_mask(names: &[String]) -> Result<ChannelMask> {
    let mut mask = ChannelMask::default();
    for name in names {
        let bit = CHANNEL_NAMES
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| anyhow!("unknown channel {name:?}"))?;
        if mask.contains(bit) {
            bail!("duplicate channel {name:?}");
        }
        mask.0 |= 1 << bit;
    }
    Ok(mask)
}

fn kind_from_name(name: &str) -> Result<NodeKind> {
    Ok(match name {
        "null" => NodeKind::Null,
        "skeletal" => NodeKind::Skeletal,
        "object" => NodeKind::Object,
        "texture" => NodeKind::Texture,
        "particle-system" => NodeKind::ParticleSystem,
        other => bail!("unknown node kind {other:?}"),
    })
}

fn kind_name(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Null => "null",
        NodeKind::Skeletal => "skeletal",
        NodeKind::Object => "object",
        NodeKind::Texture => "texture",
        NodeKind::ParticleSystem => "particle-system",
    }
}

impl AnimDoc {
    pub fn parse(text: &str) -> Result<AnimDoc> {
        toml::from_str(text).context("failed to parse animation document")
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize animation document")
    }

    /// Build the compiled tree. Track values intern into the shared
    /// tables with every frame explicit; a track whose values overflow a
    /// 256-entry table stays raw.
    pub fn compile(&self) -> Result<AnimationTree> {
        let mut nodes = Vec::with_capacity(self.nodes.len());
        for doc in &self.nodes {
            let parent = match &doc.parent {
                None => None,
                Some(name) => {
                    let index = nodes
                        .iter()
                        .position(|n: &AnimNode| n.name == *name)
                        .ok_or_else(|| {
                            anyhow!("node {:?} declared before its parent {name:?}", doc.name)
                        })?;
                    Some(index)
                }
            };
            nodes.push(AnimNode {
                name: doc.name.clone(),
                parent,
                kind: kind_from_name(&doc.kind)?,
                initial_position: doc.position,
            });
        }

        let mut tables = SharedTables::default();
        let mut sequences = Vec::with_capacity(self.sequences.len());
        for seq_doc in &self.sequences {
            let mut tracks = Vec::with_capacity(seq_doc.tracks.len());
            for track_doc in &seq_doc.tracks {
                let node = nodes
                    .iter()
                    .position(|n| n.name == track_doc.node)
                    .ok_or_else(|| anyhow!("track references unknown node {:?}", track_doc.node))?;
                let channels = channel_mask(&track_doc.channels)?;
                let stride = channels.count();
                if track_doc.frames.len() != seq_doc.frames {
                    bail!(
                        "track on {:?} has {} rows for a {}-frame sequence",
                        track_doc.node,
                        track_doc.frames.len(),
                        seq_doc.frames
                    );
                }
                for row in &track_doc.frames {
                    if row.len() != stride {
                        bail!(
                            "track on {:?} has a row of {} values, expected {stride}",
                            track_doc.node,
                            row.len()
                        );
                    }
                }
                tracks.push(NodeTrack {
                    node,
                    channels,
                    data: compress_values(&mut tables, channels, &track_doc.frames),
                });
            }
            sequences.push(Sequence {
                frame_count: seq_doc.frames,
                has_initial_frame: false,
                tracks,
            });
        }

        let mut tree = AnimationTree {
            nodes,
            tables,
            sequences,
        };
        reduce_tables(&mut tree)?;
        Ok(tree)
    }

    /// Frame-explicit editable form of a compiled tree.
    pub fn decompile(tree: &AnimationTree) -> Result<AnimDoc> {
        let nodes = tree
            .nodes
            .iter()
            .map(|n| NodeDoc {
                name: n.name.clone(),
                parent: n.parent.map(|p| tree.nodes[p].name.clone()),
                kind: kind_name(n.kind).to_owned(),
                position: n.initial_position,
            })
            .collect();
        let mut sequences = Vec::with_capacity(tree.sequences.len());
        for seq in &tree.sequences {
            let mut tracks = Vec::with_capacity(seq.tracks.len());
            for track in &seq.tracks {
                let frames = decompress_track(track, &tree.tables, seq.frame_count)?;
                let channels = track
                    .channels
                    .channels()
                    .map(|bit| CHANNEL_NAMES[bit].to_owned())
                    .collect();
                tracks.push(TrackDoc {
                    node: tree.nodes[track.node].name.clone(),
                    channels,
                    frames,
                });
            }
            sequences.push(SequenceDoc {
                frames: seq.frame_count,
                tracks,
            });
        }
        Ok(AnimDoc { nodes, sequences })
    }
}

/// Intern every value of a frame-explicit track. Falls back to the raw
/// form when a shared table fills up.
fn compress_values(
    tables: &mut SharedTables,
    channels: ChannelMask,
    rows: &[Vec<f32>],
) -> TrackData {
    let checkpoint = tables.clone();
    let mut indices = Vec::with_capacity(rows.len() * channels.count());
    for row in rows {
        for (slot, bit) in channels.channels().enumerate() {
            match tables.intern(ChannelMask::table_for(bit), row[slot]) {
                Ok(index) => indices.push(index),
                Err(_) => {
                    *tables = checkpoint;
                    return TrackData::Raw {
                        values: rows.iter().flatten().copied().collect(),
                    };
                }
            }
        }
    }
    TrackData::Compressed {
        explicit: vec![true; rows.len()],
        initial: None,
        indices,
    }
}

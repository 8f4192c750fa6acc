// Typed tracks and non-overlapping segment placement.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::DraftError;
use crate::segment::{new_segment_id, Segment};
use crate::time::{TimeRange, SEC};

/// Auto placement never extends a segment past this point unless configured.
pub const DEFAULT_PLACEMENT_CEILING: u64 = 5 * 60 * SEC;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
    Text,
    Filter,
    Effect,
}

impl TrackKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Text => "text",
            Self::Filter => "filter",
            Self::Effect => "effect",
        }
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a new segment should go on its track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Exactly this range; rejected if it collides.
    At(TimeRange),
    /// The earliest free slot of `duration` starting at or after `earliest`.
    After { earliest: u64, duration: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TrackKind,
    pub name: String,
    pub relative_index: i32,
    pub segments: Vec<Segment>,
}

impl Track {
    pub fn new(kind: TrackKind, name: impl Into<String>, relative_index: i32) -> Self {
        Self {
            id: new_segment_id(),
            kind,
            name: name.into(),
            relative_index,
            segments: Vec::new(),
        }
    }

    /// Resolve a placement against the current segments without mutating
    /// the track.
    pub fn resolve(&self, placement: Placement, ceiling: u64) -> Result<TimeRange, DraftError> {
        match placement {
            Placement::At(requested) => {
                if let Some(existing) = self.collision(&requested) {
                    return Err(DraftError::OverlappingSegment { requested, existing });
                }
                Ok(requested)
            }
            Placement::After { earliest, duration } => {
                let mut candidate = TimeRange::new(earliest, duration);
                let mut occupied: Vec<TimeRange> =
                    self.segments.iter().map(|segment| segment.target_range).collect();
                occupied.sort();
                for range in occupied {
                    if candidate.overlaps(&range) {
                        candidate = candidate.at(range.end());
                    }
                }
                if candidate.end() > ceiling {
                    return Err(DraftError::PlacementExhausted { duration, ceiling });
                }
                Ok(candidate)
            }
        }
    }

    /// Place `segment` at the resolved range, keeping segments ordered by
    /// start. Returns the stored segment so callers can attach refs.
    pub fn place(
        &mut self,
        mut segment: Segment,
        placement: Placement,
        ceiling: u64,
    ) -> Result<&mut Segment, DraftError> {
        segment.target_range = self.resolve(placement, ceiling)?;
        debug!(
            track = %self.name,
            kind = %self.kind,
            range = %segment.target_range,
            "segment placed"
        );
        let position =
            self.segments.partition_point(|existing| existing.target_range <= segment.target_range);
        self.segments.insert(position, segment);
        Ok(&mut self.segments[position])
    }

    pub fn segment_mut(&mut self, segment_id: &str) -> Option<&mut Segment> {
        self.segments.iter_mut().find(|segment| segment.id == segment_id)
    }

    /// Target end of the last segment; 0 when empty.
    pub fn end(&self) -> u64 {
        self.segments.iter().map(|segment| segment.target_range.end()).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    fn collision(&self, requested: &TimeRange) -> Option<TimeRange> {
        self.segments
            .iter()
            .map(|segment| segment.target_range)
            .find(|existing| existing.overlaps(requested))
    }
}

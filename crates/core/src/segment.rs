// Segments: one material placed on one track, plus its format-specific fields.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::time::TimeRange;

/// Lower-case simple UUID, the id format the editor uses for segments and tracks.
pub fn new_segment_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: String,
    pub material_id: String,
    #[serde(rename = "target_timerange")]
    pub target_range: TimeRange,
    #[serde(rename = "source_timerange", default, skip_serializing_if = "Option::is_none")]
    pub source_range: Option<TimeRange>,
    #[serde(rename = "extra_material_refs", default)]
    pub extra_refs: Vec<String>,
    pub volume: f64,
    pub speed: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip: Option<Clip>,
    #[serde(flatten)]
    pub compat: SegmentCompat,
}

impl Segment {
    /// A segment with default volume/speed; the owning track sets
    /// `target_range` when it places the segment.
    pub fn new(material_id: impl Into<String>, compat: SegmentCompat) -> Self {
        Self {
            id: new_segment_id(),
            material_id: material_id.into(),
            target_range: TimeRange::new(0, 0),
            source_range: None,
            extra_refs: Vec::new(),
            volume: 1.0,
            speed: 1.0,
            clip: None,
            compat,
        }
    }

    pub fn with_source(mut self, source: TimeRange) -> Self {
        self.source_range = Some(source);
        self
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_clip(mut self, clip: Clip) -> Self {
        self.clip = Some(clip);
        self
    }

    /// The trimmed source span; the target range when no trim was given.
    pub fn source_range(&self) -> TimeRange {
        self.source_range.unwrap_or(self.target_range)
    }

    /// Append an auxiliary material reference. Duplicates are ignored.
    pub fn attach(&mut self, material_id: impl Into<String>) {
        let material_id = material_id.into();
        if !self.extra_refs.contains(&material_id) {
            self.extra_refs.push(material_id);
        }
    }

    /// Every material id this segment depends on, primary first.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.material_id.as_str()).chain(self.extra_refs.iter().map(String::as_str))
    }
}

/// Screen placement for visual segments. Transform is in editor units
/// where the canvas spans -1..1 on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub transform: Point,
    pub scale: Point,
    pub rotation: f64,
    pub alpha: f64,
}

impl Clip {
    pub fn at(x: f64, y: f64) -> Self {
        Self { transform: Point { x, y }, ..Self::default() }
    }
}

impl Default for Clip {
    fn default() -> Self {
        Self { transform: Point { x: 0.0, y: 0.0 }, scale: Point { x: 1.0, y: 1.0 }, rotation: 0.0, alpha: 1.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Fields whose presence depends on the document's format revision.
/// Picked once per document from its version tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SegmentCompat {
    Current(CurrentFields),
    Legacy(LegacyFields),
}

impl SegmentCompat {
    pub fn current(render_index: i64) -> Self {
        Self::Current(CurrentFields { render_index, track_render_index: 0, visible: true })
    }

    pub fn legacy() -> Self {
        Self::Legacy(LegacyFields::default())
    }

    pub fn legacy_mut(&mut self) -> Option<&mut LegacyFields> {
        match self {
            Self::Legacy(fields) => Some(fields),
            Self::Current(_) => None,
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::Legacy(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentFields {
    pub render_index: i64,
    #[serde(default)]
    pub track_render_index: i64,
    #[serde(default = "visible_default")]
    pub visible: bool,
}

fn visible_default() -> bool {
    true
}

/// Legacy consumers read animations and transitions inline on the
/// segment instead of through `extra_material_refs`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation: Option<InlineAsset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<InlineAsset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_animation: Option<TextAnimation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineAsset {
    pub id: String,
    pub name: String,
    pub resource_id: String,
    pub duration: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextAnimation {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub duration: u64,
}

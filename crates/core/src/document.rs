// The draft document: metadata, material store, and tracks.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::error::DraftError;
use crate::material::{new_material_id, MaterialKind, MaterialStore};
use crate::segment::{Segment, SegmentCompat};
use crate::track::{Placement, Track, TrackKind};

pub const CONTENT_VERSION: u64 = 360_000;
pub const CURRENT_NEW_VERSION: &str = "110.0.0";
pub const LEGACY_NEW_VERSION: &str = "52.0.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
    #[serde(default = "original_ratio")]
    pub ratio: String,
}

fn original_ratio() -> String {
    "original".to_string()
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, ratio: original_ratio() }
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionTag {
    Current,
    Legacy,
}

impl VersionTag {
    pub fn new_version(self) -> &'static str {
        match self {
            Self::Current => CURRENT_NEW_VERSION,
            Self::Legacy => LEGACY_NEW_VERSION,
        }
    }
}

/// Platform descriptor written as both `platform` and
/// `last_modified_platform`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformInfo {
    pub app_id: u32,
    pub app_source: String,
    pub app_version: String,
    pub os: String,
    pub os_version: String,
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub hard_disk_id: String,
    #[serde(default)]
    pub mac_address: String,
}

impl PlatformInfo {
    pub fn current() -> Self {
        Self {
            app_id: 3704,
            app_source: "lv".into(),
            app_version: "5.9.0".into(),
            os: "mac".into(),
            os_version: "15.4.1".into(),
            device_id: random_hex(16),
            hard_disk_id: random_hex(16),
            mac_address: random_mac(),
        }
    }

    pub fn legacy() -> Self {
        Self { app_version: "3.1.0-beta7".into(), ..Self::current() }
    }
}

pub(crate) fn random_hex(len: usize) -> String {
    let mut hex = Uuid::new_v4().simple().to_string();
    hex.truncate(len);
    hex
}

pub(crate) fn random_mac() -> String {
    let bytes = Uuid::new_v4().into_bytes();
    bytes[..6].iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(":")
}

#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub canvas: Canvas,
    pub fps: f64,
    pub version_tag: VersionTag,
    pub platform: PlatformInfo,
    pub materials: MaterialStore,
    pub tracks: Vec<Track>,
}

impl Document {
    pub fn new(canvas: Canvas, fps: f64, version_tag: VersionTag) -> Self {
        let platform = match version_tag {
            VersionTag::Current => PlatformInfo::current(),
            VersionTag::Legacy => PlatformInfo::legacy(),
        };
        Self {
            id: new_material_id(),
            canvas,
            fps,
            version_tag,
            platform,
            materials: MaterialStore::new(),
            tracks: Vec::new(),
        }
    }

    /// Max target end over every segment; 0 for an empty document.
    pub fn duration(&self) -> u64 {
        self.tracks.iter().map(Track::end).max().unwrap_or(0)
    }

    pub fn segment_count(&self) -> usize {
        self.tracks.iter().map(|track| track.segments.len()).sum()
    }

    pub fn track(&self, kind: TrackKind, name: &str) -> Result<&Track, DraftError> {
        self.tracks
            .iter()
            .find(|track| track.kind == kind && track.name == name)
            .ok_or_else(|| DraftError::TrackNotFound { kind, name: name.to_string() })
    }

    pub fn track_mut(&mut self, kind: TrackKind, name: &str) -> Result<&mut Track, DraftError> {
        self.tracks
            .iter_mut()
            .find(|track| track.kind == kind && track.name == name)
            .ok_or_else(|| DraftError::TrackNotFound { kind, name: name.to_string() })
    }

    pub fn tracks_of(&self, kind: TrackKind) -> impl Iterator<Item = &Track> {
        self.tracks.iter().filter(move |track| track.kind == kind)
    }

    /// Get the `(kind, name)` track, creating it on first use. New tracks
    /// take `relative_index`, or the next free index for their kind.
    pub fn ensure_track(
        &mut self,
        kind: TrackKind,
        name: &str,
        relative_index: Option<i32>,
    ) -> &mut Track {
        let position = match self.tracks.iter().position(|t| t.kind == kind && t.name == name) {
            Some(position) => position,
            None => {
                let index = relative_index.unwrap_or_else(|| self.next_relative_index(kind));
                self.tracks.push(Track::new(kind, name, index));
                self.tracks.len() - 1
            }
        };
        &mut self.tracks[position]
    }

    pub fn next_relative_index(&self, kind: TrackKind) -> i32 {
        self.tracks_of(kind).map(|track| track.relative_index + 1).max().unwrap_or(0)
    }

    /// Every segment whose target range covers `at`, in track order.
    pub fn segments_at(&self, at: u64) -> impl Iterator<Item = (&Track, &Segment)> {
        self.tracks.iter().flat_map(move |track| {
            track
                .segments
                .iter()
                .filter(move |segment| {
                    let range = segment.target_range;
                    range.start <= at && at < range.end()
                })
                .map(move |segment| (track, segment))
        })
    }

    /// Format-specific segment fields for a segment on the `(kind, name)` track.
    pub fn compat_for(&self, kind: TrackKind, relative_index: i32) -> SegmentCompat {
        match self.version_tag {
            VersionTag::Legacy => SegmentCompat::legacy(),
            VersionTag::Current => {
                let base = match kind {
                    TrackKind::Video | TrackKind::Audio => 0,
                    TrackKind::Effect => 10_000,
                    TrackKind::Filter => 11_000,
                    TrackKind::Text => 14_000,
                };
                SegmentCompat::current(base + i64::from(relative_index))
            }
        }
    }

    /// Place a segment on an existing track after checking that every id
    /// it references resolves.
    pub fn add_segment(
        &mut self,
        kind: TrackKind,
        name: &str,
        segment: Segment,
        placement: Placement,
        ceiling: u64,
    ) -> Result<&mut Segment, DraftError> {
        if let Some(missing) = segment.references().find(|id| !self.materials.resolves(id)) {
            return Err(DraftError::MaterialNotFound(missing.to_string()));
        }
        self.track_mut(kind, name)?.place(segment, placement, ceiling)
    }

    /// Append a material reference to an already placed segment. Returns
    /// false when the track holds no segment with that id.
    pub fn attach(
        &mut self,
        kind: TrackKind,
        name: &str,
        segment_id: &str,
        material_id: &str,
    ) -> Result<bool, DraftError> {
        if !self.materials.resolves(material_id) {
            return Err(DraftError::MaterialNotFound(material_id.to_string()));
        }
        let Some(segment) = self.track_mut(kind, name)?.segment_mut(segment_id) else {
            return Ok(false);
        };
        segment.attach(material_id);
        Ok(true)
    }

    /// The document as the editor's content tree. Materials reserved for
    /// pending hand-off are not part of it.
    pub fn to_value(&self) -> Result<Value, DraftError> {
        let encode = |err: serde_json::Error| DraftError::SchemaMergeFailure(err.to_string());

        let mut materials = Map::new();
        for kind in MaterialKind::ALL {
            let list = self
                .materials
                .of_kind(kind)
                .map(serde_json::to_value)
                .collect::<Result<Vec<_>, _>>()
                .map_err(encode)?;
            materials.insert(kind.collection().to_string(), Value::Array(list));
        }

        let platform = serde_json::to_value(&self.platform).map_err(encode)?;
        Ok(json!({
            "id": self.id,
            "version": CONTENT_VERSION,
            "new_version": self.version_tag.new_version(),
            "canvas_config": serde_json::to_value(&self.canvas).map_err(encode)?,
            "fps": self.fps,
            "duration": self.duration(),
            "platform": platform.clone(),
            "last_modified_platform": platform,
            "materials": materials,
            "tracks": serde_json::to_value(&self.tracks).map_err(encode)?,
        }))
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new(Canvas::default(), 30.0, VersionTag::Current)
    }
}

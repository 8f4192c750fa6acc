// Material records and the append-only, id-keyed material store.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::DraftError;

/// Upper-case hyphenated UUID, the id format the editor uses for materials.
pub fn new_material_id() -> String {
    Uuid::new_v4().to_string().to_uppercase()
}

/// A material as stored and serialized: `{"id": .., "type": .., ...payload}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub payload: MaterialPayload,
}

impl Material {
    /// A material without an id; the store assigns one on insert.
    pub fn new(payload: MaterialPayload) -> Self {
        Self { id: String::new(), payload }
    }

    pub fn with_id(id: impl Into<String>, payload: MaterialPayload) -> Self {
        Self { id: id.into(), payload }
    }

    pub fn kind(&self) -> MaterialKind {
        self.payload.kind()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MaterialPayload {
    #[serde(rename = "video")]
    Video(MediaSource),
    /// Still image; shares the `videos` collection with clips.
    #[serde(rename = "photo")]
    Photo(MediaSource),
    #[serde(rename = "extract_music")]
    Audio(MediaSource),
    #[serde(rename = "text")]
    TextStyle(TextMaterial),
    #[serde(rename = "filter")]
    Filter(AssetMaterial),
    #[serde(rename = "effect")]
    Effect(AssetMaterial),
    #[serde(rename = "video_effect")]
    VideoEffect(AssetMaterial),
    #[serde(rename = "transition")]
    Transition(AssetMaterial),
    #[serde(rename = "sticker_animation")]
    Animation(AnimationSet),
    #[serde(rename = "audio_fade")]
    Fade(FadeMaterial),
    /// Caption bubble; stored with the other `effects`.
    #[serde(rename = "text_shape")]
    TextShape(AssetMaterial),
    #[serde(rename = "text_effect")]
    TextEffect(AssetMaterial),
}

impl MaterialPayload {
    pub fn kind(&self) -> MaterialKind {
        match self {
            Self::Video(_) | Self::Photo(_) => MaterialKind::Video,
            Self::Audio(_) => MaterialKind::Audio,
            Self::TextStyle(_) => MaterialKind::TextStyle,
            Self::Filter(_) => MaterialKind::Filter,
            Self::Effect(_) | Self::TextShape(_) | Self::TextEffect(_) => MaterialKind::Effect,
            Self::VideoEffect(_) => MaterialKind::VideoEffect,
            Self::Transition(_) => MaterialKind::Transition,
            Self::Animation(_) => MaterialKind::Animation,
            Self::Fade(_) => MaterialKind::Fade,
        }
    }
}

/// Video or audio file backing a segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSource {
    pub path: String,
    pub material_name: String,
    /// Probed duration in microseconds; 0 when unknown.
    #[serde(default)]
    pub duration: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextMaterial {
    pub content: String,
    pub font: String,
    pub style: TextStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub size: f64,
    /// RGB, each channel in 0..=1.
    pub color: [f64; 3],
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub alpha: f64,
    /// 0 left, 1 center, 2 right.
    pub align: u8,
    pub vertical: bool,
    pub letter_spacing: f64,
    pub line_spacing: f64,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            size: 36.0,
            color: [1.0, 1.0, 1.0],
            bold: false,
            italic: false,
            underline: false,
            alpha: 1.0,
            align: 1,
            vertical: false,
            letter_spacing: 0.0,
            line_spacing: 0.02,
        }
    }
}

/// A catalog-backed material: filter, effect, transition, text bubble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetMaterial {
    pub name: String,
    pub resource_id: String,
    pub effect_id: String,
    /// Transition overlap or effect length in microseconds, when meaningful.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    /// Filter intensity, 0..=1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub adjust_params: Vec<AdjustParam>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustParam {
    pub name: String,
    pub value: f64,
}

impl AdjustParam {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self { name: name.into(), value }
    }
}

/// Intro/outro/loop animations attached to one segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimationSet {
    pub animations: Vec<Animation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Animation {
    pub name: String,
    /// "in", "out" or "loop".
    #[serde(rename = "type")]
    pub kind: String,
    pub resource_id: String,
    pub effect_id: String,
    /// Offset from segment start, microseconds.
    pub start: u64,
    pub duration: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FadeMaterial {
    pub fade_in_duration: u64,
    pub fade_out_duration: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MaterialKind {
    Video,
    Audio,
    TextStyle,
    Filter,
    Effect,
    VideoEffect,
    Transition,
    Animation,
    Fade,
}

impl MaterialKind {
    pub const ALL: [MaterialKind; 9] = [
        MaterialKind::Video,
        MaterialKind::Audio,
        MaterialKind::TextStyle,
        MaterialKind::Filter,
        MaterialKind::Effect,
        MaterialKind::VideoEffect,
        MaterialKind::Transition,
        MaterialKind::Animation,
        MaterialKind::Fade,
    ];

    /// Name of the collection under `materials` holding this kind.
    pub fn collection(self) -> &'static str {
        match self {
            Self::Video => "videos",
            Self::Audio => "audios",
            Self::TextStyle => "texts",
            Self::Filter => "filters",
            Self::Effect => "effects",
            Self::VideoEffect => "video_effects",
            Self::Transition => "transitions",
            Self::Animation => "material_animations",
            Self::Fade => "audio_fades",
        }
    }

    pub fn from_collection(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.collection() == name)
    }
}

impl fmt::Display for MaterialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

// ── Store ──────────────────────────────────────────────────────────

/// Append-only material store. Ids are unique for the store's lifetime,
/// including ids reserved for materials handed off as pending.
#[derive(Debug, Clone, Default)]
pub struct MaterialStore {
    materials: Vec<Material>,
    index: HashMap<String, usize>,
    reserved: HashSet<String>,
}

impl MaterialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a material, generating an id if it has none. Returns the id.
    pub fn insert(&mut self, material: Material) -> Result<String, DraftError> {
        self.insert_generated(material, new_material_id)
    }

    fn insert_generated(
        &mut self,
        mut material: Material,
        mut next_id: impl FnMut() -> String,
    ) -> Result<String, DraftError> {
        material.id = self.claim_id(std::mem::take(&mut material.id), &mut next_id)?;
        let id = material.id.clone();
        debug!(id = %id, kind = %material.kind(), "material inserted");
        self.index.insert(id.clone(), self.materials.len());
        self.materials.push(material);
        Ok(id)
    }

    /// Reserve an id for a material that will live outside this store
    /// (a pending secondary material) and return it with the id set.
    pub fn defer(&mut self, mut material: Material) -> Result<Material, DraftError> {
        material.id = self.claim_id(std::mem::take(&mut material.id), &mut new_material_id)?;
        self.reserved.insert(material.id.clone());
        Ok(material)
    }

    fn claim_id(
        &self,
        requested: String,
        next_id: &mut impl FnMut() -> String,
    ) -> Result<String, DraftError> {
        if !requested.is_empty() {
            if self.is_taken(&requested) {
                return Err(DraftError::DuplicateMaterial(requested));
            }
            return Ok(requested);
        }
        loop {
            let candidate = next_id();
            if !self.is_taken(&candidate) {
                return Ok(candidate);
            }
            debug!(id = %candidate, "generated material id collided, regenerating");
        }
    }

    fn is_taken(&self, id: &str) -> bool {
        self.index.contains_key(id) || self.reserved.contains(id)
    }

    pub fn get(&self, id: &str) -> Result<&Material, DraftError> {
        self.index
            .get(id)
            .map(|&position| &self.materials[position])
            .ok_or_else(|| DraftError::MaterialNotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Stored here, or reserved for a pending material.
    pub fn resolves(&self, id: &str) -> bool {
        self.is_taken(id)
    }

    pub fn of_kind(&self, kind: MaterialKind) -> impl Iterator<Item = &Material> {
        self.materials.iter().filter(move |material| material.kind() == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Material> {
        self.materials.iter()
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

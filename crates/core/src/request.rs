// The structured draft request consumed by the assembler.

use serde::{Deserialize, Serialize};

use crate::document::Canvas;
use crate::text::LinebreakRule;
use crate::time::TimeValue;

/// Name of the text track that receives the flat `texts` list.
pub const DEFAULT_TEXT_TRACK: &str = "text";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftRequest {
    #[serde(alias = "name")]
    pub draft_name: String,
    pub canvas: Option<Canvas>,
    pub fps: Option<f64>,
    /// Emit the legacy format revision. `None` defers to configuration.
    pub legacy: Option<bool>,
    pub videos: Vec<VideoItem>,
    #[serde(alias = "audio")]
    pub audios: Vec<AudioItem>,
    pub gifs: Vec<VideoItem>,
    pub images: Vec<ImageItem>,
    pub text_tracks: Vec<TextTrackSpec>,
    pub texts: Vec<TextItem>,
    pub filters: Vec<FilterItem>,
    pub effects: Vec<EffectItem>,
    pub mosaics: Vec<MosaicItem>,
}

impl DraftRequest {
    pub fn named(name: impl Into<String>) -> Self {
        Self { draft_name: name.into(), ..Self::default() }
    }

    /// Named text tracks followed by the flat `texts` list, if any.
    pub fn text_groups(&self) -> Vec<TextTrackSpec> {
        let mut groups = self.text_tracks.clone();
        if !self.texts.is_empty() {
            groups.push(TextTrackSpec {
                name: DEFAULT_TEXT_TRACK.to_string(),
                relative_index: None,
                texts: self.texts.clone(),
            });
        }
        groups
    }

    pub fn item_count(&self) -> usize {
        self.videos.len()
            + self.audios.len()
            + self.gifs.len()
            + self.images.len()
            + self.text_tracks.iter().map(|track| track.texts.len()).sum::<usize>()
            + self.texts.len()
            + self.filters.len()
            + self.effects.len()
            + self.mosaics.len()
    }
}

/// A video or gif clip. `start` is the source in-point; `target_start`
/// pins the clip on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoItem {
    #[serde(alias = "url", alias = "local_path")]
    pub file_path: String,
    #[serde(default)]
    pub start: Option<TimeValue>,
    #[serde(default)]
    pub duration: Option<TimeValue>,
    #[serde(default)]
    pub target_start: Option<TimeValue>,
    #[serde(default = "unit")]
    pub volume: f64,
    #[serde(default)]
    pub transition: Option<String>,
    #[serde(default)]
    pub animation: Option<String>,
    #[serde(default)]
    pub effects: Vec<VideoEffectItem>,
}

impl VideoItem {
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            start: None,
            duration: None,
            target_start: None,
            volume: 1.0,
            transition: None,
            animation: None,
            effects: Vec::new(),
        }
    }
}

/// A still image shown for `duration` on the image track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageItem {
    #[serde(alias = "url", alias = "local_path")]
    pub file_path: String,
    #[serde(default)]
    pub duration: Option<TimeValue>,
    #[serde(default)]
    pub target_start: Option<TimeValue>,
    #[serde(default)]
    pub position: Option<PositionSpec>,
    /// Uniform scale; 1.0 fills the canvas.
    #[serde(default)]
    pub scale: Option<f64>,
}

impl ImageItem {
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            duration: None,
            target_start: None,
            position: None,
            scale: None,
        }
    }
}

/// An effect applied to one video segment rather than the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoEffectItem {
    #[serde(alias = "effect_id")]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioItem {
    #[serde(alias = "url", alias = "local_path")]
    pub file_path: String,
    #[serde(default)]
    pub start: Option<TimeValue>,
    #[serde(default)]
    pub duration: Option<TimeValue>,
    #[serde(default)]
    pub target_start: Option<TimeValue>,
    #[serde(default = "unit")]
    pub volume: f64,
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub fade_in: Option<TimeValue>,
    #[serde(default)]
    pub fade_out: Option<TimeValue>,
}

impl AudioItem {
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            start: None,
            duration: None,
            target_start: None,
            volume: 1.0,
            enabled: true,
            fade_in: None,
            fade_out: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextTrackSpec {
    pub name: String,
    #[serde(default)]
    pub relative_index: Option<i32>,
    #[serde(default)]
    pub texts: Vec<TextItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextItem {
    pub text: String,
    pub start: Option<TimeValue>,
    pub duration: Option<TimeValue>,
    pub target_start: Option<TimeValue>,
    pub font: Option<String>,
    pub style: Option<TextStyleSpec>,
    pub position: Option<PositionSpec>,
    #[serde(alias = "intro")]
    pub intro_animation: Option<String>,
    #[serde(alias = "outro", alias = "animation")]
    pub outro_animation: Option<String>,
    #[serde(alias = "loop")]
    pub loop_animation: Option<String>,
    pub bubble: Option<String>,
    #[serde(alias = "text_effect")]
    pub effect: Option<String>,
    pub linebreak: Option<LinebreakRule>,
}

impl TextItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Self::default() }
    }
}

/// Style overrides; absent fields keep the text style defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyleSpec {
    pub color: Option<ColorSpec>,
    pub size: Option<f64>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    pub alpha: Option<f64>,
    pub align: Option<u8>,
    pub vertical: Option<bool>,
    pub letter_spacing: Option<f64>,
    pub line_spacing: Option<f64>,
}

/// `[r, g, b]` with channels in 0..=1, or a `#RRGGBB` string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorSpec {
    Rgb([f64; 3]),
    Hex(String),
}

impl ColorSpec {
    pub fn to_rgb(&self) -> Option<[f64; 3]> {
        match self {
            Self::Rgb(rgb) => Some(rgb.map(|channel| channel.clamp(0.0, 1.0))),
            Self::Hex(hex) => {
                let digits = hex.trim().trim_start_matches('#');
                if digits.len() != 6 || !digits.is_ascii() {
                    return None;
                }
                let channel = |range: std::ops::Range<usize>| {
                    u8::from_str_radix(&digits[range], 16).ok().map(|v| f64::from(v) / 255.0)
                };
                Some([channel(0..2)?, channel(2..4)?, channel(4..6)?])
            }
        }
    }
}

/// Either pixel coordinates or fractions of the canvas; see `text::normalize_position`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSpec {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterItem {
    #[serde(alias = "filter_id")]
    pub name: String,
    #[serde(default)]
    pub start: Option<TimeValue>,
    #[serde(default)]
    pub duration: Option<TimeValue>,
    #[serde(default)]
    pub target_start: Option<TimeValue>,
    /// 0..=100.
    #[serde(default = "full_intensity")]
    pub intensity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectItem {
    #[serde(alias = "effect_id")]
    pub name: String,
    #[serde(default)]
    pub start: Option<TimeValue>,
    #[serde(default)]
    pub duration: Option<TimeValue>,
    #[serde(default)]
    pub target_start: Option<TimeValue>,
    #[serde(default)]
    pub params: Vec<f64>,
}

/// A mosaic over a region `[x1, y1, x2, y2]`, always auto-advanced on the
/// effect track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MosaicItem {
    pub region: [f64; 4],
    #[serde(default)]
    pub start: Option<TimeValue>,
    #[serde(default)]
    pub duration: Option<TimeValue>,
}

fn unit() -> f64 {
    1.0
}

fn enabled() -> bool {
    true
}

fn full_intensity() -> f64 {
    100.0
}

// Configuration file for the cutdraft CLI.
//
// Global config: `~/.cutdraft/config.toml`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use cutdraft_core::assembler::AssemblyOptions;
use cutdraft_core::document::Canvas;
use cutdraft_core::subtitle::AssOptions;
use cutdraft_core::text::LinebreakRule;
use cutdraft_core::time::SEC;
use cutdraft_core::track::DEFAULT_PLACEMENT_CEILING;

/// Root directory for cutdraft global state: `~/.cutdraft/`.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".cutdraft"))
}

/// Path to the global config file: `~/.cutdraft/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    global_dir().map(|d| d.join("config.toml"))
}

// ── Global config ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GlobalConfig {
    /// Where new draft folders are created.
    pub drafts_root: Option<PathBuf>,
    /// Folder copied into every new draft; its `draft_content.json` is the
    /// merge template.
    pub template_folder: Option<PathBuf>,
    /// Replaces the bundled asset catalog.
    pub catalog_path: Option<PathBuf>,
    /// Emit the legacy format revision unless a request says otherwise.
    pub legacy: bool,
    pub fps: f64,
    pub canvas: CanvasConfig,
    pub placement: PlacementConfig,
    pub linebreak: LinebreakRule,
    pub subtitles: SubtitleConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            drafts_root: None,
            template_folder: None,
            catalog_path: None,
            legacy: false,
            fps: 30.0,
            canvas: CanvasConfig::default(),
            placement: PlacementConfig::default(),
            linebreak: LinebreakRule::default(),
            subtitles: SubtitleConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Load from `~/.cutdraft/config.toml`. Returns defaults if the file
    /// doesn't exist or can't be parsed.
    pub fn load() -> Self {
        global_config_path().and_then(|p| Self::load_from(&p).ok()).unwrap_or_default()
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        }
        let contents = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }

    /// `drafts_root`, else `~/.cutdraft/drafts`, else `./drafts`.
    pub fn drafts_root(&self) -> PathBuf {
        self.drafts_root
            .clone()
            .or_else(|| global_dir().map(|d| d.join("drafts")))
            .unwrap_or_else(|| PathBuf::from("drafts"))
    }

    pub fn assembly_options(&self) -> AssemblyOptions {
        AssemblyOptions {
            placement_ceiling: secs_to_micros(self.placement.ceiling_secs),
            default_duration: secs_to_micros(self.placement.default_duration_secs),
            linebreak: self.linebreak,
            canvas: Canvas::new(self.canvas.width, self.canvas.height),
            fps: self.fps,
            legacy: self.legacy,
            ..AssemblyOptions::default()
        }
    }

    pub fn ass_options(&self) -> AssOptions {
        AssOptions { play_res_x: self.subtitles.play_res_x, play_res_y: self.subtitles.play_res_y }
    }
}

fn secs_to_micros(secs: f64) -> u64 {
    (secs.max(0.0) * SEC as f64).round() as u64
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self { width: 1920, height: 1080 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlacementConfig {
    /// Auto placement never ends a segment past this point.
    pub ceiling_secs: f64,
    /// Item duration when neither the request nor the media gives one.
    pub default_duration_secs: f64,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            ceiling_secs: (DEFAULT_PLACEMENT_CEILING / SEC) as f64,
            default_duration_secs: 5.0,
        }
    }
}

/// ASS script resolution; the document canvas when unset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct SubtitleConfig {
    pub play_res_x: Option<u32>,
    pub play_res_y: Option<u32>,
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config I/O error: {e}"),
            Self::Parse(e) => write!(f, "config parse error: {e}"),
            Self::Serialize(e) => write!(f, "config serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

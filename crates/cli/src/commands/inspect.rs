// `cutdraft inspect`: summarize a draft's content file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use serde::Serialize;
use serde_json::Value;

use cutdraft_core::meta::CONTENT_FILE;
use cutdraft_core::reconcile::{dangling_refs, DanglingRef};
use cutdraft_core::time;

use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Draft folder or content file.
    path: PathBuf,
    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct InspectResult {
    pub path: PathBuf,
    pub id: Option<String>,
    pub version: Option<u64>,
    pub new_version: Option<String>,
    pub canvas: Option<(u64, u64)>,
    pub duration: u64,
    pub tracks: Vec<TrackSummary>,
    pub materials: BTreeMap<String, usize>,
    pub dangling: Vec<DanglingRef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackSummary {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub segments: usize,
}

pub fn run(args: InspectArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    match inspect(&args.path) {
        Ok(result) => {
            output::print_output(format, &result, format_human)?;
            Ok(())
        }
        Err(e) => {
            output::print_anyhow_error(format, &e);
            Err(e)
        }
    }
}

fn inspect(path: &Path) -> anyhow::Result<InspectResult> {
    let file = if path.is_dir() { path.join(CONTENT_FILE) } else { path.to_path_buf() };
    let raw = fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
    let content: Value =
        serde_json::from_slice(&raw).with_context(|| format!("parsing {}", file.display()))?;
    Ok(summarize(file, &content))
}

fn summarize(path: PathBuf, content: &Value) -> InspectResult {
    let tracks = content["tracks"]
        .as_array()
        .into_iter()
        .flatten()
        .map(|track| TrackSummary {
            kind: track["type"].as_str().unwrap_or_default().to_string(),
            name: track["name"].as_str().unwrap_or_default().to_string(),
            segments: track["segments"].as_array().map_or(0, Vec::len),
        })
        .collect();
    let materials = content["materials"]
        .as_object()
        .into_iter()
        .flatten()
        .filter_map(|(collection, list)| {
            list.as_array().filter(|l| !l.is_empty()).map(|l| (collection.clone(), l.len()))
        })
        .collect();
    let canvas = content["canvas_config"]["width"]
        .as_u64()
        .zip(content["canvas_config"]["height"].as_u64());

    InspectResult {
        path,
        id: content["id"].as_str().map(String::from),
        version: content["version"].as_u64(),
        new_version: content["new_version"].as_str().map(String::from),
        canvas,
        duration: content["duration"].as_u64().unwrap_or(0),
        tracks,
        materials,
        dangling: dangling_refs(content),
    }
}

fn format_human(result: &InspectResult) -> String {
    let mut lines = Vec::new();
    lines.push(format!("{}", result.path.display()));
    if let Some(id) = &result.id {
        lines.push(format!("  id:       {id}"));
    }
    let version = match (&result.new_version, result.version) {
        (Some(new), Some(old)) => format!("{new} ({old})"),
        (Some(new), None) => new.clone(),
        (None, Some(old)) => old.to_string(),
        (None, None) => "unknown".into(),
    };
    lines.push(format!("  version:  {version}"));
    if let Some((width, height)) = result.canvas {
        lines.push(format!("  canvas:   {width}x{height}"));
    }
    lines.push(format!("  duration: {}", time::format(result.duration)));

    lines.push(format!("  {} track(s)", result.tracks.len()));
    for track in &result.tracks {
        let name = if track.name.is_empty() { "-" } else { track.name.as_str() };
        lines.push(format!("    {:<7} {name}: {} segment(s)", track.kind, track.segments));
    }
    if !result.materials.is_empty() {
        lines.push("  materials:".into());
        for (collection, count) in &result.materials {
            lines.push(format!("    {collection}: {count}"));
        }
    }
    if result.dangling.is_empty() {
        lines.push("  no dangling references".into());
    } else {
        lines.push(format!("  {} dangling reference(s):", result.dangling.len()));
        for reference in &result.dangling {
            lines.push(format!(
                "    {} segment {} → {}",
                reference.track_type, reference.segment_id, reference.material_id
            ));
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample() -> Value {
        json!({
            "id": "D",
            "version": 360000,
            "new_version": "110.0.0",
            "canvas_config": {"width": 1920, "height": 1080},
            "duration": 1_500_000,
            "materials": {
                "videos": [{"id": "v1"}],
                "texts": [],
            },
            "tracks": [
                {"type": "video", "name": "video", "segments": [
                    {"id": "s1", "material_id": "v1", "extra_material_refs": ["gone"]}
                ]},
                {"type": "text", "name": "", "segments": []},
            ],
        })
    }

    #[test]
    fn summarizes_tracks_materials_and_dangling_refs() {
        let result = summarize(PathBuf::from("draft_content.json"), &sample());
        assert_eq!(result.canvas, Some((1920, 1080)));
        assert_eq!(result.tracks.len(), 2);
        assert_eq!(result.tracks[0].segments, 1);
        assert_eq!(result.materials.get("videos"), Some(&1));
        assert!(!result.materials.contains_key("texts"));
        assert_eq!(result.dangling.len(), 1);
        assert_eq!(result.dangling[0].material_id, "gone");

        let human = format_human(&result);
        assert!(human.contains("110.0.0 (360000)"));
        assert!(human.contains("duration: 1.5s"));
        assert!(human.contains("1 dangling reference(s)"));
    }

    #[test]
    fn accepts_a_draft_folder() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONTENT_FILE), serde_json::to_vec(&sample()).unwrap()).unwrap();
        let result = inspect(dir.path()).unwrap();
        assert_eq!(result.id.as_deref(), Some("D"));
        assert!(result.path.ends_with(CONTENT_FILE));
    }

    #[test]
    fn missing_content_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = inspect(dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains(CONTENT_FILE));
    }
}

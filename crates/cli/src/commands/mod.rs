// CLI subcommand dispatch.

use std::fs;
use std::path::Path;

use anyhow::Context;
use clap::Subcommand;
use serde::Deserialize;

use cutdraft_core::assembler::DraftAssembler;
use cutdraft_core::catalog::AssetCatalog;
use cutdraft_core::request::DraftRequest;
use cutdraft_core::source::LocalSources;

use crate::config::GlobalConfig;

pub mod build;
pub mod catalog;
pub mod inspect;
pub mod subtitles;

#[derive(Subcommand)]
pub enum Command {
    /// Assemble requests and write draft folders
    Build(build::BuildArgs),
    /// Summarize a draft folder or content file
    Inspect(inspect::InspectArgs),
    /// Assemble a request and export its captions as ASS
    Subtitles(subtitles::SubtitlesArgs),
    /// List asset catalog entries
    Catalog(catalog::CatalogArgs),
}

pub fn run(cmd: Command, config: &GlobalConfig) -> anyhow::Result<()> {
    match cmd {
        Command::Build(args) => build::run(args, config),
        Command::Inspect(args) => inspect::run(args),
        Command::Subtitles(args) => subtitles::run(args, config),
        Command::Catalog(args) => catalog::run(args, config),
    }
}

// ── Shared helpers ─────────────────────────────────────────────────

/// A request file holds one request or an array of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum RequestFile {
    Batch(Vec<DraftRequest>),
    Single(Box<DraftRequest>),
}

pub(crate) fn read_requests(path: &Path) -> anyhow::Result<Vec<DraftRequest>> {
    let raw = fs::read(path).with_context(|| format!("reading request file {}", path.display()))?;
    let parsed: RequestFile = serde_json::from_slice(&raw)
        .with_context(|| format!("parsing request file {}", path.display()))?;
    Ok(match parsed {
        RequestFile::Batch(requests) => requests,
        RequestFile::Single(request) => vec![*request],
    })
}

pub(crate) fn load_catalog(config: &GlobalConfig) -> anyhow::Result<AssetCatalog> {
    match &config.catalog_path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading catalog {}", path.display()))?;
            AssetCatalog::from_json(&raw).with_context(|| format!("loading catalog {}", path.display()))
        }
        None => Ok(AssetCatalog::builtin()),
    }
}

/// An assembler whose relative media paths resolve against `base`, usually
/// the request file's directory.
pub(crate) fn assembler(config: &GlobalConfig, base: &Path) -> anyhow::Result<DraftAssembler> {
    Ok(DraftAssembler::new(load_catalog(config)?)
        .with_resolver(LocalSources::relative_to(base))
        .with_options(config.assembly_options()))
}

pub(crate) fn request_dir(path: &Path) -> &Path {
    path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn request_file_accepts_single_and_batch() {
        let dir = TempDir::new().unwrap();
        let single = dir.path().join("one.json");
        fs::write(&single, br#"{"name": "a", "videos": [{"url": "a.mp4"}]}"#).unwrap();
        let batch = dir.path().join("many.json");
        fs::write(&batch, br#"[{"draft_name": "a"}, {"draft_name": "b"}]"#).unwrap();

        let one = read_requests(&single).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].draft_name, "a");
        assert_eq!(one[0].videos[0].file_path, "a.mp4");
        assert_eq!(read_requests(&batch).unwrap().len(), 2);
    }

    #[test]
    fn malformed_request_file_names_the_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, b"{").unwrap();
        let err = read_requests(&path).unwrap_err();
        assert!(format!("{err:#}").contains("bad.json"));
    }

    #[test]
    fn custom_catalog_replaces_builtin() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");
        fs::write(
            &path,
            br#"{"filters": {"default": "x", "entries": [{"name": "x", "resource_id": "1", "effect_id": "1"}]}}"#,
        )
        .unwrap();
        let config = GlobalConfig { catalog_path: Some(path), ..GlobalConfig::default() };
        let catalog = load_catalog(&config).unwrap();
        assert_eq!(catalog.categories().count(), 1);
    }

    #[test]
    fn request_dir_defaults_to_current_directory() {
        assert_eq!(request_dir(Path::new("req.json")), Path::new("."));
        assert_eq!(request_dir(Path::new("/a/req.json")), Path::new("/a"));
    }
}

// Collaborator seams: turning request sources into local files and probing them.

use std::path::{Path, PathBuf};

/// Produces a local file for a request's `file_path`/`url`. Remote fetching
/// happens in an implementation of this trait, before assembly.
pub trait SourceResolver {
    fn resolve(&self, source: &str) -> Result<PathBuf, String>;
}

/// Reports a media file's duration in microseconds, if it can.
pub trait MediaProbe {
    fn duration(&self, path: &Path) -> Option<u64>;
}

/// Accepts existing local files; rejects remote URLs.
#[derive(Debug, Clone, Default)]
pub struct LocalSources {
    base: Option<PathBuf>,
}

impl LocalSources {
    /// Resolve relative paths against `base` instead of the working directory.
    pub fn relative_to(base: impl Into<PathBuf>) -> Self {
        Self { base: Some(base.into()) }
    }
}

impl SourceResolver for LocalSources {
    fn resolve(&self, source: &str) -> Result<PathBuf, String> {
        let source = source.trim();
        if source.is_empty() {
            return Err("empty source".to_string());
        }
        if is_remote(source) {
            return Err("remote sources must be fetched before assembly".to_string());
        }
        let raw = source.strip_prefix("file://").unwrap_or(source);
        let path = match &self.base {
            Some(base) if Path::new(raw).is_relative() => base.join(raw),
            _ => PathBuf::from(raw),
        };
        if !path.is_file() {
            return Err(format!("no such file: {}", path.display()));
        }
        Ok(path)
    }
}

/// Takes every source at face value without touching the filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl SourceResolver for PassThrough {
    fn resolve(&self, source: &str) -> Result<PathBuf, String> {
        if source.trim().is_empty() {
            return Err("empty source".to_string());
        }
        Ok(PathBuf::from(source))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoProbe;

impl MediaProbe for NoProbe {
    fn duration(&self, _path: &Path) -> Option<u64> {
        None
    }
}

pub fn is_remote(source: &str) -> bool {
    let lower = source.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

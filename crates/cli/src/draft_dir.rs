// Writes assembled drafts into editor draft folders.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use cutdraft_core::assembler::{AssemblyReport, DraftAssembler};
use cutdraft_core::document::LEGACY_NEW_VERSION;
use cutdraft_core::meta::{new_meta, update_meta, MetaInfo, CONTENT_FILE, META_FILE, META_INFO_FILE};
use cutdraft_core::reconcile::{LegacyProfile, Repair, SchemaReconciler};
use cutdraft_core::request::DraftRequest;
use cutdraft_core::subtitle::{export_ass, AssOptions};

pub const SUBTITLES_FILE: &str = "subtitles.ass";

/// Merge template used when no template folder is configured.
const EMPTY_CONTENT: &[u8] = br#"{"materials": {}, "tracks": []}"#;

#[derive(Debug, Clone, Serialize)]
pub struct WrittenDraft {
    pub name: String,
    pub draft_id: String,
    pub folder: PathBuf,
    pub duration: u64,
    pub legacy: bool,
    pub report: AssemblyReport,
    pub repairs: Vec<Repair>,
    pub subtitles: Option<PathBuf>,
}

pub struct DraftWriter<'a> {
    assembler: &'a DraftAssembler,
    root: PathBuf,
    template: Option<PathBuf>,
    subtitles: Option<AssOptions>,
}

impl<'a> DraftWriter<'a> {
    pub fn new(assembler: &'a DraftAssembler, root: impl Into<PathBuf>) -> Self {
        Self { assembler, root: root.into(), template: None, subtitles: None }
    }

    pub fn with_template(mut self, template: Option<PathBuf>) -> Self {
        self.template = template;
        self
    }

    /// Also write `subtitles.ass` next to the content file.
    pub fn with_subtitles(mut self, options: Option<AssOptions>) -> Self {
        self.subtitles = options;
        self
    }

    /// Create a new folder for `request` and fill it. The folder is removed
    /// again if any step fails.
    pub fn write(&self, request: &DraftRequest, now: DateTime<Utc>) -> anyhow::Result<WrittenDraft> {
        if let Some(template) = &self.template {
            if !template.is_dir() {
                bail!("template folder `{}` not found", template.display());
            }
        }
        fs::create_dir_all(&self.root)
            .with_context(|| format!("creating drafts root {}", self.root.display()))?;

        let name = display_name(request);
        let staged = StagedFolder::create(self.root.join(folder_name(&name, now)))?;
        let folder = staged.path().to_path_buf();

        if let Some(template) = &self.template {
            copy_dir(template, &folder).with_context(|| {
                format!("copying template {} into {}", template.display(), folder.display())
            })?;
        }

        let assembly = self
            .assembler
            .assemble(request)
            .with_context(|| format!("assembling draft `{name}`"))?;
        let legacy = request.legacy.unwrap_or(self.assembler.options().legacy);

        let content_path = folder.join(CONTENT_FILE);
        let template_bytes = if content_path.is_file() {
            fs::read(&content_path)
                .with_context(|| format!("reading template content {}", content_path.display()))?
        } else {
            EMPTY_CONTENT.to_vec()
        };
        let reconciled = SchemaReconciler::new(LegacyProfile::default(), self.assembler.catalog())
            .merge(&assembly.document, &assembly.pending, &template_bytes, legacy)
            .with_context(|| format!("merging draft `{name}` into its template"))?;
        let content = serde_json::to_vec(&reconciled.content)?;
        write_atomic(&content_path, &content)?;

        let draft_id = reconciled.content["id"]
            .as_str()
            .map(String::from)
            .unwrap_or_else(|| assembly.document.id.clone());
        let duration = assembly.document.duration();
        let info = MetaInfo {
            draft_id: draft_id.clone(),
            draft_name: name.clone(),
            draft_fold_path: folder.to_string_lossy().into_owned(),
            draft_root_path: self.root.to_string_lossy().into_owned(),
            created_us: now.timestamp_micros(),
            modified_us: now.timestamp_micros(),
            duration,
            legacy_version: legacy.then(|| LEGACY_NEW_VERSION.to_string()),
        };
        write_meta(&folder, &info)?;

        let subtitles = match &self.subtitles {
            Some(options) => {
                let path = folder.join(SUBTITLES_FILE);
                write_atomic(&path, export_ass(&assembly.document, options).as_bytes())?;
                Some(path)
            }
            None => None,
        };

        let folder = staged.commit();
        info!(
            draft = %name,
            folder = %folder.display(),
            duration,
            repairs = reconciled.repairs.len(),
            "draft written"
        );
        Ok(WrittenDraft {
            name,
            draft_id,
            folder,
            duration,
            legacy,
            report: assembly.report,
            repairs: reconciled.repairs,
            subtitles,
        })
    }
}

/// Update whichever meta files the folder carries; create
/// `draft_meta_info.json` when it has none.
fn write_meta(folder: &Path, info: &MetaInfo) -> anyhow::Result<()> {
    let mut found = false;
    for file in [META_INFO_FILE, META_FILE] {
        let path = folder.join(file);
        if !path.is_file() {
            continue;
        }
        found = true;
        let raw = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        let mut meta: Value = serde_json::from_slice(&raw).unwrap_or_else(|err| {
            warn!(file = %path.display(), error = %err, "meta file unreadable; rewriting");
            Value::Null
        });
        update_meta(&mut meta, info);
        write_atomic(&path, &serde_json::to_vec(&meta)?)?;
    }
    if !found {
        let path = folder.join(META_INFO_FILE);
        write_atomic(&path, &serde_json::to_vec(&new_meta(info))?)?;
    }
    Ok(())
}

fn display_name(request: &DraftRequest) -> String {
    let name = request.draft_name.trim();
    if name.is_empty() {
        "draft".to_string()
    } else {
        name.to_string()
    }
}

/// `<name>_<YYYYmmdd_HHMMSS_micros>` with path separators replaced.
pub fn folder_name(name: &str, now: DateTime<Utc>) -> String {
    let safe: String = name
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') || c.is_control() { '_' } else { c })
        .collect();
    format!("{safe}_{}", now.format("%Y%m%d_%H%M%S_%6f"))
}

// ── Filesystem helpers ─────────────────────────────────────────────

/// A freshly created folder that is deleted on drop unless committed.
struct StagedFolder {
    path: PathBuf,
    committed: bool,
}

impl StagedFolder {
    fn create(path: PathBuf) -> anyhow::Result<Self> {
        fs::create_dir(&path).with_context(|| format!("creating draft folder {}", path.display()))?;
        Ok(Self { path, committed: false })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn commit(mut self) -> PathBuf {
        self.committed = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for StagedFolder {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(folder = %self.path.display(), "removed incomplete draft folder"),
            Err(err) => {
                warn!(folder = %self.path.display(), error = %err, "could not remove draft folder")
            }
        }
    }
}

fn copy_dir(from: &Path, to: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from).with_context(|| format!("reading {}", from.display()))? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)
                .with_context(|| format!("copying {}", entry.path().display()))?;
        }
    }
    Ok(())
}

/// Write through a sibling temp file and rename over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let file_name = path
        .file_name()
        .with_context(|| format!("{} has no file name", path.display()))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    fs::write(&tmp, bytes).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

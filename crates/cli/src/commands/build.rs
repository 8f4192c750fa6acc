// `cutdraft build`: assemble requests into draft folders.

use std::path::PathBuf;

use anyhow::bail;
use chrono::Utc;
use clap::Args;
use serde::Serialize;
use tracing::error;

use cutdraft_core::assembler::ItemStatus;

use crate::commands::{assembler, read_requests, request_dir};
use crate::config::GlobalConfig;
use crate::draft_dir::{DraftWriter, WrittenDraft};
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Request file holding one request or an array of requests.
    request: PathBuf,
    /// Parent directory for new draft folders.
    #[arg(long)]
    drafts_root: Option<PathBuf>,
    /// Folder copied into each new draft.
    #[arg(long)]
    template: Option<PathBuf>,
    /// Emit the legacy format for requests that don't choose one.
    #[arg(long)]
    legacy: bool,
    /// Also write subtitles.ass into each draft folder.
    #[arg(long)]
    subtitles: bool,
    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
pub struct BuildResult {
    pub drafts: Vec<WrittenDraft>,
    pub failed: Vec<FailedDraft>,
}

#[derive(Debug, Serialize)]
pub struct FailedDraft {
    pub name: String,
    pub error: String,
}

pub fn run(args: BuildArgs, config: &GlobalConfig) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    let result = build(&args, config);
    match result {
        Ok(result) => {
            for draft in &result.drafts {
                for warning in &draft.report.warnings {
                    let message = format!("{}: {}: {}", draft.name, warning.item, warning.message);
                    output::print_warning(format, "ASSEMBLY_WARNING", &message);
                }
            }
            output::print_output(format, &result, format_human)?;
            if !result.failed.is_empty() {
                let total = result.failed.len() + result.drafts.len();
                bail!("{} of {total} draft(s) failed", result.failed.len());
            }
            Ok(())
        }
        Err(e) => {
            output::print_anyhow_error(format, &e);
            Err(e)
        }
    }
}

fn build(args: &BuildArgs, config: &GlobalConfig) -> anyhow::Result<BuildResult> {
    let mut config = config.clone();
    if args.legacy {
        config.legacy = true;
    }
    let requests = read_requests(&args.request)?;
    let assembler = assembler(&config, request_dir(&args.request))?;
    let root = args.drafts_root.clone().unwrap_or_else(|| config.drafts_root());
    let writer = DraftWriter::new(&assembler, root)
        .with_template(args.template.clone().or_else(|| config.template_folder.clone()))
        .with_subtitles(args.subtitles.then(|| config.ass_options()));

    let mut result = BuildResult { drafts: Vec::new(), failed: Vec::new() };
    for request in &requests {
        match writer.write(request, Utc::now()) {
            Ok(written) => result.drafts.push(written),
            Err(err) => {
                error!(draft = %request.draft_name, error = %format!("{err:#}"), "draft failed");
                result.failed.push(FailedDraft {
                    name: request.draft_name.clone(),
                    error: format!("{err:#}"),
                });
            }
        }
    }
    Ok(result)
}

fn format_human(result: &BuildResult) -> String {
    let mut lines = Vec::new();
    for draft in &result.drafts {
        let skipped = draft.report.skipped().count();
        lines.push(format!(
            "{} → {} ({:.2}s, {} placed, {} skipped{})",
            draft.name,
            draft.folder.display(),
            draft.duration as f64 / 1_000_000.0,
            draft.report.placed(),
            skipped,
            if draft.legacy { ", legacy" } else { "" },
        ));
        for outcome in draft.report.skipped() {
            if let ItemStatus::Skipped { reason } = &outcome.status {
                lines.push(format!("  skipped {}: {}", outcome.item, reason));
            }
        }
        if !draft.repairs.is_empty() {
            lines.push(format!("  {} reference(s) repaired", draft.repairs.len()));
        }
    }
    for failed in &result.failed {
        lines.push(format!("{} failed: {}", failed.name, failed.error));
    }
    if lines.is_empty() {
        return "No requests in file.".into();
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutdraft_core::meta::CONTENT_FILE;
    use std::fs;
    use tempfile::TempDir;

    fn args(request: PathBuf, root: PathBuf) -> BuildArgs {
        BuildArgs {
            request,
            drafts_root: Some(root),
            template: None,
            legacy: false,
            subtitles: false,
            json: true,
        }
    }

    #[test]
    fn builds_every_request_in_a_batch() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("clip.mp4"), b"").unwrap();
        let request = dir.path().join("batch.json");
        fs::write(
            &request,
            br#"[
                {"name": "one", "videos": [{"file_path": "clip.mp4", "duration": "2s"}]},
                {"name": "two", "videos": [{"file_path": "missing.mp4"}], "texts": [{"text": "hi"}]}
            ]"#,
        )
        .unwrap();
        let root = dir.path().join("drafts");

        let result = build(&args(request, root.clone()), &GlobalConfig::default()).unwrap();
        assert_eq!(result.drafts.len(), 2);
        assert!(result.failed.is_empty());
        assert!(result.drafts[0].folder.join(CONTENT_FILE).is_file());
        assert_eq!(result.drafts[0].duration, 2_000_000);
        // The missing clip is skipped, the text still lands.
        assert_eq!(result.drafts[1].report.skipped().count(), 1);
        assert_eq!(result.drafts[1].report.placed(), 1);

        let human = format_human(&result);
        assert!(human.contains("one →"));
        assert!(human.contains("skipped videos[0]"));
    }

    #[test]
    fn invalid_times_fail_only_that_draft() {
        let dir = TempDir::new().unwrap();
        let request = dir.path().join("req.json");
        fs::write(
            &request,
            br#"[{"name": "bad", "texts": [{"text": "x", "start": "soon"}]}, {"name": "good"}]"#,
        )
        .unwrap();
        let root = dir.path().join("drafts");

        let mut build_args = args(request, root.clone());
        build_args.legacy = true;
        let result = build(&build_args, &GlobalConfig::default()).unwrap();
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].name, "bad");
        assert!(result.failed[0].error.contains("soon"));
        assert_eq!(result.drafts.len(), 1);
        assert!(result.drafts[0].legacy);
        assert_eq!(fs::read_dir(&root).unwrap().count(), 1);
    }
}

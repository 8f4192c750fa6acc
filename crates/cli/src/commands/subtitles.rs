// `cutdraft subtitles`: export a request's captions as an ASS script.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Args;
use serde::Serialize;

use cutdraft_core::subtitle::export_ass;

use crate::commands::{assembler, read_requests, request_dir};
use crate::config::GlobalConfig;
use crate::draft_dir::write_atomic;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct SubtitlesArgs {
    /// Request file; a batch file must name the draft with `--draft`.
    request: PathBuf,
    /// Output path for the script.
    #[arg(short, long)]
    output: PathBuf,
    /// Which request of a batch to export.
    #[arg(long)]
    draft: Option<String>,
    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubtitlesResult {
    pub draft: String,
    pub output: PathBuf,
    pub dialogues: usize,
}

pub fn run(args: SubtitlesArgs, config: &GlobalConfig) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    match export(&args.request, &args.output, args.draft.as_deref(), config) {
        Ok(result) => {
            output::print_output(format, &result, |r| {
                format!("{} dialogue line(s) from `{}` → {}", r.dialogues, r.draft, r.output.display())
            })?;
            Ok(())
        }
        Err(e) => {
            output::print_anyhow_error(format, &e);
            Err(e)
        }
    }
}

fn export(
    request_path: &Path,
    output: &Path,
    draft: Option<&str>,
    config: &GlobalConfig,
) -> anyhow::Result<SubtitlesResult> {
    let mut requests = read_requests(request_path)?;
    let request = match draft {
        Some(name) => {
            let Some(position) = requests.iter().position(|r| r.draft_name == name) else {
                bail!("no request named `{name}` in {}", request_path.display());
            };
            requests.swap_remove(position)
        }
        None if requests.len() == 1 => requests.remove(0),
        None => bail!(
            "{} holds {} requests; pick one with --draft",
            request_path.display(),
            requests.len()
        ),
    };

    let assembly = assembler(config, request_dir(request_path))?
        .assemble(&request)
        .with_context(|| format!("assembling draft `{}`", request.draft_name))?;
    let script = export_ass(&assembly.document, &config.ass_options());
    write_atomic(output, script.as_bytes())?;

    Ok(SubtitlesResult {
        draft: request.draft_name,
        output: output.to_path_buf(),
        dialogues: script.lines().filter(|line| line.starts_with("Dialogue:")).count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn exports_the_named_request() {
        let dir = TempDir::new().unwrap();
        let request = dir.path().join("req.json");
        fs::write(
            &request,
            r#"[
                {"name": "a", "texts": [{"text": "one"}]},
                {"name": "b", "texts": [{"text": "一"}, {"text": "二"}]}
            ]"#,
        )
        .unwrap();
        let out = dir.path().join("b.ass");

        let result = export(&request, &out, Some("b"), &GlobalConfig::default()).unwrap();
        assert_eq!(result.dialogues, 2);
        let script = fs::read_to_string(&out).unwrap();
        assert!(script.contains("二"));
    }

    #[test]
    fn batch_without_draft_name_is_rejected() {
        let dir = TempDir::new().unwrap();
        let request = dir.path().join("req.json");
        fs::write(&request, r#"[{"name": "a"}, {"name": "b"}]"#).unwrap();
        let err = export(&request, &dir.path().join("x.ass"), None, &GlobalConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("--draft"));
    }
}

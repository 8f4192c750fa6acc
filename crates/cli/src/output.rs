// Result and diagnostic printing: text on a terminal, JSON lines otherwise.

use std::io::{self, IsTerminal, Write};

use serde::Serialize;

use cutdraft_core::DraftError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    /// `--json` wins; otherwise JSON whenever stdout is piped.
    pub fn detect(json_flag: bool) -> Self {
        Self::choose(json_flag, io::stdout().is_terminal())
    }

    fn choose(json_flag: bool, stdout_is_tty: bool) -> Self {
        if json_flag || !stdout_is_tty {
            Self::Json
        } else {
            Self::Human
        }
    }
}

/// Print a command result on stdout.
pub fn print_output<T, F>(format: OutputFormat, value: &T, human: F) -> io::Result<()>
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    let line = render(format, value, human)?;
    writeln!(io::stdout().lock(), "{line}")
}

fn render<T, F>(format: OutputFormat, value: &T, human: F) -> io::Result<String>
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Human => Ok(human(value)),
        OutputFormat::Json => serde_json::to_string(value).map_err(io::Error::other),
    }
}

// ── Diagnostics ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum Level {
    Error,
    Warning,
}

/// One stderr line. Draft warnings and failures share this shape so
/// scripts can read both from the same stream.
#[derive(Debug, Serialize)]
struct Diagnostic<'a> {
    level: Level,
    code: &'a str,
    message: &'a str,
}

impl Diagnostic<'_> {
    fn render(&self, format: OutputFormat, colored: bool) -> String {
        match format {
            OutputFormat::Json => serde_json::to_string(self)
                .unwrap_or_else(|_| format!("{{\"code\":\"{}\"}}", self.code)),
            OutputFormat::Human => {
                let label = match self.level {
                    Level::Error => "error",
                    Level::Warning => "warning",
                };
                if colored {
                    let color = match self.level {
                        Level::Error => "\x1b[31m",
                        Level::Warning => "\x1b[33m",
                    };
                    format!("{color}{label}\x1b[0m: {}", self.message)
                } else {
                    format!("{label}: {}", self.message)
                }
            }
        }
    }

    fn emit(&self, format: OutputFormat) {
        let line = self.render(format, io::stderr().is_terminal());
        let _ = writeln!(io::stderr().lock(), "{line}");
    }
}

pub fn print_warning(format: OutputFormat, code: &str, message: &str) {
    Diagnostic { level: Level::Warning, code, message }.emit(format);
}

/// Report a failed command with a stable code derived from its cause.
pub fn print_anyhow_error(format: OutputFormat, error: &anyhow::Error) {
    let message = describe(error);
    Diagnostic { level: Level::Error, code: error_code(error), message: &message }.emit(format);
}

fn describe(error: &anyhow::Error) -> String {
    let message = format!("{error:#}");
    if error_code(error) == "REQUEST_INVALID" {
        return format!("{message} (is the request valid JSON?)");
    }
    message
}

fn error_code(error: &anyhow::Error) -> &'static str {
    for cause in error.chain() {
        if let Some(draft) = cause.downcast_ref::<DraftError>() {
            return draft_code(draft);
        }
        if cause.is::<serde_json::Error>() {
            return "REQUEST_INVALID";
        }
        if let Some(io) = cause.downcast_ref::<io::Error>() {
            return match io.kind() {
                io::ErrorKind::NotFound => "NOT_FOUND",
                _ => "IO_ERROR",
            };
        }
    }
    "ERROR"
}

fn draft_code(error: &DraftError) -> &'static str {
    match error {
        DraftError::InvalidTimeFormat(_) => "INVALID_TIME",
        DraftError::SchemaMergeFailure(_) => "TEMPLATE_INVALID",
        DraftError::DraftNotFound(_) | DraftError::ItemNotFound { .. } => "DRAFT_NOT_FOUND",
        DraftError::NotAssembled(_) => "NOT_ASSEMBLED",
        DraftError::UnresolvedSource { .. } => "SOURCE_UNRESOLVED",
        DraftError::UnknownAssetName { .. } => "UNKNOWN_ASSET",
        _ => "ASSEMBLY_FAILED",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use cutdraft_core::document::Canvas;
    use cutdraft_core::manager::DraftManager;

    #[test]
    fn json_flag_or_pipe_selects_json() {
        assert_eq!(OutputFormat::choose(true, true), OutputFormat::Json);
        assert_eq!(OutputFormat::choose(false, false), OutputFormat::Json);
        assert_eq!(OutputFormat::choose(false, true), OutputFormat::Human);
    }

    #[test]
    fn results_render_per_format() {
        let counts = serde_json::json!({"placed": 3, "skipped": 1});
        let human = render(OutputFormat::Human, &counts, |c| format!("{} placed", c["placed"]));
        assert_eq!(human.unwrap(), "3 placed");
        let json = render(OutputFormat::Json, &counts, |_| unreachable!()).unwrap();
        assert_eq!(serde_json::from_str::<serde_json::Value>(&json).unwrap(), counts);
    }

    #[test]
    fn assembly_warning_lines() {
        let warning = Diagnostic {
            level: Level::Warning,
            code: "ASSEMBLY_WARNING",
            message: "intro: videos[0]: unknown transitions `x`, skipped",
        };
        let json: serde_json::Value =
            serde_json::from_str(&warning.render(OutputFormat::Json, false)).unwrap();
        assert_eq!(json["level"], "warning");
        assert_eq!(json["code"], "ASSEMBLY_WARNING");
        assert_eq!(
            warning.render(OutputFormat::Human, false),
            "warning: intro: videos[0]: unknown transitions `x`, skipped"
        );
        assert!(warning.render(OutputFormat::Human, true).starts_with("\x1b[33mwarning"));
    }

    #[test]
    fn draft_errors_keep_their_code_through_context() {
        let err = anyhow::Error::new(DraftError::InvalidTimeFormat("5 secs".into()))
            .context("assembling draft `intro`");
        assert_eq!(error_code(&err), "INVALID_TIME");
        let message = describe(&err);
        assert!(message.contains("assembling draft `intro`"));
        assert!(message.contains("5 secs"));

        let draft = DraftManager::new().create("intro", Canvas::default());
        let cases = [
            (DraftError::SchemaMergeFailure("empty".into()), "TEMPLATE_INVALID"),
            (DraftError::ItemNotFound { draft, item: "videos[3]".into() }, "DRAFT_NOT_FOUND"),
            (DraftError::NotAssembled(draft), "NOT_ASSEMBLED"),
            (DraftError::MaterialNotFound("A".into()), "ASSEMBLY_FAILED"),
        ];
        for (error, code) in cases {
            assert_eq!(error_code(&anyhow::Error::new(error)), code);
        }
    }

    #[test]
    fn bad_request_json_and_missing_files() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = anyhow::Error::new(parse).context("parsing request.json");
        assert_eq!(error_code(&err), "REQUEST_INVALID");
        assert!(describe(&err).ends_with("(is the request valid JSON?)"));

        let err = std::fs::read("/definitely/not/here.json").context("reading request").unwrap_err();
        assert_eq!(error_code(&err), "NOT_FOUND");
        assert_eq!(error_code(&anyhow::anyhow!("no requests")), "ERROR");
    }
}

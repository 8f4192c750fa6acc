// Caption helpers: screen position normalization and script-aware line wrapping.

use serde::{Deserialize, Serialize};

use crate::document::Canvas;
use crate::request::PositionSpec;

/// Normalize a requested position to clip transform units, where the
/// canvas spans -1..1 on both axes with y pointing up.
///
/// Values with magnitude <= 1 on both axes are already in those units.
/// Anything larger is read as pixels from the top-left corner of `canvas`.
pub fn normalize_position(position: PositionSpec, canvas: &Canvas) -> (f64, f64) {
    if position.x.abs() <= 1.0 && position.y.abs() <= 1.0 {
        return (position.x, position.y);
    }
    let width = f64::from(canvas.width.max(1));
    let height = f64::from(canvas.height.max(1));
    (2.0 * position.x / width - 1.0, 1.0 - 2.0 * position.y / height)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinebreakMode {
    #[default]
    None,
    #[serde(alias = "manual", alias = "auto")]
    Wrap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinebreakRule {
    pub mode: LinebreakMode,
    /// Code points per line for CJK captions.
    pub zh_length: usize,
    /// Words per line for Latin captions.
    pub en_words: usize,
}

impl Default for LinebreakRule {
    fn default() -> Self {
        Self { mode: LinebreakMode::None, zh_length: 8, en_words: 3 }
    }
}

impl LinebreakRule {
    pub fn wrapping(zh_length: usize, en_words: usize) -> Self {
        Self { mode: LinebreakMode::Wrap, zh_length, en_words }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Cjk,
    Latin,
}

/// The predominant script: CJK only when CJK code points outnumber Latin letters.
pub fn detect_script(text: &str) -> Script {
    let (cjk, latin) = text.chars().fold((0usize, 0usize), |(cjk, latin), c| {
        if is_cjk(c) {
            (cjk + 1, latin)
        } else if is_latin_letter(c) {
            (cjk, latin + 1)
        } else {
            (cjk, latin)
        }
    });
    if cjk > latin {
        Script::Cjk
    } else {
        Script::Latin
    }
}

fn is_cjk(c: char) -> bool {
    matches!(
        c as u32,
        0x3040..=0x30FF
            | 0x3400..=0x4DBF
            | 0x4E00..=0x9FFF
            | 0xAC00..=0xD7AF
            | 0xF900..=0xFAFF
            | 0x20000..=0x2A6DF
    )
}

fn is_latin_letter(c: char) -> bool {
    c.is_ascii_alphabetic() || (('\u{00C0}'..='\u{024F}').contains(&c) && c.is_alphabetic())
}

/// Hard-wrap `text` per `rule`. Existing line breaks are kept; each line
/// is wrapped on its own using the script of the whole string.
pub fn wrap(text: &str, rule: &LinebreakRule) -> String {
    if rule.mode == LinebreakMode::None {
        return text.to_string();
    }
    let script = detect_script(text);
    text.split('\n')
        .map(|line| match script {
            Script::Cjk => wrap_chars(line, rule.zh_length),
            Script::Latin => wrap_words(line, rule.en_words),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn wrap_chars(line: &str, per_line: usize) -> String {
    if per_line == 0 {
        return line.to_string();
    }
    let chars: Vec<char> = line.chars().collect();
    chars.chunks(per_line).map(|chunk| chunk.iter().collect::<String>()).collect::<Vec<_>>().join("\n")
}

fn wrap_words(line: &str, per_line: usize) -> String {
    if per_line == 0 {
        return line.to_string();
    }
    let words: Vec<&str> = line.split_whitespace().collect();
    words.chunks(per_line).map(|chunk| chunk.join(" ")).collect::<Vec<_>>().join("\n")
}

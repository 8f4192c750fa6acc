// Advanced SubStation Alpha export of a document's text tracks.

use std::fmt::Write as _;

use crate::document::Document;
use crate::material::{MaterialPayload, TextMaterial, TextStyle};
use crate::track::{Track, TrackKind};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssOptions {
    /// Script resolution; the document canvas when unset.
    pub play_res_x: Option<u32>,
    pub play_res_y: Option<u32>,
}

const STYLE_FORMAT: &str = "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, \
OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, \
BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding";

const EVENT_FORMAT: &str =
    "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text";

/// Render every text track as one ASS script: a style per track and a
/// `Dialogue` line per segment.
pub fn export_ass(document: &Document, options: &AssOptions) -> String {
    let width = options.play_res_x.unwrap_or(document.canvas.width);
    let height = options.play_res_y.unwrap_or(document.canvas.height);

    let mut out = String::new();
    out.push_str("[Script Info]\n");
    out.push_str("ScriptType: v4.00+\n");
    let _ = writeln!(out, "PlayResX: {width}");
    let _ = writeln!(out, "PlayResY: {height}");
    out.push_str("WrapStyle: 0\n");
    out.push_str("ScaledBorderAndShadow: yes\n\n");

    let tracks: Vec<&Track> = document.tracks_of(TrackKind::Text).collect();

    out.push_str("[V4+ Styles]\n");
    out.push_str(STYLE_FORMAT);
    out.push('\n');
    for track in &tracks {
        let (font, style) = first_text(document, track)
            .map(|text| (text.font.as_str(), text.style.clone()))
            .unwrap_or(("", TextStyle::default()));
        let _ = writeln!(out, "{}", style_line(&style_name(track), font, &style));
    }
    out.push('\n');

    out.push_str("[Events]\n");
    out.push_str(EVENT_FORMAT);
    out.push('\n');
    for track in &tracks {
        let name = style_name(track);
        for segment in &track.segments {
            let Some(text) = text_material(document, &segment.material_id) else {
                continue;
            };
            let position = segment
                .clip
                .map(|clip| {
                    let x = (clip.transform.x + 1.0) / 2.0 * f64::from(width);
                    let y = (1.0 - clip.transform.y) / 2.0 * f64::from(height);
                    format!("{{\\pos({},{})}}", x.round() as i64, y.round() as i64)
                })
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "Dialogue: {},{},{},{},,0,0,0,,{}{}",
                track.relative_index,
                format_ass_time(segment.target_range.start),
                format_ass_time(segment.target_range.end()),
                name,
                position,
                escape(&plain_text(&text.content)),
            );
        }
    }
    out
}

/// `h:mm:ss.cc`, truncated to centiseconds.
pub fn format_ass_time(us: u64) -> String {
    let cs = us / 10_000;
    format!("{}:{:02}:{:02}.{:02}", cs / 360_000, (cs / 6_000) % 60, (cs / 100) % 60, cs % 100)
}

fn style_line(name: &str, font: &str, style: &TextStyle) -> String {
    let alpha = ((1.0 - style.alpha.clamp(0.0, 1.0)) * 255.0).round() as u8;
    let [r, g, b] = style.color.map(|channel| (channel.clamp(0.0, 1.0) * 255.0).round() as u8);
    let flag = |on: bool| if on { -1 } else { 0 };
    // Bottom row alignments: 1 left, 2 center, 3 right.
    let alignment = match style.align {
        0 => 1,
        2 => 3,
        _ => 2,
    };
    format!(
        "Style: {name},{font},{size},&H{alpha:02X}{b:02X}{g:02X}{r:02X},&H000000FF,&H00000000,\
&H00000000,{bold},{italic},{underline},0,100,100,{spacing},0,1,2,0,{alignment},10,10,10,1",
        size = style.size,
        bold = flag(style.bold),
        italic = flag(style.italic),
        underline = flag(style.underline),
        spacing = style.letter_spacing,
    )
}

fn style_name(track: &Track) -> String {
    let name: String = track.name.chars().filter(|c| *c != ',').collect();
    if name.is_empty() {
        "Default".to_string()
    } else {
        name
    }
}

fn first_text<'a>(document: &'a Document, track: &Track) -> Option<&'a TextMaterial> {
    track.segments.iter().find_map(|segment| text_material(document, &segment.material_id))
}

fn text_material<'a>(document: &'a Document, id: &str) -> Option<&'a TextMaterial> {
    match &document.materials.get(id).ok()?.payload {
        MaterialPayload::TextStyle(text) => Some(text),
        _ => None,
    }
}

/// Text materials store either plain text or `{"text": ..}` JSON.
fn plain_text(content: &str) -> String {
    serde_json::from_str::<serde_json::Value>(content)
        .ok()
        .and_then(|value| value.get("text").and_then(|text| text.as_str()).map(String::from))
        .unwrap_or_else(|| content.to_string())
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('{', "\\{")
        .replace('}', "\\}")
        .replace("\r\n", "\\N")
        .replace('\n', "\\N")
}

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use thiserror::Error;
use tracing::warn;

use crate::docx::xml::{child_elements, escape_attr, find_attr, first_child, XmlEvent};

/// Largest `w:sz` Word accepts (1638pt).
pub const MAX_HALF_POINTS: u32 = 3276;

const UNDERLINE_STYLES: &[&str] = &[
    "single",
    "words",
    "double",
    "thick",
    "dotted",
    "dottedHeavy",
    "dash",
    "dashedHeavy",
    "dashLong",
    "dashLongHeavy",
    "dotDash",
    "dashDotHeavy",
    "dotDotDash",
    "dashDotDotHeavy",
    "wave",
    "wavyHeavy",
    "wavyDouble",
    "none",
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Underline {
    Off,
    Single,
    Style(String),
}

impl Underline {
    fn from_val(val: &str) -> Self {
        match val {
            "none" => Underline::Off,
            "single" => Underline::Single,
            other => Underline::Style(other.to_string()),
        }
    }

    fn val(&self) -> &str {
        match self {
            Underline::Off => "none",
            Underline::Single => "single",
            Underline::Style(s) => s.as_str(),
        }
    }
}

/// 24-bit RGB color as stored in `w:color/@w:val`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb(pub u32);

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06X}", self.0)
    }
}

impl FromStr for Rgb {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u32::from_str_radix(s.trim(), 16).map(Rgb)
    }
}

/// Character formatting captured from a run. `None` means "not set on this run".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunFormat {
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<Underline>,
    pub font_name: Option<String>,
    /// Half-points, the `w:sz` unit.
    pub font_size: Option<u32>,
    pub color: Option<Rgb>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Run {
    pub text: String,
    pub format: RunFormat,
}

impl Run {
    pub fn new(text: impl Into<String>, format: RunFormat) -> Self {
        Self {
            text: text.into(),
            format,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatAttr {
    Bold,
    Italic,
    Underline,
    FontName,
    FontSize,
    Color,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AttributeRejected {
    #[error("empty font name")]
    EmptyFontName,
    #[error("font name contains control characters: {0:?}")]
    FontNameControl(String),
    #[error("font size {0} half-points outside 1..={MAX_HALF_POINTS}")]
    FontSize(u32),
    #[error("color {0:#X} exceeds 24 bits")]
    Color(u32),
    #[error("unknown underline style {0:?}")]
    Underline(String),
}

/// Attributes that could not be written for one run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormatOutcome {
    pub skipped: Vec<(FormatAttr, AttributeRejected)>,
}

impl FormatOutcome {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Spans of the paragraph children that carry text: direct `w:r` and `w:hyperlink`.
pub fn text_bearing_children(events: &[XmlEvent], p_span: &Range<usize>) -> Vec<Range<usize>> {
    child_elements(events, p_span)
        .into_iter()
        .filter(|(name, _)| *name == "w:r" || *name == "w:hyperlink")
        .map(|(_, r)| r)
        .collect()
}

/// Run spans of a paragraph in document order, hyperlink runs included.
pub fn run_spans(events: &[XmlEvent], p_span: &Range<usize>) -> Vec<Range<usize>> {
    let mut out = Vec::new();
    for (name, span) in child_elements(events, p_span) {
        match name {
            "w:r" => out.push(span),
            "w:hyperlink" => out.extend(
                child_elements(events, &span)
                    .into_iter()
                    .filter(|(n, _)| *n == "w:r")
                    .map(|(_, r)| r),
            ),
            _ => {}
        }
    }
    out
}

pub fn read_runs(events: &[XmlEvent], p_span: &Range<usize>) -> Vec<Run> {
    run_spans(events, p_span)
        .into_iter()
        .map(|span| Run {
            text: run_text(events, &span),
            format: read_format(events, &span),
        })
        .collect()
}

pub fn paragraph_text(events: &[XmlEvent], p_span: &Range<usize>) -> String {
    run_spans(events, p_span)
        .iter()
        .map(|span| run_text(events, span))
        .collect()
}

fn run_text(events: &[XmlEvent], r_span: &Range<usize>) -> String {
    let mut buf = String::new();
    for (name, span) in child_elements(events, r_span) {
        match name {
            "w:t" => {
                for ev in &events[span] {
                    if let XmlEvent::Text { text } = ev {
                        buf.push_str(text);
                    }
                }
            }
            "w:tab" | "w:ptab" => buf.push('\t'),
            "w:cr" => buf.push('\n'),
            "w:br" => {
                let br_type = find_attr(events[span.start].attrs(), "w:type");
                if br_type.unwrap_or("textWrapping") == "textWrapping" {
                    buf.push('\n');
                }
            }
            "w:noBreakHyphen" => buf.push('-'),
            _ => {}
        }
    }
    buf
}

fn read_format(events: &[XmlEvent], r_span: &Range<usize>) -> RunFormat {
    let mut fmt = RunFormat::default();
    let Some(rpr) = first_child(events, r_span, "w:rPr") else {
        return fmt;
    };
    for (name, span) in child_elements(events, &rpr) {
        let attrs = events[span.start].attrs();
        match name {
            "w:b" => fmt.bold = Some(parse_w_bool(attrs)),
            "w:i" => fmt.italic = Some(parse_w_bool(attrs)),
            "w:u" => fmt.underline = find_attr(attrs, "w:val").map(Underline::from_val),
            "w:rFonts" => fmt.font_name = find_attr(attrs, "w:ascii").map(unescape_attr),
            "w:sz" => fmt.font_size = find_attr(attrs, "w:val").and_then(|v| v.trim().parse().ok()),
            "w:color" => {
                fmt.color = find_attr(attrs, "w:val")
                    .filter(|v| !v.eq_ignore_ascii_case("auto"))
                    .and_then(|v| v.parse().ok())
            }
            _ => {}
        }
    }
    fmt
}

fn parse_w_bool(attrs: &[(String, String)]) -> bool {
    if let Some(v) = find_attr(attrs, "w:val") {
        let s = v.trim().to_ascii_lowercase();
        return !(s == "0" || s == "false" || s == "off" || s == "none");
    }
    true
}

fn unescape_attr(raw: &str) -> String {
    quick_xml::escape::unescape(raw)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

fn val_attr(value: impl Into<String>) -> Vec<(String, String)> {
    vec![("w:val".to_string(), value.into())]
}

fn bool_attr(on: bool) -> Vec<(String, String)> {
    if on {
        Vec::new()
    } else {
        val_attr("0")
    }
}

/// Builds `w:rPr` children in schema order, one attribute at a time.
///
/// A rejected value is skipped and reported; the remaining attributes are still written.
fn format_properties(fmt: &RunFormat) -> (Vec<XmlEvent>, FormatOutcome) {
    let mut props: Vec<XmlEvent> = Vec::new();
    let mut outcome = FormatOutcome::default();

    let mut push = |attr: FormatAttr, res: Result<XmlEvent, AttributeRejected>| match res {
        Ok(ev) => props.push(ev),
        Err(why) => {
            warn!(?attr, %why, "skipping run attribute");
            outcome.skipped.push((attr, why));
        }
    };

    if let Some(name) = fmt.font_name.as_deref() {
        push(FormatAttr::FontName, font_event(name));
    }
    if let Some(b) = fmt.bold {
        push(FormatAttr::Bold, Ok(XmlEvent::empty("w:b", bool_attr(b))));
    }
    if let Some(i) = fmt.italic {
        push(FormatAttr::Italic, Ok(XmlEvent::empty("w:i", bool_attr(i))));
    }
    if let Some(color) = fmt.color {
        push(FormatAttr::Color, color_event(color));
    }
    if let Some(sz) = fmt.font_size {
        push(FormatAttr::FontSize, size_event(sz));
    }
    if let Some(u) = fmt.underline.as_ref() {
        push(FormatAttr::Underline, underline_event(u));
    }
    (props, outcome)
}

fn font_event(name: &str) -> Result<XmlEvent, AttributeRejected> {
    if name.trim().is_empty() {
        return Err(AttributeRejected::EmptyFontName);
    }
    if name.chars().any(char::is_control) {
        return Err(AttributeRejected::FontNameControl(name.to_string()));
    }
    let v = escape_attr(name);
    Ok(XmlEvent::empty(
        "w:rFonts",
        vec![("w:ascii".to_string(), v.clone()), ("w:hAnsi".to_string(), v)],
    ))
}

fn color_event(color: Rgb) -> Result<XmlEvent, AttributeRejected> {
    if color.0 > 0xFF_FFFF {
        return Err(AttributeRejected::Color(color.0));
    }
    Ok(XmlEvent::empty("w:color", val_attr(color.to_string())))
}

fn size_event(half_points: u32) -> Result<XmlEvent, AttributeRejected> {
    if half_points == 0 || half_points > MAX_HALF_POINTS {
        return Err(AttributeRejected::FontSize(half_points));
    }
    Ok(XmlEvent::empty("w:sz", val_attr(half_points.to_string())))
}

fn underline_event(u: &Underline) -> Result<XmlEvent, AttributeRejected> {
    let val = u.val();
    if !UNDERLINE_STYLES.contains(&val) {
        return Err(AttributeRejected::Underline(val.to_string()));
    }
    Ok(XmlEvent::empty("w:u", val_attr(val)))
}

/// Events for one `w:r`, plus the attributes that had to be dropped.
///
/// Tabs become `w:tab`, line breaks become `w:br` (a `\r\n` pair yields one break).
pub fn run_events(run: &Run) -> (Vec<XmlEvent>, FormatOutcome) {
    let (props, outcome) = format_properties(&run.format);
    let mut out = vec![XmlEvent::start("w:r", Vec::new())];
    if !props.is_empty() {
        out.push(XmlEvent::start("w:rPr", Vec::new()));
        out.extend(props);
        out.push(XmlEvent::end("w:rPr"));
    }

    let mut pending = String::new();
    let mut chars = run.text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\t' => {
                flush_text(&mut out, &mut pending);
                out.push(XmlEvent::empty("w:tab", Vec::new()));
            }
            '\r' | '\n' => {
                if ch == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                flush_text(&mut out, &mut pending);
                out.push(XmlEvent::empty("w:br", Vec::new()));
            }
            _ => pending.push(ch),
        }
    }
    flush_text(&mut out, &mut pending);
    out.push(XmlEvent::end("w:r"));
    (out, outcome)
}

fn flush_text(out: &mut Vec<XmlEvent>, pending: &mut String) {
    if pending.is_empty() {
        return;
    }
    let text = std::mem::take(pending);
    let attrs = if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
        vec![("xml:space".to_string(), "preserve".to_string())]
    } else {
        Vec::new()
    };
    out.push(XmlEvent::start("w:t", attrs));
    out.push(XmlEvent::Text { text });
    out.push(XmlEvent::end("w:t"));
}

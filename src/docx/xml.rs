use std::ops::Range;

use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::Reader;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum XmlEvent {
    Decl {
        version: String,
        encoding: Option<String>,
        standalone: Option<String>,
    },
    Start {
        name: String,
        attrs: Vec<(String, String)>,
    },
    End {
        name: String,
    },
    Empty {
        name: String,
        attrs: Vec<(String, String)>,
    },
    Text {
        text: String,
    },
    CData {
        text: String,
    },
    Comment {
        text: String,
    },
    PI {
        content: String,
    },
    DocType {
        text: String,
    },
}

impl XmlEvent {
    pub fn start(name: &str, attrs: Vec<(String, String)>) -> Self {
        XmlEvent::Start {
            name: name.to_string(),
            attrs,
        }
    }

    pub fn end(name: &str) -> Self {
        XmlEvent::End {
            name: name.to_string(),
        }
    }

    pub fn empty(name: &str, attrs: Vec<(String, String)>) -> Self {
        XmlEvent::Empty {
            name: name.to_string(),
            attrs,
        }
    }

    /// Element name for `Start`/`Empty` events.
    pub fn open_name(&self) -> Option<&str> {
        match self {
            XmlEvent::Start { name, .. } | XmlEvent::Empty { name, .. } => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn attrs(&self) -> &[(String, String)] {
        match self {
            XmlEvent::Start { attrs, .. } | XmlEvent::Empty { attrs, .. } => attrs,
            _ => &[],
        }
    }
}

#[derive(Clone, Debug)]
pub struct XmlPart {
    pub name: String,
    pub events: Vec<XmlEvent>,
}

pub fn parse_xml_part(name: &str, xml_bytes: &[u8]) -> Result<XmlPart> {
    let mut reader = Reader::from_reader(xml_bytes);
    reader.config_mut().trim_text(false);

    let bad = |what: &str, e: &dyn std::fmt::Display| {
        Error::malformed(format!("{name}: {what}: {e}"))
    };

    let mut events: Vec<XmlEvent> = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let ev = reader
            .read_event_into(&mut buf)
            .map_err(|e| bad("read xml event", &e))?;
        match ev {
            Event::Eof => break,
            Event::Decl(d) => {
                let version = bytes_to_string(d.version().map_err(|e| bad("decl version", &e))?);
                let encoding = d
                    .encoding()
                    .map(|r| r.map(bytes_to_string))
                    .transpose()
                    .unwrap_or(None);
                let standalone = d
                    .standalone()
                    .map(|r| r.map(bytes_to_string))
                    .transpose()
                    .unwrap_or(None);
                events.push(XmlEvent::Decl {
                    version,
                    encoding,
                    standalone,
                });
            }
            Event::Start(s) => {
                events.push(XmlEvent::Start {
                    name: bytes_to_string(s.name().as_ref()),
                    attrs: collect_attrs(name, &s)?,
                });
            }
            Event::End(e) => {
                events.push(XmlEvent::End {
                    name: bytes_to_string(e.name().as_ref()),
                });
            }
            Event::Empty(s) => {
                events.push(XmlEvent::Empty {
                    name: bytes_to_string(s.name().as_ref()),
                    attrs: collect_attrs(name, &s)?,
                });
            }
            Event::Text(t) => {
                let txt = t.unescape().map_err(|e| bad("unescape text", &e))?.into_owned();
                events.push(XmlEvent::Text { text: txt });
            }
            Event::CData(t) => {
                events.push(XmlEvent::CData {
                    text: bytes_to_string(t.into_inner()),
                });
            }
            Event::Comment(t) => {
                events.push(XmlEvent::Comment {
                    text: bytes_to_string(t.into_inner()),
                });
            }
            Event::PI(t) => {
                let target = bytes_to_string(t.target());
                let content = bytes_to_string(t.content());
                events.push(XmlEvent::PI {
                    content: format!("{target}{content}"),
                });
            }
            Event::DocType(t) => {
                events.push(XmlEvent::DocType {
                    text: bytes_to_string(t.into_inner()),
                });
            }
        }
    }

    Ok(XmlPart {
        name: name.to_string(),
        events,
    })
}

fn collect_attrs(part: &str, s: &BytesStart<'_>) -> Result<Vec<(String, String)>> {
    let mut attrs: Vec<(String, String)> = Vec::new();
    for a in s.attributes() {
        let a = a.map_err(|e| Error::malformed(format!("{part}: attr: {e}")))?;
        // Values stay raw (already escaped) so character references such as `&#xD;&#xA;`
        // survive a round trip unchanged.
        attrs.push((
            bytes_to_string(a.key.as_ref()),
            bytes_to_string(a.value.as_ref()),
        ));
    }
    Ok(attrs)
}

fn bytes_to_string(bytes: impl AsRef<[u8]>) -> String {
    String::from_utf8_lossy(bytes.as_ref()).into_owned()
}

pub fn write_xml_part(part: &XmlPart) -> Result<Vec<u8>> {
    let mut out: Vec<u8> = Vec::new();

    fn escape_text_into(out: &mut Vec<u8>, text: &str) {
        for ch in text.chars() {
            match ch {
                '&' => out.extend_from_slice(b"&amp;"),
                '<' => out.extend_from_slice(b"&lt;"),
                '>' => out.extend_from_slice(b"&gt;"),
                _ => {
                    let mut buf = [0u8; 4];
                    out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                }
            }
        }
    }

    fn write_start_like(out: &mut Vec<u8>, name: &str, attrs: &[(String, String)], empty: bool) {
        out.extend_from_slice(b"<");
        out.extend_from_slice(name.as_bytes());
        // Attribute values are raw XML; never escape them a second time.
        for (k, v) in attrs {
            out.extend_from_slice(b" ");
            out.extend_from_slice(k.as_bytes());
            out.extend_from_slice(b"=\"");
            out.extend_from_slice(v.as_bytes());
            out.extend_from_slice(b"\"");
        }
        if empty {
            out.extend_from_slice(b"/>");
        } else {
            out.extend_from_slice(b">");
        }
    }

    for ev in &part.events {
        match ev {
            XmlEvent::Decl {
                version,
                encoding,
                standalone,
            } => {
                let d =
                    BytesDecl::new(version.as_str(), encoding.as_deref(), standalone.as_deref());
                let mut writer = quick_xml::Writer::new(Vec::new());
                writer
                    .write_event(Event::Decl(d))
                    .map_err(|e| Error::serialize(format!("{}: write decl: {e}", part.name)))?;
                out.extend_from_slice(&writer.into_inner());
            }
            XmlEvent::Start { name, attrs } => write_start_like(&mut out, name, attrs, false),
            XmlEvent::End { name } => {
                out.extend_from_slice(b"</");
                out.extend_from_slice(name.as_bytes());
                out.extend_from_slice(b">");
            }
            XmlEvent::Empty { name, attrs } => write_start_like(&mut out, name, attrs, true),
            XmlEvent::Text { text } => escape_text_into(&mut out, text),
            XmlEvent::CData { text } => {
                out.extend_from_slice(b"<![CDATA[");
                out.extend_from_slice(text.as_bytes());
                out.extend_from_slice(b"]]>");
            }
            XmlEvent::Comment { text } => {
                out.extend_from_slice(b"<!--");
                out.extend_from_slice(text.as_bytes());
                out.extend_from_slice(b"-->");
            }
            XmlEvent::PI { content } => {
                out.extend_from_slice(b"<?");
                out.extend_from_slice(content.as_bytes());
                out.extend_from_slice(b"?>");
            }
            XmlEvent::DocType { text } => {
                out.extend_from_slice(b"<!DOCTYPE");
                out.extend_from_slice(text.as_bytes());
                out.extend_from_slice(b">");
            }
        }
    }

    Ok(out)
}

/// Whether `ch` is allowed in XML 1.0 character data.
pub fn is_xml_char(ch: char) -> bool {
    matches!(
        ch,
        '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}'
    )
}

/// Escapes a value for storage in the raw attribute representation.
pub fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn find_attr<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Index of the event closing the element opened at `start`.
///
/// For an `Empty` event this is `start` itself. Returns `None` when `start` does not open
/// an element or the stream ends before the element is closed.
pub fn element_end(events: &[XmlEvent], start: usize) -> Option<usize> {
    match events.get(start)? {
        XmlEvent::Empty { .. } => Some(start),
        XmlEvent::Start { .. } => {
            let mut depth = 0usize;
            for (idx, ev) in events.iter().enumerate().skip(start) {
                match ev {
                    XmlEvent::Start { .. } => depth += 1,
                    XmlEvent::End { .. } => {
                        depth -= 1;
                        if depth == 0 {
                            return Some(idx);
                        }
                    }
                    _ => {}
                }
            }
            None
        }
        _ => None,
    }
}

/// Element span (`start..end+1`) covering the element opened at `start`.
pub fn element_span(events: &[XmlEvent], start: usize) -> Option<Range<usize>> {
    element_end(events, start).map(|end| start..end + 1)
}

/// Direct child elements of the element spanning `span`, as `(name, span)` pairs.
///
/// Text, comments and other non-element events between children are skipped.
pub fn child_elements<'a>(events: &'a [XmlEvent], span: &Range<usize>) -> Vec<(&'a str, Range<usize>)> {
    let mut out = Vec::new();
    if span.len() < 2 {
        return out;
    }
    let mut idx = span.start + 1;
    let last = span.end - 1;
    while idx < last {
        match events[idx].open_name() {
            Some(name) => match element_span(events, idx) {
                Some(child) => {
                    idx = child.end;
                    out.push((name, child));
                }
                None => break,
            },
            None => idx += 1,
        }
    }
    out
}

pub fn first_child<'a>(
    events: &'a [XmlEvent],
    span: &Range<usize>,
    name: &str,
) -> Option<Range<usize>> {
    child_elements(events, span)
        .into_iter()
        .find(|(n, _)| *n == name)
        .map(|(_, r)| r)
}

/// SHA-256 fingerprint of an event slice, covering names, attributes and text.
pub fn events_hash(events: &[XmlEvent]) -> String {
    let mut hasher = Sha256::new();
    for ev in events {
        match ev {
            XmlEvent::Start { name, attrs } => hash_start_like(&mut hasher, b"S:", name, attrs),
            XmlEvent::Empty { name, attrs } => hash_start_like(&mut hasher, b"N:", name, attrs),
            XmlEvent::End { name } => {
                hasher.update(b"E:");
                hasher.update(name.as_bytes());
            }
            XmlEvent::Text { text } => {
                hasher.update(b"T:");
                hasher.update(text.as_bytes());
            }
            XmlEvent::Decl {
                version,
                encoding,
                standalone,
            } => {
                hasher.update(b"D:");
                hasher.update(version.as_bytes());
                hasher.update(b"|");
                if let Some(e) = encoding.as_ref() {
                    hasher.update(e.as_bytes());
                }
                hasher.update(b"|");
                if let Some(s) = standalone.as_ref() {
                    hasher.update(s.as_bytes());
                }
            }
            XmlEvent::CData { text } => {
                hasher.update(b"C:");
                hasher.update(text.as_bytes());
            }
            XmlEvent::Comment { text } => {
                hasher.update(b"M:");
                hasher.update(text.as_bytes());
            }
            XmlEvent::PI { content } => {
                hasher.update(b"P:");
                hasher.update(content.as_bytes());
            }
            XmlEvent::DocType { text } => {
                hasher.update(b"Y:");
                hasher.update(text.as_bytes());
            }
        }
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

fn hash_start_like(hasher: &mut Sha256, tag: &[u8], name: &str, attrs: &[(String, String)]) {
    hasher.update(tag);
    hasher.update(name.as_bytes());
    hasher.update(b"|");
    for (k, v) in attrs {
        hasher.update(k.as_bytes());
        hasher.update(b"=");
        hasher.update(v.as_bytes());
        hasher.update(b";");
    }
}

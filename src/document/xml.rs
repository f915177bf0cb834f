/*!
 * Lossless XML event model for OOXML parts.
 *
 * A part is parsed into a flat list of events that can be edited in place
 * and written back. Attribute values are kept in their escaped form so that
 * character references survive a round trip untouched.
 *
 * Text-bearing elements (`w:t`, `a:t`, `t`) are normalized on parse so that
 * each one is exactly `Start, Text, End`; editors can then address a text
 * node by the index of its start tag.
 */

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::ops::Range;

use crate::errors::DocumentError;

/// One XML event
#[derive(Clone, Debug, PartialEq)]
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
    pub fn start(name: impl Into<String>, attrs: Vec<(String, String)>) -> Self {
        XmlEvent::Start {
            name: name.into(),
            attrs,
        }
    }

    pub fn end(name: impl Into<String>) -> Self {
        XmlEvent::End { name: name.into() }
    }

    pub fn text(text: impl Into<String>) -> Self {
        XmlEvent::Text { text: text.into() }
    }

    /// Qualified name of a start, empty or end tag
    pub fn name(&self) -> Option<&str> {
        match self {
            XmlEvent::Start { name, .. } | XmlEvent::Empty { name, .. } | XmlEvent::End { name } => Some(name),
            _ => None,
        }
    }

    /// Attributes of a start or empty tag
    pub fn attrs(&self) -> &[(String, String)] {
        match self {
            XmlEvent::Start { attrs, .. } | XmlEvent::Empty { attrs, .. } => attrs,
            _ => &[],
        }
    }

    /// Raw value of an attribute
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs().iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// True for a start tag with the given qualified name
    pub fn is_start(&self, qname: &str) -> bool {
        matches!(self, XmlEvent::Start { name, .. } if name == qname)
    }

    /// True for a start or empty tag with the given qualified name
    pub fn opens(&self, qname: &str) -> bool {
        matches!(self, XmlEvent::Start { name, .. } | XmlEvent::Empty { name, .. } if name == qname)
    }

    /// True for an end tag with the given qualified name
    pub fn is_end(&self, qname: &str) -> bool {
        matches!(self, XmlEvent::End { name } if name == qname)
    }
}

/// Name without its namespace prefix
pub fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, local)| local).unwrap_or(name)
}

/// Namespace prefix of a qualified name, including the colon
pub fn prefix_of(name: &str) -> &str {
    name.rsplit_once(':').map(|(prefix, _)| &name[..=prefix.len()]).unwrap_or("")
}

fn is_text_tag(name: &str) -> bool {
    matches!(name, "w:t" | "a:t" | "w:delText") || local_name(name) == "t"
}

/// A parsed XML part of a package
#[derive(Clone, Debug)]
pub struct XmlPart {
    pub name: String,
    pub events: Vec<XmlEvent>,
    pub baseline_hash: String,
}

impl XmlPart {
    /// Index of the end tag matching the start tag at `start`
    ///
    /// An empty tag is its own end.
    pub fn matching_end(&self, start: usize) -> usize {
        if !matches!(self.events.get(start), Some(XmlEvent::Start { .. })) {
            return start;
        }
        let mut depth = 0usize;
        for (idx, event) in self.events.iter().enumerate().skip(start) {
            match event {
                XmlEvent::Start { .. } => depth += 1,
                XmlEvent::End { .. } => {
                    depth -= 1;
                    if depth == 0 {
                        return idx;
                    }
                }
                _ => {}
            }
        }
        self.events.len().saturating_sub(1)
    }

    /// Indices of direct children (start or empty tags) of the element at `start`
    pub fn children(&self, start: usize) -> Vec<usize> {
        let end = self.matching_end(start);
        let mut children = Vec::new();
        let mut idx = start + 1;
        while idx < end {
            match &self.events[idx] {
                XmlEvent::Start { .. } => {
                    children.push(idx);
                    idx = self.matching_end(idx) + 1;
                }
                XmlEvent::Empty { .. } => {
                    children.push(idx);
                    idx += 1;
                }
                _ => idx += 1,
            }
        }
        children
    }

    /// Indices of start tags named `qname` in the range `[from, to]`
    pub fn find_all(&self, qname: &str, from: usize, to: usize) -> Vec<usize> {
        (from..=to.min(self.events.len().saturating_sub(1)))
            .filter(|&idx| self.events[idx].is_start(qname))
            .collect()
    }

    /// Text of the normalized text element starting at `start`
    pub fn text_at(&self, start: usize) -> &str {
        match self.events.get(start + 1) {
            Some(XmlEvent::Text { text }) => text,
            _ => "",
        }
    }

    /// Replace the text of the normalized text element starting at `start`
    ///
    /// `xml:space="preserve"` is added when the new text would otherwise lose
    /// significant whitespace.
    pub fn set_text(&mut self, start: usize, text: &str) {
        if let Some(XmlEvent::Text { text: current }) = self.events.get_mut(start + 1) {
            *current = text.to_string();
        }
        if needs_space_preserve(text) {
            if let Some(XmlEvent::Start { attrs, .. }) = self.events.get_mut(start) {
                if !attrs.iter().any(|(k, _)| k == "xml:space") {
                    attrs.push(("xml:space".to_string(), "preserve".to_string()));
                }
            }
        }
    }

    /// Replace event ranges; edits may be given in any order but must not overlap
    pub fn splice(&mut self, mut edits: Vec<(Range<usize>, Vec<XmlEvent>)>) {
        edits.sort_by(|a, b| b.0.start.cmp(&a.0.start));
        for (range, replacement) in edits {
            self.events.splice(range, replacement);
        }
    }

    /// Check that nothing but text content changed since parsing
    pub fn verify_structure_unchanged(&self) -> Result<(), DocumentError> {
        let current = structure_hash(&self.events);
        if current != self.baseline_hash {
            return Err(DocumentError::extraction(
                &self.name,
                format!(
                    "non-text structure changed (baseline={} current={})",
                    self.baseline_hash, current
                ),
            ));
        }
        Ok(())
    }
}

/// Whether a text node needs `xml:space="preserve"`
pub fn needs_space_preserve(text: &str) -> bool {
    text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) || text.contains("  ")
}

/// Parse an XML part
pub fn parse_xml_part(name: &str, xml_bytes: &[u8]) -> Result<XmlPart, DocumentError> {
    let mut reader = Reader::from_reader(xml_bytes);
    reader.config_mut().trim_text(false);

    let fail = |e: &dyn std::fmt::Display| DocumentError::extraction(name, e);
    let mut events: Vec<XmlEvent> = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let event = reader.read_event_into(&mut buf).map_err(|e| fail(&e))?;
        match event {
            Event::Eof => break,
            Event::Decl(d) => {
                let version = bytes_to_string(d.version().map_err(|e| fail(&e))?);
                let encoding = d.encoding().and_then(|r| r.ok()).map(bytes_to_string);
                let standalone = d.standalone().and_then(|r| r.ok()).map(bytes_to_string);
                events.push(XmlEvent::Decl {
                    version,
                    encoding,
                    standalone,
                });
            }
            Event::Start(s) => events.push(XmlEvent::Start {
                name: bytes_to_string(s.name().as_ref()),
                attrs: collect_attrs(name, &s)?,
            }),
            Event::End(e) => events.push(XmlEvent::End {
                name: bytes_to_string(e.name().as_ref()),
            }),
            Event::Empty(s) => events.push(XmlEvent::Empty {
                name: bytes_to_string(s.name().as_ref()),
                attrs: collect_attrs(name, &s)?,
            }),
            Event::Text(t) => {
                let text = t.unescape().map_err(|e| fail(&e))?.into_owned();
                // Adjacent text events (split reads) are merged
                if let Some(XmlEvent::Text { text: previous }) = events.last_mut() {
                    previous.push_str(&text);
                } else {
                    events.push(XmlEvent::Text { text });
                }
            }
            Event::CData(t) => events.push(XmlEvent::CData {
                text: bytes_to_string(t.into_inner()),
            }),
            Event::Comment(t) => events.push(XmlEvent::Comment {
                text: bytes_to_string(t.into_inner()),
            }),
            Event::PI(t) => events.push(XmlEvent::PI {
                content: format!("{}{}", bytes_to_string(t.target()), bytes_to_string(t.content())),
            }),
            Event::DocType(t) => events.push(XmlEvent::DocType {
                text: bytes_to_string(t.into_inner()),
            }),
        }
    }

    let events = normalize_text_elements(events);
    let baseline_hash = structure_hash(&events);
    Ok(XmlPart {
        name: name.to_string(),
        events,
        baseline_hash,
    })
}

/// Rewrite `<t/>` and `<t></t>` as `<t>""</t>` so every text element carries a text event
fn normalize_text_elements(events: Vec<XmlEvent>) -> Vec<XmlEvent> {
    let mut out = Vec::with_capacity(events.len());
    for event in events {
        match event {
            XmlEvent::Empty { name, attrs } if is_text_tag(&name) => {
                out.push(XmlEvent::Start {
                    name: name.clone(),
                    attrs,
                });
                out.push(XmlEvent::text(""));
                out.push(XmlEvent::End { name });
            }
            XmlEvent::End { name } if is_text_tag(&name) => {
                if matches!(out.last(), Some(XmlEvent::Start { name: open, .. }) if *open == name) {
                    out.push(XmlEvent::text(""));
                }
                out.push(XmlEvent::End { name });
            }
            other => out.push(other),
        }
    }
    out
}

fn collect_attrs(part: &str, s: &BytesStart<'_>) -> Result<Vec<(String, String)>, DocumentError> {
    let mut attrs = Vec::new();
    for attr in s.attributes() {
        let attr = attr.map_err(|e| DocumentError::extraction(part, e))?;
        // Raw (still escaped) value, written back verbatim
        attrs.push((bytes_to_string(attr.key.as_ref()), bytes_to_string(attr.value.as_ref())));
    }
    Ok(attrs)
}

fn bytes_to_string(bytes: impl AsRef<[u8]>) -> String {
    String::from_utf8_lossy(bytes.as_ref()).into_owned()
}

/// Serialize a part back to bytes
pub fn write_xml_part(part: &XmlPart) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::new();

    for event in &part.events {
        match event {
            XmlEvent::Decl {
                version,
                encoding,
                standalone,
            } => {
                out.extend_from_slice(b"<?xml version=\"");
                out.extend_from_slice(version.as_bytes());
                out.push(b'"');
                if let Some(encoding) = encoding {
                    out.extend_from_slice(b" encoding=\"");
                    out.extend_from_slice(encoding.as_bytes());
                    out.push(b'"');
                }
                if let Some(standalone) = standalone {
                    out.extend_from_slice(b" standalone=\"");
                    out.extend_from_slice(standalone.as_bytes());
                    out.push(b'"');
                }
                out.extend_from_slice(b"?>");
            }
            XmlEvent::Start { name, attrs } => write_start_like(&mut out, name, attrs, false),
            XmlEvent::Empty { name, attrs } => write_start_like(&mut out, name, attrs, true),
            XmlEvent::End { name } => {
                out.extend_from_slice(b"</");
                out.extend_from_slice(name.as_bytes());
                out.push(b'>');
            }
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
                out.push(b'>');
            }
        }
    }

    out
}

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
    out.push(b'<');
    out.extend_from_slice(name.as_bytes());
    for (key, value) in attrs {
        out.push(b' ');
        out.extend_from_slice(key.as_bytes());
        out.extend_from_slice(b"=\"");
        out.extend_from_slice(value.as_bytes());
        out.push(b'"');
    }
    if empty {
        out.extend_from_slice(b"/>");
    } else {
        out.push(b'>');
    }
}

/// Hash of everything except the content of text elements and `xml:space`
fn structure_hash(events: &[XmlEvent]) -> String {
    let mut hasher = Sha256::new();
    let mut stack: Vec<&str> = Vec::new();

    for event in events {
        match event {
            XmlEvent::Start { name, attrs } => {
                stack.push(name);
                hash_start_like(&mut hasher, name, attrs);
            }
            XmlEvent::Empty { name, attrs } => {
                hash_start_like(&mut hasher, name, attrs);
                hash_end_like(&mut hasher, name);
            }
            XmlEvent::End { name } => {
                hash_end_like(&mut hasher, name);
                stack.pop();
            }
            XmlEvent::Text { text } => {
                if stack.last().is_some_and(|current| is_text_tag(current)) {
                    continue;
                }
                hash_tagged(&mut hasher, b"T:", text);
            }
            XmlEvent::Decl {
                version,
                encoding,
                standalone,
            } => {
                let decl = format!(
                    "{}|{}|{}",
                    version,
                    encoding.as_deref().unwrap_or(""),
                    standalone.as_deref().unwrap_or("")
                );
                hash_tagged(&mut hasher, b"D:", &decl);
            }
            XmlEvent::CData { text } => hash_tagged(&mut hasher, b"C:", text),
            XmlEvent::Comment { text } => hash_tagged(&mut hasher, b"M:", text),
            XmlEvent::PI { content } => hash_tagged(&mut hasher, b"P:", content),
            XmlEvent::DocType { text } => hash_tagged(&mut hasher, b"Y:", text),
        }
    }
    format!("{:x}", hasher.finalize())
}

fn hash_tagged(hasher: &mut Sha256, tag: &[u8], value: &str) {
    hasher.update(tag);
    hasher.update(value.as_bytes());
    hasher.update(b"\n");
}

fn hash_start_like(hasher: &mut Sha256, name: &str, attrs: &[(String, String)]) {
    hasher.update(b"S:");
    hasher.update(name.as_bytes());
    hasher.update(b"|");
    let sorted: BTreeMap<&str, &str> = attrs
        .iter()
        .filter(|(k, _)| k != "xml:space")
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    for (key, value) in sorted {
        hasher.update(key.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
        hasher.update(b";");
    }
    hasher.update(b"\n");
}

fn hash_end_like(hasher: &mut Sha256, name: &str) {
    hash_tagged(hasher, b"E:", name);
}

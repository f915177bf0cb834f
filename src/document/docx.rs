use super::package::Package;
use super::segments::{self, Segments};
use super::xml::{XmlEvent, XmlPart};
use super::{TextUnit, TranslatedUnits, UnitAddress};
use crate::errors::DocumentError;

pub const DOCUMENT_PART: &str = "word/document.xml";

/// Body of a word processing document
#[derive(Debug, Clone)]
pub struct DocxBody {
    part: XmlPart,
    paragraphs: Vec<Paragraph>,
}

/// A `w:p` and the `w:t` elements it owns, split at inline breaks
#[derive(Debug, Clone, Default)]
struct Paragraph {
    segments: Segments,
}

/// Character a run-level break or tab element stands for
///
/// Page and column breaks carry no text.
fn inline_break(event: &XmlEvent) -> Option<char> {
    match event.name()? {
        "w:tab" | "w:ptab" => Some('\t'),
        "w:cr" => Some('\n'),
        "w:br" => match event.attr("w:type").unwrap_or("textWrapping") {
            "textWrapping" => Some('\n'),
            _ => None,
        },
        _ => None,
    }
}

impl DocxBody {
    pub fn parse(package: &Package) -> Result<Self, DocumentError> {
        let part = package.xml_part(DOCUMENT_PART)?;

        let mut paragraphs: Vec<Paragraph> = Vec::new();
        // Paragraphs nest through text boxes; runs belong to the innermost one
        let mut open: Vec<usize> = Vec::new();
        // Breaks and tabs count only as direct children of a run; `w:tab` also names tab stops
        let mut parents: Vec<&str> = Vec::new();
        for (idx, event) in part.events.iter().enumerate() {
            let in_run = parents.last() == Some(&"w:r");
            match event {
                XmlEvent::Start { name, .. } if name == "w:p" => {
                    open.push(paragraphs.len());
                    paragraphs.push(Paragraph::default());
                }
                XmlEvent::Empty { name, .. } if name == "w:p" => paragraphs.push(Paragraph::default()),
                XmlEvent::End { name } if name == "w:p" => {
                    open.pop();
                }
                XmlEvent::Start { name, .. } if name == "w:t" => {
                    if let Some(&current) = open.last() {
                        paragraphs[current].segments.push_text(idx);
                    }
                }
                XmlEvent::Start { .. } | XmlEvent::Empty { .. } if in_run => {
                    if let (Some(ch), Some(&current)) = (inline_break(event), open.last()) {
                        paragraphs[current].segments.push_break(ch);
                    }
                }
                _ => {}
            }
            match event {
                XmlEvent::Start { name, .. } => parents.push(name),
                XmlEvent::End { .. } => {
                    parents.pop();
                }
                _ => {}
            }
        }

        Ok(Self { part, paragraphs })
    }

    pub fn paragraph_count(&self) -> usize {
        self.paragraphs.len()
    }

    fn paragraph_text(&self, paragraph: &Paragraph) -> String {
        paragraph.segments.text(&self.part)
    }

    pub fn units(&self) -> Vec<TextUnit> {
        self.paragraphs
            .iter()
            .enumerate()
            .map(|(index, p)| (index, self.paragraph_text(p)))
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(index, text)| TextUnit::new(UnitAddress::Paragraph { index }, text))
            .collect()
    }

    /// Put each translated paragraph back around its breaks and tabs
    ///
    /// The text between two breaks goes into the first run after the earlier
    /// one; the other runs of that stretch are emptied.
    pub fn apply(&mut self, translations: &TranslatedUnits) {
        let Self { part, paragraphs } = self;
        for (index, paragraph) in paragraphs.iter().enumerate() {
            let Some(text) = translations.get(&UnitAddress::Paragraph { index }) else {
                continue;
            };
            let pieces = segments::split_pieces(text, &['\n', '\t']);
            let texts = segments::spread(pieces, paragraph.segments.segment_count());
            // Units only come from paragraphs with a text node, so nothing is left over
            paragraph.segments.fill(part, texts);
        }
    }

    /// Finish editing; fails if anything but text changed
    pub fn into_part(self) -> Result<XmlPart, DocumentError> {
        self.part.verify_structure_unchanged()?;
        Ok(self.part)
    }
}

use log::debug;
use std::ops::Range;

use super::package::Package;
use super::segments::{self, Segments};
use super::xml::{XmlEvent, XmlPart};
use super::{TextUnit, TranslatedUnits, UnitAddress};
use crate::errors::DocumentError;

const PRESENTATION_PART: &str = "ppt/presentation.xml";

/// `p:spTree` children that describe the tree itself rather than a shape
const TREE_PROPERTIES: [&str; 3] = ["p:nvGrpSpPr", "p:grpSpPr", "p:extLst"];

/// All slides of a deck, in presentation order
#[derive(Debug, Clone)]
pub struct PptxBody {
    slides: Vec<Slide>,
}

#[derive(Debug, Clone)]
struct Slide {
    part: XmlPart,
    shape_count: usize,
    shapes: Vec<ShapeText>,
}

/// A text-bearing `p:sp`
#[derive(Debug, Clone)]
struct ShapeText {
    shape: usize,
    paragraphs: Vec<ShapeParagraph>,
}

#[derive(Debug, Clone)]
struct ShapeParagraph {
    start: usize,
    end: usize,
    segments: Segments,
    end_properties: Option<usize>,
}

/// Slide part names in presentation order
fn slide_order(package: &Package) -> Result<Vec<String>, DocumentError> {
    if package.contains(PRESENTATION_PART) {
        let presentation = package.xml_part(PRESENTATION_PART)?;
        let rels = package.relationships(PRESENTATION_PART)?;
        let ordered: Vec<String> = presentation
            .events
            .iter()
            .filter(|e| e.opens("p:sldId"))
            .filter_map(|e| e.attr("r:id"))
            .filter_map(|id| rels.get(id).cloned())
            .filter(|name| package.contains(name))
            .collect();
        if !ordered.is_empty() {
            return Ok(ordered);
        }
    }
    debug!("No usable slide list in presentation part, ordering slides by number");
    Ok(package.numbered_parts("ppt/slides/slide"))
}

impl Slide {
    fn parse(part: XmlPart) -> Self {
        let Some(tree) = part.events.iter().position(|e| e.is_start("p:spTree")) else {
            return Self {
                part,
                shape_count: 0,
                shapes: Vec::new(),
            };
        };

        let mut shape_count = 0;
        let mut shapes = Vec::new();
        for child in part.children(tree) {
            let name = part.events[child].name().unwrap_or_default();
            if TREE_PROPERTIES.contains(&name) {
                continue;
            }
            let shape = shape_count;
            shape_count += 1;
            if name != "p:sp" {
                continue;
            }

            let shape_end = part.matching_end(child);
            let Some(&body) = part.find_all("p:txBody", child, shape_end).first() else {
                continue;
            };
            let body_end = part.matching_end(body);
            let paragraphs = (body..=body_end)
                .filter(|&idx| part.events[idx].opens("a:p"))
                .map(|start| {
                    let end = part.matching_end(start);
                    let mut segments = Segments::default();
                    for idx in start..=end {
                        let event = &part.events[idx];
                        if event.is_start("a:t") {
                            segments.push_text(idx);
                        } else if event.opens("a:br") {
                            segments.push_break('\n');
                        }
                    }
                    ShapeParagraph {
                        start,
                        end,
                        segments,
                        end_properties: (start..=end).find(|&idx| part.events[idx].opens("a:endParaRPr")),
                    }
                })
                .collect();
            shapes.push(ShapeText { shape, paragraphs });
        }

        Self {
            part,
            shape_count,
            shapes,
        }
    }

    fn shape_text(&self, shape: &ShapeText) -> String {
        shape
            .paragraphs
            .iter()
            .map(|p| p.segments.text(&self.part))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn apply(&mut self, slide: usize, translations: &TranslatedUnits) {
        let Self { part, shapes, .. } = self;
        let mut insertions = Vec::new();

        for shape in shapes.iter() {
            let Some(text) = translations.get(&UnitAddress::Shape { slide, shape: shape.shape }) else {
                continue;
            };
            // Paragraphs and the line breaks inside them both read as `\n`
            let lines = segments::split_pieces(text, &['\n']);
            let sizes: Vec<usize> = shape.paragraphs.iter().map(|p| p.segments.segment_count()).collect();
            for (paragraph, lines) in shape.paragraphs.iter().zip(segments::allot(lines, &sizes)) {
                let texts = segments::spread(lines, paragraph.segments.segment_count());
                if let Some(rest) = paragraph.segments.fill(part, texts) {
                    insertions.push(run_insertion(part, paragraph, &rest));
                }
            }
        }

        part.splice(insertions);
    }
}

/// Events that add a run carrying `text` to a paragraph that has none
fn run_insertion(part: &XmlPart, paragraph: &ShapeParagraph, text: &str) -> (Range<usize>, Vec<XmlEvent>) {
    let mut run = vec![XmlEvent::start("a:r", Vec::new())];
    // Carry the paragraph end properties (language, size) over to the new run
    if let Some(props) = paragraph.end_properties {
        run.push(XmlEvent::Empty {
            name: "a:rPr".to_string(),
            attrs: part.events[props].attrs().to_vec(),
        });
    }
    run.extend([
        XmlEvent::start("a:t", Vec::new()),
        XmlEvent::text(text),
        XmlEvent::end("a:t"),
        XmlEvent::end("a:r"),
    ]);

    match &part.events[paragraph.start] {
        XmlEvent::Empty { name, attrs } => {
            let mut events = vec![XmlEvent::start(name.clone(), attrs.clone())];
            events.extend(run);
            events.push(XmlEvent::end(name.clone()));
            (paragraph.start..paragraph.start + 1, events)
        }
        _ => {
            let at = paragraph.end_properties.unwrap_or(paragraph.end);
            (at..at, run)
        }
    }
}

impl PptxBody {
    pub fn parse(package: &Package) -> Result<Self, DocumentError> {
        let slides = slide_order(package)?
            .iter()
            .map(|name| package.xml_part(name).map(Slide::parse))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { slides })
    }

    /// Number of indexed shapes on each slide
    pub fn shape_counts(&self) -> Vec<usize> {
        self.slides.iter().map(|s| s.shape_count).collect()
    }

    pub fn units(&self) -> Vec<TextUnit> {
        let mut units = Vec::new();
        for (slide_index, slide) in self.slides.iter().enumerate() {
            for shape in &slide.shapes {
                let text = slide.shape_text(shape);
                if text.trim().is_empty() {
                    continue;
                }
                units.push(TextUnit::new(
                    UnitAddress::Shape {
                        slide: slide_index,
                        shape: shape.shape,
                    },
                    text,
                ));
            }
        }
        units
    }

    pub fn apply(&mut self, translations: &TranslatedUnits) {
        for (index, slide) in self.slides.iter_mut().enumerate() {
            slide.apply(index, translations);
        }
    }

    pub fn into_parts(self) -> Vec<XmlPart> {
        self.slides.into_iter().map(|s| s.part).collect()
    }
}

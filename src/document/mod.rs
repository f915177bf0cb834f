/*!
 * Office document extraction and reconstruction.
 *
 * `extract` turns the bytes of a `.docx`, `.pptx` or `.xlsx` package into an
 * ordered list of addressable text units plus a template holding the parsed
 * package. `reconstruct` writes translated text back into the template at
 * each unit's address and produces the output package bytes.
 *
 * Only text nodes are edited. Every ZIP entry that carries no translatable
 * text is copied as is.
 */

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

use crate::errors::{DocumentError, TranslationError};

pub mod docx;
pub mod package;
pub mod pptx;
mod segments;
pub mod xlsx;
pub mod xml;

use package::Package;

/// Supported office formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    /// Word processing document (paragraphs)
    Docx,
    /// Slide deck (slides and shapes)
    Pptx,
    /// Spreadsheet (sheets and cells)
    Xlsx,
}

impl DocumentFormat {
    /// Select the format from a file extension (case-insensitive, with or without the dot)
    pub fn from_extension(extension: &str) -> Result<Self, DocumentError> {
        match extension.trim_start_matches('.').to_lowercase().as_str() {
            "docx" => Ok(Self::Docx),
            "pptx" => Ok(Self::Pptx),
            "xlsx" => Ok(Self::Xlsx),
            other => Err(DocumentError::UnsupportedFormat {
                extension: other.to_string(),
            }),
        }
    }

    /// Select the format from a file name or path
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let extension = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        Self::from_extension(extension)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Docx => "docx",
            Self::Pptx => "pptx",
            Self::Xlsx => "xlsx",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Granularity of spreadsheet translation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpreadsheetMode {
    /// One unit per text cell
    #[default]
    Cells,
    /// One unit per sheet, cells joined with tabs and rows with newlines
    WholeSheet,
}

/// Structural position of a text unit, unique within a document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UnitAddress {
    Paragraph { index: usize },
    Shape { slide: usize, shape: usize },
    Cell { sheet: usize, row: usize, column: usize },
    Sheet { sheet: usize },
}

impl fmt::Display for UnitAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Paragraph { index } => write!(f, "paragraph {}", index),
            Self::Shape { slide, shape } => write!(f, "slide {} shape {}", slide, shape),
            Self::Cell { sheet, row, column } => {
                write!(f, "sheet {} cell {}", sheet, xlsx::cell_reference(*row, *column))
            }
            Self::Sheet { sheet } => write!(f, "sheet {}", sheet),
        }
    }
}

/// A piece of translatable text and where it lives
#[derive(Debug, Clone, PartialEq)]
pub struct TextUnit {
    pub address: UnitAddress,
    pub content: String,
    /// Position in document order
    pub order: usize,
}

impl TextUnit {
    pub fn new(address: UnitAddress, content: impl Into<String>) -> Self {
        Self {
            address,
            content: content.into(),
            order: 0,
        }
    }
}

/// Options that change what the extractor emits
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    pub spreadsheet_mode: SpreadsheetMode,
}

/// The parsed, untranslated document
#[derive(Debug, Clone)]
pub struct DocumentTemplate {
    format: DocumentFormat,
    package: Package,
    body: TemplateBody,
}

#[derive(Debug, Clone)]
enum TemplateBody {
    Docx(docx::DocxBody),
    Pptx(pptx::PptxBody),
    Xlsx(xlsx::XlsxBody),
}

impl DocumentTemplate {
    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    /// Structural counts that translation must never change
    ///
    /// Paragraph count for documents, shapes per slide for decks and
    /// `[rows, cells]` per sheet for spreadsheets.
    pub fn layout(&self) -> Vec<usize> {
        match &self.body {
            TemplateBody::Docx(body) => vec![body.paragraph_count()],
            TemplateBody::Pptx(body) => body.shape_counts(),
            TemplateBody::Xlsx(body) => body.layout(),
        }
    }
}

/// Units plus the template they were extracted from
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub units: Vec<TextUnit>,
    pub template: DocumentTemplate,
}

impl ExtractedDocument {
    /// Units grouped per slide, one entry per slide including slides without text
    pub fn slides(&self) -> Vec<Vec<&TextUnit>> {
        let slide_count = match &self.template.body {
            TemplateBody::Pptx(body) => body.shape_counts().len(),
            _ => return Vec::new(),
        };
        let mut slides = vec![Vec::new(); slide_count];
        for unit in &self.units {
            if let UnitAddress::Shape { slide, .. } = unit.address {
                if let Some(group) = slides.get_mut(slide) {
                    group.push(unit);
                }
            }
        }
        slides
    }

    /// All unit contents in document order, one per line
    pub fn full_text(&self) -> String {
        self.units
            .iter()
            .map(|u| u.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Translated text per address, written at most once per address
#[derive(Debug, Clone, Default)]
pub struct TranslatedUnits {
    entries: BTreeMap<UnitAddress, String>,
}

impl TranslatedUnits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a translation; a second write for the same address is rejected
    pub fn insert(&mut self, address: UnitAddress, text: impl Into<String>) -> Result<(), TranslationError> {
        if self.entries.contains_key(&address) {
            return Err(TranslationError::AddressCollision {
                address: address.to_string(),
            });
        }
        self.entries.insert(address, text.into());
        Ok(())
    }

    pub fn get(&self, address: &UnitAddress) -> Option<&str> {
        self.entries.get(address).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in address order
    pub fn iter(&self) -> impl Iterator<Item = (&UnitAddress, &str)> {
        self.entries.iter().map(|(a, t)| (a, t.as_str()))
    }
}

/// Parse a package and collect its text units in document order
pub fn extract(format: DocumentFormat, bytes: &[u8], options: &ExtractOptions) -> Result<ExtractedDocument, DocumentError> {
    let package = Package::read(bytes)?;

    let (mut units, body) = match format {
        DocumentFormat::Docx => {
            let body = docx::DocxBody::parse(&package)?;
            (body.units(), TemplateBody::Docx(body))
        }
        DocumentFormat::Pptx => {
            let body = pptx::PptxBody::parse(&package)?;
            (body.units(), TemplateBody::Pptx(body))
        }
        DocumentFormat::Xlsx => {
            let mut body = xlsx::XlsxBody::parse(&package)?;
            let units = body.units(options.spreadsheet_mode);
            (units, TemplateBody::Xlsx(body))
        }
    };

    for (order, unit) in units.iter_mut().enumerate() {
        unit.order = order;
    }
    debug!("Extracted {} text units from {} package", units.len(), format);

    Ok(ExtractedDocument {
        units,
        template: DocumentTemplate { format, package, body },
    })
}

/// Write translations into the template and serialize the package
pub fn reconstruct(template: DocumentTemplate, translations: &TranslatedUnits) -> Result<Vec<u8>, DocumentError> {
    let DocumentTemplate { format, package, body } = template;

    let parts = match body {
        TemplateBody::Docx(mut body) => {
            body.apply(translations);
            vec![body.into_part()?]
        }
        TemplateBody::Pptx(mut body) => {
            body.apply(translations);
            body.into_parts()
        }
        TemplateBody::Xlsx(mut body) => {
            body.apply(translations);
            body.into_parts()
        }
    };

    let replacements: HashMap<String, Vec<u8>> = parts
        .iter()
        .map(|part| (part.name.clone(), xml::write_xml_part(part)))
        .collect();
    debug!("Rebuilding {} package with {} rewritten parts", format, replacements.len());

    package.write_with_replacements(&replacements)
}

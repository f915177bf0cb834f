/*!
 * Spreadsheet extraction and reconstruction.
 *
 * Text cells are shared-string (`t="s"`) and inline-string (`t="inlineStr"`)
 * cells. Numbers, booleans and formula results are never touched.
 *
 * A translated cell is rewritten as an inline string, so a shared string
 * referenced from several cells can be translated differently per cell and
 * `sharedStrings.xml` itself is never edited.
 *
 * In whole-sheet mode a sheet is flattened over the bounding box of its text
 * cells: cells are joined with `\t` and rows with `\n`. The translated grid is
 * re-split on the same separators and forced back into the source shape.
 */

use log::warn;
use std::collections::HashMap;

use super::package::Package;
use super::xml::{local_name, needs_space_preserve, prefix_of, XmlEvent, XmlPart};
use super::{SpreadsheetMode, TextUnit, TranslatedUnits, UnitAddress};
use crate::errors::DocumentError;

const WORKBOOK_PART: &str = "xl/workbook.xml";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";

/// All worksheets of a workbook, in workbook order
#[derive(Debug, Clone)]
pub struct XlsxBody {
    sheets: Vec<Sheet>,
}

#[derive(Debug, Clone)]
struct Sheet {
    part: XmlPart,
    row_count: usize,
    cell_count: usize,
    cells: Vec<TextCell>,
    grid: Option<SheetGrid>,
}

/// A text cell and the event range of its `c` element
#[derive(Debug, Clone)]
struct TextCell {
    row: usize,
    column: usize,
    start: usize,
    end: usize,
    text: String,
}

/// Bounding box of the text cells of a sheet flattened as one unit
#[derive(Debug, Clone, Copy, PartialEq)]
struct SheetGrid {
    first_row: usize,
    first_column: usize,
    rows: usize,
    columns: usize,
}

/// Zero-based `(row, column)` of an A1-style reference
pub fn parse_cell_reference(reference: &str) -> Option<(usize, usize)> {
    let letters = reference.chars().take_while(|c| c.is_ascii_alphabetic()).count();
    if letters == 0 || letters > 3 {
        return None;
    }
    let (column_part, row_part) = reference.split_at(letters);
    let row: usize = row_part.parse().ok()?;
    if row == 0 {
        return None;
    }
    let column = column_part
        .bytes()
        .fold(0usize, |acc, b| acc * 26 + (b.to_ascii_uppercase() - b'A' + 1) as usize);
    Some((row - 1, column - 1))
}

/// A1-style reference of a zero-based position
pub fn cell_reference(row: usize, column: usize) -> String {
    let mut letters = Vec::new();
    let mut n = column + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect::<String>() + &(row + 1).to_string()
}

/// Join a grid with the whole-sheet separators
pub fn join_grid(grid: &[Vec<String>]) -> String {
    grid.iter().map(|row| row.join("\t")).collect::<Vec<_>>().join("\n")
}

/// Row count and widest row of a flattened sheet
pub fn grid_shape(text: &str) -> (usize, usize) {
    let rows: Vec<usize> = text.split('\n').map(|row| row.split('\t').count()).collect();
    (rows.len(), rows.into_iter().max().unwrap_or(0))
}

/// Split a flattened sheet and force it into `rows` x `columns`
///
/// Missing rows and cells are padded with empty strings, surplus ones dropped.
pub fn reshape_grid(text: &str, rows: usize, columns: usize) -> Vec<Vec<String>> {
    let text = text.trim_matches(|c| c == '\n' || c == '\r');
    let mut grid: Vec<Vec<String>> = text
        .split('\n')
        .take(rows)
        .map(|row| {
            row.trim_end_matches('\r')
                .split('\t')
                .take(columns)
                .map(str::to_string)
                .collect()
        })
        .collect();
    grid.resize(rows, Vec::new());
    for row in &mut grid {
        row.resize(columns, String::new());
    }
    grid
}

/// Text of the `t` elements between `from` and `to`, skipping phonetic runs
fn text_between(part: &XmlPart, from: usize, to: usize) -> String {
    let mut text = String::new();
    let mut idx = from;
    while idx <= to && idx < part.events.len() {
        match &part.events[idx] {
            XmlEvent::Start { name, .. } if local_name(name) == "rPh" => {
                idx = part.matching_end(idx);
            }
            XmlEvent::Start { name, .. } if local_name(name) == "t" => text.push_str(part.text_at(idx)),
            _ => {}
        }
        idx += 1;
    }
    text
}

fn shared_strings(package: &Package) -> Result<Vec<String>, DocumentError> {
    if !package.contains(SHARED_STRINGS_PART) {
        return Ok(Vec::new());
    }
    let part = package.xml_part(SHARED_STRINGS_PART)?;
    Ok(part
        .events
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, XmlEvent::Start { name, .. } | XmlEvent::Empty { name, .. } if local_name(name) == "si"))
        .map(|(idx, _)| text_between(&part, idx, part.matching_end(idx)))
        .collect())
}

/// Worksheet part names in workbook order
fn sheet_order(package: &Package) -> Result<Vec<String>, DocumentError> {
    if package.contains(WORKBOOK_PART) {
        let workbook = package.xml_part(WORKBOOK_PART)?;
        let rels = package.relationships(WORKBOOK_PART)?;
        let ordered: Vec<String> = workbook
            .events
            .iter()
            .filter(|e| e.name().is_some_and(|n| local_name(n) == "sheet") && !matches!(e, XmlEvent::End { .. }))
            .filter_map(|e| {
                e.attrs()
                    .iter()
                    .find(|(k, _)| k.contains(':') && local_name(k) == "id")
                    .map(|(_, v)| v.as_str())
            })
            .filter_map(|id| rels.get(id).cloned())
            .filter(|name| package.contains(name))
            .collect();
        if !ordered.is_empty() {
            return Ok(ordered);
        }
    }
    Ok(package.numbered_parts("xl/worksheets/sheet"))
}

impl Sheet {
    fn parse(part: XmlPart, shared: &[String]) -> Self {
        let mut row_count = 0;
        let mut cell_count = 0;
        let mut cells = Vec::new();
        let mut current_row = 0usize;
        let mut next_column = 0usize;

        for (idx, event) in part.events.iter().enumerate() {
            let Some(name) = event.name() else { continue };
            if matches!(event, XmlEvent::End { .. }) {
                continue;
            }
            match local_name(name) {
                "row" => {
                    current_row = event
                        .attr("r")
                        .and_then(|r| r.parse::<usize>().ok())
                        .filter(|r| *r > 0)
                        .map(|r| r - 1)
                        .unwrap_or(if row_count == 0 { 0 } else { current_row + 1 });
                    row_count += 1;
                    next_column = 0;
                }
                "c" => {
                    cell_count += 1;
                    let (row, column) = event
                        .attr("r")
                        .and_then(parse_cell_reference)
                        .unwrap_or((current_row, next_column));
                    next_column = column + 1;

                    let end = part.matching_end(idx);
                    let text = match event.attr("t") {
                        Some("s") => (idx..=end)
                            .find(|&i| part.events[i].name().is_some_and(|n| local_name(n) == "v"))
                            .and_then(|v| part.text_at(v).trim().parse::<usize>().ok())
                            .and_then(|i| shared.get(i).cloned()),
                        Some("inlineStr") => Some(text_between(&part, idx, end)),
                        _ => None,
                    };
                    if let Some(text) = text {
                        cells.push(TextCell {
                            row,
                            column,
                            start: idx,
                            end,
                            text,
                        });
                    }
                }
                _ => {}
            }
        }

        Self {
            part,
            row_count,
            cell_count,
            cells,
            grid: None,
        }
    }

    fn text_cells(&self) -> impl Iterator<Item = &TextCell> {
        self.cells.iter().filter(|c| !c.text.trim().is_empty())
    }

    fn bounding_grid(&self) -> Option<SheetGrid> {
        let first_row = self.text_cells().map(|c| c.row).min()?;
        let last_row = self.text_cells().map(|c| c.row).max()?;
        let first_column = self.text_cells().map(|c| c.column).min()?;
        let last_column = self.text_cells().map(|c| c.column).max()?;
        Some(SheetGrid {
            first_row,
            first_column,
            rows: last_row - first_row + 1,
            columns: last_column - first_column + 1,
        })
    }

    fn flatten(&self, grid: SheetGrid) -> String {
        let mut cells = vec![vec![String::new(); grid.columns]; grid.rows];
        for cell in self.text_cells() {
            cells[cell.row - grid.first_row][cell.column - grid.first_column] = cell.text.clone();
        }
        join_grid(&cells)
    }

    fn apply(&mut self, sheet: usize, translations: &TranslatedUnits) {
        let mut updates: HashMap<(usize, usize), String> = HashMap::new();
        if let (Some(grid), Some(text)) = (self.grid, translations.get(&UnitAddress::Sheet { sheet })) {
            for (r, row) in reshape_grid(text, grid.rows, grid.columns).into_iter().enumerate() {
                for (c, value) in row.into_iter().enumerate() {
                    updates.insert((grid.first_row + r, grid.first_column + c), value);
                }
            }
        }
        for cell in &self.cells {
            let address = UnitAddress::Cell {
                sheet,
                row: cell.row,
                column: cell.column,
            };
            if let Some(text) = translations.get(&address) {
                updates.insert((cell.row, cell.column), text.to_string());
            }
        }

        let edits = self
            .text_cells()
            .filter_map(|cell| {
                let text = updates.get(&(cell.row, cell.column))?;
                Some((cell.start..cell.end + 1, inline_string_cell(&self.part.events[cell.start], text)))
            })
            .collect();
        self.part.splice(edits);
    }
}

/// Events of a `c` element holding `text` as an inline string
fn inline_string_cell(original: &XmlEvent, text: &str) -> Vec<XmlEvent> {
    let name = original.name().unwrap_or("c").to_string();
    let prefix = prefix_of(&name).to_string();

    let mut attrs = original.attrs().to_vec();
    match attrs.iter_mut().find(|(k, _)| k == "t") {
        Some((_, value)) => *value = "inlineStr".to_string(),
        None => attrs.push(("t".to_string(), "inlineStr".to_string())),
    }
    let text_attrs = if needs_space_preserve(text) {
        vec![("xml:space".to_string(), "preserve".to_string())]
    } else {
        Vec::new()
    };

    vec![
        XmlEvent::start(name.clone(), attrs),
        XmlEvent::start(format!("{}is", prefix), Vec::new()),
        XmlEvent::start(format!("{}t", prefix), text_attrs),
        XmlEvent::text(text),
        XmlEvent::end(format!("{}t", prefix)),
        XmlEvent::end(format!("{}is", prefix)),
        XmlEvent::end(name),
    ]
}

impl XlsxBody {
    pub fn parse(package: &Package) -> Result<Self, DocumentError> {
        let shared = shared_strings(package)?;
        let sheets = sheet_order(package)?
            .iter()
            .map(|name| package.xml_part(name).map(|part| Sheet::parse(part, &shared)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { sheets })
    }

    /// `[rows, cells]` for each sheet
    pub fn layout(&self) -> Vec<usize> {
        self.sheets
            .iter()
            .flat_map(|s| [s.row_count, s.cell_count])
            .collect()
    }

    /// Units for the requested granularity
    ///
    /// Whole-sheet units are only produced for sheets whose cells contain no
    /// separator characters; other sheets fall back to cell units.
    pub fn units(&mut self, mode: SpreadsheetMode) -> Vec<TextUnit> {
        let mut units = Vec::new();
        for (index, sheet) in self.sheets.iter_mut().enumerate() {
            sheet.grid = None;
            if mode == SpreadsheetMode::WholeSheet {
                if sheet.text_cells().any(|c| c.text.contains(['\t', '\n'])) {
                    warn!(
                        "Sheet {} has cells containing tabs or newlines, translating it cell by cell",
                        index
                    );
                } else if let Some(grid) = sheet.bounding_grid() {
                    sheet.grid = Some(grid);
                    units.push(TextUnit::new(UnitAddress::Sheet { sheet: index }, sheet.flatten(grid)));
                    continue;
                } else {
                    continue;
                }
            }

            units.extend(sheet.text_cells().map(|cell| {
                TextUnit::new(
                    UnitAddress::Cell {
                        sheet: index,
                        row: cell.row,
                        column: cell.column,
                    },
                    cell.text.clone(),
                )
            }));
        }
        units
    }

    pub fn apply(&mut self, translations: &TranslatedUnits) {
        for (index, sheet) in self.sheets.iter_mut().enumerate() {
            sheet.apply(index, translations);
        }
    }

    pub fn into_parts(self) -> Vec<XmlPart> {
        self.sheets.into_iter().map(|s| s.part).collect()
    }
}

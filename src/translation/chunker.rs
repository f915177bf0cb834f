/*!
 * Paragraph-boundary chunking.
 *
 * Long unit text is split on blank lines (`\n\n`) into segments of at most
 * `max_length` characters. Every segment but the last keeps one trailing
 * `\n`, so joining the segments with `\n` restores the original blank lines.
 */

use crate::document::{TextUnit, UnitAddress};

const PARAGRAPH_BREAK: &str = "\n\n";

/// One piece of a unit sent to the model on its own
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub source_unit: UnitAddress,
    pub segment_index: usize,
    pub text: String,
}

/// Split `text` into segments of at most `max_length` characters
///
/// A single paragraph longer than `max_length` becomes its own oversized
/// segment; text is never cut inside a paragraph. `max_length == 0` means no
/// limit.
pub fn chunk(text: &str, max_length: usize) -> Vec<String> {
    if max_length == 0 || text.chars().count() <= max_length {
        return vec![text.to_string()];
    }

    let mut segments: Vec<String> = Vec::new();
    let mut current: Option<(String, usize)> = None;
    for paragraph in text.split(PARAGRAPH_BREAK) {
        let length = paragraph.chars().count();
        current = match current.take() {
            None => Some((paragraph.to_string(), length)),
            Some((mut buffer, buffer_length)) if buffer_length + PARAGRAPH_BREAK.len() + length <= max_length => {
                buffer.push_str(PARAGRAPH_BREAK);
                buffer.push_str(paragraph);
                Some((buffer, buffer_length + PARAGRAPH_BREAK.len() + length))
            }
            Some((buffer, _)) => {
                segments.push(buffer);
                Some((paragraph.to_string(), length))
            }
        };
    }
    segments.extend(current.map(|(buffer, _)| buffer));

    let last = segments.len().saturating_sub(1);
    for segment in &mut segments[..last] {
        segment.push('\n');
    }
    segments
}

/// Chunk a unit, tagging each segment with its position
pub fn chunk_unit(unit: &TextUnit, max_length: usize) -> Vec<Chunk> {
    chunk(&unit.content, max_length)
        .into_iter()
        .enumerate()
        .map(|(segment_index, text)| Chunk {
            source_unit: unit.address.clone(),
            segment_index,
            text,
        })
        .collect()
}

/// Reassemble segments in order, dropping trailing whitespace
pub fn join<S: AsRef<str>>(segments: &[S]) -> String {
    let joined = segments.iter().map(|s| s.as_ref()).collect::<Vec<_>>().join("\n");
    joined.trim_end().to_string()
}

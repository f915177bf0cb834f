/*!
 * Paragraph text split around inline break elements.
 *
 * A paragraph is a list of segments separated by breaks (`w:br`, `w:cr`,
 * `w:tab`, `a:br`). Each segment owns the text nodes between two breaks, so
 * translated text can be written back on the right side of every break while
 * the break elements themselves stay where they are.
 */

use super::xml::XmlPart;

/// Text nodes of a paragraph, grouped by the breaks between them
#[derive(Debug, Clone)]
pub struct Segments {
    nodes: Vec<Vec<usize>>,
    breaks: Vec<char>,
}

impl Default for Segments {
    fn default() -> Self {
        Self {
            nodes: vec![Vec::new()],
            breaks: Vec::new(),
        }
    }
}

impl Segments {
    pub fn push_text(&mut self, start: usize) {
        if let Some(segment) = self.nodes.last_mut() {
            segment.push(start);
        }
    }

    /// Close the current segment with a break rendered as `ch`
    pub fn push_break(&mut self, ch: char) {
        self.breaks.push(ch);
        self.nodes.push(Vec::new());
    }

    pub fn segment_count(&self) -> usize {
        self.nodes.len()
    }

    /// Segment texts joined by their break characters
    pub fn text(&self, part: &XmlPart) -> String {
        let mut text = String::new();
        for (index, segment) in self.nodes.iter().enumerate() {
            if index > 0 {
                text.push(self.breaks[index - 1]);
            }
            text.extend(segment.iter().map(|&start| part.text_at(start)));
        }
        text
    }

    /// Write one text per segment into its first node, emptying the others
    ///
    /// A segment without text nodes hands its text on to the next one. Text
    /// left over at the end goes to the last written node, or is returned when
    /// the paragraph has no text node at all.
    pub fn fill(&self, part: &mut XmlPart, texts: Vec<String>) -> Option<String> {
        let mut carry = String::new();
        let mut last_written = None;
        for (segment, text) in self.nodes.iter().zip(texts) {
            let text = join_words(std::mem::take(&mut carry), text);
            match segment.split_first() {
                Some((first, rest)) => {
                    part.set_text(*first, &text);
                    for &node in rest {
                        part.set_text(node, "");
                    }
                    last_written = Some(*first);
                }
                None => carry = text,
            }
        }

        if carry.is_empty() {
            return None;
        }
        match last_written {
            Some(node) => {
                let merged = join_words(part.text_at(node).to_string(), carry);
                part.set_text(node, &merged);
                None
            }
            None => Some(carry),
        }
    }
}

fn join_words(head: String, tail: String) -> String {
    match (head.is_empty(), tail.is_empty()) {
        (true, _) => tail,
        (_, true) => head,
        _ => format!("{} {}", head, tail),
    }
}

/// Split translated text at line breaks and tabs
pub fn split_pieces(text: &str, separators: &[char]) -> Vec<String> {
    text.split(separators)
        .map(|piece| piece.trim_end_matches('\r').to_string())
        .collect()
}

/// Spread pieces over `slots` slots; surplus pieces join the last slot
pub fn spread(pieces: Vec<String>, slots: usize) -> Vec<String> {
    if slots == 0 {
        return Vec::new();
    }
    let mut pieces = pieces.into_iter();
    let mut out: Vec<String> = pieces.by_ref().take(slots - 1).collect();
    let rest: Vec<String> = pieces.collect();
    if !rest.is_empty() {
        out.push(rest.join(" "));
    }
    out.resize(slots, String::new());
    out
}

/// Group pieces into consecutive runs of the given sizes; the last group takes the remainder
pub fn allot(pieces: Vec<String>, sizes: &[usize]) -> Vec<Vec<String>> {
    let mut pieces = pieces.into_iter();
    let mut groups = Vec::with_capacity(sizes.len());
    for (index, &size) in sizes.iter().enumerate() {
        if index + 1 == sizes.len() {
            groups.push(pieces.by_ref().collect());
        } else {
            groups.push(pieces.by_ref().take(size).collect());
        }
    }
    groups
}

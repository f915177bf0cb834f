/*!
 * METEOR-style lexical scoring against a reference translation.
 *
 * Tokens are lower-cased words; punctuation is dropped. Hypothesis words are aligned to
 * reference words in three passes:
 * - exact match
 * - match after light suffix stripping
 * - match through an optional synonym table
 *
 * The score is the harmonic mean of precision and recall, weighted towards
 * recall, reduced by a penalty that grows with the number of
 * non-contiguous aligned chunks.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::errors::EvaluationError;

/// Letters and digits, with inner apostrophes kept ("l'eau", "don't")
static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}]+(?:['’][\p{L}\p{N}]+)*").unwrap());

/// Suffixes removed by the stemming pass, longest first
const SUFFIXES: &[&str] = &["ations", "ation", "ments", "ment", "ness", "ings", "ing", "edly", "ies", "ed", "es", "ly", "s"];

/// Shortest stem a suffix may leave behind
const MIN_STEM_LEN: usize = 3;

/// Common English synonyms used when no table is supplied; a word belongs to one group only
const ENGLISH_SYNONYMS: &[&[&str]] = &[
    &["big", "large", "huge"],
    &["small", "little", "tiny"],
    &["begin", "start", "commence"],
    &["end", "finish", "conclude"],
    &["buy", "purchase"],
    &["sofa", "couch"],
    &["car", "automobile"],
    &["house", "home"],
    &["help", "assist", "aid"],
    &["show", "display"],
    &["answer", "reply", "respond"],
    &["quick", "fast", "rapid"],
    &["happy", "glad"],
    &["error", "mistake"],
    &["choose", "select", "pick"],
    &["get", "obtain"],
    &["need", "require"],
    &["use", "utilize", "utilise"],
    &["try", "attempt"],
    &["enough", "sufficient"],
    &["often", "frequently"],
    &["maybe", "perhaps"],
    &["about", "approximately", "roughly"],
    &["image", "picture"],
    &["company", "firm", "enterprise"],
    &["shop", "store"],
    &["street", "road"],
];

/// Groups of interchangeable words
#[derive(Debug, Clone, Default)]
pub struct SynonymTable {
    groups: HashMap<String, usize>,
    next_group: usize,
}

impl SynonymTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Small built-in table of common English synonyms
    pub fn english() -> Self {
        let mut table = Self::new();
        for group in ENGLISH_SYNONYMS {
            table.add_group(group.iter());
        }
        table
    }

    /// Declare `words` as synonyms of each other
    pub fn add_group<I, S>(&mut self, words: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let group = self.next_group;
        self.next_group += 1;
        for word in words {
            self.groups.insert(word.as_ref().to_lowercase(), group);
        }
    }

    pub fn are_synonyms(&self, a: &str, b: &str) -> bool {
        match (self.groups.get(a), self.groups.get(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }
}

/// METEOR parameters
#[derive(Debug, Clone)]
pub struct Meteor {
    /// Precision/recall balance
    pub alpha: f32,
    /// Fragmentation penalty exponent
    pub beta: f32,
    /// Maximum fragmentation penalty
    pub gamma: f32,
    pub synonyms: Option<SynonymTable>,
}

impl Default for Meteor {
    fn default() -> Self {
        Self {
            alpha: 0.9,
            beta: 3.0,
            gamma: 0.5,
            synonyms: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Stage {
    Exact,
    Stem,
    Synonym,
}

impl Meteor {
    pub fn with_synonyms(mut self, synonyms: SynonymTable) -> Self {
        self.synonyms = Some(synonyms);
        self
    }

    /// Score `hypothesis` against `reference`, in `[0, 1]`
    ///
    /// A blank reference cannot be scored. A blank hypothesis scores 0.
    pub fn score(&self, reference: &str, hypothesis: &str) -> Result<f32, EvaluationError> {
        let reference = tokenize(reference);
        let hypothesis = tokenize(hypothesis);
        if reference.is_empty() {
            return Err(EvaluationError::Degenerate("empty reference"));
        }
        if hypothesis.is_empty() {
            return Ok(0.0);
        }

        let alignment = self.align(&reference, &hypothesis);
        let matches = alignment.len() as f32;
        if alignment.is_empty() {
            return Ok(0.0);
        }

        let precision = matches / hypothesis.len() as f32;
        let recall = matches / reference.len() as f32;
        let fmean = precision * recall / (self.alpha * precision + (1.0 - self.alpha) * recall);

        let fragmentation = count_chunks(&alignment) as f32 / matches;
        let penalty = self.gamma * fragmentation.powf(self.beta);

        Ok(((1.0 - penalty) * fmean).clamp(0.0, 1.0))
    }

    /// `(hypothesis index, reference index)` pairs, sorted by hypothesis index
    fn align(&self, reference: &[String], hypothesis: &[String]) -> Vec<(usize, usize)> {
        let mut ref_used = vec![false; reference.len()];
        let mut hyp_used = vec![false; hypothesis.len()];
        let mut pairs = Vec::new();

        let hyp_stems: Vec<&str> = hypothesis.iter().map(|w| stem(w)).collect();
        let ref_stems: Vec<&str> = reference.iter().map(|w| stem(w)).collect();

        for stage in [Stage::Exact, Stage::Stem, Stage::Synonym] {
            if stage == Stage::Synonym && self.synonyms.is_none() {
                continue;
            }
            for (h, word) in hypothesis.iter().enumerate() {
                if hyp_used[h] {
                    continue;
                }
                let found = (0..reference.len()).find(|&r| {
                    !ref_used[r]
                        && match stage {
                            Stage::Exact => reference[r] == *word,
                            Stage::Stem => ref_stems[r] == hyp_stems[h],
                            Stage::Synonym => self
                                .synonyms
                                .as_ref()
                                .is_some_and(|s| s.are_synonyms(&reference[r], word)),
                        }
                });
                if let Some(r) = found {
                    ref_used[r] = true;
                    hyp_used[h] = true;
                    pairs.push((h, r));
                }
            }
        }

        pairs.sort_unstable();
        pairs
    }
}

/// Score with the default parameters and no synonyms
pub fn meteor_score(reference: &str, hypothesis: &str) -> Result<f32, EvaluationError> {
    Meteor::default().score(reference, hypothesis)
}

fn tokenize(text: &str) -> Vec<String> {
    WORD.find_iter(text).map(|m| m.as_str().to_lowercase()).collect()
}

/// Strip the first matching suffix, keeping at least `MIN_STEM_LEN` chars
fn stem(word: &str) -> &str {
    SUFFIXES
        .iter()
        .find_map(|suffix| {
            word.strip_suffix(suffix)
                .filter(|rest| rest.chars().count() >= MIN_STEM_LEN)
        })
        .unwrap_or(word)
}

/// Runs of alignments adjacent in both hypothesis and reference
fn count_chunks(alignment: &[(usize, usize)]) -> usize {
    if alignment.is_empty() {
        return 0;
    }
    1 + alignment
        .windows(2)
        .filter(|w| !(w[1].0 == w[0].0 + 1 && w[1].1 == w[0].1 + 1))
        .count()
}

//! Language utilities for ISO language code handling
//!
//! Languages reach the pipeline either as ISO 639-1 / 639-2 codes ("fr", "fra", "fre")
//! or as English names ("French"). Prompts always use the English name when one is known.

use anyhow::{Result, anyhow};
use isolang::Language;

/// Value meaning "let the model detect the source language"
pub const AUTO_LANGUAGE: &str = "auto";

/// ISO 639-2/B codes that differ from their 639-2/T form
const BIBLIOGRAPHIC_CODES: &[(&str, &str)] = &[
    ("fre", "fra"),
    ("ger", "deu"),
    ("dut", "nld"),
    ("gre", "ell"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("ice", "isl"),
    ("alb", "sqi"),
    ("arm", "hye"),
    ("baq", "eus"),
    ("bur", "mya"),
    ("per", "fas"),
    ("geo", "kat"),
    ("may", "msa"),
    ("mac", "mkd"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("wel", "cym"),
];

/// Whether the value asks for source language detection
pub fn is_auto(code: &str) -> bool {
    code.trim().eq_ignore_ascii_case(AUTO_LANGUAGE)
}

fn lookup(value: &str) -> Option<Language> {
    let normalized = value.trim().to_lowercase();
    match normalized.chars().count() {
        0 | 1 => None,
        2 => Language::from_639_1(&normalized),
        3 => {
            let part2t = BIBLIOGRAPHIC_CODES
                .iter()
                .find(|(bib, _)| *bib == normalized)
                .map(|(_, term)| *term)
                .unwrap_or(normalized.as_str());
            Language::from_639_3(part2t)
        }
        _ => Language::from_name(&capitalize(value.trim())),
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

/// Get the English language name from a code
pub fn get_language_name(code: &str) -> Result<String> {
    lookup(code)
        .map(|lang| lang.to_name().to_string())
        .ok_or_else(|| anyhow!("Unknown language: {}", code))
}

/// Accepts ISO codes and English language names
pub fn validate_language_setting(value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow!("Language must not be empty"));
    }
    get_language_name(value).map(|_| ())
}

/// Render a language setting for use inside an instruction.
///
/// Known codes become English names, "auto" becomes a neutral phrase and
/// anything else is passed through verbatim.
pub fn display_name(value: &str) -> String {
    if is_auto(value) {
        return "the source language".to_string();
    }
    get_language_name(value).unwrap_or_else(|_| value.trim().to_string())
}

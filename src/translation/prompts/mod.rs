/*!
 * Instruction construction for translation calls.
 *
 * This module provides:
 * - Instruction templates (plain and glossary-constrained)
 * - The ordered `Glossary` term mapping
 * - `build`, which turns languages plus an optional glossary into the
 *   deterministic system instruction sent with every call
 */

pub mod glossary;
pub mod templates;

pub use glossary::{Glossary, GlossaryTerm};
pub use templates::PromptTemplate;

use crate::language_utils;

/// Build the instruction for a translation call
///
/// Language codes known to ISO 639 are rendered as English names. Without a
/// glossary the instruction asks for the translation only; with one, every
/// entry is listed as `term: translation` in glossary order.
pub fn build(source_language: &str, target_language: &str, glossary: Option<&Glossary>) -> String {
    build_with_template(None, source_language, target_language, glossary)
}

/// Same as `build`, with an optional user template replacing the opening sentence
pub fn build_with_template(
    template: Option<&str>,
    source_language: &str,
    target_language: &str,
    glossary: Option<&Glossary>,
) -> String {
    let source = language_utils::display_name(source_language);
    let target = language_utils::display_name(target_language);
    let custom = template.map(PromptTemplate::new);

    match glossary.filter(|g| !g.is_empty()) {
        None => {
            let opening = custom.unwrap_or_else(PromptTemplate::plain).render(&source, &target);
            format!("{}\n{}", opening, PromptTemplate::TRANSLATION_ONLY)
        }
        Some(glossary) => {
            let opening = custom
                .unwrap_or_else(PromptTemplate::glossary_assistant)
                .render(&source, &target);
            let terms = glossary
                .terms()
                .iter()
                .map(|t| format!("{}: {}", t.source, t.target))
                .collect::<Vec<_>>()
                .join("\n");
            format!(
                "{}\n{}\n{}\n\n{}",
                opening,
                PromptTemplate::GLOSSARY_INTRO,
                terms,
                PromptTemplate::GLOSSARY_CLOSING
            )
        }
    }
}

/*!
 * Instruction templates for document translation.
 */

/// Instruction template with `{source_language}` and `{target_language}` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// Base instruction when no glossary is given.
    pub const PLAIN: &'static str =
        "Translate the following text from {source_language} to {target_language}, preserving the formatting:";

    /// Opening of the instruction when a glossary is given.
    pub const GLOSSARY_ASSISTANT: &'static str =
        "You are a translation assistant that translates text from {source_language} to {target_language}.";

    /// Line introducing the glossary entries.
    pub const GLOSSARY_INTRO: &'static str = "Please use the following glossary for specific terms:";

    /// Closing sentence after the glossary entries.
    pub const GLOSSARY_CLOSING: &'static str = "Translate the following text preserving the formatting:";

    /// Keeps the answer free of commentary.
    pub const TRANSLATION_ONLY: &'static str =
        "Respond with the translated text only, without explanations or notes.";

    /// Extra rule for flattened spreadsheets.
    pub const KEEP_SEPARATORS: &'static str =
        "The text is a table: keep every tab and line break exactly where it is.";

    /// Create a new prompt template.
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }

    pub fn plain() -> Self {
        Self::new(Self::PLAIN)
    }

    pub fn glossary_assistant() -> Self {
        Self::new(Self::GLOSSARY_ASSISTANT)
    }

    /// Render the template with the given language names.
    pub fn render(&self, source_language: &str, target_language: &str) -> String {
        self.template
            .replace("{source_language}", source_language)
            .replace("{target_language}", target_language)
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::plain()
    }
}

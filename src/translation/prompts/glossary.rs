use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One glossary entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossaryTerm {
    /// Term as it appears in the source text
    pub source: String,
    /// Required translation
    pub target: String,
}

/// Ordered term mapping applied to every translation call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Glossary {
    terms: Vec<GlossaryTerm>,
}

impl Glossary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(term, translation)` pairs, keeping their order
    pub fn from_pairs<I, S, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        let mut glossary = Self::new();
        for (source, target) in pairs {
            glossary.add_term(source, target);
        }
        glossary
    }

    /// Parse a JSON object of `"term": "translation"` entries, in file order
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json).context("Glossary is not valid JSON")?;
        let object = value
            .as_object()
            .ok_or_else(|| anyhow!("Glossary must be a JSON object of term/translation pairs"))?;

        let mut glossary = Self::new();
        for (source, target) in object {
            let target = match target {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                other => return Err(anyhow!("Glossary entry '{}' has a non-text translation: {}", source, other)),
            };
            glossary.add_term(source.clone(), target);
        }
        Ok(glossary)
    }

    /// Load a JSON glossary file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read glossary file: {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("Invalid glossary file: {}", path.display()))
    }

    /// Add a term; an existing entry for the same term is replaced in place
    pub fn add_term(&mut self, source: impl Into<String>, target: impl Into<String>) {
        let source = source.into();
        let target = target.into();
        match self.terms.iter_mut().find(|t| t.source == source) {
            Some(existing) => existing.target = target,
            None => self.terms.push(GlossaryTerm { source, target }),
        }
    }

    pub fn terms(&self) -> &[GlossaryTerm] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/*!
 * Translation caching functionality.
 *
 * Identical segments (repeated spreadsheet cells, boilerplate paragraphs)
 * are sent to the model once per job. The key covers the text, both
 * languages and a fingerprint of the full instruction, so a different
 * glossary or template never reuses a stale answer.
 */

use log::debug;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Cache key combining source text, languages and instruction fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    source_text: String,
    source_language: String,
    target_language: String,
    instruction_fingerprint: String,
}

impl CacheKey {
    fn new(source_text: &str, source_language: &str, target_language: &str, instruction: &str) -> Self {
        Self {
            source_text: source_text.to_string(),
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            instruction_fingerprint: fingerprint(instruction),
        }
    }
}

/// SHA-256 of an instruction, hex encoded
pub fn fingerprint(instruction: &str) -> String {
    format!("{:x}", Sha256::digest(instruction.as_bytes()))
}

/// Translation cache shared by clones of a translation service
#[derive(Debug, Clone)]
pub struct TranslationCache {
    cache: Arc<RwLock<HashMap<CacheKey, String>>>,
    hits: Arc<AtomicUsize>,
    misses: Arc<AtomicUsize>,
    enabled: bool,
}

impl TranslationCache {
    pub fn new(enabled: bool) -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            hits: Arc::new(AtomicUsize::new(0)),
            misses: Arc::new(AtomicUsize::new(0)),
            enabled,
        }
    }

    /// Look up a translation
    pub fn get(&self, source_text: &str, source_language: &str, target_language: &str, instruction: &str) -> Option<String> {
        if !self.enabled {
            return None;
        }

        let key = CacheKey::new(source_text, source_language, target_language, instruction);
        match self.cache.read().get(&key) {
            Some(translation) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "Cache hit for '{}' ({} -> {})",
                    truncate_text(source_text, 30),
                    source_language,
                    target_language
                );
                Some(translation.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a translation
    pub fn store(&self, source_text: &str, source_language: &str, target_language: &str, instruction: &str, translation: &str) {
        if !self.enabled {
            return;
        }
        let key = CacheKey::new(source_text, source_language, target_language, instruction);
        self.cache.write().insert(key, translation.to_string());
    }

    /// `(hits, misses, hit_rate)`
    pub fn stats(&self) -> (usize, usize, f64) {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 { hits as f64 / total as f64 } else { 0.0 };
        (hits, misses, hit_rate)
    }

    pub fn clear(&self) {
        self.cache.write().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        debug!("Translation cache cleared");
    }

    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Default for TranslationCache {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Truncate text to a maximum number of characters with ellipsis
fn truncate_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}...", &text[..byte_index]),
        None => text.to_string(),
    }
}

/*!
 * Tests for translation cache functionality
 */

use yadtwai::translation::cache::{fingerprint, TranslationCache};

const INSTRUCTION: &str = "Translate the following text from English to French";

#[test]
fn test_cache_new_withDisabled_shouldNeverReturnEntries() {
    let cache = TranslationCache::new(false);
    cache.store("hello", "en", "fr", INSTRUCTION, "bonjour");

    assert!(cache.get("hello", "en", "fr", INSTRUCTION).is_none());
    assert!(cache.is_empty());
    assert!(!cache.is_enabled());
}

#[test]
fn test_cache_store_withEnabledCache_shouldStoreTranslation() {
    let cache = TranslationCache::new(true);
    cache.store("hello", "en", "fr", INSTRUCTION, "bonjour");

    assert_eq!(cache.get("hello", "en", "fr", INSTRUCTION), Some("bonjour".to_string()));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_cache_get_withDifferentLanguages_shouldReturnNone() {
    let cache = TranslationCache::new(true);
    cache.store("hello", "en", "fr", INSTRUCTION, "bonjour");

    assert!(cache.get("hello", "de", "fr", INSTRUCTION).is_none());
    assert!(cache.get("hello", "en", "es", INSTRUCTION).is_none());
}

#[test]
fn test_cache_get_withDifferentInstruction_shouldReturnNone() {
    let cache = TranslationCache::new(true);
    cache.store("hello", "en", "fr", INSTRUCTION, "bonjour");

    // A glossary changes the instruction and therefore the expected output
    let with_glossary = format!("{}\nhello: salut", INSTRUCTION);
    assert!(cache.get("hello", "en", "fr", &with_glossary).is_none());
}

#[test]
fn test_cache_stats_shouldCountHitsAndMisses() {
    let cache = TranslationCache::new(true);
    cache.store("hello", "en", "fr", INSTRUCTION, "bonjour");

    cache.get("hello", "en", "fr", INSTRUCTION);
    cache.get("hello", "en", "fr", INSTRUCTION);
    cache.get("goodbye", "en", "fr", INSTRUCTION);

    let (hits, misses, rate) = cache.stats();
    assert_eq!(hits, 2);
    assert_eq!(misses, 1);
    assert!((rate - 2.0 / 3.0).abs() < 1e-9);
}

#[test]
fn test_cache_clear_shouldResetEntriesAndStats() {
    let cache = TranslationCache::new(true);
    cache.store("hello", "en", "fr", INSTRUCTION, "bonjour");
    cache.get("hello", "en", "fr", INSTRUCTION);

    cache.clear();

    assert!(cache.is_empty());
    assert_eq!(cache.stats(), (0, 0, 0.0));
}

#[test]
fn test_cache_clones_shouldShareEntries() {
    let cache = TranslationCache::new(true);
    let clone = cache.clone();
    clone.store("hello", "en", "fr", INSTRUCTION, "bonjour");

    assert_eq!(cache.get("hello", "en", "fr", INSTRUCTION), Some("bonjour".to_string()));
}

#[test]
fn test_fingerprint_shouldBeStableHexDigest() {
    let a = fingerprint(INSTRUCTION);
    assert_eq!(a, fingerprint(INSTRUCTION));
    assert_eq!(a.len(), 64);
    assert_ne!(a, fingerprint("something else"));
}

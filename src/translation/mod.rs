/*!
 * Translation of extracted document units through a completion provider.
 *
 * It is split into several submodules:
 *
 * - `core`: translation service, per-unit requests and token usage
 * - `batch`: bounded concurrent translation of a document's units
 * - `chunker`: paragraph-boundary splitting and reassembly
 * - `prompts`: instruction templates and the glossary
 * - `cache`: in-memory reuse of identical segments
 * - `telemetry`: trace and generation observers
 */

// Re-export main types for easier usage
pub use self::batch::BatchTranslator;
pub use self::core::{TokenUsageStats, TranslationRequest, TranslationService};
pub use self::prompts::{Glossary, GlossaryTerm, PromptTemplate};
pub use self::telemetry::{LogObserver, MemoryObserver, NoopObserver, Observer};

// Submodules
pub mod batch;
pub mod cache;
pub mod chunker;
pub mod core;
pub mod prompts;
pub mod telemetry;

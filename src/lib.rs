/*!
 * # YADTwAI - Yet Another Document Translator with AI
 *
 * A Rust library for translating office documents with large language models
 * while keeping their structure intact.
 *
 * ## Features
 *
 * - Extract translatable text from `.docx`, `.pptx` and `.xlsx` packages
 * - Translate through various AI providers:
 *   - Ollama (local LLM)
 *   - OpenAI API (and LM Studio)
 *   - Anthropic API
 * - Glossary-constrained instructions
 * - Chunking on paragraph boundaries for long text
 * - Rebuild the original package with translated text in place
 * - Quality evaluation (METEOR, embedding similarity, back-translation)
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `document`: OOXML extraction and reconstruction
 * - `translation`: AI-powered translation services:
 *   - `translation::core`: Per-unit translation and token usage
 *   - `translation::batch`: Bounded concurrent translation of a document
 *   - `translation::chunker`: Splitting long text for the model
 *   - `translation::prompts`: Instructions and glossary
 *   - `translation::telemetry`: Trace and generation observers
 * - `evaluation`: Translation quality scoring
 * - `app_config`: Configuration management
 * - `app_controller`: Translation jobs, file and folder runs
 * - `file_utils`: File system operations
 * - `language_utils`: ISO language code utilities
 * - `providers`: Client implementations for various LLM providers
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod document;
pub mod errors;
pub mod evaluation;
pub mod file_utils;
pub mod language_utils;
pub mod providers;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use app_controller::{Controller, JobOutcome, TranslationJob};
pub use document::{DocumentFormat, TextUnit, UnitAddress};
pub use errors::{AppError, DocumentError, EvaluationError, ProviderError, TranslationError};
pub use evaluation::{EvaluationMethod, EvaluationResult};
pub use language_utils::{get_language_name, validate_language_setting};
pub use translation::{Glossary, TranslationService};

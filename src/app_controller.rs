use anyhow::{anyhow, Context, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::app_config::Config;
use crate::document::{self, DocumentFormat, ExtractOptions, TranslatedUnits};
use crate::errors::{AppError, DocumentError};
use crate::evaluation::{self, EvaluationInput, EvaluationMethod, EvaluationResult, Evaluator};
use crate::file_utils::FileManager;
use crate::providers::{self, Embedder, Provider};
use crate::translation::telemetry::{report_trace, LogObserver, Observer, TraceRecord};
use crate::translation::{BatchTranslator, Glossary, TokenUsageStats, TranslationService};

// @module: Application controller for document translation jobs

/// One document to translate
#[derive(Debug, Clone)]
pub struct TranslationJob {
    /// Original file name, used to pick the format and name the output
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub source_language: String,
    pub target_language: String,
    pub glossary: Option<Glossary>,
    /// `reference_file`, `reference_text`, `self_evaluation` or `no_evaluation`
    pub evaluation_method: String,
    pub reference: Option<String>,
}

impl TranslationJob {
    pub fn new(
        file_name: impl Into<String>,
        bytes: Vec<u8>,
        source_language: impl Into<String>,
        target_language: impl Into<String>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
            source_language: source_language.into(),
            target_language: target_language.into(),
            glossary: None,
            evaluation_method: EvaluationMethod::None.as_str().to_string(),
            reference: None,
        }
    }

    pub fn with_glossary(mut self, glossary: Glossary) -> Self {
        self.glossary = Some(glossary);
        self
    }

    pub fn with_evaluation(mut self, method: impl Into<String>, reference: Option<String>) -> Self {
        self.evaluation_method = method.into();
        self.reference = reference;
        self
    }
}

/// Result of a successful job
#[derive(Debug, Clone)]
pub struct JobOutcome {
    /// Reconstructed document
    pub bytes: Vec<u8>,
    pub output_file_name: String,
    pub evaluation: EvaluationResult,
    pub usage: TokenUsageStats,
    /// Source unit texts in document order, one per line
    pub original_text: String,
    /// Translated unit texts in document order, one per line
    pub translated_text: String,
    pub unit_count: usize,
}

/// Per-run settings shared by every file of a CLI invocation
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub glossary: Option<Glossary>,
    pub evaluation_method: Option<String>,
    pub reference: Option<String>,
}

/// Main application controller for document translation
pub struct Controller {
    // @field: App configuration
    config: Config,
    provider: Arc<dyn Provider>,
    embedder: Arc<dyn Embedder>,
    observer: Arc<dyn Observer>,
}

impl Controller {
    // @method: Create a controller with the provider selected in the configuration
    pub fn with_config(config: Config) -> Result<Self> {
        let provider = providers::create_provider(&config.translation)?;
        let embedder = evaluation::create_embedder(&config)?;
        Ok(Self {
            config,
            provider,
            embedder,
            observer: Arc::new(LogObserver),
        })
    }

    /// Create a controller around an existing provider, with the local embedder
    pub fn with_provider(config: Config, provider: Arc<dyn Provider>) -> Self {
        Self {
            config,
            provider,
            embedder: Arc::new(evaluation::HashingEmbedder::default()),
            observer: Arc::new(LogObserver),
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = embedder;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Check that the completion service answers
    pub async fn test_connection(&self) -> Result<()> {
        self.provider
            .test_connection()
            .await
            .with_context(|| format!("Cannot reach {} ({})", self.config.translation.provider.display_name(), self.provider.model()))
    }

    /// Translate one document end to end
    pub async fn translate_document(&self, job: TranslationJob) -> Result<JobOutcome, AppError> {
        self.translate_document_with_progress(job, &|_, _| {}).await
    }

    /// Translate one document, reporting `(completed, total)` units
    ///
    /// The format is checked before anything else, so an unsupported file
    /// never reaches the provider. Any extraction or translation error aborts
    /// the job without output; evaluation problems only drop the score.
    pub async fn translate_document_with_progress(
        &self,
        job: TranslationJob,
        progress: &(dyn Fn(usize, usize) + Send + Sync),
    ) -> Result<JobOutcome, AppError> {
        let format = DocumentFormat::from_path(&job.file_name)?;

        let limit = self.config.document.max_file_size_bytes;
        if job.bytes.len() > limit {
            return Err(DocumentError::TooLarge {
                size: job.bytes.len(),
                limit,
            }
            .into());
        }

        let trace = TraceRecord::new("translate_document")
            .with_metadata("file", job.file_name.as_str())
            .with_metadata("source_language", job.source_language.as_str())
            .with_metadata("target_language", job.target_language.as_str())
            .with_metadata("evaluation", job.evaluation_method.as_str());
        report_trace(self.observer.as_ref(), &trace);

        let options = ExtractOptions {
            spreadsheet_mode: self.config.document.spreadsheet_mode,
        };
        let extracted = document::extract(format, &job.bytes, &options)?;
        info!("{}: {} text units to translate", job.file_name, extracted.units.len());

        let service = TranslationService::new(self.provider.clone(), self.config.translation.clone())
            .with_observer(self.observer.clone())
            .with_trace(trace.id.clone());
        let translator = BatchTranslator::new(service.clone());
        let translated = translator
            .translate_units(
                &extracted.units,
                &job.source_language,
                &job.target_language,
                job.glossary.as_ref(),
                progress,
            )
            .await?;

        let original_text = extracted.full_text();
        let translated_text = ordered_text(&extracted.units, &translated);
        let unit_count = extracted.units.len();
        let bytes = document::reconstruct(extracted.template, &translated)?;

        let method = EvaluationMethod::parse(&job.evaluation_method);
        let evaluation = Evaluator::new(self.embedder.clone())
            .evaluate(
                method,
                EvaluationInput {
                    original: &original_text,
                    translated: &translated_text,
                    reference: job.reference.as_deref(),
                    source_language: &job.source_language,
                    target_language: &job.target_language,
                },
                &service,
            )
            .await;

        let usage = service.usage_stats();
        let (hits, misses, _) = service.cache.stats();
        debug!("Translation cache: {} hits, {} misses", hits, misses);

        Ok(JobOutcome {
            bytes,
            output_file_name: FileManager::translated_file_name(&base_name(&job.file_name), &job.target_language),
            evaluation,
            usage,
            original_text,
            translated_text,
            unit_count,
        })
    }

    /// Translate a single file into `output_dir`
    pub async fn run(&self, input_file: PathBuf, output_dir: PathBuf, force_overwrite: bool, options: &RunOptions) -> Result<()> {
        self.run_with_progress(&input_file, &output_dir, &MultiProgress::new(), force_overwrite, options)
            .await
            .map(|_| ())
    }

    /// Returns whether a file was written
    async fn run_with_progress(
        &self,
        input_file: &Path,
        output_dir: &Path,
        multi_progress: &MultiProgress,
        force_overwrite: bool,
        options: &RunOptions,
    ) -> Result<bool> {
        let start_time = Instant::now();

        if !FileManager::file_exists(input_file) {
            return Err(anyhow!("Input file does not exist: {:?}", input_file));
        }
        let output_path = FileManager::generate_output_path(input_file, output_dir, &self.config.target_language);
        if output_path.exists() && !force_overwrite {
            warn!("Skipping file, translation already exists (use -f to force overwrite)");
            return Ok(false);
        }

        let bytes = FileManager::read_bytes_limited(input_file, self.config.document.max_file_size_bytes)?;
        let file_name = base_name(&input_file.to_string_lossy());
        let job = TranslationJob::new(
            file_name.as_str(),
            bytes,
            self.config.source_language.as_str(),
            self.config.target_language.as_str(),
        )
        .with_evaluation(
            options
                .evaluation_method
                .clone()
                .unwrap_or_else(|| self.config.evaluation.method.clone()),
            options.reference.clone(),
        );
        let job = match &options.glossary {
            Some(glossary) => job.with_glossary(glossary.clone()),
            None => job,
        };

        info!(
            "YADTwAI: {} - {}",
            self.config.translation.provider.display_name(),
            self.config.translation.get_model()
        );
        info!("Translating {}, please wait…", file_name);

        let progress_bar = multi_progress.add(ProgressBar::new(0));
        let template_result = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} units ({percent}%) {msg} {eta}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(template_result.progress_chars("█▓▒░"));
        progress_bar.set_message("Translating");

        let pb = progress_bar.clone();
        let result = self
            .translate_document_with_progress(job, &move |completed, total| {
                pb.set_length(total as u64);
                pb.set_position(completed as u64);
            })
            .await;
        progress_bar.finish_and_clear();
        let outcome = result?;

        FileManager::write_bytes(&output_path, &outcome.bytes)?;
        info!(
            "Success: {} ({} units in {})",
            output_path.display(),
            outcome.unit_count,
            Self::format_duration(start_time.elapsed())
        );

        match outcome.evaluation.score {
            Some(score) => info!("Evaluation ({}): {:.4}", outcome.evaluation.method, score),
            None if outcome.evaluation.method != EvaluationMethod::None => {
                warn!("Evaluation ({}) produced no score", outcome.evaluation.method)
            }
            None => {}
        }
        if outcome.usage.total_tokens > 0 {
            info!("{}", outcome.usage.summary());
        }

        Ok(true)
    }

    /// Translate every supported document under `input_dir`, next to its source
    /// Files that already have a translation are skipped unless forced
    pub async fn run_folder(&self, input_dir: PathBuf, force_overwrite: bool, options: &RunOptions) -> Result<()> {
        let start_time = Instant::now();

        if !input_dir.is_dir() {
            return Err(anyhow!("Input directory does not exist: {:?}", input_dir));
        }

        let documents = FileManager::find_documents(&input_dir)?;
        if documents.is_empty() {
            return Err(anyhow!("No supported documents found in directory: {:?}", input_dir));
        }

        let multi_progress = MultiProgress::new();
        let folder_pb = multi_progress.add(ProgressBar::new(documents.len() as u64));
        let template_result = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {msg} {eta}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        folder_pb.set_style(template_result.progress_chars("█▓▒░"));

        let mut success_count = 0;
        let mut skip_count = 0;
        let mut error_count = 0;

        for path in &documents {
            let file_name = path
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            folder_pb.set_message(format!("Processing: {}", file_name));

            let output_dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| input_dir.clone());
            match self
                .run_with_progress(path, &output_dir, &multi_progress, force_overwrite, options)
                .await
            {
                Ok(true) => success_count += 1,
                Ok(false) => skip_count += 1,
                Err(e) => {
                    error!("Error processing file {}: {:#}", file_name, e);
                    error_count += 1;
                }
            }
            folder_pb.inc(1);
        }

        folder_pb.finish_with_message("Folder processing complete");

        let summary_message = format!(
            "Folder processing completed: {} processed, {} skipped, {} errors",
            success_count, skip_count, error_count
        );
        info!("{}", summary_message);

        let log_file_path = input_dir.join("yadtwai.issues.log");
        let entry = format!(
            "Folder Processing: {} - {} - Duration: {}",
            input_dir.display(),
            summary_message,
            Self::format_duration(start_time.elapsed())
        );
        if let Err(e) = FileManager::append_to_log_file(&log_file_path, &entry) {
            warn!("Failed to write folder logs to file: {}", e);
        }

        Ok(())
    }

    /// Reference text for evaluation
    ///
    /// Supported documents contribute their extracted text, anything else is
    /// read as plain text.
    pub fn load_reference(&self, path: &Path) -> Result<String> {
        match DocumentFormat::from_path(path) {
            Ok(format) => {
                let bytes = FileManager::read_bytes_limited(path, self.config.document.max_file_size_bytes)?;
                let options = ExtractOptions {
                    spreadsheet_mode: self.config.document.spreadsheet_mode,
                };
                let extracted = document::extract(format, &bytes, &options)
                    .with_context(|| format!("Failed to read reference document: {:?}", path))?;
                Ok(extracted.full_text())
            }
            Err(_) => FileManager::read_to_string(path),
        }
    }

    // Format duration in a human-readable format
    fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}

/// Translated texts in the units' document order
fn ordered_text(units: &[document::TextUnit], translated: &TranslatedUnits) -> String {
    units
        .iter()
        .filter_map(|unit| translated.get(&unit.address))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Last path component of a file name
fn base_name(file_name: &str) -> String {
    Path::new(file_name)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| file_name.to_string())
}

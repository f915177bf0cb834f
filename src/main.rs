// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::{Path, PathBuf};

use yadtwai::app_config::{self, Config, TranslationProvider};
use yadtwai::app_controller::{Controller, RunOptions};
use yadtwai::document::SpreadsheetMode;
use yadtwai::translation::Glossary;

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    Ollama,
    #[value(name = "openai")]
    OpenAI,
    Anthropic,
    #[value(name = "lmstudio")]
    LMStudio,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Ollama => TranslationProvider::Ollama,
            CliTranslationProvider::OpenAI => TranslationProvider::OpenAI,
            CliTranslationProvider::Anthropic => TranslationProvider::Anthropic,
            CliTranslationProvider::LMStudio => TranslationProvider::LMStudio,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

/// Evaluation methods accepted on the command line
#[derive(Debug, Clone, ValueEnum)]
enum CliEvaluationMethod {
    #[value(name = "reference_file")]
    ReferenceFile,
    #[value(name = "reference_text")]
    ReferenceText,
    #[value(name = "self_evaluation")]
    SelfEvaluation,
    #[value(name = "no_evaluation")]
    NoEvaluation,
}

impl CliEvaluationMethod {
    fn as_name(&self) -> &'static str {
        match self {
            Self::ReferenceFile => "reference_file",
            Self::ReferenceText => "reference_text",
            Self::SelfEvaluation => "self_evaluation",
            Self::NoEvaluation => "no_evaluation",
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum CliSpreadsheetMode {
    Cells,
    #[value(name = "whole_sheet")]
    WholeSheet,
}

impl From<CliSpreadsheetMode> for SpreadsheetMode {
    fn from(mode: CliSpreadsheetMode) -> Self {
        match mode {
            CliSpreadsheetMode::Cells => SpreadsheetMode::Cells,
            CliSpreadsheetMode::WholeSheet => SpreadsheetMode::WholeSheet,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate office documents using AI providers (default command)
    Translate(TranslateArgs),

    /// Generate shell completions for yadtwai
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(clap::Args, Debug, Clone)]
struct TranslateArgs {
    /// Input document (.docx, .pptx, .xlsx) or directory to process
    #[arg(value_name = "INPUT_PATH")]
    input_path: Option<PathBuf>,

    /// Force overwrite of existing output files
    #[arg(short, long)]
    force_overwrite: bool,

    /// Translation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// Source language code (e.g., 'fr', 'de') or 'auto'
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language code (e.g., 'en', 'es', 'fr')
    #[arg(short, long)]
    target_language: Option<String>,

    /// JSON glossary file of "term": "translation" pairs
    #[arg(short, long, value_name = "GLOSSARY_JSON")]
    glossary: Option<PathBuf>,

    /// Quality evaluation method
    #[arg(short, long, value_enum)]
    evaluation: Option<CliEvaluationMethod>,

    /// Reference translation text for evaluation
    #[arg(long, conflicts_with = "reference_file")]
    reference_text: Option<String>,

    /// Reference translation file (document or plain text) for evaluation
    #[arg(long)]
    reference_file: Option<PathBuf>,

    /// Spreadsheet unit granularity
    #[arg(long, value_enum)]
    spreadsheet_mode: Option<CliSpreadsheetMode>,

    /// Output directory (defaults to the input file's directory)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", env = "YADTWAI_CONFIG")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

/// YADTwAI - Yet Another Document Translator with AI
///
/// Translates Word, PowerPoint and Excel documents with AI providers while
/// keeping their layout (Ollama, OpenAI, Anthropic, LM Studio).
#[derive(Parser, Debug)]
#[command(name = "yadtwai")]
#[command(version)]
#[command(about = "AI-powered office document translation tool")]
#[command(long_about = "YADTwAI translates .docx, .pptx and .xlsx files with AI providers and writes
translated_<lang>_<file> next to the original.

EXAMPLES:
    yadtwai report.docx                            # Translate using default config
    yadtwai -f report.docx                         # Force overwrite existing files
    yadtwai -p openai -m gpt-4o deck.pptx          # Use specific provider and model
    yadtwai -s fr -t en report.docx                # Translate from French to English
    yadtwai -g glossary.json report.docx           # Enforce glossary terms
    yadtwai -e self-evaluation report.docx         # Score by back-translation
    yadtwai -e reference-text --reference-text \"...\" memo.docx
    yadtwai --log-level debug /documents/          # Process an entire directory
    yadtwai completions bash > yadtwai.bash        # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically.

SUPPORTED PROVIDERS:
    ollama    - Local Ollama server
    openai    - OpenAI API (requires API key, or OPENAI_API_KEY)
    anthropic - Anthropic API (requires API key, or ANTHROPIC_API_KEY)
    lmstudio  - LM Studio local server (OpenAI-compatible on http://localhost:1234/v1)")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    args: TranslateArgs,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        // The boxed logger accepts every record; the global max level does the filtering
        log::set_boxed_logger(Box::new(CustomLogger { level: LevelFilter::Trace }))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let _ = writeln!(
                std::io::stderr(),
                "{}{} {:<5} {}\x1B[0m",
                Self::color_for_level(record.level()),
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Info until the configuration says otherwise
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "yadtwai", &mut std::io::stdout());
            Ok(())
        }
        Some(Commands::Translate(args)) => run_translate(args).await,
        None => run_translate(cli.args).await,
    }
}

/// Load the configuration file, creating it with defaults when missing
fn load_config(config_path: &str) -> Result<Config> {
    if Path::new(config_path).exists() {
        Config::from_file(config_path)
    } else {
        warn!("Config file not found at '{}', creating default config.", config_path);
        let config = Config::default();
        config
            .save_to_file(config_path)
            .with_context(|| format!("Failed to write default config to file: {}", config_path))?;
        Ok(config)
    }
}

/// Apply command line overrides on top of the file configuration
fn apply_overrides(config: &mut Config, options: &TranslateArgs) {
    if let Some(provider) = &options.provider {
        config.translation.provider = provider.clone().into();
    }
    if let Some(model) = &options.model {
        let provider = config.translation.provider.clone();
        config.translation.provider_config_mut(&provider).model = model.clone();
    }
    if let Some(source_lang) = &options.source_language {
        config.source_language = source_lang.clone();
    }
    if let Some(target_lang) = &options.target_language {
        config.target_language = target_lang.clone();
    }
    if let Some(mode) = &options.spreadsheet_mode {
        config.document.spreadsheet_mode = mode.clone().into();
    }
    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }
}

async fn run_translate(options: TranslateArgs) -> Result<()> {
    let input_path = options
        .input_path
        .clone()
        .ok_or_else(|| anyhow!("INPUT_PATH is required when no subcommand is specified"))?;

    if let Some(level) = &options.log_level {
        let level: app_config::LogLevel = level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    let mut config = load_config(&options.config_path)?;
    apply_overrides(&mut config, &options);
    config.validate().context("Configuration validation failed")?;
    log::set_max_level(config.log_level.to_level_filter());

    let controller = Controller::with_config(config.clone())?;
    controller.test_connection().await?;

    let reference = match (&options.reference_text, &options.reference_file) {
        (Some(text), _) => Some(text.clone()),
        (None, Some(path)) => Some(controller.load_reference(path)?),
        (None, None) => None,
    };
    let run_options = RunOptions {
        glossary: options.glossary.as_ref().map(Glossary::from_file).transpose()?,
        evaluation_method: options.evaluation.as_ref().map(|m| m.as_name().to_string()),
        reference,
    };

    if input_path.is_file() {
        let output_dir = match &options.output_dir {
            Some(dir) => dir.clone(),
            None => input_path.parent().unwrap_or(Path::new(".")).to_path_buf(),
        };
        controller
            .run(input_path, output_dir, options.force_overwrite, &run_options)
            .await
    } else if input_path.is_dir() {
        controller
            .run_folder(input_path, options.force_overwrite, &run_options)
            .await
    } else {
        Err(anyhow!("Input path does not exist: {:?}", input_path))
    }
}

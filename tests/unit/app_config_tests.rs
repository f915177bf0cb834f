/*!
 * Tests for application configuration functionality
 */

use anyhow::Result;
use yadtwai::app_config::{Config, LogLevel, ProviderConfig, TranslationCommonConfig, TranslationProvider};
use yadtwai::document::SpreadsheetMode;

use crate::common;

/// Test default configuration values
#[test]
fn test_default_config_withNoParameters_shouldHaveCorrectDefaults() {
    let config = Config::default();

    assert_eq!(config.source_language, "auto");
    assert_eq!(config.target_language, "en");
    assert_eq!(config.translation.provider, TranslationProvider::Ollama);
    assert_eq!(config.evaluation.method, "no_evaluation");
    assert_eq!(config.document.spreadsheet_mode, SpreadsheetMode::Cells);

    let ollama_config = config
        .translation
        .get_provider_config(&TranslationProvider::Ollama)
        .expect("Ollama provider config should exist");

    assert_eq!(ollama_config.concurrent_requests, 1);
    assert_eq!(ollama_config.max_chars_per_request, 4000);
    assert_eq!(ollama_config.timeout_secs, 60);
    assert_eq!(ollama_config.model, "llama3.2:3b");

    assert_eq!(config.translation.optimal_concurrent_requests(), 1);
    assert_eq!(config.log_level, LogLevel::Info);
}

/// Test configuration validation
#[test]
fn test_config_validation_withVariousConfigs_shouldValidateCorrectly() {
    let mut config = Config::default();
    assert!(config.validate().is_ok());

    // "auto" is only accepted on the source side
    config.target_language = "auto".to_string();
    assert!(config.validate().is_err());
    config.target_language = "".to_string();
    assert!(config.validate().is_err());
    config.target_language = "French".to_string();
    assert!(config.validate().is_ok());

    config.source_language = "not-a-language".to_string();
    assert!(config.validate().is_err());
    config.source_language = "de".to_string();

    config.translation.provider = TranslationProvider::OpenAI;
    config
        .translation
        .provider_config_mut(&TranslationProvider::OpenAI)
        .api_key = "sk-1234567890".to_string();
    assert!(config.validate().is_ok());

    config.translation.provider = TranslationProvider::Ollama;
    config.document.max_file_size_bytes = 0;
    assert!(config.validate().is_err());
}

/// Test that common configuration provides reasonable default values
#[test]
fn test_commonConfigDefaults_shouldProvideReasonableValues() {
    let common_config = TranslationCommonConfig::default();

    assert_eq!(common_config.retry_count, 3);
    assert_eq!(common_config.retry_backoff_ms, 1000);
    assert_eq!(common_config.temperature, 0.0);
    assert!(common_config.cache_enabled);
    assert!(common_config.system_prompt.is_none());
}

/// Test that each provider has appropriate default rate limits
#[test]
fn test_providerSpecificDefaults_shouldHaveCorrectRateLimits() {
    assert_eq!(ProviderConfig::new(TranslationProvider::Ollama).rate_limit, None);
    assert_eq!(ProviderConfig::new(TranslationProvider::LMStudio).rate_limit, None);
    assert_eq!(ProviderConfig::new(TranslationProvider::OpenAI).rate_limit, Some(60));
    assert_eq!(ProviderConfig::new(TranslationProvider::Anthropic).rate_limit, Some(45));
    assert_eq!(ProviderConfig::new(TranslationProvider::Anthropic).timeout_secs, 90);
}

#[test]
fn test_providerFromStr_withMixedCase_shouldParse() {
    assert_eq!("LMStudio".parse::<TranslationProvider>().unwrap(), TranslationProvider::LMStudio);
    assert_eq!("openai".parse::<TranslationProvider>().unwrap(), TranslationProvider::OpenAI);
    assert!("deepl".parse::<TranslationProvider>().is_err());
    assert_eq!(TranslationProvider::LMStudio.display_name(), "LM Studio");
}

#[test]
fn test_saveAndLoad_withCustomValues_shouldKeepThem() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("conf.json");

    let mut config = common::test_config();
    config.document.spreadsheet_mode = SpreadsheetMode::WholeSheet;
    config.evaluation.method = "self_evaluation".to_string();
    config.translation.common.system_prompt = Some("Render {source_language} as {target_language}.".to_string());
    config.save_to_file(&path)?;

    let loaded = Config::from_file(&path)?;
    assert_eq!(loaded.source_language, "fr");
    assert_eq!(loaded.document.spreadsheet_mode, SpreadsheetMode::WholeSheet);
    assert_eq!(loaded.evaluation.method, "self_evaluation");
    assert_eq!(
        loaded.translation.common.system_prompt.as_deref(),
        Some("Render {source_language} as {target_language}.")
    );
    Ok(())
}

#[test]
fn test_fromFile_withMalformedJson_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(temp_dir.path(), "conf.json", b"{ not json")?;
    assert!(Config::from_file(&path).is_err());
    assert!(Config::from_file(temp_dir.path().join("missing.json")).is_err());
    Ok(())
}

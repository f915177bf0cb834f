/*!
 * Integration tests for application lifecycle: single files, folders and references
 */

use anyhow::Result;
use std::fs;

use yadtwai::app_config::Config;
use yadtwai::app_controller::{Controller, RunOptions};
use yadtwai::document::DocumentFormat;
use yadtwai::providers::mock::MockProvider;

use crate::common::{self, fixtures};

#[test]
fn test_controller_withDefaultConfig_shouldInitialize() -> Result<()> {
    let controller = Controller::with_config(Config::default())?;
    assert_eq!(controller.config().target_language, "en");
    Ok(())
}

#[tokio::test]
async fn test_run_withDocx_shouldWriteTranslatedFile() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "lettre.docx", &fixtures::docx(&["Bonjour", "Merci"]))?;
    let output_dir = temp_dir.path().join("out");
    let provider = MockProvider::working();
    let controller = common::mock_controller(&provider, common::test_config());

    controller.run(input, output_dir.clone(), false, &RunOptions::default()).await?;

    let written = fs::read(output_dir.join("translated_en_lettre.docx"))?;
    assert_eq!(
        common::unit_texts(DocumentFormat::Docx, &written),
        vec!["[TRANSLATED] Bonjour", "[TRANSLATED] Merci"]
    );
    assert_eq!(provider.call_count(), 2);
    Ok(())
}

#[tokio::test]
async fn test_run_existingOutput_shouldSkipUnlessForced() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "lettre.docx", &fixtures::docx(&["Bonjour"]))?;
    let existing = common::create_test_file(temp_dir.path(), "translated_en_lettre.docx", b"previous")?;
    let provider = MockProvider::working();
    let controller = common::mock_controller(&provider, common::test_config());

    controller
        .run(input.clone(), temp_dir.path().to_path_buf(), false, &RunOptions::default())
        .await?;
    assert_eq!(fs::read(&existing)?, b"previous");
    assert_eq!(provider.call_count(), 0);

    controller
        .run(input, temp_dir.path().to_path_buf(), true, &RunOptions::default())
        .await?;
    assert_eq!(
        common::unit_texts(DocumentFormat::Docx, &fs::read(&existing)?),
        vec!["[TRANSLATED] Bonjour"]
    );
    Ok(())
}

#[tokio::test]
async fn test_run_failingProvider_shouldWriteNothing() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "deck.pptx", &fixtures::pptx(&[&["Bonjour"]]))?;
    let output_dir = temp_dir.path().join("out");
    let controller = common::mock_controller(&MockProvider::failing(), common::test_config());

    let result = controller.run(input, output_dir.clone(), false, &RunOptions::default()).await;

    assert!(result.is_err());
    assert!(!output_dir.join("translated_en_deck.pptx").exists());
    Ok(())
}

#[test]
fn test_run_missingInput_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let controller = common::mock_controller(&MockProvider::working(), common::test_config());

    let result = tokio_test::block_on(async {
        controller
            .run(temp_dir.path().join("absent.docx"), temp_dir.path().to_path_buf(), false, &RunOptions::default())
            .await
    });

    assert!(result.is_err());
    Ok(())
}

#[tokio::test]
async fn test_run_withGlossaryOption_shouldReachProvider() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_file(temp_dir.path(), "menu.xlsx", &fixtures::xlsx(&[&[&["Plat du jour"]]]))?;
    let provider = MockProvider::glossary_aware();
    let controller = common::mock_controller(&provider, common::test_config());
    let options = RunOptions {
        glossary: Some(yadtwai::translation::Glossary::from_pairs([("Plat du jour", "Daily special")])),
        ..RunOptions::default()
    };

    controller.run(input, temp_dir.path().to_path_buf(), false, &options).await?;

    let written = fs::read(temp_dir.path().join("translated_en_menu.xlsx"))?;
    assert_eq!(common::unit_texts(DocumentFormat::Xlsx, &written), vec!["Daily special"]);
    Ok(())
}

#[tokio::test]
async fn test_runFolder_shouldTranslateNestedDocumentsNextToSources() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let nested = temp_dir.path().join("slides");
    fs::create_dir_all(&nested)?;
    common::create_test_file(temp_dir.path(), "a.docx", &fixtures::docx(&["Un"]))?;
    common::create_test_file(&nested, "b.pptx", &fixtures::pptx(&[&["Deux"]]))?;
    common::create_test_file(temp_dir.path(), "notes.txt", b"ignored")?;
    let provider = MockProvider::working();
    let controller = common::mock_controller(&provider, common::test_config());

    controller
        .run_folder(temp_dir.path().to_path_buf(), false, &RunOptions::default())
        .await?;

    assert!(temp_dir.path().join("translated_en_a.docx").exists());
    assert!(nested.join("translated_en_b.pptx").exists());
    assert_eq!(provider.call_count(), 2);

    let log = fs::read_to_string(temp_dir.path().join("yadtwai.issues.log"))?;
    assert!(log.contains("2 processed, 0 skipped, 0 errors"));
    Ok(())
}

#[tokio::test]
async fn test_runFolder_withBrokenFile_shouldCountErrorAndContinue() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    common::create_test_file(temp_dir.path(), "a.docx", b"not a zip")?;
    common::create_test_file(temp_dir.path(), "b.docx", &fixtures::docx(&["Deux"]))?;
    let controller = common::mock_controller(&MockProvider::working(), common::test_config());

    controller
        .run_folder(temp_dir.path().to_path_buf(), false, &RunOptions::default())
        .await?;

    assert!(!temp_dir.path().join("translated_en_a.docx").exists());
    assert!(temp_dir.path().join("translated_en_b.docx").exists());
    let log = fs::read_to_string(temp_dir.path().join("yadtwai.issues.log"))?;
    assert!(log.contains("1 processed, 0 skipped, 1 errors"));
    Ok(())
}

#[tokio::test]
async fn test_runFolder_withoutDocuments_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    common::create_test_file(temp_dir.path(), "readme.md", b"# nothing")?;
    let controller = common::mock_controller(&MockProvider::working(), common::test_config());

    let result = controller
        .run_folder(temp_dir.path().to_path_buf(), false, &RunOptions::default())
        .await;

    assert!(result.is_err());
    Ok(())
}

#[test]
fn test_loadReference_shouldReadDocumentsAndPlainText() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let docx = common::create_test_file(temp_dir.path(), "ref.docx", &fixtures::docx(&["Hello", "", "Thanks"]))?;
    let txt = common::create_test_file(temp_dir.path(), "ref.txt", "Hello\nThanks".as_bytes())?;
    let controller = common::mock_controller(&MockProvider::working(), common::test_config());

    assert_eq!(controller.load_reference(&docx)?, "Hello\nThanks");
    assert_eq!(controller.load_reference(&txt)?, "Hello\nThanks");
    assert!(controller.load_reference(&temp_dir.path().join("missing.txt")).is_err());
    Ok(())
}

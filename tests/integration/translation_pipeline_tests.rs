/*!
 * Integration tests for the full translation pipeline.
 *
 * Every job runs against a scripted mock provider: extraction, bounded
 * concurrent translation, reconstruction and evaluation.
 */

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use yadtwai::app_controller::TranslationJob;
use yadtwai::document::{DocumentFormat, SpreadsheetMode, TextUnit, UnitAddress};
use yadtwai::errors::{AppError, DocumentError, ProviderError, TranslationError};
use yadtwai::evaluation::EvaluationMethod;
use yadtwai::providers::mock::MockProvider;
use yadtwai::providers::CompletionRequest;
use yadtwai::translation::{BatchTranslator, Glossary, MemoryObserver};

use crate::common::{self, fixtures};

fn french_docx_job(paragraphs: &[&str]) -> TranslationJob {
    TranslationJob::new("lettre.docx", fixtures::docx(paragraphs), "fr", "en")
}

#[tokio::test]
async fn test_translateDocument_withGlossary_shouldHonourTerm() {
    let provider = MockProvider::glossary_aware();
    let controller = common::mock_controller(&provider, common::test_config());
    let job = french_docx_job(&["Bonjour tout le monde"])
        .with_glossary(Glossary::from_pairs([("tout le monde", "Casablanca")]));

    let outcome = controller.translate_document(job).await.unwrap();

    assert!(outcome.translated_text.contains("Casablanca"));
    assert!(!outcome.translated_text.contains("tout le monde"));
    assert_eq!(outcome.output_file_name, "translated_en_lettre.docx");
    assert_eq!(
        common::unit_texts(DocumentFormat::Docx, &outcome.bytes),
        vec![outcome.translated_text.clone()]
    );

    let request = &provider.requests()[0];
    assert!(request.system.contains("from French to English"));
    assert!(request.system.contains("tout le monde: Casablanca"));
    assert_eq!(request.user, "Bonjour tout le monde");
}

#[tokio::test]
async fn test_translateDocument_noEvaluation_shouldHaveNoScore() {
    let provider = MockProvider::working();
    let controller = common::mock_controller(&provider, common::test_config());
    let job = french_docx_job(&["Bonjour"]).with_evaluation("no_evaluation", Some("Hello".to_string()));

    let outcome = controller.translate_document(job).await.unwrap();

    assert_eq!(outcome.evaluation.method, EvaluationMethod::None);
    assert_eq!(outcome.evaluation.score, None);
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_translateDocument_unknownEvaluationMethod_shouldBehaveAsNone() {
    let provider = MockProvider::working();
    let controller = common::mock_controller(&provider, common::test_config());
    let job = french_docx_job(&["Bonjour"]).with_evaluation("bleu", Some("Hello".to_string()));

    let outcome = controller.translate_document(job).await.unwrap();
    assert_eq!(outcome.evaluation.score, None);
}

#[tokio::test]
async fn test_translateDocument_selfEvaluation_shouldBackTranslateAndScore() {
    let provider = MockProvider::echo();
    let controller = common::mock_controller(&provider, common::test_config());
    let job = TranslationJob::new("bonjour.docx", fixtures::docx(&["Bonjour"]), "fr", "English")
        .with_evaluation("self_evaluation", None);

    let outcome = controller.translate_document(job).await.unwrap();

    assert_eq!(provider.call_count(), 2);
    let requests = provider.requests();
    assert!(requests[0].system.contains("from French to English"));
    assert!(requests[1].system.contains("from English to French"));

    assert_eq!(outcome.evaluation.method, EvaluationMethod::SelfEvaluation);
    let score = outcome.evaluation.score.expect("self evaluation should score");
    assert!((score - 1.0).abs() < 1e-5, "score {}", score);
}

#[tokio::test]
async fn test_translateDocument_referenceText_shouldScoreLexically() {
    let provider = MockProvider::echo();
    let controller = common::mock_controller(&provider, common::test_config());
    let job = french_docx_job(&["the cat sleeps on the sofa"])
        .with_evaluation("reference_text", Some("the cat sleeps on the sofa".to_string()));

    let outcome = controller.translate_document(job).await.unwrap();

    assert_eq!(outcome.evaluation.method, EvaluationMethod::Lexical);
    assert!(outcome.evaluation.score.unwrap() > 0.99);
}

#[tokio::test]
async fn test_translateDocument_referenceFileWithoutReference_shouldStillSucceed() {
    let provider = MockProvider::working();
    let controller = common::mock_controller(&provider, common::test_config());
    let job = french_docx_job(&["Bonjour"]).with_evaluation("reference_file", None);

    let outcome = controller.translate_document(job).await.unwrap();
    assert_eq!(outcome.evaluation.method, EvaluationMethod::Semantic);
    assert_eq!(outcome.evaluation.score, None);
}

#[tokio::test]
async fn test_translateDocument_wholeSheetShortRow_shouldPadAndSucceed() {
    let provider = MockProvider::working().with_custom_response(|_request: &CompletionRequest| "Hola\tMundo\nAdiós".to_string());
    let mut config = common::test_config();
    config.document.spreadsheet_mode = SpreadsheetMode::WholeSheet;
    let controller = common::mock_controller(&provider, config);
    let bytes = fixtures::xlsx(&[&[&["Hello", "World"], &["Bye", "Later"]]]);
    let job = TranslationJob::new("table.xlsx", bytes.clone(), "en", "es");

    let outcome = controller.translate_document(job).await.unwrap();

    assert_eq!(provider.call_count(), 1);
    assert!(provider.requests()[0].system.contains("keep every tab and line break"));
    assert_eq!(outcome.translated_text, "Hola\tMundo\nAdiós\t");
    assert_eq!(
        common::unit_texts_with_mode(DocumentFormat::Xlsx, &outcome.bytes, SpreadsheetMode::Cells),
        vec!["Hola", "Mundo", "Adiós"]
    );
    assert_eq!(
        common::layout(DocumentFormat::Xlsx, &outcome.bytes),
        common::layout(DocumentFormat::Xlsx, &bytes)
    );
}

#[tokio::test]
async fn test_translateDocument_pptx_shouldTranslateEveryShapeInOrder() {
    let provider = MockProvider::working();
    let controller = common::mock_controller(&provider, common::test_config());
    let bytes = fixtures::pptx(&[&["Titre", "Sous-titre"], &["Conclusion"]]);
    let job = TranslationJob::new("deck.pptx", bytes, "fr", "en");

    let outcome = controller.translate_document(job).await.unwrap();

    assert_eq!(outcome.unit_count, 3);
    assert_eq!(
        common::unit_texts(DocumentFormat::Pptx, &outcome.bytes),
        vec!["[TRANSLATED] Titre", "[TRANSLATED] Sous-titre", "[TRANSLATED] Conclusion"]
    );
    assert_eq!(common::layout(DocumentFormat::Pptx, &outcome.bytes), vec![3, 2]);
}

#[tokio::test]
async fn test_translateDocument_slowProvider_shouldTimeOut() {
    let provider = MockProvider::slow(3_000);
    let mut config = common::test_config();
    let active = config.translation.provider.clone();
    config.translation.provider_config_mut(&active).timeout_secs = 1;
    let controller = common::mock_controller(&provider, config);

    let result = controller.translate_document(french_docx_job(&["Bonjour"])).await;

    match result {
        Err(AppError::Translation(TranslationError::Service { address, source })) => {
            assert_eq!(address, "paragraph 0");
            assert!(matches!(source, ProviderError::Timeout(1)));
        }
        other => panic!("Expected a timeout, got {:?}", other.map(|o| o.translated_text)),
    }
}

#[tokio::test]
async fn test_translateDocument_emptyModelOutput_shouldFailWithAddress() {
    let provider = MockProvider::empty();
    let controller = common::mock_controller(&provider, common::test_config());

    let result = controller.translate_document(french_docx_job(&["", "Bonjour"])).await;

    match result {
        Err(AppError::Translation(TranslationError::EmptyResult { address })) => assert_eq!(address, "paragraph 1"),
        other => panic!("Expected EmptyResult, got {:?}", other.map(|o| o.translated_text)),
    }
}

#[tokio::test]
async fn test_translateDocument_failingProvider_shouldAbortWithoutOutput() {
    let provider = MockProvider::failing();
    let controller = common::mock_controller(&provider, common::test_config());

    let result = controller.translate_document(french_docx_job(&["Un", "Deux", "Trois"])).await;

    assert!(matches!(
        result,
        Err(AppError::Translation(TranslationError::Service { .. }))
    ));
    // Sequential by default, so the first failure stops the job
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_translateDocument_unsupportedExtension_shouldNotCallProvider() {
    let provider = MockProvider::working();
    let controller = common::mock_controller(&provider, common::test_config());
    let job = TranslationJob::new("notes.txt", b"Bonjour".to_vec(), "fr", "en");

    let result = controller.translate_document(job).await;

    assert!(matches!(
        result,
        Err(AppError::Document(DocumentError::UnsupportedFormat { .. }))
    ));
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_translateDocument_oversizedInput_shouldBeRejected() {
    let provider = MockProvider::working();
    let mut config = common::test_config();
    config.document.max_file_size_bytes = 64;
    let controller = common::mock_controller(&provider, config);

    let result = controller.translate_document(french_docx_job(&["Bonjour"])).await;

    match result {
        Err(AppError::Document(DocumentError::TooLarge { size, limit })) => {
            assert!(size > 64);
            assert_eq!(limit, 64);
        }
        other => panic!("Expected TooLarge, got {:?}", other.map(|o| o.unit_count)),
    }
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_translateDocument_corruptPackage_shouldFailExtraction() {
    let provider = MockProvider::working();
    let controller = common::mock_controller(&provider, common::test_config());
    let job = TranslationJob::new("broken.docx", b"PK\x03\x04 truncated".to_vec(), "fr", "en");

    let result = controller.translate_document(job).await;

    assert!(matches!(result, Err(AppError::Document(DocumentError::Extraction { .. }))));
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_translateDocument_repeatedParagraphs_shouldReuseCachedTranslation() {
    let provider = MockProvider::working();
    let controller = common::mock_controller(&provider, common::test_config());

    let outcome = controller
        .translate_document(french_docx_job(&["Merci", "Merci", "Merci"]))
        .await
        .unwrap();

    assert_eq!(provider.call_count(), 1);
    assert_eq!(outcome.translated_text, "[TRANSLATED] Merci\n[TRANSLATED] Merci\n[TRANSLATED] Merci");
}

#[tokio::test]
async fn test_translateDocument_withObserver_shouldRecordTraceAndGenerations() {
    let provider = MockProvider::working();
    let observer = Arc::new(MemoryObserver::new());
    let controller = common::mock_controller(&provider, common::test_config()).with_observer(observer.clone());

    let outcome = controller
        .translate_document(french_docx_job(&["Un", "Deux"]).with_evaluation("self_evaluation", None))
        .await
        .unwrap();

    let traces = observer.traces();
    assert_eq!(traces.len(), 1);
    assert!(traces[0].metadata.contains(&("file".to_string(), "lettre.docx".to_string())));

    let generations = observer.generations();
    assert_eq!(generations.len(), 3);
    assert!(generations.iter().all(|g| g.trace_id.as_deref() == Some(traces[0].id.as_str())));
    assert_eq!(generations[0].address, "paragraph 0");
    assert_eq!(outcome.usage.requests, 3);
    assert!(outcome.usage.total_tokens > 0);
}

#[tokio::test]
async fn test_batchTranslator_duplicateAddress_shouldReportCollision() {
    let provider = MockProvider::working();
    let translator = BatchTranslator::new(common::mock_service(&provider));
    let units = vec![
        TextUnit::new(UnitAddress::Paragraph { index: 3 }, "Un"),
        TextUnit::new(UnitAddress::Paragraph { index: 3 }, "Deux"),
    ];

    let result = translator.translate_units(&units, "fr", "en", None, &|_, _| {}).await;

    match result {
        Err(TranslationError::AddressCollision { address }) => assert_eq!(address, "paragraph 3"),
        other => panic!("Expected AddressCollision, got {:?}", other.map(|t| t.len())),
    }
}

#[tokio::test]
async fn test_batchTranslator_concurrent_shouldKeepEveryUnitAtItsAddress() {
    let provider = MockProvider::slow(20);
    let translator = BatchTranslator::new(common::mock_service(&provider)).with_concurrency(4);
    let units: Vec<TextUnit> = (0..12)
        .map(|index| TextUnit::new(UnitAddress::Paragraph { index }, format!("Phrase {}", index)))
        .collect();
    let reported = AtomicUsize::new(0);

    let translated = translator
        .translate_units(&units, "fr", "en", None, &|completed, total| {
            assert!(completed <= total);
            reported.fetch_max(completed, Ordering::SeqCst);
        })
        .await
        .unwrap();

    assert_eq!(translated.len(), 12);
    for unit in &units {
        assert_eq!(translated.get(&unit.address), Some(unit.content.as_str()));
    }
    assert_eq!(reported.load(Ordering::SeqCst), 12);
    assert_eq!(provider.call_count(), 12);
}

#[tokio::test]
async fn test_translateDocument_concurrentConfig_shouldMatchSequentialOutput() {
    let paragraphs: Vec<String> = (0..10).map(|i| format!("Paragraphe {}", i)).collect();
    let refs: Vec<&str> = paragraphs.iter().map(String::as_str).collect();

    let sequential = common::mock_controller(&MockProvider::working(), common::test_config())
        .translate_document(french_docx_job(&refs))
        .await
        .unwrap();

    let mut config = common::test_config();
    let active = config.translation.provider.clone();
    config.translation.provider_config_mut(&active).concurrent_requests = 5;
    let concurrent = common::mock_controller(&MockProvider::slow(10), config)
        .translate_document(french_docx_job(&refs))
        .await
        .unwrap();

    assert_eq!(
        sequential.translated_text,
        paragraphs.iter().map(|p| format!("[TRANSLATED] {}", p)).collect::<Vec<_>>().join("\n")
    );
    // The slow mock echoes, so only the order is compared
    assert_eq!(concurrent.translated_text, refs.join("\n"));
}

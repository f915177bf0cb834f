/*!
 * Tests for translation quality evaluation
 */

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use yadtwai::errors::{EvaluationError, ProviderError, TranslationError};
use yadtwai::evaluation::{
    cosine_similarity, meteor_score, semantic_similarity, BackTranslate, EvaluationInput, EvaluationMethod,
    Evaluator, HashingEmbedder, Meteor, SynonymTable,
};
use yadtwai::providers::Embedder;

/// Back-translator returning a fixed text and counting calls
struct FixedBackTranslation {
    text: &'static str,
    calls: AtomicUsize,
}

impl FixedBackTranslation {
    fn new(text: &'static str) -> Self {
        Self {
            text,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl BackTranslate for FixedBackTranslation {
    async fn back_translate(&self, _text: &str, _from: &str, _to: &str) -> Result<String, TranslationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.text.to_string())
    }
}

#[derive(Debug)]
struct UnreachableEmbedder;

#[async_trait]
impl Embedder for UnreachableEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        Err(ProviderError::ConnectionError("embedding service down".to_string()))
    }
}

fn input<'a>(translated: &'a str, reference: Option<&'a str>) -> EvaluationInput<'a> {
    EvaluationInput {
        original: "Le chat dort sur le canapé",
        translated,
        reference,
        source_language: "fr",
        target_language: "en",
    }
}

#[test]
fn test_meteor_identicalText_shouldScoreNearOne() {
    let score = meteor_score("the cat sleeps on the sofa", "the cat sleeps on the sofa").unwrap();
    assert!(score > 0.99, "score {}", score);
}

#[test]
fn test_meteor_scrambledWordOrder_shouldScoreLowerThanOrdered() {
    let ordered = meteor_score("the cat sleeps on the sofa", "the cat sleeps on the sofa").unwrap();
    let scrambled = meteor_score("the cat sleeps on the sofa", "sofa the on sleeps cat the").unwrap();
    assert!(scrambled < ordered);
    assert!(scrambled > 0.0);
}

#[test]
fn test_meteor_unrelatedText_shouldScoreZero() {
    assert_eq!(meteor_score("the cat sleeps", "bonjour tout le monde").unwrap(), 0.0);
    assert_eq!(meteor_score("the cat sleeps", "   ").unwrap(), 0.0);
}

#[test]
fn test_meteor_emptyReference_shouldBeDegenerate() {
    assert!(matches!(meteor_score("", "the cat"), Err(EvaluationError::Degenerate(_))));
}

#[test]
fn test_meteor_stemmedForms_shouldMatch() {
    let exact = meteor_score("the cats were sleeping", "the cat was sleep").unwrap();
    let unrelated = meteor_score("the cats were sleeping", "the dog was quiet").unwrap();
    assert!(exact > unrelated);
}

#[test]
fn test_meteor_withSynonymTable_shouldRaiseScore() {
    let mut synonyms = SynonymTable::new();
    synonyms.add_group(["sofa", "couch", "settee"]);
    let with_synonyms = Meteor::default().with_synonyms(synonyms);

    let plain = Meteor::default().score("the cat sleeps on the sofa", "the cat sleeps on the couch").unwrap();
    let boosted = with_synonyms.score("the cat sleeps on the sofa", "the cat sleeps on the couch").unwrap();
    assert!(boosted > plain);
}

#[test]
fn test_cosineSimilarity_shouldHandleEdgeCases() {
    assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]).unwrap() - 1.0).abs() < 1e-6);
    assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap().abs() < 1e-6);
    assert!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]).is_err());
    assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).is_err());
}

#[tokio::test]
async fn test_semanticSimilarity_withHashingEmbedder_shouldRankCloserTextHigher() {
    let embedder = HashingEmbedder::default();
    let same = semantic_similarity(&embedder, "The cat sleeps on the sofa", "the cat sleeps on the sofa")
        .await
        .unwrap();
    let close = semantic_similarity(&embedder, "The cat sleeps on the sofa", "The cat is sleeping on the sofa")
        .await
        .unwrap();
    let far = semantic_similarity(&embedder, "The cat sleeps on the sofa", "Quarterly revenue grew strongly")
        .await
        .unwrap();

    assert!((same - 1.0).abs() < 1e-5);
    assert!(close > far);
}

#[tokio::test]
async fn test_semanticSimilarity_withEmptyText_shouldBeDegenerate() {
    let result = semantic_similarity(&HashingEmbedder::default(), "", "text").await;
    assert!(matches!(result, Err(EvaluationError::Degenerate(_))));
}

#[test]
fn test_hashingEmbedder_shouldBeDeterministicAndNormalised() {
    let embedder = HashingEmbedder::new(64);
    let a = embedder.vectorize("Bonjour tout le monde");
    let b = embedder.vectorize("Bonjour tout le monde");
    assert_eq!(a, b);
    assert_eq!(a.len(), 64);
    let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-5);
}

#[test]
fn test_evaluationMethod_roundTripsNames() {
    for method in [
        EvaluationMethod::Lexical,
        EvaluationMethod::Semantic,
        EvaluationMethod::SelfEvaluation,
        EvaluationMethod::None,
    ] {
        assert_eq!(EvaluationMethod::parse(method.as_str()), method);
    }
    assert_eq!(EvaluationMethod::parse("  Self_Evaluation "), EvaluationMethod::SelfEvaluation);
    assert!(EvaluationMethod::Semantic.needs_reference());
    assert!(!EvaluationMethod::SelfEvaluation.needs_reference());
}

#[tokio::test]
async fn test_evaluate_semanticWithReference_shouldScore() {
    let back = FixedBackTranslation::new("unused");
    let result = Evaluator::default()
        .evaluate(
            EvaluationMethod::Semantic,
            input("The cat sleeps on the sofa", Some("The cat is asleep on the sofa")),
            &back,
        )
        .await;

    assert_eq!(result.method, EvaluationMethod::Semantic);
    let score = result.score.unwrap();
    assert!(score > 0.5 && score <= 1.0, "score {}", score);
    assert_eq!(back.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_evaluate_semanticWithBlankReference_shouldBeAbsent() {
    let result = Evaluator::default()
        .evaluate(
            EvaluationMethod::Semantic,
            input("The cat sleeps", Some("   ")),
            &FixedBackTranslation::new("unused"),
        )
        .await;
    assert_eq!(result.score, None);
}

#[tokio::test]
async fn test_evaluate_withFailingEmbedder_shouldBeAbsent() {
    let result = Evaluator::new(Arc::new(UnreachableEmbedder))
        .evaluate(
            EvaluationMethod::Semantic,
            input("The cat sleeps", Some("The cat sleeps")),
            &FixedBackTranslation::new("unused"),
        )
        .await;
    assert_eq!(result.score, None);
}

#[tokio::test]
async fn test_evaluate_selfEvaluation_shouldCompareBackTranslationWithOriginal() {
    let faithful = FixedBackTranslation::new("Le chat dort sur le canapé");
    let result = Evaluator::default()
        .evaluate(EvaluationMethod::SelfEvaluation, input("The cat sleeps on the sofa", None), &faithful)
        .await;

    assert_eq!(faithful.calls.load(Ordering::SeqCst), 1);
    assert!((result.score.unwrap() - 1.0).abs() < 1e-5);

    let unfaithful = FixedBackTranslation::new("Les ventes trimestrielles ont augmenté");
    let lower = Evaluator::default()
        .evaluate(EvaluationMethod::SelfEvaluation, input("The cat sleeps on the sofa", None), &unfaithful)
        .await;
    assert!(lower.score.unwrap() < 0.9);
}

#[tokio::test]
async fn test_evaluate_lexicalWithSynonymMeteor_shouldUseCustomParameters() {
    let mut synonyms = SynonymTable::new();
    synonyms.add_group(["sofa", "couch"]);
    let evaluator = Evaluator::default().with_meteor(Meteor::default().with_synonyms(synonyms));

    let result = evaluator
        .evaluate(
            EvaluationMethod::Lexical,
            input("the cat sleeps on the couch", Some("the cat sleeps on the sofa")),
            &FixedBackTranslation::new("unused"),
        )
        .await;
    assert!(result.score.unwrap() > 0.99);
}

/*!
 * Translation quality evaluation.
 *
 * One of four interchangeable strategies scores a finished translation:
 * - `Lexical`: METEOR-style score against a reference text
 * - `Semantic`: embedding similarity against a reference text
 * - `SelfEvaluation`: back-translation compared with the original
 * - `None`: no score
 *
 * Evaluation never fails a job. Strategy errors are logged and turn into an
 * absent score.
 */

pub mod lexical;
pub mod semantic;

pub use lexical::{meteor_score, Meteor, SynonymTable};
pub use semantic::{cosine_similarity, create_embedder, semantic_similarity, HashingEmbedder};

use async_trait::async_trait;
use log::{debug, warn};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::errors::{EvaluationError, TranslationError};
use crate::providers::Embedder;
use crate::translation::TranslationService;

/// Scoring strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMethod {
    /// METEOR against a reference text (`reference_text`)
    Lexical,
    /// Embedding similarity against a reference file (`reference_file`)
    Semantic,
    /// Back-translation compared with the original (`self_evaluation`)
    SelfEvaluation,
    /// No score (`no_evaluation`)
    None,
}

impl EvaluationMethod {
    /// Parse a method name; unknown names mean no evaluation
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "reference_text" => Self::Lexical,
            "reference_file" => Self::Semantic,
            "self_evaluation" => Self::SelfEvaluation,
            "no_evaluation" => Self::None,
            other => {
                debug!("Unknown evaluation method '{}', skipping evaluation", other);
                Self::None
            }
        }
    }

    /// Canonical method name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lexical => "reference_text",
            Self::Semantic => "reference_file",
            Self::SelfEvaluation => "self_evaluation",
            Self::None => "no_evaluation",
        }
    }

    pub fn needs_reference(&self) -> bool {
        matches!(self, Self::Lexical | Self::Semantic)
    }
}

impl fmt::Display for EvaluationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an evaluation; an absent score is a valid result
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvaluationResult {
    pub method: EvaluationMethod,
    pub score: Option<f32>,
}

impl EvaluationResult {
    pub fn none() -> Self {
        Self {
            method: EvaluationMethod::None,
            score: None,
        }
    }
}

/// Translation back into the source language, used by self evaluation
#[async_trait]
pub trait BackTranslate: Send + Sync {
    async fn back_translate(&self, text: &str, from: &str, to: &str) -> Result<String, TranslationError>;
}

#[async_trait]
impl BackTranslate for TranslationService {
    async fn back_translate(&self, text: &str, from: &str, to: &str) -> Result<String, TranslationError> {
        self.translate_text(text, from, to).await
    }
}

/// Texts to score
#[derive(Debug, Clone, Copy)]
pub struct EvaluationInput<'a> {
    pub original: &'a str,
    pub translated: &'a str,
    pub reference: Option<&'a str>,
    pub source_language: &'a str,
    pub target_language: &'a str,
}

/// Runs the selected strategy
#[derive(Debug, Clone)]
pub struct Evaluator {
    embedder: Arc<dyn Embedder>,
    meteor: Meteor,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(Arc::new(HashingEmbedder::default()))
    }
}

impl Evaluator {
    /// Lexical scoring starts with the built-in English synonym table
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            meteor: Meteor::default().with_synonyms(SynonymTable::english()),
        }
    }

    /// Use custom METEOR parameters (e.g. another synonym table, or none)
    pub fn with_meteor(mut self, meteor: Meteor) -> Self {
        self.meteor = meteor;
        self
    }

    /// Score a translation; never fails
    pub async fn evaluate(
        &self,
        method: EvaluationMethod,
        input: EvaluationInput<'_>,
        back_translator: &dyn BackTranslate,
    ) -> EvaluationResult {
        let score = match self.score(method, input, back_translator).await {
            Ok(score) => score,
            Err(e) => {
                warn!("Evaluation '{}' produced no score: {}", method, e);
                None
            }
        };
        if let Some(score) = score {
            debug!("Evaluation '{}' scored {:.4}", method, score);
        }
        EvaluationResult { method, score }
    }

    async fn score(
        &self,
        method: EvaluationMethod,
        input: EvaluationInput<'_>,
        back_translator: &dyn BackTranslate,
    ) -> Result<Option<f32>, EvaluationError> {
        let reference = || {
            input
                .reference
                .filter(|r| !r.trim().is_empty())
                .ok_or(EvaluationError::MissingReference)
        };

        match method {
            EvaluationMethod::None => Ok(None),
            EvaluationMethod::Lexical => self.meteor.score(reference()?, input.translated).map(Some),
            EvaluationMethod::Semantic => {
                semantic_similarity(self.embedder.as_ref(), reference()?, input.translated)
                    .await
                    .map(Some)
            }
            EvaluationMethod::SelfEvaluation => {
                let back_translated = back_translator
                    .back_translate(input.translated, input.target_language, input.source_language)
                    .await
                    .map_err(|e| EvaluationError::BackTranslation(e.to_string()))?;
                semantic_similarity(self.embedder.as_ref(), input.original, &back_translated)
                    .await
                    .map(Some)
            }
        }
    }
}

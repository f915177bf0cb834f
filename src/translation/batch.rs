/*!
 * Batch translation processing.
 *
 * Units of one document are translated on a bounded pool and merged into
 * `TranslatedUnits` by address. The first failing unit aborts the batch;
 * in-flight calls are dropped with the stream.
 */

use futures::stream::{self, StreamExt, TryStreamExt};
use log::{debug, error};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

use super::core::{TranslationRequest, TranslationService};
use super::prompts::Glossary;
use crate::document::{TextUnit, TranslatedUnits};
use crate::errors::TranslationError;

/// Batch translator for the units of one document
pub struct BatchTranslator {
    /// The translation service to use
    service: TranslationService,

    /// Maximum number of concurrent unit translations
    max_concurrent_requests: usize,
}

impl BatchTranslator {
    /// Create a new batch translator using the service's configured concurrency
    pub fn new(service: TranslationService) -> Self {
        Self {
            max_concurrent_requests: service.config.optimal_concurrent_requests(),
            service,
        }
    }

    /// Override the worker count (never below one)
    pub fn with_concurrency(mut self, max_concurrent_requests: usize) -> Self {
        self.max_concurrent_requests = max_concurrent_requests.max(1);
        self
    }

    pub fn service(&self) -> &TranslationService {
        &self.service
    }

    /// Translate every unit
    ///
    /// `progress` is called with `(completed, total)` after each unit.
    pub async fn translate_units(
        &self,
        units: &[TextUnit],
        source_language: &str,
        target_language: &str,
        glossary: Option<&Glossary>,
        progress: &(dyn Fn(usize, usize) + Send + Sync),
    ) -> Result<TranslatedUnits, TranslationError> {
        let total = units.len();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_requests));
        let processed = Arc::new(AtomicUsize::new(0));
        let started = Instant::now();

        debug!(
            "Translating {} units with {} concurrent request(s)",
            total, self.max_concurrent_requests
        );

        let results = stream::iter(units.iter())
            .map(|unit| {
                let service = self.service.clone();
                let semaphore = semaphore.clone();
                let processed = processed.clone();
                let request = TranslationRequest::for_unit(unit, source_language, target_language, glossary);

                async move {
                    let _permit = semaphore.acquire().await.ok();

                    let result = service.translate_unit(&request).await;
                    if let Err(e) = &result {
                        error!("{}", e);
                    }
                    let translated = result?;

                    let current = processed.fetch_add(1, Ordering::SeqCst) + 1;
                    progress(current, total);

                    Ok::<_, TranslationError>((unit.address.clone(), translated))
                }
            })
            .buffer_unordered(self.max_concurrent_requests)
            .try_collect::<Vec<_>>()
            .await?;

        let mut translated = TranslatedUnits::new();
        for (address, text) in results {
            translated.insert(address, text)?;
        }

        debug!("Translated {} units in {:?}", translated.len(), started.elapsed());
        Ok(translated)
    }
}

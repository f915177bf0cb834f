/*!
 * Trace and generation reporting.
 *
 * A job opens one trace; every completion call inside it is reported as a
 * generation record. Observers are best effort: a failing observer is
 * logged at warn level and never fails the translation.
 */

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::providers::TokenUsage;

/// A translation job as seen by the observer
#[derive(Debug, Clone)]
pub struct TraceRecord {
    pub id: String,
    pub name: String,
    pub metadata: Vec<(String, String)>,
    pub started_at: DateTime<Utc>,
}

impl TraceRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            metadata: Vec::new(),
            started_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }
}

/// One completion call
#[derive(Debug, Clone)]
pub struct GenerationRecord {
    pub span_id: String,
    pub trace_id: Option<String>,
    /// Call kind, e.g. `translate` or `back_translate`
    pub name: String,
    /// Structural address of the unit the call served
    pub address: String,
    pub input: String,
    pub output: String,
    pub usage: TokenUsage,
    /// Billed cost, when the provider reports one
    pub cost: Option<f64>,
    pub latency: Duration,
    pub model: String,
    pub provider: String,
    pub finished_at: DateTime<Utc>,
}

/// Receiver of traces and generation records
pub trait Observer: Send + Sync + Debug {
    fn trace(&self, trace: &TraceRecord) -> Result<()>;

    fn generation(&self, record: &GenerationRecord) -> Result<()>;
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn trace(&self, _trace: &TraceRecord) -> Result<()> {
        Ok(())
    }

    fn generation(&self, _record: &GenerationRecord) -> Result<()> {
        Ok(())
    }
}

/// Writes records to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn trace(&self, trace: &TraceRecord) -> Result<()> {
        let metadata = trace
            .metadata
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ");
        info!("Trace {} [{}] {}", trace.name, trace.id, metadata);
        Ok(())
    }

    fn generation(&self, record: &GenerationRecord) -> Result<()> {
        debug!(
            "{} {} via {}/{}: {} -> {} chars in {:?} (tokens: {:?}/{:?}, cost: {:?})",
            record.name,
            record.address,
            record.provider,
            record.model,
            record.input.chars().count(),
            record.output.chars().count(),
            record.latency,
            record.usage.prompt_tokens,
            record.usage.completion_tokens,
            record.cost
        );
        Ok(())
    }
}

/// Keeps every record in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryObserver {
    traces: Arc<Mutex<Vec<TraceRecord>>>,
    generations: Arc<Mutex<Vec<GenerationRecord>>>,
}

impl MemoryObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn traces(&self) -> Vec<TraceRecord> {
        self.traces.lock().clone()
    }

    pub fn generations(&self) -> Vec<GenerationRecord> {
        self.generations.lock().clone()
    }
}

impl Observer for MemoryObserver {
    fn trace(&self, trace: &TraceRecord) -> Result<()> {
        self.traces.lock().push(trace.clone());
        Ok(())
    }

    fn generation(&self, record: &GenerationRecord) -> Result<()> {
        self.generations.lock().push(record.clone());
        Ok(())
    }
}

/// Report a trace, logging observer failures
pub fn report_trace(observer: &dyn Observer, trace: &TraceRecord) {
    if let Err(e) = observer.trace(trace) {
        warn!("Observer failed to record trace {}: {}", trace.id, e);
    }
}

/// Report a generation, logging observer failures
pub fn report_generation(observer: &dyn Observer, record: &GenerationRecord) {
    if let Err(e) = observer.generation(record) {
        warn!("Observer failed to record generation for {}: {}", record.address, e);
    }
}

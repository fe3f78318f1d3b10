use std::sync::{Arc, Mutex, MutexGuard};

use opentelemetry_sdk::error::OTelSdkResult;
use opentelemetry_sdk::trace::{SdkTracerProvider, SpanData, SpanExporter};

use super::{SpanRecord, tracer_for};
use crate::tracer::SharedTracer;

/// Exporter that collects finished spans in memory, in the order they ended.
///
/// Clones share the same buffer, so one clone can be handed to a provider while
/// another is kept for reading.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<SpanRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracer whose spans are exported synchronously into this sink.
    pub fn tracer(&self) -> SharedTracer {
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(self.clone())
            .build();
        tracer_for(&provider)
    }

    // a panicking writer must not take the collected spans with it
    fn lock(&self) -> MutexGuard<'_, Vec<SpanRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn records(&self) -> Vec<SpanRecord> {
        self.lock().clone()
    }

    /// Drain everything collected so far.
    pub fn take(&self) -> Vec<SpanRecord> {
        std::mem::take(&mut *self.lock())
    }

    /// Last finished span with this name.
    pub fn find(&self, name: &str) -> Option<SpanRecord> {
        self.lock().iter().rev().find(|r| r.name == name).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl SpanExporter for MemorySink {
    async fn export(&self, batch: Vec<SpanData>) -> OTelSdkResult {
        self.lock().extend(batch.iter().map(SpanRecord::from));
        Ok(())
    }
}

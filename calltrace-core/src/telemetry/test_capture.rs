#![cfg(test)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{Event, Level, Subscriber};
use tracing_core::field::{Field, Visit};
use tracing_subscriber::registry;
use tracing_subscriber::{layer::Context, registry::LookupSpan, Layer};

#[derive(Debug, Clone)]
pub struct EventData {
    pub target: String,
    pub level: Level,
    pub fields: HashMap<String, String>, // Display for strings and `%` values, Debug otherwise
}

impl EventData {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

#[derive(Default, Debug)]
pub struct EventStore {
    events: Mutex<Vec<EventData>>,
}

impl EventStore {
    pub fn events(&self) -> Vec<EventData> {
        self.events.lock().unwrap().clone()
    }
}

#[derive(Clone)]
pub struct CaptureLayer {
    pub store: Arc<EventStore>,
}

struct MapVisitor<'a> {
    map: &'a mut HashMap<String, String>,
}

impl Visit for MapVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn core::fmt::Debug) {
        self.map.insert(field.name().to_string(), format!("{value:?}"));
    }
    fn record_i64(&mut self, field: &Field, value: i64) {
        self.map.insert(field.name().to_string(), value.to_string());
    }
    fn record_u64(&mut self, field: &Field, value: u64) {
        self.map.insert(field.name().to_string(), value.to_string());
    }
    fn record_bool(&mut self, field: &Field, value: bool) {
        self.map.insert(field.name().to_string(), value.to_string());
    }
    fn record_str(&mut self, field: &Field, value: &str) {
        self.map.insert(field.name().to_string(), value.to_string());
    }
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        let mut fields = HashMap::new();
        event.record(&mut MapVisitor { map: &mut fields });
        self.store.events.lock().unwrap().push(EventData {
            target: meta.target().to_string(),
            level: *meta.level(),
            fields,
        });
    }
}

/// Capture events on the current thread until the guard drops.
pub fn install_capture() -> (Arc<EventStore>, tracing::subscriber::DefaultGuard) {
    use tracing_subscriber::prelude::*;
    let store = Arc::new(EventStore::default());
    let layer = CaptureLayer { store: store.clone() };
    let subscriber = registry::Registry::default().with(layer);
    let guard = tracing::subscriber::set_default(subscriber);
    (store, guard)
}

use std::sync::{Mutex, PoisonError};

use serde_json::Value;
use tracing::info;

/// Event sink.
pub trait Analytics: Send + Sync + 'static {
    fn track(&self, event: &str, properties: &Value);
}

/// Emits every event as a `tracing` record.
pub struct TracingAnalytics;

impl Analytics for TracingAnalytics {
    fn track(&self, event: &str, properties: &Value) {
        info!(target: "analytics", event, %properties, "track");
    }
}

/// Keeps events in memory, in order.
#[derive(Default)]
pub struct MemoryAnalytics {
    events: Mutex<Vec<(String, Value)>>,
}

impl MemoryAnalytics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, Value)> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Names of recorded events.
    #[cfg(test)]
    pub fn names(&self) -> Vec<String> {
        self.events().into_iter().map(|(name, _)| name).collect()
    }
}

impl Analytics for MemoryAnalytics {
    fn track(&self, event: &str, properties: &Value) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((event.to_string(), properties.clone()));
    }
}

//! Destinations for analytics events.

use std::sync::{Arc, Mutex, PoisonError};

use super::event::LoggingEvent;

/// Receives finished events.
///
/// Sinks are shared by every in-flight request and must accept concurrent
/// calls. Implementations must not panic.
pub trait EventSink: Send + Sync {
    /// Records one event.
    fn record(&self, event: LoggingEvent);

    /// Called when a tokenization attempt ends, after its last event.
    fn session_reset(&self) {}
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn record(&self, event: LoggingEvent) {
        (**self).record(event);
    }

    fn session_reset(&self) {
        (**self).session_reset();
    }
}

#[derive(Debug, Default)]
struct MemorySinkState {
    events: Vec<LoggingEvent>,
    session_resets: usize,
}

/// Keeps events in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    state: Arc<Mutex<MemorySinkState>>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<LoggingEvent> {
        self.lock().events.clone()
    }

    /// Removes and returns recorded events.
    #[must_use]
    pub fn drain(&self) -> Vec<LoggingEvent> {
        std::mem::take(&mut self.lock().events)
    }

    /// Number of session resets seen.
    #[must_use]
    pub fn session_resets(&self) -> usize {
        self.lock().session_resets
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemorySinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: LoggingEvent) {
        self.lock().events.push(event);
    }

    fn session_reset(&self) {
        self.lock().session_resets += 1;
    }
}

/// Re-emits events through `tracing` under the `tokenization::events` target.
#[cfg(feature = "telemetry")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[cfg(feature = "telemetry")]
impl EventSink for TracingSink {
    fn record(&self, event: LoggingEvent) {
        use super::event::MonitoringLevel;

        let properties = serde_json::Value::Object(event.properties);
        let id = event.event_type.event_id();
        let correlation_id = event.correlation_id;
        match event.level {
            MonitoringLevel::Debug => {
                tracing::debug!(
                    target: "tokenization::events",
                    event = id,
                    %correlation_id,
                    %properties
                );
            }
            MonitoringLevel::Info => {
                tracing::info!(
                    target: "tokenization::events",
                    event = id,
                    %correlation_id,
                    %properties
                );
            }
            MonitoringLevel::Warn => {
                tracing::warn!(
                    target: "tokenization::events",
                    event = id,
                    %correlation_id,
                    %properties
                );
            }
            MonitoringLevel::Error => {
                tracing::error!(
                    target: "tokenization::events",
                    event = id,
                    %correlation_id,
                    %properties
                );
            }
        }
    }

    fn session_reset(&self) {
        tracing::debug!(target: "tokenization::events", "session reset");
    }
}

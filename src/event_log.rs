//! Event log for plan runs
//!
//! Audit trail of what the runner saw, in emission order.
//! - Event: envelope with id + timestamp + kind
//! - EventKind: run-level and step-level variants
//! - EventLog: thread-safe log of the latest run

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Single event in the run log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Position in the run, starting at 0
    pub id: u64,
    /// Time since the run began (ms)
    pub timestamp_ms: u64,
    pub kind: EventKind,
}

/// All event types.
///
/// Uses `Arc<str>` for step ids so cloning events stays cheap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    // ═══════════════════════════════════════════
    // RUN LEVEL
    // ═══════════════════════════════════════════
    RunStarted {
        step_count: usize,
    },
    RunCompleted {
        result_count: usize,
        total_duration_ms: u64,
    },
    RunFailed {
        error: String,
        failed_step: Option<Arc<str>>,
    },

    // ═══════════════════════════════════════════
    // STEP LEVEL
    // ═══════════════════════════════════════════
    StepStarted {
        step_id: Arc<str>,
        index: usize,
    },
    StepCompleted {
        step_id: Arc<str>,
        output: Value,
        duration_ms: u64,
    },
    StepFailed {
        step_id: Arc<str>,
        error: String,
        duration_ms: u64,
    },
    /// A contained step failed; the run carries on with a null output
    StepContained {
        step_id: Arc<str>,
        error: Option<String>,
    },
}

impl EventKind {
    /// Extract step_id if event is step-related
    pub fn step_id(&self) -> Option<&str> {
        match self {
            Self::StepStarted { step_id, .. }
            | Self::StepCompleted { step_id, .. }
            | Self::StepFailed { step_id, .. }
            | Self::StepContained { step_id, .. } => Some(step_id),
            Self::RunStarted { .. } | Self::RunCompleted { .. } | Self::RunFailed { .. } => None,
        }
    }
}

/// Thread-safe event log, scoped to the latest run.
///
/// [`EventLog::begin_run`] drops the previous run's events and restarts
/// ids and timestamps at zero.
#[derive(Clone)]
pub struct EventLog {
    state: Arc<RwLock<RunLog>>,
}

struct RunLog {
    events: Vec<Event>,
    started: Instant,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(RunLog {
                events: Vec::new(),
                started: Instant::now(),
            })),
        }
    }

    /// Start a fresh run: earlier events are discarded
    pub fn begin_run(&self) {
        let mut state = self.state.write();
        state.events.clear();
        state.started = Instant::now();
    }

    /// Emit an event (returns event ID)
    pub fn emit(&self, kind: EventKind) -> u64 {
        let mut state = self.state.write();
        let id = state.events.len() as u64;
        let timestamp_ms = state.started.elapsed().as_millis() as u64;
        state.events.push(Event {
            id,
            timestamp_ms,
            kind,
        });
        id
    }

    /// Events of the current run, in emission order
    pub fn events(&self) -> Vec<Event> {
        self.state.read().events.clone()
    }

    /// Serialize to JSON for the CLI's `--events` dump
    pub fn to_json(&self) -> Value {
        serde_json::to_value(&self.state.read().events).unwrap_or(Value::Null)
    }

    pub fn len(&self) -> usize {
        self.state.read().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_are_monotonic() {
        let log = EventLog::new();
        let first = log.emit(EventKind::RunStarted { step_count: 2 });
        let second = log.emit(EventKind::StepStarted {
            step_id: "a".into(),
            index: 0,
        });
        assert_eq!(first, 0);
        assert_eq!(second, 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn step_id_selects_step_events() {
        let log = EventLog::new();
        log.emit(EventKind::RunStarted { step_count: 2 });
        log.emit(EventKind::StepStarted {
            step_id: "a".into(),
            index: 0,
        });
        log.emit(EventKind::StepCompleted {
            step_id: "a".into(),
            output: json!("ok"),
            duration_ms: 1,
        });
        log.emit(EventKind::StepStarted {
            step_id: "b".into(),
            index: 1,
        });
        log.emit(EventKind::RunFailed {
            error: "boom".into(),
            failed_step: Some("b".into()),
        });

        let for_step = |id: &str| {
            log.events()
                .into_iter()
                .filter(|e| e.kind.step_id() == Some(id))
                .count()
        };
        assert_eq!(for_step("a"), 2);
        assert_eq!(for_step("b"), 1);
        assert_eq!(log.len(), 5);
    }

    #[test]
    fn begin_run_discards_previous_events() {
        let log = EventLog::new();
        log.emit(EventKind::RunStarted { step_count: 1 });
        log.emit(EventKind::RunCompleted {
            result_count: 1,
            total_duration_ms: 0,
        });

        log.begin_run();
        assert!(log.is_empty());
        assert_eq!(log.emit(EventKind::RunStarted { step_count: 3 }), 0);
        assert_eq!(
            log.events()[0].kind,
            EventKind::RunStarted { step_count: 3 }
        );
    }

    #[test]
    fn serializes_with_snake_case_tag() {
        let log = EventLog::new();
        log.emit(EventKind::StepContained {
            step_id: "check".into(),
            error: Some("nope".into()),
        });

        let json = log.to_json();
        assert_eq!(json[0]["kind"]["type"], "step_contained");
        assert_eq!(json[0]["kind"]["step_id"], "check");
    }

    #[test]
    fn clones_share_storage() {
        let log = EventLog::new();
        let other = log.clone();
        other.emit(EventKind::RunStarted { step_count: 0 });
        assert!(!log.is_empty());
    }
}

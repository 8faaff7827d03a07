use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogEvent {
    pub ts: DateTime<Utc>,
    pub level: LogLevel,
    pub request_id: Option<String>,
    pub candidate: Option<String>,
    pub message: String,
    pub fields: HashMap<String, String>,
}

impl LogEvent {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            ts: Utc::now(),
            level,
            request_id: None,
            candidate: None,
            message: message.into(),
            fields: HashMap::new(),
        }
    }

    pub fn with_request(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_candidate(mut self, candidate: impl Into<String>) -> Self {
        self.candidate = Some(candidate.into());
        self
    }

    pub fn with_field(mut self, k: impl Into<String>, v: impl Into<String>) -> Self {
        self.fields.insert(k.into(), v.into());
        self
    }
}

pub trait EventLogger: Send + Sync {
    fn log(&self, event: LogEvent);
}

pub type SharedEventLogger = Arc<dyn EventLogger>;

#[derive(Default)]
pub struct NoopEventLogger;

impl EventLogger for NoopEventLogger {
    fn log(&self, _event: LogEvent) {}
}

/// Forwards events to the `tracing` macros at the matching level.
#[derive(Default)]
pub struct TracingEventLogger;

impl EventLogger for TracingEventLogger {
    fn log(&self, event: LogEvent) {
        let request_id = event.request_id.as_deref().unwrap_or("-");
        let candidate = event.candidate.as_deref().unwrap_or("-");
        let fields = format_fields(&event.fields);
        match event.level {
            LogLevel::Trace => tracing::trace!(request_id, candidate, fields = %fields, "{}", event.message),
            LogLevel::Debug => tracing::debug!(request_id, candidate, fields = %fields, "{}", event.message),
            LogLevel::Info => tracing::info!(request_id, candidate, fields = %fields, "{}", event.message),
            LogLevel::Warn => tracing::warn!(request_id, candidate, fields = %fields, "{}", event.message),
            LogLevel::Error => tracing::error!(request_id, candidate, fields = %fields, "{}", event.message),
        }
    }
}

fn format_fields(fields: &HashMap<String, String>) -> String {
    let mut pairs: Vec<_> = fields.iter().collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Keeps the most recent events in memory, each tagged with a sequence number.
pub struct BufferedEventLogger {
    seq: AtomicU64,
    max_events: usize,
    events: Mutex<VecDeque<(u64, LogEvent)>>,
}

impl BufferedEventLogger {
    pub fn new(max_events: usize) -> Self {
        Self {
            seq: AtomicU64::new(0),
            max_events: max_events.max(1),
            events: Mutex::new(VecDeque::new()),
        }
    }

    /// Events newer than `last_seq`, plus the highest sequence number returned.
    pub fn events_since(&self, last_seq: u64) -> (u64, Vec<LogEvent>) {
        let Ok(events) = self.events.lock() else {
            return (last_seq, Vec::new());
        };
        let mut out = Vec::new();
        let mut new_last = last_seq;
        for (seq, ev) in events.iter() {
            if *seq > last_seq {
                out.push(ev.clone());
                new_last = new_last.max(*seq);
            }
        }
        (new_last, out)
    }

    pub fn messages(&self) -> Vec<String> {
        self.events_since(0)
            .1
            .into_iter()
            .map(|ev| ev.message)
            .collect()
    }
}

impl EventLogger for BufferedEventLogger {
    fn log(&self, event: LogEvent) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let Ok(mut events) = self.events.lock() else {
            return;
        };
        events.push_back((seq, event));
        while events.len() > self.max_events {
            events.pop_front();
        }
    }
}

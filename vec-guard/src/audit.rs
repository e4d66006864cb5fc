//! Audit system for security decisions
//!
//! Every scan, permission and budget decision is reported as an
//! [`AuditEvent`]. Where events end up is decided by the [`AuditSink`]
//! implementation the host wires in.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

/// Replacement written over credential-like detail fields
pub const REDACTED: &str = "[REDACTED]";

/// Events kept by [`MemoryAuditSink::new`]
const DEFAULT_MEMORY_EVENTS: usize = 1000;

/// Detail keys whose values never reach a sink
const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "apiKey",
    "api_key",
    "token",
    "access_token",
    "refresh_token",
    "authorization",
    "cookie",
    "secret",
];

/// Subsystem that produced an audit event
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    Permission,
    Egress,
    Validation,
    Budget,
}

/// Audit event representing a security decision
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: AuditEventType,
    /// What was decided (e.g. `"fs.read"`, `"scan"`, `"alert"`)
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
}

impl AuditEvent {
    /// Create a new audit event stamped now
    pub fn new(event_type: AuditEventType, action: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            action: action.into(),
            target: None,
            approved: None,
            details: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_approved(mut self, approved: bool) -> Self {
        self.approved = Some(approved);
        self
    }

    /// Add one detail field
    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), value.into());
        self
    }

    /// Look up a detail field
    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.as_ref().and_then(|d| d.get(key))
    }

    /// Copy of the event with credential-like detail fields masked
    pub fn redacted(mut self) -> Self {
        if let Some(details) = self.details.as_mut() {
            redact_map(details);
        }
        self
    }
}

fn redact_map(map: &mut Map<String, Value>) {
    for (key, value) in map.iter_mut() {
        if SENSITIVE_KEYS.contains(&key.as_str()) {
            *value = Value::String(REDACTED.to_string());
        } else {
            redact_value(value);
        }
    }
}

fn redact_value(value: &mut Value) {
    match value {
        Value::Object(map) => redact_map(map),
        Value::Array(items) => items.iter_mut().for_each(redact_value),
        _ => {}
    }
}

/// Error type for audit operations
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Failed to write audit log: {0}")]
    WriteError(#[from] std::io::Error),

    #[error("Failed to serialize audit event: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Trait for audit event sinks
///
/// # Example
///
/// ```rust
/// use vec_guard::audit::{AuditError, AuditEvent, AuditSink};
///
/// struct StderrSink;
///
/// impl AuditSink for StderrSink {
///     fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
///         eprintln!("{}", serde_json::to_string(&event)?);
///         Ok(())
///     }
///
///     fn flush(&self) -> Result<(), AuditError> {
///         Ok(())
///     }
/// }
/// ```
pub trait AuditSink: Send + Sync {
    /// Record an audit event
    fn record(&self, event: AuditEvent) -> Result<(), AuditError>;

    /// Flush any buffered events
    fn flush(&self) -> Result<(), AuditError>;
}

/// Redact and deliver an event; sink failures are logged, never raised
pub(crate) fn emit(sink: &dyn AuditSink, event: AuditEvent) {
    let event_type = event.event_type;
    if let Err(e) = sink.record(event.redacted()) {
        tracing::error!(error = %e, ?event_type, "Failed to record audit event");
    }
}

// ============================================================================
// Sink implementations
// ============================================================================

/// Sink that writes events into the tracing stream
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        let details = match &event.details {
            Some(details) => serde_json::to_string(details)?,
            None => String::new(),
        };
        tracing::warn!(
            audit = true,
            timestamp = %event.timestamp.to_rfc3339(),
            event_type = ?event.event_type,
            action = %event.action,
            audit_target = event.target.as_deref().unwrap_or(""),
            approved = ?event.approved,
            details = %details,
            "Audit: {:?} - {}",
            event.event_type,
            event.action
        );
        Ok(())
    }

    fn flush(&self) -> Result<(), AuditError> {
        Ok(())
    }
}

/// Append-only JSON Lines audit log
///
/// Events are redacted again on the way in, so the file is safe even when
/// the sink is driven directly rather than through the engine. Each record
/// is written as one complete line and reaches the file when its newline
/// does.
pub struct FileAuditSink {
    path: PathBuf,
    file: Mutex<LineWriter<File>>,
}

impl FileAuditSink {
    /// Open (or create) the log file in append mode
    pub fn new(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        tracing::debug!(path = %path.display(), "Audit log opened");

        Ok(Self {
            path,
            file: Mutex::new(LineWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        let mut line = serde_json::to_vec(&event.redacted())?;
        line.push(b'\n');
        self.file
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .write_all(&line)?;
        Ok(())
    }

    fn flush(&self) -> Result<(), AuditError> {
        self.file.lock().unwrap_or_else(|e| e.into_inner()).flush()?;
        Ok(())
    }
}

impl fmt::Debug for FileAuditSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileAuditSink").field("path", &self.path).finish()
    }
}

/// Bounded in-memory audit trail, oldest events dropped first
///
/// Used by tests and by hosts that show recent decisions in a UI.
pub struct MemoryAuditSink {
    events: Mutex<VecDeque<AuditEvent>>,
    max_events: usize,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MEMORY_EVENTS)
    }

    pub fn with_capacity(max_events: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(max_events.min(DEFAULT_MEMORY_EVENTS))),
            max_events,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<AuditEvent>> {
        self.events.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Retained events, oldest first
    pub fn events(&self) -> Vec<AuditEvent> {
        self.lock().iter().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn find_by_type(&self, event_type: AuditEventType) -> Vec<AuditEvent> {
        self.lock()
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }
}

impl Default for MemoryAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        if self.max_events == 0 {
            return Ok(());
        }
        let mut events = self.lock();
        while events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event.redacted());
        Ok(())
    }

    fn flush(&self) -> Result<(), AuditError> {
        Ok(())
    }
}

impl fmt::Debug for MemoryAuditSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryAuditSink")
            .field("count", &self.count())
            .field("max_events", &self.max_events)
            .finish()
    }
}

/// Null audit sink (discards all events)
#[derive(Debug, Default)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _event: AuditEvent) -> Result<(), AuditError> {
        Ok(())
    }

    fn flush(&self) -> Result<(), AuditError> {
        Ok(())
    }
}

/// Audit sink that forwards to several sinks
pub struct CompositeAuditSink {
    sinks: Vec<Box<dyn AuditSink>>,
}

impl CompositeAuditSink {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn with_sink(mut self, sink: impl AuditSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl Default for CompositeAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for CompositeAuditSink {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        for sink in &self.sinks {
            sink.record(event.clone())?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), AuditError> {
        for sink in &self.sinks {
            sink.flush()?;
        }
        Ok(())
    }
}

impl fmt::Debug for CompositeAuditSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeAuditSink")
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}

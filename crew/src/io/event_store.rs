//! Durable copies of run events.
//!
//! [`EventSink`] is the engine-facing write side; [`EventHistory`] is the read
//! model consumers use to replay a run. Both stores implement both traits and
//! accept concurrent appends from different runs.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::core::types::Event;

/// Persisted shape of one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub conversation_id: String,
    pub timestamp: DateTime<Utc>,
    pub agent_name: String,
    pub message_type: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl EventRecord {
    pub fn from_event(run_id: &str, event: &Event) -> Self {
        Self {
            conversation_id: run_id.to_string(),
            timestamp: event.timestamp,
            agent_name: event.role.as_str().to_string(),
            message_type: event.kind.as_str().to_string(),
            content: event.content.clone(),
            metadata: event.metadata.clone(),
        }
    }
}

/// Append-only event destination. One call per event, in emission order.
pub trait EventSink: Send + Sync {
    fn append(&self, run_id: &str, event: &Event) -> Result<()>;
}

/// Read model over stored events.
pub trait EventHistory: Send + Sync {
    /// Records for `run_id` in append order, whatever their timestamps say.
    /// Unknown runs yield an empty list.
    fn history(&self, run_id: &str) -> Result<Vec<EventRecord>>;
}

/// Accept only ids that are safe to use as file names.
pub fn validate_run_id(run_id: &str) -> Result<()> {
    if run_id.is_empty() {
        return Err(anyhow!("run id must be non-empty"));
    }
    if !run_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(anyhow!(
            "invalid run id '{run_id}' (allowed: ASCII letters, digits, '-', '_', '.')"
        ));
    }
    if run_id.starts_with('.') {
        return Err(anyhow!("invalid run id '{run_id}' (must not start with '.')"));
    }
    Ok(())
}

/// Process-local store, mainly for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    runs: Mutex<HashMap<String, Vec<EventRecord>>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run_ids(&self) -> Result<Vec<String>> {
        let runs = self
            .runs
            .lock()
            .map_err(|_| anyhow!("event store lock poisoned"))?;
        let mut ids: Vec<String> = runs.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

impl EventSink for MemoryEventStore {
    fn append(&self, run_id: &str, event: &Event) -> Result<()> {
        let mut runs = self
            .runs
            .lock()
            .map_err(|_| anyhow!("event store lock poisoned"))?;
        runs.entry(run_id.to_string())
            .or_default()
            .push(EventRecord::from_event(run_id, event));
        Ok(())
    }
}

impl EventHistory for MemoryEventStore {
    fn history(&self, run_id: &str) -> Result<Vec<EventRecord>> {
        let runs = self
            .runs
            .lock()
            .map_err(|_| anyhow!("event store lock poisoned"))?;
        Ok(runs.get(run_id).cloned().unwrap_or_default())
    }
}

/// One JSON record per line in `<dir>/<run_id>.jsonl`.
#[derive(Debug)]
pub struct JsonlEventStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlEventStore {
    /// Create the store directory if needed.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("create events dir {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    pub fn run_path(&self, run_id: &str) -> Result<PathBuf> {
        validate_run_id(run_id)?;
        Ok(self.dir.join(format!("{run_id}.jsonl")))
    }
}

impl EventSink for JsonlEventStore {
    #[instrument(skip_all, fields(run_id = %run_id, kind = event.kind.as_str()))]
    fn append(&self, run_id: &str, event: &Event) -> Result<()> {
        let path = self.run_path(run_id)?;
        let mut line = serde_json::to_string(&EventRecord::from_event(run_id, event))
            .context("serialize event record")?;
        line.push('\n');

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow!("event store lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open {}", path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("append {}", path.display()))?;
        debug!(path = %path.display(), "event appended");
        Ok(())
    }
}

impl EventHistory for JsonlEventStore {
    fn history(&self, run_id: &str) -> Result<Vec<EventRecord>> {
        let path = self.run_path(run_id)?;
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents =
            fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        let mut records = Vec::new();
        for (idx, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: EventRecord = serde_json::from_str(line)
                .with_context(|| format!("parse {} line {}", path.display(), idx + 1))?;
            records.push(record);
        }
        Ok(records)
    }
}

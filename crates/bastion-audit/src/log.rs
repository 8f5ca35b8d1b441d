// log.rs — Append-only JSONL audit logs for one run.
//
// A run keeps two streams under its `logs/` directory:
//
//   tool_calls.jsonl    — rule evaluations and tool invocations
//   agent_events.jsonl  — lifecycle events (blocks, denials, agent status)
//
// Each line is a single JSON object: the redacted event merged with a UTC
// `timestamp`, with top-level keys written in sorted order. Files are reopened in append mode for every record; a
// logger holds no open handles and is cheap to clone.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::AuditError;
use crate::redaction::redact_value;

/// File name of the tool-call stream.
pub const TOOL_CALLS_FILE: &str = "tool_calls.jsonl";
/// File name of the lifecycle event stream.
pub const AGENT_EVENTS_FILE: &str = "agent_events.jsonl";

/// Which of the two run logs a record goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStream {
    ToolCalls,
    AgentEvents,
}

impl AuditStream {
    pub fn file_name(&self) -> &'static str {
        match self {
            AuditStream::ToolCalls => TOOL_CALLS_FILE,
            AuditStream::AgentEvents => AGENT_EVENTS_FILE,
        }
    }
}

/// Writer for a run's audit streams.
#[derive(Debug, Clone)]
pub struct AuditLogger {
    logs_dir: PathBuf,
}

impl AuditLogger {
    /// Create the logs directory if needed and return a logger rooted there.
    pub fn open(logs_dir: impl AsRef<Path>) -> Result<Self, AuditError> {
        let logs_dir = logs_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&logs_dir).map_err(|source| AuditError::OpenFailed {
            path: logs_dir.clone(),
            source,
        })?;
        Ok(Self { logs_dir })
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    /// Full path of one stream.
    pub fn stream_path(&self, stream: AuditStream) -> PathBuf {
        self.logs_dir.join(stream.file_name())
    }

    /// Append a record to `tool_calls.jsonl`.
    pub fn log_tool_call<T: Serialize>(&self, event: &T) -> Result<(), AuditError> {
        self.append(AuditStream::ToolCalls, event)
    }

    /// Append a record to `agent_events.jsonl`.
    pub fn log_agent_event<T: Serialize>(&self, event: &T) -> Result<(), AuditError> {
        self.append(AuditStream::AgentEvents, event)
    }

    /// Redact, timestamp and append one record.
    ///
    /// Object events are flattened into the record; any other JSON value is
    /// stored under an `event` key.
    pub fn append<T: Serialize>(&self, stream: AuditStream, event: &T) -> Result<(), AuditError> {
        let line = serde_json::to_string(&build_record(event)?)?;
        let path = self.stream_path(stream);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| AuditError::OpenFailed {
                path: path.clone(),
                source,
            })?;
        writeln!(file, "{}", line)?;
        file.flush()?;
        Ok(())
    }

    /// Read every record from one of this logger's streams.
    ///
    /// A stream that has never been written is empty, not an error.
    pub fn read_stream(&self, stream: AuditStream) -> Result<Vec<Value>, AuditError> {
        let path = self.stream_path(stream);
        if !path.exists() {
            return Ok(Vec::new());
        }
        read_all(&path)
    }
}

fn build_record<T: Serialize>(event: &T) -> Result<BTreeMap<String, Value>, AuditError> {
    let mut record = BTreeMap::new();
    record.insert(
        "timestamp".to_string(),
        Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
    );
    match redact_value(&serde_json::to_value(event)?) {
        Value::Object(fields) => record.extend(fields),
        other => {
            record.insert("event".to_string(), other);
        }
    }
    Ok(record)
}

/// Read all records from a JSONL audit file, oldest first. Blank lines are
/// skipped.
pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<Value>, AuditError> {
    let file = File::open(path.as_ref()).map_err(|source| AuditError::OpenFailed {
        path: path.as_ref().to_path_buf(),
        source,
    })?;
    let mut records = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}

/// The last `n` records of a JSONL audit file.
pub fn tail(path: impl AsRef<Path>, n: usize) -> Result<Vec<Value>, AuditError> {
    let mut records = read_all(path)?;
    let skip = records.len().saturating_sub(n);
    Ok(records.split_off(skip))
}

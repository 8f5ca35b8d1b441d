// signals.rs — External control of a running assessment.
//
// Signals are fire-and-forget and idempotent. Within one process they are
// delivered through a RunHandle. Across processes, `bastion signal` appends
// them to `artifacts/control.jsonl` and the process hosting the run tails
// that inbox and forwards what it finds.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bastion_artifacts::ManifestState;

use crate::error::WorkflowError;

/// File name of the cross-process signal inbox inside `artifacts/`.
pub const CONTROL_INBOX_FILE: &str = "control.jsonl";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ControlSignal {
    Pause,
    Resume,
    Cancel,
    UpdateConfig,
}

impl ControlSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlSignal::Pause => "pause",
            ControlSignal::Resume => "resume",
            ControlSignal::Cancel => "cancel",
            ControlSignal::UpdateConfig => "update_config",
        }
    }

    /// Apply this signal to the manifest flags.
    ///
    /// - `pause` is ignored once the run is canceled
    /// - `resume` clears pause only; a config wait needs `update_config`
    /// - `cancel` is terminal
    /// - `update_config` clears the config wait and resumes
    pub fn apply(&self, manifest: &mut ManifestState) {
        match self {
            ControlSignal::Pause => {
                if !manifest.canceled {
                    manifest.mark_paused(true);
                }
            }
            ControlSignal::Resume => manifest.mark_paused(false),
            ControlSignal::UpdateConfig => {
                manifest.mark_paused(false);
                manifest.clear_waiting();
            }
            ControlSignal::Cancel => manifest.mark_canceled(),
        }
    }
}

impl fmt::Display for ControlSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlSignal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "pause" => Ok(ControlSignal::Pause),
            "resume" => Ok(ControlSignal::Resume),
            "cancel" => Ok(ControlSignal::Cancel),
            "update_config" => Ok(ControlSignal::UpdateConfig),
            other => Err(format!(
                "unknown signal '{}' (expected pause, resume, cancel, update_config)",
                other
            )),
        }
    }
}

/// One line of the control inbox.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ControlMessage {
    pub signal: ControlSignal,
    pub sent_at: DateTime<Utc>,
}

/// Append-only signal inbox for one run.
#[derive(Debug, Clone)]
pub struct ControlInbox {
    path: PathBuf,
}

impl ControlInbox {
    /// Inbox stored in a run's `artifacts/` directory.
    pub fn new(artifacts_dir: impl AsRef<Path>) -> Self {
        Self {
            path: artifacts_dir.as_ref().join(CONTROL_INBOX_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn send(&self, signal: ControlSignal) -> Result<(), WorkflowError> {
        let message = ControlMessage {
            signal,
            sent_at: Utc::now(),
        };
        let line = serde_json::to_string(&message)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.io_error(source))?;
        writeln!(file, "{}", line).map_err(|source| self.io_error(source))?;
        Ok(())
    }

    /// Messages written at or after byte `offset`, plus the offset to resume
    /// from. A trailing partial line is left for the next read; malformed
    /// lines are skipped.
    pub fn read_from(&self, offset: u64) -> Result<(Vec<ControlMessage>, u64), WorkflowError> {
        if !self.path.exists() {
            return Ok((Vec::new(), offset));
        }
        let mut file = fs::File::open(&self.path).map_err(|source| self.io_error(source))?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|source| self.io_error(source))?;
        let mut buf = String::new();
        file.read_to_string(&mut buf)
            .map_err(|source| self.io_error(source))?;

        let complete = buf.rfind('\n').map_or(0, |i| i + 1);
        let messages = buf[..complete]
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(message) => Some(message),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed control message");
                    None
                }
            })
            .collect();
        Ok((messages, offset + complete as u64))
    }

    fn io_error(&self, source: std::io::Error) -> WorkflowError {
        WorkflowError::Inbox {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bastion_artifacts::create_manifest;
    use tempfile::tempdir;

    fn manifest() -> ManifestState {
        create_manifest("acme", "r1", "https://staging.acme.test", "repos/acme")
    }

    #[test]
    fn signals_parse_from_cli_names() {
        assert_eq!("pause".parse::<ControlSignal>().unwrap(), ControlSignal::Pause);
        assert_eq!(
            "update-config".parse::<ControlSignal>().unwrap(),
            ControlSignal::UpdateConfig
        );
        assert!("stop".parse::<ControlSignal>().is_err());
    }

    #[test]
    fn pause_is_ignored_after_cancel() {
        let mut m = manifest();
        ControlSignal::Cancel.apply(&mut m);
        ControlSignal::Pause.apply(&mut m);
        assert!(m.canceled);
        assert!(!m.paused);
    }

    #[test]
    fn signals_are_idempotent() {
        let mut once = manifest();
        ControlSignal::Pause.apply(&mut once);
        let mut twice = once.clone();
        ControlSignal::Pause.apply(&mut twice);
        assert_eq!(once, twice);
    }

    #[test]
    fn update_config_clears_wait_and_pause() {
        let mut m = manifest();
        m.mark_waiting("quota");
        m.mark_paused(true);
        ControlSignal::UpdateConfig.apply(&mut m);
        assert!(!m.waiting_for_config);
        assert!(!m.paused);
    }

    #[test]
    fn resume_leaves_config_wait_in_place() {
        let mut m = manifest();
        m.mark_waiting("quota");
        m.mark_paused(true);
        ControlSignal::Resume.apply(&mut m);
        assert!(!m.paused);
        assert!(m.waiting_for_config);
        assert_eq!(m.waiting_reason.as_deref(), Some("quota"));
    }

    #[test]
    fn inbox_reads_incrementally() {
        let dir = tempdir().unwrap();
        let inbox = ControlInbox::new(dir.path());
        let (empty, offset) = inbox.read_from(0).unwrap();
        assert!(empty.is_empty());
        assert_eq!(offset, 0);

        inbox.send(ControlSignal::Pause).unwrap();
        inbox.send(ControlSignal::Resume).unwrap();
        let (first, offset) = inbox.read_from(0).unwrap();
        let signals: Vec<ControlSignal> = first.iter().map(|m| m.signal).collect();
        assert_eq!(signals, vec![ControlSignal::Pause, ControlSignal::Resume]);

        inbox.send(ControlSignal::Cancel).unwrap();
        let (second, _) = inbox.read_from(offset).unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].signal, ControlSignal::Cancel);
    }

    #[test]
    fn partial_lines_wait_for_completion() {
        let dir = tempdir().unwrap();
        let inbox = ControlInbox::new(dir.path());
        fs::write(inbox.path(), "{\"signal\":\"pause\",\"sent_at\":\"2024-01-01T00:00:00Z\"}\n{\"sig").unwrap();
        let (messages, offset) = inbox.read_from(0).unwrap();
        assert_eq!(messages.len(), 1);
        let (rest, same) = inbox.read_from(offset).unwrap();
        assert!(rest.is_empty());
        assert_eq!(same, offset);
    }
}

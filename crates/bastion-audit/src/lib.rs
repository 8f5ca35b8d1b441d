//! # bastion-audit
//!
//! Streaming artifact hashing, secret redaction, and append-only JSONL audit
//! logs for Bastion.
//!
//! Every rule evaluation, tool call and blocked action in a run is recorded
//! as one JSON line under the run's `logs/` directory. Records are redacted
//! before they are written: nothing that looks like an API key, token,
//! secret or password reaches disk.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use bastion_audit::AuditLogger;
//! use serde_json::json;
//!
//! let logger = AuditLogger::open("/tmp/run/logs").unwrap();
//! logger
//!     .log_tool_call(&json!({"event_type": "rules_evaluated", "phase": "recon"}))
//!     .unwrap();
//! ```

pub mod error;
pub mod hasher;
pub mod log;
pub mod redaction;

pub use error::AuditError;
pub use hasher::{hash_bytes, hash_file, hash_str, HASH_CHUNK_SIZE};
pub use log::{read_all, tail, AuditLogger, AuditStream, AGENT_EVENTS_FILE, TOOL_CALLS_FILE};
pub use redaction::{is_secret_key, redact_text, redact_value, REDACTED};

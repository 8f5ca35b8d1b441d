//! # bastion-guardrail
//!
//! The authorization boundary between an assessment agent and its tools.
//!
//! Phase-level rule evaluation decides which analyzers run; this crate
//! re-evaluates the same rules for every individual tool call, so an agent
//! that wanders onto an avoided host, path, or method is stopped before the
//! call executes. Denials leave evidence in the phase directory and a record
//! in the run's audit log.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use bastion_guardrail::{Guardrail, GuardrailContext, GuardrailVerdict, ToolCall};
//! use bastion_policy::Phase;
//! use serde_json::json;
//!
//! let ctx = GuardrailContext::new(Phase::Recon, "https://staging.example.com", "repos/app", "acme", "run-1");
//! let guardrail = Guardrail::from_config(ctx).unwrap();
//! let call = ToolCall::new("call-1", "http_request", json!({"path": "/admin"}));
//! if let GuardrailVerdict::Blocked { message } = guardrail.check(&call).unwrap() {
//!     eprintln!("{}", message);
//! }
//! ```

pub mod boundary;
pub mod context;
pub mod error;
pub mod guardrail;

pub use boundary::{check_filesystem_boundary, NormalizedToolBoundary, ToolCall};
pub use context::GuardrailContext;
pub use error::GuardrailError;
pub use guardrail::{Guardrail, GuardrailVerdict, BLOCKED_EVENT_TYPE};

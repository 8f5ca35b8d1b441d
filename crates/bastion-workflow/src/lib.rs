//! # bastion-workflow
//!
//! Runs an assessment through its fixed phase sequence:
//! intake → prerecon → netdisc → recon → vuln → report.
//!
//! [`RunOrchestrator`] owns the run's manifest and drives each phase through
//! a [`PhaseExecutor`]. Transient failures are retried with backoff, missing
//! provider configuration suspends the run until an operator updates it, and
//! anything else stops the run with `last_error` recorded. Operators steer a
//! run with [`ControlSignal`]s, either through a [`RunHandle`] in the same
//! process or through the run's [`ControlInbox`] file from another one.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bastion_workflow::{RunOptions, RunOrchestrator, SafePhaseExecutor};
//!
//! # async fn example() -> Result<(), bastion_workflow::WorkflowError> {
//! let options = RunOptions::new("runs", "acme", "run-1", "https://staging.example.com", "repos/app");
//! let orchestrator = RunOrchestrator::new(options, Arc::new(SafePhaseExecutor::default()))?;
//! let status = orchestrator.run().await?;
//! println!("completed: {:?}", status.completed_phases);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod retry;
pub mod signals;

pub use error::{classify_message, FailureKind, PhaseError, WorkflowError};
pub use executor::{
    AgentInvocation, AgentReport, NoopAgent, PhaseAgent, PhaseExecutor, PhaseOutcome, PhaseRequest,
    PhaseStatus, SafePhaseExecutor,
};
pub use orchestrator::{RunHandle, RunOptions, RunOrchestrator, RunState};
pub use retry::RetryPolicy;
pub use signals::{ControlInbox, ControlMessage, ControlSignal, CONTROL_INBOX_FILE};

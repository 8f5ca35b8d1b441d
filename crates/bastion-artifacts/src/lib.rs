//! # bastion-artifacts
//!
//! The on-disk side of an assessment run: directory layout, the manifest
//! checkpoint, phase outputs, and a content-addressed artifact index.
//!
//! ## Key invariants
//!
//! - **Idempotent phases**: [`ArtifactStore::should_skip_phase`] is true only
//!   when `<phase>/output.json` exists and parses into a [`PhaseOutput`] for
//!   that same phase. Anything else means the phase runs again.
//! - **Deterministic index**: `artifacts/index.json` is sorted and unique by
//!   run-relative path; the same files always produce the same bytes.
//! - **Atomic checkpoints**: the index and manifest are replaced with a
//!   temp-file rename, never rewritten in place.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use bastion_artifacts::{ArtifactStore, PhaseOutput};
//! use bastion_policy::Phase;
//!
//! let store = ArtifactStore::open("runs", "acme", "run-1").unwrap();
//! let paths = store
//!     .write_phase_artifacts(&PhaseOutput::new(Phase::Intake, "Scope captured"))
//!     .unwrap();
//! store.append_index(&paths.to_vec()).unwrap();
//! assert!(store.should_skip_phase(Phase::Intake, false));
//! ```

pub mod error;
pub mod manifest;
pub mod models;
pub mod schema;
pub mod store;

pub use error::ArtifactError;
pub use manifest::create_manifest;
pub use models::{ArtifactEntry, ArtifactIndex, EvidenceRef, ManifestState, PhaseOutput, RunStatus};
pub use schema::{
    export_schemas, load_phase_output, validate_index, validate_manifest, validate_phase_output,
};
pub use store::{latest_run_id, new_run_id, ArtifactStore, PhaseArtifactPaths};

//! Local source packaging and template rendering for keel.
//!
//! Nothing in this crate touches the network.
//!
//! # Build pipeline (local half)
//!
//! ```text
//! keel build
//!   1. Ignore rules ── .dockerignore → IgnoreRules
//!   2a. Incremental ── create_index() → rack reports missing hashes
//!                      → pack_missing() (entries named by hash)
//!   2b. Full        ── create_tarball() (ignore file + Dockerfile forced in)
//! ```
//!
//! # Promotion (local half)
//!
//! `FormationGenerator` renders the app's CloudFormation template from the
//! live stack parameters and the release's stored manifest.

pub mod archive;
pub mod ignore;
pub mod index;
pub mod tarball;
pub mod template;

pub use archive::{TransferError, pack_missing};
pub use ignore::{IgnoreError, IgnoreRules, warn_unignored_env};
pub use index::{IndexError, create_index, hash_bytes};
pub use tarball::{TarballError, create_tarball};
pub use template::{AppParams, FormationGenerator, RELEASE_PARAMETER, TemplateError};

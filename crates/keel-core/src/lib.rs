//! Core types and configuration for keel.
//!
//! This crate defines the `keel.toml` schema ([`KeelConfig`]), the explicit
//! per-invocation [`AppContext`], and the records that flow through the
//! build and release pipeline: [`Index`], [`BuildRecord`], [`ReleaseRecord`].

pub mod build;
pub mod config;
pub mod context;
pub mod error;
pub mod id;
pub mod index;
pub mod release;

pub use build::{BuildRecord, BuildStatus};
pub use config::{AppConfig, AwsConfig, BuildConfig, KeelConfig, RackConfig};
pub use context::AppContext;
pub use error::{Error, Result};
pub use index::{Index, IndexEntry};
pub use release::{ReleaseRecord, StackParameter};

#![deny(unsafe_code)]

//! Shared test utilities for the CaseAssist workspace.
//!
//! Provides config builders, recording engine factories, canned configuration
//! sources, result fixtures, and tracing helpers so that tests across crates
//! stay concise and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! caseassist-test-utils = { workspace = true }
//! ```
//!
//! Only integration tests (`tests/`) of `caseassist-core` may use it; unit
//! tests inside the core would see two copies of the core types.

pub mod config;
pub mod engine;
pub mod fixtures;
pub mod harness;
pub mod tracing_setup;

//! # dockfix-common
//!
//! Shared error definitions, domain types, configuration model, and
//! constants used across the entire dockfix workspace.
//!
//! This crate is the leaf of the dependency graph. It depends on no other
//! internal crate and provides the primitives the log bridge, the container
//! managers, and the fixture lifecycle are built from.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

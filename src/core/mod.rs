//! core
//!
//! Core domain types and configuration.
//!
//! # Modules
//!
//! - [`types`] - Strong types: BranchName, VersionNumber, DependencyVersion
//! - [`graph`] - Branch forest derived from naming conventions
//! - [`naming`] - Namespace token injection
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing
//! - Nothing in this layer performs network I/O

pub mod config;
pub mod graph;
pub mod naming;
pub mod types;

//! metaship - release automation for metadata-driven platforms
//!
//! metaship moves platform metadata between a source tree, an org and a
//! hosting forge: it retrieves, transforms and redeploys metadata, keeps
//! package version pins and API versions current, and cascades a source
//! branch down a tree of feature branches.
//!
//! # Architecture
//!
//! The codebase is layered; each layer only calls the ones below it:
//!
//! - [`cli`] - Command-line interface (parses args, wires collaborators)
//! - [`tasks`] - Named, configurable units of work and their registry
//! - [`engine`] - ETL pipeline and branch cascade merger
//! - [`metadata`] - Metadata documents, manifests, transforms and rewrites
//! - [`transport`] - Retrieve/deploy boundary to an org
//! - [`forge`] - Abstraction for the repository host (GitHub)
//! - [`git`] - Local repository queries (remote discovery)
//! - [`core`] - Domain types, naming, branch forest, configuration
//! - [`ui`] - Output formatting
//!
//! # Invariants
//!
//! 1. Configuration errors (unknown task, bad option) surface before any
//!    collaborator is created or any file is touched
//! 2. Version pins are only ever raised
//! 3. Every cascade decision is logged where it is made

pub mod cli;
pub mod core;
pub mod engine;
pub mod forge;
pub mod git;
pub mod metadata;
pub mod tasks;
pub mod transport;
pub mod ui;

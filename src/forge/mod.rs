//! forge
//!
//! Abstraction for the repository host.
//!
//! # Architecture
//!
//! The `Forge` trait defines the interface the branch cascade uses: branch
//! lookup and listing, comparisons, server-side merges and pull requests.
//! Commands use the [`create_forge`] factory rather than importing
//! specific forge implementations directly.
//!
//! # Modules
//!
//! - `traits`: Core `Forge` trait and request/response types
//! - [`github`]: GitHub implementation using the REST API
//! - [`mock`]: Mock implementation for deterministic testing
//! - `factory`: Target resolution and forge creation

mod factory;
pub mod github;
pub mod mock;
mod traits;

pub use factory::{create_forge, resolve_target, ForgeTarget, TOKEN_ENV};
pub use traits::*;

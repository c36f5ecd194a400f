//! ui
//!
//! User-facing output.
//!
//! # Modules
//!
//! - [`output`] - Output formatting and display
//!
//! # Design
//!
//! Command handlers print results through this module so the quiet flag is
//! honoured in one place. Progress and decisions are logged, not printed.

pub mod output;

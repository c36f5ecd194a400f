//! engine
//!
//! The two release algorithms: the branch cascade and the metadata pipeline.
//!
//! # Architecture
//!
//! Both engines borrow their collaborators (a [`Forge`](crate::forge::Forge)
//! or a [`MetadataTransport`](crate::transport::MetadataTransport)) and run
//! strictly sequentially: every remote call is awaited before the next
//! decision is made.
//!
//! - [`cascade`]: merge a source branch down the feature branch forest
//! - [`etl`]: retrieve metadata, rewrite it in a working directory, deploy it
//!
//! # Invariants
//!
//! - Configuration problems surface before the first mutation
//! - Every skip and action is logged where it is decided

pub mod cascade;
pub mod etl;

pub use cascade::{
    BranchCascadeMerger, BranchOutcome, BranchResult, CascadeError, CascadeOptions,
    CascadeReport, TraceLine,
};
pub use etl::{EntityTransformJob, EtlError, EtlJob, EtlPipeline, EtlReport, EtlStages};

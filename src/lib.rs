//! Quay - build-graph resolution engine
//!
//! This crate turns the per-target metadata a build aspect emits into a
//! deduplicated module/library graph for IDE and build-protocol use:
//! target selection, parallel library derivation, jdeps reconciliation,
//! transitive compile-time jar pruning and sharded sync orchestration.

pub mod core;
pub mod ops;
pub mod resolver;
pub mod util;

pub use crate::core::{
    label::Label, library::Library, module::Module, project::Project, target_info::TargetInfo,
    workspace::RepoMapping, workspace::WorkspaceContext,
};

pub use crate::resolver::{DependencyGraph, ResolveCaches, SyncError};
pub use crate::util::cancel::CancellationToken;

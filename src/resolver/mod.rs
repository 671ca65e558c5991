//! Build-graph resolution engine

pub mod errors;
pub mod graph;
pub mod jdeps;
pub mod mapper;
pub mod passes;
pub mod pruning;
pub mod selection;

pub use errors::SyncError;
pub use graph::{DependencyGraph, TargetsAtDepth};
pub use jdeps::ResolveCaches;
pub use mapper::{ingest_targets, resolve_project};
pub use selection::TargetSelection;

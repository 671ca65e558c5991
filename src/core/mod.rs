//! Value objects of the project model

pub mod label;
pub mod language;
pub mod library;
pub mod module;
pub mod project;
pub mod target_info;
pub mod workspace;

pub use label::{Label, LabelError};
pub use language::LanguageClass;
pub use library::{GoLibrary, Library};
pub use module::{LanguageData, Module, SourceItem, Tag};
pub use project::Project;
pub use target_info::{
    Dependency, DependencyKind, FileLocation, PathsResolver, TargetInfo,
};
pub use workspace::{RepoMapping, WorkspaceContext};

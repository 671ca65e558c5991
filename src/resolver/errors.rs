//! Resolution error types.

use thiserror::Error;

use crate::core::label::{Label, LabelError};
use crate::core::language::LanguageClass;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("sync was cancelled")]
    Cancelled,

    #[error(transparent)]
    Label(#[from] LabelError),

    #[error("no module named `{0}` in the current project")]
    ModuleNotFound(Label),

    #[error("module `{module}` has no debuggable language (found {languages:?})")]
    DebuggerUnsupported {
        module: Label,
        languages: Vec<LanguageClass>,
    },

    #[error("shard of {size} targets failed at minimum size: {reason}")]
    ShardExhausted { size: usize, reason: String },

    #[error("invalid third-party jar pattern `{pattern}`: {source}")]
    InvalidJarPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

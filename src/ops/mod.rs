//! High-level sync operations

pub mod sync;

pub use sync::{
    ensure_debuggable, run_partial_sync, run_sync, AspectBuildResult, AspectInvoker, InvokeError,
    SyncOutcome,
};

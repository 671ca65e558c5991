//! Shared utilities

pub mod cancel;
pub mod hash;
pub mod interning;

pub use cancel::CancellationToken;
pub use interning::InternedString;

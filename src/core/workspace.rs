//! Resolution-wide configuration and repository mapping.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::label::Label;

/// Default pattern extracting a `group/artifact` fragment from a
/// third-party jar path under `external/`.
pub const DEFAULT_THIRD_PARTY_JAR_PATTERN: &str = r"external/[^/]+/(.+)/([^/]+)/[^/]+$";

/// Per-sync configuration: import policy, feature toggles and the knobs of
/// the experimental transitive-jar pruning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceContext {
    /// Transitive import depth from the root targets; negative means
    /// unbounded.
    pub import_depth: i32,
    /// Split very large syncs into shards.
    pub shard_sync: bool,
    pub target_shard_size: usize,
    /// Import targets tagged `manual` instead of skipping them.
    pub allow_manual_targets_sync: bool,
    /// Opt-in for transitive compile-time jar pruning.
    pub experimental_add_transitive_compile_time_jars: bool,
    /// Rule kinds eligible for transitive-jar pruning.
    pub transitive_compile_time_jars_target_kinds: HashSet<String>,
    /// Substring patterns exempting a jar path from pruning.
    pub no_prune_patterns: Vec<String>,
    /// Regex extracting third-party coordinates from an `external/` jar path.
    pub third_party_jar_pattern: String,
    /// Repository path prefixes recognized as third-party artifact stores.
    pub third_party_repo_prefixes: Vec<String>,
    pub go_support: bool,
    pub python_support: bool,
    pub android_support: bool,
}

impl Default for WorkspaceContext {
    fn default() -> Self {
        WorkspaceContext {
            import_depth: -1,
            shard_sync: false,
            target_shard_size: 1000,
            allow_manual_targets_sync: false,
            experimental_add_transitive_compile_time_jars: false,
            transitive_compile_time_jars_target_kinds: HashSet::new(),
            no_prune_patterns: Vec::new(),
            third_party_jar_pattern: DEFAULT_THIRD_PARTY_JAR_PATTERN.to_string(),
            third_party_repo_prefixes: vec!["external/maven".to_string()],
            go_support: true,
            python_support: true,
            android_support: false,
        }
    }
}

impl WorkspaceContext {
    /// Whether a rule kind participates in transitive-jar pruning.
    pub fn transitive_compile_jars_enabled_for(&self, kind: &str) -> bool {
        self.transitive_compile_time_jars_target_kinds.contains(kind)
    }
}

/// Mapping between apparent and canonical external repository names.
///
/// With bzlmod enabled every `@repo` in aspect output is apparent and must
/// be rewritten to its canonical `@@name` once at ingestion; the mapping
/// also records which canonical repositories are checked out locally and
/// therefore count as part of the workspace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoMapping {
    pub apparent_to_canonical: HashMap<String, String>,
    /// Canonical repository names backed by a local checkout.
    pub canonical_to_local_path: HashMap<String, PathBuf>,
}

impl RepoMapping {
    pub fn canonical_name(&self, apparent: &str) -> Option<&str> {
        self.apparent_to_canonical.get(apparent).map(String::as_str)
    }

    /// Whether a label belongs to the workspace rather than to a fetched
    /// external repository.
    pub fn is_internal(&self, label: &Label) -> bool {
        if label.is_synthetic() {
            return false;
        }
        label.is_main_workspace() || self.canonical_to_local_path.contains_key(label.repo_name())
    }
}

//! Target selection: which graph nodes become modules.
//!
//! A node is imported as a module when it is internal (main workspace or a
//! locally mapped repository, or produced by a code generator) and either
//! its kind is a known workspace kind or it carries language facets with
//! recognizable source files. Everything else reachable from the imported
//! set stays library material.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::debug;

use crate::core::label::Label;
use crate::core::language::LanguageClass;
use crate::core::target_info::TargetInfo;
use crate::core::workspace::{RepoMapping, WorkspaceContext};
use crate::resolver::graph::DependencyGraph;

/// Rule kinds always promoted to modules when internal.
const WORKSPACE_KINDS: &[&str] = &[
    "java_library",
    "java_binary",
    "java_test",
    "kt_jvm_library",
    "kt_jvm_binary",
    "kt_jvm_test",
    "scala_library",
    "scala_binary",
    "scala_test",
    "intellij_plugin_debug_target",
];

#[derive(Debug, Default)]
pub struct TargetSelection {
    pub targets_to_import: HashSet<Label>,
    pub targets_as_libraries: HashMap<Label, TargetInfo>,
}

/// Partition the reachable target set into modules-to-be and library
/// material, honoring the configured import depth.
pub fn select_targets(
    targets: &HashMap<Label, TargetInfo>,
    roots: &HashSet<Label>,
    graph: &DependencyGraph,
    ctx: &WorkspaceContext,
    repo_mapping: &RepoMapping,
) -> TargetSelection {
    let at_depth = graph.all_targets_at_depth(ctx.import_depth, roots, |label| {
        targets
            .get(label)
            .is_some_and(|info| is_importable(info, ctx, repo_mapping))
    });

    let targets_to_import: HashSet<Label> = at_depth
        .targets
        .iter()
        .filter(|label| {
            targets
                .get(label)
                .is_some_and(|info| is_importable(info, ctx, repo_mapping))
        })
        .copied()
        .collect();

    // Library material: everything reachable from the imported set that
    // was not itself imported
    let mut candidates: HashMap<Label, TargetInfo> = HashMap::new();
    for label in targets.keys() {
        if !targets_to_import.contains(label) {
            if let Some(info) = targets.get(label) {
                candidates.insert(*label, info.clone());
            }
        }
    }
    let targets_as_libraries = graph.filter_used_libraries(candidates, &targets_to_import);

    debug!(
        imported = targets_to_import.len(),
        libraries = targets_as_libraries.len(),
        "target selection complete"
    );

    TargetSelection {
        targets_to_import,
        targets_as_libraries,
    }
}

/// Import policy for one target.
pub fn is_importable(info: &TargetInfo, ctx: &WorkspaceContext, repo_mapping: &RepoMapping) -> bool {
    let internal = repo_mapping.is_internal(&info.id)
        || info
            .python_target_info
            .as_ref()
            .is_some_and(|py| py.is_code_generator);
    if !internal {
        return false;
    }
    if info.has_tag("manual") && !ctx.allow_manual_targets_sync {
        return false;
    }

    if WORKSPACE_KINDS.contains(&info.kind.as_str()) {
        return true;
    }

    has_recognized_sources(info, ctx)
}

/// A facet-carrying target with at least one source file whose extension
/// matches the facet's language, gated by the per-language feature flags.
pub(crate) fn has_recognized_sources(info: &TargetInfo, ctx: &WorkspaceContext) -> bool {
    let source_language = |location: &crate::core::target_info::FileLocation| {
        LanguageClass::from_source_path(Path::new(&location.relative_path))
    };

    if info.jvm_target_info.is_some()
        && info
            .sources
            .iter()
            .any(|s| source_language(s).is_some_and(|l| l.is_jvm()))
    {
        return true;
    }
    if ctx.python_support
        && info.python_target_info.is_some()
        && info
            .sources
            .iter()
            .any(|s| source_language(s) == Some(LanguageClass::Python))
    {
        return true;
    }
    if ctx.go_support
        && info.go_target_info.is_some()
        && info
            .sources
            .iter()
            .any(|s| source_language(s) == Some(LanguageClass::Go))
    {
        return true;
    }
    if ctx.android_support && info.android_target_info.is_some() && !info.sources.is_empty() {
        return true;
    }
    false
}

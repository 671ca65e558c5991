//! Transitive compile-time jar pruning (opt-in).
//!
//! For library-like kinds the toolchain reports the full transitive
//! compile-time classpath, typically thousands of jars. This pass narrows
//! it to the jars actually needed: foreign-language interface jars the
//! compiler cannot see through jdeps, jars demanded by reverse dependents'
//! jdeps, third-party coordinates matching an allow-list derived from the
//! explicit interfaces, and configured do-not-prune patterns. Kept jars
//! reuse the synthetic-label cache shared with jdeps reconciliation.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use rayon::prelude::*;
use regex::Regex;

use crate::core::label::Label;
use crate::core::language::LanguageClass;
use crate::core::library::Library;
use crate::core::target_info::{PathsResolver, TargetInfo};
use crate::core::workspace::WorkspaceContext;
use crate::resolver::errors::SyncError;
use crate::resolver::graph::DependencyGraph;
use crate::resolver::jdeps::ResolveCaches;
use crate::resolver::passes::PassResult;

/// Interface jars of direct dependencies the primary toolchain cannot
/// compile (foreign-language deps); jdeps never sees these, so they must
/// survive pruning unconditionally.
fn explicit_compile_time_interfaces(
    info: &TargetInfo,
    targets: &HashMap<Label, TargetInfo>,
    resolver: &PathsResolver,
) -> HashSet<PathBuf> {
    info.dependency_ids()
        .filter_map(|dep| targets.get(&dep))
        .filter(|dep| {
            let languages = LanguageClass::from_kind(&dep.kind);
            languages.is_empty() || !languages.iter().all(LanguageClass::is_jvm)
        })
        .flat_map(|dep| dep.interface_jar_paths().map(|l| resolver.resolve(l)))
        .collect()
}

/// `group/artifact`-like fragment of a third-party jar path, if any.
fn third_party_fragment(pattern: &Regex, path: &str) -> Option<String> {
    pattern
        .captures(path)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Prune the transitive compile-time jars of every eligible target down
/// to the referenced subset. All four inclusion criteria must hold their
/// ground: explicit interfaces, reverse-jdeps demand, allow-listed
/// third-party coordinates and configured exemptions.
pub fn transitive_jar_libraries(
    targets: &HashMap<Label, TargetInfo>,
    imported: &[&TargetInfo],
    graph: &DependencyGraph,
    jdeps_paths: &HashMap<Label, HashSet<PathBuf>>,
    ctx: &WorkspaceContext,
    resolver: &PathsResolver,
    caches: &ResolveCaches,
) -> Result<PassResult, SyncError> {
    if !ctx.experimental_add_transitive_compile_time_jars {
        return Ok(PassResult::new());
    }
    let pattern = Regex::new(&ctx.third_party_jar_pattern).map_err(|source| {
        SyncError::InvalidJarPattern {
            pattern: ctx.third_party_jar_pattern.clone(),
            source,
        }
    })?;

    let eligible: Vec<&TargetInfo> = imported
        .iter()
        .copied()
        .filter(|info| ctx.transitive_compile_jars_enabled_for(&info.kind))
        .filter(|info| {
            info.jvm_target_info
                .as_ref()
                .is_some_and(|jvm| !jvm.transitive_compile_time_jars.is_empty())
        })
        .collect();

    let result: PassResult = eligible
        .par_iter()
        .map(|info| {
            let explicit = explicit_compile_time_interfaces(info, targets, resolver);

            let reverse_demand: HashSet<&PathBuf> = graph
                .reverse_dependencies(&info.id)
                .iter()
                .filter_map(|r| jdeps_paths.get(r))
                .flatten()
                .collect();

            let allow_list: HashSet<String> = explicit
                .iter()
                .filter_map(|jar| third_party_fragment(&pattern, &jar.to_string_lossy()))
                .collect();

            let libraries: Vec<Library> = info
                .jvm_target_info
                .iter()
                .flat_map(|jvm| jvm.transitive_compile_time_jars.iter())
                .map(|l| resolver.resolve(l))
                .filter(|jar| {
                    let path_str = jar.to_string_lossy();
                    explicit.contains(jar)
                        || reverse_demand.contains(jar)
                        || (ctx
                            .third_party_repo_prefixes
                            .iter()
                            .any(|prefix| path_str.contains(prefix.as_str()))
                            && third_party_fragment(&pattern, &path_str)
                                .is_some_and(|f| allow_list.contains(&f)))
                        || ctx
                            .no_prune_patterns
                            .iter()
                            .any(|p| path_str.contains(p.as_str()))
                })
                .map(|jar| {
                    Library::new(caches.synthetic_label(&jar)).with_outputs([jar])
                })
                .collect();
            (info.id, libraries)
        })
        .filter(|(_, libraries)| !libraries.is_empty())
        .collect();

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::target_info::{Dependency, DependencyKind, FileLocation, JvmOutputs, JvmTargetInfo};

    fn ctx_enabled() -> WorkspaceContext {
        let mut ctx = WorkspaceContext::default();
        ctx.experimental_add_transitive_compile_time_jars = true;
        ctx.transitive_compile_time_jars_target_kinds
            .insert("java_library".to_string());
        ctx
    }

    fn exec_jar(path: &str) -> FileLocation {
        FileLocation {
            relative_path: path.to_string(),
            is_source: false,
            is_external: true,
            root_execution_path_fragment: String::new(),
        }
    }

    fn resolver() -> PathsResolver {
        PathsResolver::new("/ws", "/exec")
    }

    fn target_with_transitive(id: &str, deps: &[&str], transitive: &[&str]) -> TargetInfo {
        let mut info = TargetInfo::new(Label::parse(id).unwrap(), "java_library");
        info.jvm_target_info = Some(JvmTargetInfo {
            transitive_compile_time_jars: transitive.iter().map(|p| exec_jar(p)).collect(),
            ..Default::default()
        });
        for dep in deps {
            info.dependencies.push(Dependency {
                id: Label::parse(dep).unwrap(),
                kind: DependencyKind::Compile,
            });
        }
        info
    }

    #[test]
    fn test_disabled_by_default() {
        let info = target_with_transitive("//lib:a", &[], &["external/maven/com/x/y/1.0/y-1.0.jar"]);
        let targets: HashMap<Label, TargetInfo> = [(info.id, info.clone())].into();
        let graph = DependencyGraph::new(&targets);

        let result = transitive_jar_libraries(
            &targets,
            &[&info],
            &graph,
            &HashMap::new(),
            &WorkspaceContext::default(),
            &resolver(),
            &ResolveCaches::new(),
        )
        .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_foreign_interface_jars_survive() {
        let mut foreign_dep =
            TargetInfo::new(Label::parse("//native:wrapper").unwrap(), "cc_library");
        foreign_dep.jvm_target_info = Some(JvmTargetInfo {
            jars: vec![JvmOutputs {
                interface_jars: vec![exec_jar("native/wrapper-ijar.jar")],
                ..Default::default()
            }],
            ..Default::default()
        });

        let info = target_with_transitive(
            "//lib:a",
            &["//native:wrapper"],
            &["native/wrapper-ijar.jar", "somewhere/unrelated.jar"],
        );
        let targets: HashMap<Label, TargetInfo> =
            [(info.id, info.clone()), (foreign_dep.id, foreign_dep)].into();
        let graph = DependencyGraph::new(&targets);

        let result = transitive_jar_libraries(
            &targets,
            &[&info],
            &graph,
            &HashMap::new(),
            &ctx_enabled(),
            &resolver(),
            &ResolveCaches::new(),
        )
        .unwrap();

        let libraries = &result[&info.id];
        assert_eq!(libraries.len(), 1);
        assert!(libraries[0]
            .outputs
            .contains(&PathBuf::from("/exec/native/wrapper-ijar.jar")));
    }

    #[test]
    fn test_reverse_jdeps_demand_survives() {
        let consumer = target_with_transitive("//app:main", &["//lib:a"], &[]);
        let info = target_with_transitive("//lib:a", &[], &["jars/needed-downstream.jar"]);
        let targets: HashMap<Label, TargetInfo> =
            [(info.id, info.clone()), (consumer.id, consumer.clone())].into();
        let graph = DependencyGraph::new(&targets);

        let jdeps_paths: HashMap<Label, HashSet<PathBuf>> = [(
            consumer.id,
            [PathBuf::from("/exec/jars/needed-downstream.jar")].into(),
        )]
        .into();

        let result = transitive_jar_libraries(
            &targets,
            &[&info],
            &graph,
            &jdeps_paths,
            &ctx_enabled(),
            &resolver(),
            &ResolveCaches::new(),
        )
        .unwrap();

        assert_eq!(result[&info.id].len(), 1);
    }

    #[test]
    fn test_no_prune_pattern_exempts() {
        let info = target_with_transitive("//lib:a", &[], &["vendor/keepme/lib.jar"]);
        let targets: HashMap<Label, TargetInfo> = [(info.id, info.clone())].into();
        let graph = DependencyGraph::new(&targets);

        let mut ctx = ctx_enabled();
        ctx.no_prune_patterns.push("keepme".to_string());

        let result = transitive_jar_libraries(
            &targets,
            &[&info],
            &graph,
            &HashMap::new(),
            &ctx,
            &resolver(),
            &ResolveCaches::new(),
        )
        .unwrap();
        assert_eq!(result[&info.id].len(), 1);
    }

    #[test]
    fn test_unmatched_jars_are_pruned() {
        let info = target_with_transitive(
            "//lib:a",
            &[],
            &["external/maven/com/x/y/1.0/y-1.0.jar", "jars/noise.jar"],
        );
        let targets: HashMap<Label, TargetInfo> = [(info.id, info.clone())].into();
        let graph = DependencyGraph::new(&targets);

        // No explicit interfaces, no reverse demand, empty allow-list
        let result = transitive_jar_libraries(
            &targets,
            &[&info],
            &graph,
            &HashMap::new(),
            &ctx_enabled(),
            &resolver(),
            &ResolveCaches::new(),
        )
        .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let info = target_with_transitive("//lib:a", &[], &["x.jar"]);
        let targets: HashMap<Label, TargetInfo> = [(info.id, info.clone())].into();
        let graph = DependencyGraph::new(&targets);

        let mut ctx = ctx_enabled();
        ctx.third_party_jar_pattern = "(".to_string();

        let err = transitive_jar_libraries(
            &targets,
            &[&info],
            &graph,
            &HashMap::new(),
            &ctx,
            &resolver(),
            &ResolveCaches::new(),
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::InvalidJarPattern { .. }));
    }
}

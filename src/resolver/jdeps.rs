//! Jdeps reconciliation.
//!
//! The compiler's `.jdeps` report names the jars its output actually
//! referenced, independent of declared dependencies. This pass recovers
//! the jars the graph never declared, wraps each in a synthetic library
//! and subtracts everything already reachable through the declared
//! dependency closure so nothing is modeled twice.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use prost::Message;
use rayon::prelude::*;
use tracing::warn;

use crate::core::label::Label;
use crate::core::language::LanguageClass;
use crate::core::library::Library;
use crate::core::target_info::{PathsResolver, TargetInfo};
use crate::resolver::passes::{source_jar_sibling, PassResult};

/// Kinds whose jars are modeled by the output-jars pass already; running
/// jdeps recovery on them would duplicate their own outputs.
const OUTPUT_ONLY_KINDS: &[&str] = &[
    "java_proto_library",
    "java_lite_proto_library",
    "java_mutable_proto_library",
    "kt_proto_library_helper",
];

/// Wire format of a `.jdeps` report (protobuf `Dependencies` message).
#[derive(Clone, PartialEq, Message)]
pub struct JdepsReport {
    #[prost(message, repeated, tag = "1")]
    pub dependency: Vec<JdepsDependency>,
    #[prost(bool, optional, tag = "2")]
    pub success: Option<bool>,
    #[prost(string, optional, tag = "3")]
    pub rule_label: Option<String>,
    #[prost(string, repeated, tag = "4")]
    pub contained_package: Vec<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct JdepsDependency {
    #[prost(string, tag = "1")]
    pub path: String,
    #[prost(enumeration = "JdepsDependencyKind", tag = "2")]
    pub kind: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum JdepsDependencyKind {
    Explicit = 0,
    Implicit = 1,
    Unused = 2,
    Incomplete = 3,
}

/// The two mutable structures shared across the parallel resolution:
/// dependency-injected per sync so runs never leak state into each other.
/// Both are used only through compute-if-absent.
#[derive(Debug, Default)]
pub struct ResolveCaches {
    /// Physical jar path -> synthetic label, shared between jdeps
    /// reconciliation and transitive-jar pruning.
    pub synthetic_labels: DashMap<PathBuf, Label>,
    /// Declared-closure jar sets, memoized per label.
    pub reachable_jars: DashMap<Label, Arc<HashSet<PathBuf>>>,
}

impl ResolveCaches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synthetic label for a jar, stable across the whole sync.
    pub fn synthetic_label(&self, path: &Path) -> Label {
        if let Some(label) = self.synthetic_labels.get(path) {
            return *label;
        }
        let label = Label::synthetic(path);
        *self
            .synthetic_labels
            .entry(path.to_path_buf())
            .or_insert(label)
    }
}

/// Whether jdeps recovery applies to a target: JVM-only language set with
/// a jdeps report, and not an output-only kind. Uses the same language
/// inference as module assembly, so a kind-opaque rule with `.java`
/// sources is recovered here too.
fn is_eligible(info: &TargetInfo) -> bool {
    if OUTPUT_ONLY_KINDS.contains(&info.kind.as_str()) {
        return false;
    }
    let languages = info.languages();
    if languages.is_empty() || !languages.iter().all(LanguageClass::is_jvm) {
        return false;
    }
    info.jvm_target_info
        .as_ref()
        .is_some_and(|jvm| jvm.jdeps.is_some())
}

/// Parse one target's jdeps report into resolved jar paths.
///
/// Keeps EXPLICIT and IMPLICIT entries only, drops the target's own
/// declared jars, and drops `header_*` jars shadowed by a `processed_*`
/// sibling in the same report.
fn jdeps_paths_for(info: &TargetInfo, resolver: &PathsResolver) -> HashSet<PathBuf> {
    let Some(jdeps_location) = info.jvm_target_info.as_ref().and_then(|j| j.jdeps.as_ref())
    else {
        return HashSet::new();
    };
    let jdeps_file = resolver.resolve(jdeps_location);

    let bytes = match std::fs::read(&jdeps_file) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(target_id = %info.id, path = %jdeps_file.display(), %err, "skipping unreadable jdeps report");
            return HashSet::new();
        }
    };
    let report = match JdepsReport::decode(bytes.as_slice()) {
        Ok(report) => report,
        Err(err) => {
            warn!(target_id = %info.id, path = %jdeps_file.display(), %err, "skipping corrupt jdeps report");
            return HashSet::new();
        }
    };

    let own_jars: HashSet<PathBuf> = info
        .binary_jar_paths()
        .chain(info.interface_jar_paths())
        .map(|l| resolver.resolve(l))
        .collect();

    let raw: HashSet<PathBuf> = report
        .dependency
        .iter()
        .filter(|dep| {
            matches!(
                dep.kind(),
                JdepsDependencyKind::Explicit | JdepsDependencyKind::Implicit
            )
        })
        .map(|dep| resolver.execution_root.join(&dep.path))
        .filter(|path| !own_jars.contains(path))
        .collect();

    // header_X.jar with a processed_X.jar sibling in the same report is a
    // toolchain duplicate of one logical dependency
    raw.iter()
        .filter(|path| {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                return true;
            };
            match name.strip_prefix("header_") {
                Some(rest) => !raw.contains(&path.with_file_name(format!("processed_{rest}"))),
                None => true,
            }
        })
        .cloned()
        .collect()
}

/// Jars reachable from `start` through declared dependencies: the node's
/// own output and interface jars, known library jars, and everything
/// below, restricted to jars some jdeps report mentions. Memoized in the
/// shared cache; cycle-safe via a query-local visited set. A concurrent
/// duplicate computation is idempotent, so the entry insert keeps
/// whichever value landed first.
fn reachable_jars_from(
    start: Label,
    targets: &HashMap<Label, TargetInfo>,
    known_libraries: &HashMap<Label, Library>,
    all_jdeps_jars: &HashSet<PathBuf>,
    resolver: &PathsResolver,
    caches: &ResolveCaches,
) -> Arc<HashSet<PathBuf>> {
    if let Some(cached) = caches.reachable_jars.get(&start) {
        return Arc::clone(&cached);
    }

    let mut jars: HashSet<PathBuf> = HashSet::new();
    let mut visited: HashSet<Label> = HashSet::new();
    let mut stack = vec![start];

    while let Some(node) = stack.pop() {
        if !visited.insert(node) {
            continue;
        }
        if node != start {
            if let Some(cached) = caches.reachable_jars.get(&node) {
                jars.extend(cached.iter().cloned());
                continue;
            }
        }
        if let Some(info) = targets.get(&node) {
            jars.extend(
                info.binary_jar_paths()
                    .chain(info.interface_jar_paths())
                    .map(|l| resolver.resolve(l))
                    .filter(|p| all_jdeps_jars.contains(p)),
            );
            stack.extend(info.dependency_ids());
        }
        if let Some(library) = known_libraries.get(&node) {
            jars.extend(
                library
                    .outputs
                    .iter()
                    .chain(library.interface_jars.iter())
                    .filter(|p| all_jdeps_jars.contains(*p))
                    .cloned(),
            );
            stack.extend(library.dependencies.iter().copied());
        }
    }

    let jars = Arc::new(jars);
    caches.reachable_jars.entry(start).or_insert(jars).clone()
}

/// Read and filter the jdeps reports of all eligible targets in parallel
/// (I/O-bound). The result also feeds the reverse-jdeps criterion of
/// transitive-jar pruning.
pub fn collect_jdeps_paths(
    imported: &[&TargetInfo],
    resolver: &PathsResolver,
) -> HashMap<Label, HashSet<PathBuf>> {
    imported
        .par_iter()
        .filter(|info| is_eligible(info))
        .map(|info| (info.id, jdeps_paths_for(info, resolver)))
        .collect()
}

/// Recover undeclared jar dependencies for every eligible imported target.
pub fn jdeps_libraries(
    targets: &HashMap<Label, TargetInfo>,
    imported: &[&TargetInfo],
    known_libraries: &HashMap<Label, Library>,
    resolver: &PathsResolver,
    caches: &ResolveCaches,
) -> PassResult {
    let per_target = collect_jdeps_paths(imported, resolver);
    jdeps_libraries_from_paths(targets, &per_target, known_libraries, resolver, caches)
}

/// Subtraction step over pre-collected jdeps paths (CPU-bound).
pub fn jdeps_libraries_from_paths(
    targets: &HashMap<Label, TargetInfo>,
    per_target: &HashMap<Label, HashSet<PathBuf>>,
    known_libraries: &HashMap<Label, Library>,
    resolver: &PathsResolver,
    caches: &ResolveCaches,
) -> PassResult {
    let all_jdeps_jars: HashSet<PathBuf> = per_target
        .values()
        .flat_map(|paths| paths.iter().cloned())
        .collect();

    // CPU-bound: subtract the declared-closure jars per target
    per_target
        .par_iter()
        .filter(|(_, paths)| !paths.is_empty())
        .map(|(label, paths)| {
            let mut reachable: HashSet<PathBuf> = HashSet::new();
            if let Some(info) = targets.get(label) {
                for dep in info.dependency_ids() {
                    reachable.extend(
                        reachable_jars_from(
                            dep,
                            targets,
                            known_libraries,
                            &all_jdeps_jars,
                            resolver,
                            caches,
                        )
                        .iter()
                        .cloned(),
                    );
                }
            }

            let libraries: Vec<Library> = paths
                .iter()
                .filter(|path| !reachable.contains(*path))
                .map(|path| {
                    let mut library = Library::new(caches.synthetic_label(path))
                        .with_outputs([path.clone()]);
                    if let Some(sources) = source_jar_sibling(path) {
                        library = library.with_sources([sources]);
                    }
                    library.with_inferred_maven_coordinates()
                })
                .collect();
            (*label, libraries)
        })
        .filter(|(_, libraries)| !libraries.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::target_info::{
        Dependency, DependencyKind, FileLocation, JvmOutputs, JvmTargetInfo,
    };
    use tempfile::TempDir;

    fn write_jdeps(dir: &Path, name: &str, entries: &[(&str, JdepsDependencyKind)]) -> String {
        let report = JdepsReport {
            dependency: entries
                .iter()
                .map(|(path, kind)| JdepsDependency {
                    path: path.to_string(),
                    kind: *kind as i32,
                })
                .collect(),
            success: Some(true),
            rule_label: None,
            contained_package: Vec::new(),
        };
        let file = dir.join(name);
        std::fs::write(&file, report.encode_to_vec()).unwrap();
        name.to_string()
    }

    fn jvm_target(id: &str, jdeps: Option<&str>, deps: &[&str]) -> TargetInfo {
        let mut info = TargetInfo::new(Label::parse(id).unwrap(), "java_library");
        info.jvm_target_info = Some(JvmTargetInfo {
            jdeps: jdeps.map(|name| FileLocation {
                relative_path: name.to_string(),
                is_source: false,
                is_external: false,
                root_execution_path_fragment: String::new(),
            }),
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
    fn test_recovers_undeclared_jar_with_stable_label() {
        let dir = TempDir::new().unwrap();
        let resolver = PathsResolver::new(dir.path(), dir.path());
        let jdeps = write_jdeps(
            dir.path(),
            "a.jdeps",
            &[
                ("jars/libY.jar", JdepsDependencyKind::Explicit),
                ("jars/unused.jar", JdepsDependencyKind::Unused),
            ],
        );

        let info = jvm_target("//lib:a", Some(&jdeps), &["//lib:x"]);
        let targets: HashMap<Label, TargetInfo> = [(info.id, info.clone())].into();

        let run = |caches: &ResolveCaches| {
            jdeps_libraries(&targets, &[&info], &HashMap::new(), &resolver, caches)
        };
        let first = run(&ResolveCaches::new());
        let second = run(&ResolveCaches::new());

        // The wire default is the zero variant
        assert_eq!(JdepsDependencyKind::default(), JdepsDependencyKind::Explicit);

        let libraries = &first[&info.id];
        assert_eq!(libraries.len(), 1, "UNUSED entries must be ignored");
        assert!(libraries[0]
            .outputs
            .contains(&dir.path().join("jars/libY.jar")));
        // Re-running yields the identical synthetic label
        assert_eq!(libraries[0].label, second[&info.id][0].label);
    }

    #[test]
    fn test_reachable_jars_are_subtracted() {
        let dir = TempDir::new().unwrap();
        let resolver = PathsResolver::new(dir.path(), dir.path());
        let jdeps = write_jdeps(
            dir.path(),
            "a.jdeps",
            &[
                ("jars/declared.jar", JdepsDependencyKind::Explicit),
                ("jars/extra.jar", JdepsDependencyKind::Implicit),
            ],
        );

        let root = jvm_target("//lib:a", Some(&jdeps), &["//lib:dep"]);
        let mut dep = jvm_target("//lib:dep", None, &[]);
        dep.jvm_target_info = Some(JvmTargetInfo {
            jars: vec![JvmOutputs {
                binary_jars: vec![FileLocation {
                    relative_path: "jars/declared.jar".to_string(),
                    is_source: false,
                    is_external: false,
                    root_execution_path_fragment: String::new(),
                }],
                ..Default::default()
            }],
            ..Default::default()
        });
        let targets: HashMap<Label, TargetInfo> =
            [(root.id, root.clone()), (dep.id, dep)].into();

        let result = jdeps_libraries(
            &targets,
            &[&root],
            &HashMap::new(),
            &resolver,
            &ResolveCaches::new(),
        );

        let libraries = &result[&root.id];
        assert_eq!(libraries.len(), 1);
        assert!(libraries[0].outputs.contains(&dir.path().join("jars/extra.jar")));
    }

    #[test]
    fn test_header_jar_shadowed_by_processed_sibling() {
        let dir = TempDir::new().unwrap();
        let resolver = PathsResolver::new(dir.path(), dir.path());
        let jdeps = write_jdeps(
            dir.path(),
            "a.jdeps",
            &[
                ("jars/header_lib.jar", JdepsDependencyKind::Explicit),
                ("jars/processed_lib.jar", JdepsDependencyKind::Explicit),
                ("jars/header_alone.jar", JdepsDependencyKind::Explicit),
            ],
        );

        let info = jvm_target("//lib:a", Some(&jdeps), &[]);
        let paths = jdeps_paths_for(&info, &resolver);

        assert!(!paths.contains(&dir.path().join("jars/header_lib.jar")));
        assert!(paths.contains(&dir.path().join("jars/processed_lib.jar")));
        assert!(paths.contains(&dir.path().join("jars/header_alone.jar")));
    }

    #[test]
    fn test_missing_report_is_skipped_not_fatal() {
        let dir = TempDir::new().unwrap();
        let resolver = PathsResolver::new(dir.path(), dir.path());
        let info = jvm_target("//lib:a", Some("does-not-exist.jdeps"), &[]);
        let targets: HashMap<Label, TargetInfo> = [(info.id, info.clone())].into();

        let result = jdeps_libraries(
            &targets,
            &[&info],
            &HashMap::new(),
            &resolver,
            &ResolveCaches::new(),
        );
        assert!(result.is_empty());
    }

    #[test]
    fn test_non_jvm_targets_are_ineligible() {
        let mut info = TargetInfo::new(Label::parse("//go:lib").unwrap(), "go_library");
        info.jvm_target_info = Some(JvmTargetInfo {
            jdeps: Some(FileLocation::source("x.jdeps")),
            ..Default::default()
        });
        assert!(!is_eligible(&info));

        let proto = jvm_target("//proto:java", Some("p.jdeps"), &[]);
        let mut proto = proto;
        proto.kind = "java_proto_library".to_string();
        assert!(!is_eligible(&proto));
    }

    #[test]
    fn test_opaque_kind_with_java_sources_is_eligible() {
        // The kind table knows nothing about the rule, but the sources
        // mark it as Java, same as module assembly models it
        let mut info = jvm_target("//lib:wrapped", Some("w.jdeps"), &[]);
        info.kind = "my_java_macro".to_string();
        assert!(!is_eligible(&info));

        info.sources.push(FileLocation::source("lib/Wrapped.java"));
        assert!(is_eligible(&info));
    }

    #[test]
    fn test_reachable_closure_is_cycle_safe_and_cached() {
        let dir = TempDir::new().unwrap();
        let resolver = PathsResolver::new(dir.path(), dir.path());

        let mut a = jvm_target("//lib:a", None, &["//lib:b"]);
        a.jvm_target_info = Some(JvmTargetInfo {
            jars: vec![JvmOutputs {
                binary_jars: vec![FileLocation::source("jars/a.jar")],
                ..Default::default()
            }],
            ..Default::default()
        });
        let b = jvm_target("//lib:b", None, &["//lib:a"]);
        let targets: HashMap<Label, TargetInfo> = [(a.id, a.clone()), (b.id, b.clone())].into();

        let all_jars: HashSet<PathBuf> = [dir.path().join("jars/a.jar")].into();
        let caches = ResolveCaches::new();
        let reachable = reachable_jars_from(b.id, &targets, &HashMap::new(), &all_jars, &resolver, &caches);

        assert!(reachable.contains(&dir.path().join("jars/a.jar")));
        assert!(caches.reachable_jars.contains_key(&b.id));
    }
}

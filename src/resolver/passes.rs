//! Library derivation passes.
//!
//! Each pass is a pure function from the imported target set to a partial
//! `Label -> Vec<Library>` map of extra libraries per target. Passes are
//! independent and run concurrently; the mapper concatenates their results
//! in pass order before deduplicating by library label.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::core::label::Label;
use crate::core::library::{GoLibrary, Library};
use crate::core::target_info::{PathsResolver, TargetInfo};
use crate::core::workspace::WorkspaceContext;
use crate::resolver::selection::has_recognized_sources;

pub type PassResult = HashMap<Label, Vec<Library>>;

/// Infer a `foo-sources.jar` sibling for a stdlib jar; the toolchain does
/// not report stdlib source jars directly. A missing sibling means no
/// source jar, never an error.
pub fn source_jar_sibling(jar: &Path) -> Option<PathBuf> {
    let stem = jar.file_stem()?.to_str()?;
    let sibling = jar.with_file_name(format!("{stem}-sources.jar"));
    sibling.exists().then_some(sibling)
}

/// Targets with no recognizable first-party sources whose outputs are
/// nevertheless real jars: the target itself becomes an opaque library.
pub fn output_jars_libraries(
    targets: &[&TargetInfo],
    resolver: &PathsResolver,
    ctx: &WorkspaceContext,
) -> PassResult {
    let mut result = PassResult::new();
    for info in targets {
        if has_recognized_sources(info, ctx) {
            continue;
        }
        let outputs: BTreeSet<PathBuf> = info.binary_jar_paths().map(|l| resolver.resolve(l)).collect();
        let has_generated_srcjars = info
            .generated_sources
            .iter()
            .any(|s| s.relative_path.ends_with(".srcjar"));
        if outputs.is_empty() && !has_generated_srcjars {
            continue;
        }
        let library = Library::new(info.id)
            .with_outputs(outputs)
            .with_interface_jars(info.interface_jar_paths().map(|l| resolver.resolve(l)))
            .with_sources(info.source_jar_paths().map(|l| resolver.resolve(l)))
            .from_internal_target();
        result.insert(info.id, vec![library]);
    }
    result
}

/// One synthetic library per target that declares annotation-processor
/// generated jars; additive next to the target's own classpath entry.
/// Keyed on the full target label so same-named targets in different
/// packages get distinct libraries.
pub fn annotation_processor_libraries(targets: &[&TargetInfo], resolver: &PathsResolver) -> PassResult {
    let mut result = PassResult::new();
    for info in targets {
        let mut outputs = BTreeSet::new();
        let mut sources = BTreeSet::new();
        for group in info.generated_jar_groups() {
            outputs.extend(group.binary_jars.iter().map(|l| resolver.resolve(l)));
            sources.extend(group.source_jars.iter().map(|l| resolver.resolve(l)));
        }
        if outputs.is_empty() {
            continue;
        }
        let label = Label::synthetic_named(&format!("{}-generated", info.id));
        let library = Library::new(label)
            .with_outputs(outputs)
            .with_sources(sources)
            .from_internal_target();
        result.insert(info.id, vec![library]);
    }
    result
}

/// One project-level Kotlin stdlib library, unioned across every Kotlin
/// target and fanned out to all of them. Flagged low priority so a
/// user-declared stdlib dependency overrides it.
pub fn kotlin_stdlib_libraries(targets: &[&TargetInfo], resolver: &PathsResolver) -> PassResult {
    let mut jars: BTreeSet<PathBuf> = BTreeSet::new();
    let mut kotlin_targets: Vec<Label> = Vec::new();
    for info in targets {
        let Some(kotlin) = &info.kotlin_target_info else {
            continue;
        };
        kotlin_targets.push(info.id);
        jars.extend(kotlin.stdlibs.iter().map(|l| resolver.resolve(l)));
    }
    if jars.is_empty() {
        return PassResult::new();
    }

    let sources: BTreeSet<PathBuf> = jars.iter().filter_map(|j| source_jar_sibling(j)).collect();
    let library = Library::new(Label::synthetic_named("kotlin-stdlibs"))
        .with_outputs(jars)
        .with_sources(sources)
        .low_priority();

    kotlin_targets
        .into_iter()
        .map(|label| (label, vec![library.clone()]))
        .collect()
}

/// One project-level Scala SDK library from the union of compiler
/// classpaths, fanned out to every Scala target.
pub fn scala_sdk_libraries(targets: &[&TargetInfo], resolver: &PathsResolver) -> PassResult {
    let mut jars: BTreeSet<PathBuf> = BTreeSet::new();
    let mut scala_targets: Vec<Label> = Vec::new();
    for info in targets {
        let Some(scala) = &info.scala_target_info else {
            continue;
        };
        scala_targets.push(info.id);
        jars.extend(scala.compiler_classpath.iter().map(|l| resolver.resolve(l)));
    }
    if jars.is_empty() {
        return PassResult::new();
    }

    let sources: BTreeSet<PathBuf> = jars.iter().filter_map(|j| source_jar_sibling(j)).collect();
    let library = Library::new(Label::synthetic_named("scala-sdk"))
        .with_outputs(jars)
        .with_sources(sources);

    scala_targets
        .into_iter()
        .map(|label| (label, vec![library.clone()]))
        .collect()
}

/// One library per distinct compiler-plugin jar, labeled by file name so
/// the same plugin used from many targets dedups to one entry.
pub fn kotlinc_plugin_libraries(targets: &[&TargetInfo], resolver: &PathsResolver) -> PassResult {
    let mut result = PassResult::new();
    for info in targets {
        let Some(kotlin) = &info.kotlin_target_info else {
            continue;
        };
        let mut libraries = Vec::new();
        for plugin in &kotlin.kotlinc_plugin_infos {
            for jar in &plugin.plugin_jars {
                let path = resolver.resolve(jar);
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                libraries.push(
                    Library::new(Label::synthetic_named(&name)).with_outputs([path]),
                );
            }
        }
        if !libraries.is_empty() {
            result.insert(info.id, libraries);
        }
    }
    result
}

/// AIDL jar libraries. The toolchain emits no distinct AIDL jar for a
/// target without declared sources, so such targets are skipped outright.
pub fn android_aidl_libraries(
    targets: &[&TargetInfo],
    resolver: &PathsResolver,
    ctx: &WorkspaceContext,
) -> PassResult {
    if !ctx.android_support {
        return PassResult::new();
    }
    let mut result = PassResult::new();
    for info in targets {
        let Some(android) = &info.android_target_info else {
            continue;
        };
        let Some(binary_jar) = &android.aidl_binary_jar else {
            continue;
        };
        if info.sources.is_empty() {
            continue;
        }
        let label = Label::synthetic_named(&format!("{}-aidl", info.id));
        let mut library = Library::new(label)
            .with_outputs([resolver.resolve(binary_jar)])
            .from_internal_target();
        if let Some(source_jar) = &android.aidl_source_jar {
            library = library.with_sources([resolver.resolve(source_jar)]);
        }
        result.insert(info.id, vec![library]);
    }
    result
}

/// Go package map; entries with neither an import path nor a root are not
/// real libraries.
pub fn go_libraries(
    targets: &[&TargetInfo],
    resolver: &PathsResolver,
    ctx: &WorkspaceContext,
) -> HashMap<Label, GoLibrary> {
    if !ctx.go_support {
        return HashMap::new();
    }
    let mut result = HashMap::new();
    for info in targets {
        let Some(go) = &info.go_target_info else {
            continue;
        };
        let library = GoLibrary {
            label: info.id,
            import_path: Some(go.import_path.clone()),
            root: go.root.as_ref().map(|l| resolver.resolve(l)),
        };
        if library.is_resolvable() {
            result.insert(info.id, library);
        }
    }
    result
}

/// Concatenate pass results per label, preserving pass order.
pub fn merge_pass_results(passes: Vec<PassResult>) -> PassResult {
    let mut merged = PassResult::new();
    for pass in passes {
        for (label, libraries) in pass {
            merged.entry(label).or_default().extend(libraries);
        }
    }
    merged
}

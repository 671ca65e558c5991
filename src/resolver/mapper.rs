//! Pipeline orchestration and module/library assembly.
//!
//! Order of battle: ingest (canonicalize + configuration dedup), build the
//! dependency graph, select targets, run the derivation passes
//! concurrently, reconcile jdeps, prune transitive jars, then assemble
//! modules and merge the library maps by fixed precedence:
//! targets-and-deps < derivation passes (in pass order) < jdeps <
//! transitive-pruned. The merge itself is single-threaded and
//! deterministic regardless of task completion order.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::PathBuf;

use rayon::prelude::*;
use tracing::{debug_span, warn};

use crate::core::label::Label;
use crate::core::language::LanguageClass;
use crate::core::library::Library;
use crate::core::module::{LanguageData, Module, SourceItem, Tag};
use crate::core::project::Project;
use crate::core::target_info::{PathsResolver, TargetInfo};
use crate::core::workspace::{RepoMapping, WorkspaceContext};
use crate::resolver::errors::SyncError;
use crate::resolver::graph::DependencyGraph;
use crate::resolver::jdeps::{self, ResolveCaches};
use crate::resolver::passes::{self, PassResult};
use crate::resolver::pruning;
use crate::resolver::selection::{self, TargetSelection};
use crate::util::cancel::CancellationToken;

/// Canonicalize repository names and deduplicate per-configuration
/// variants, keeping the variant with the largest combined jar count.
pub fn ingest_targets(
    raw: Vec<TargetInfo>,
    repo_mapping: &RepoMapping,
) -> HashMap<Label, TargetInfo> {
    let mut targets: HashMap<Label, TargetInfo> = HashMap::with_capacity(raw.len());
    for info in raw {
        let info = info.canonicalized(repo_mapping);
        match targets.get(&info.id) {
            Some(existing) if existing.jar_count() >= info.jar_count() => {}
            _ => {
                targets.insert(info.id, info);
            }
        }
    }
    targets
}

/// Resolve one sync's target set into a [`Project`].
#[allow(clippy::too_many_arguments)]
pub fn resolve_project(
    raw_targets: Vec<TargetInfo>,
    roots: &HashSet<Label>,
    ctx: &WorkspaceContext,
    repo_mapping: &RepoMapping,
    resolver: &PathsResolver,
    build_tool_release: &str,
    caches: &ResolveCaches,
    cancel: &CancellationToken,
) -> Result<Project, SyncError> {
    let check = |cancel: &CancellationToken| {
        if cancel.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    };
    check(cancel)?;

    let targets = {
        let _span = debug_span!("ingest_targets").entered();
        ingest_targets(raw_targets, repo_mapping)
    };
    let graph = {
        let _span = debug_span!("build_dependency_graph").entered();
        DependencyGraph::new(&targets)
    };
    let selection = {
        let _span = debug_span!("select_targets").entered();
        selection::select_targets(&targets, roots, &graph, ctx, repo_mapping)
    };
    check(cancel)?;

    let mut imported: Vec<&TargetInfo> = selection
        .targets_to_import
        .iter()
        .filter_map(|label| targets.get(label))
        .collect();
    imported.sort_by_key(|info| info.id);

    let base_libraries = {
        let _span = debug_span!("libraries_from_targets").entered();
        libraries_from_targets(&selection, repo_mapping, resolver)
    };

    // Independent derivation passes, joined before the merge
    let (output_jars, annotation, stdlib, scala_sdk, plugins, aidl, go_libraries) = {
        let _span = debug_span!("derivation_passes").entered();
        let mut output_jars = None;
        let mut annotation = None;
        let mut stdlib = None;
        let mut scala_sdk = None;
        let mut plugins = None;
        let mut aidl = None;
        let mut go = None;
        rayon::scope(|s| {
            s.spawn(|_| output_jars = Some(passes::output_jars_libraries(&imported, resolver, ctx)));
            s.spawn(|_| annotation = Some(passes::annotation_processor_libraries(&imported, resolver)));
            s.spawn(|_| stdlib = Some(passes::kotlin_stdlib_libraries(&imported, resolver)));
            s.spawn(|_| scala_sdk = Some(passes::scala_sdk_libraries(&imported, resolver)));
            s.spawn(|_| plugins = Some(passes::kotlinc_plugin_libraries(&imported, resolver)));
            s.spawn(|_| aidl = Some(passes::android_aidl_libraries(&imported, resolver, ctx)));
            s.spawn(|_| go = Some(passes::go_libraries(&imported, resolver, ctx)));
        });
        (
            output_jars.unwrap_or_default(),
            annotation.unwrap_or_default(),
            stdlib.unwrap_or_default(),
            scala_sdk.unwrap_or_default(),
            plugins.unwrap_or_default(),
            aidl.unwrap_or_default(),
            go.unwrap_or_default(),
        )
    };
    check(cancel)?;

    // Fixed pass order, regardless of completion order
    let pass_libraries = passes::merge_pass_results(vec![
        output_jars,
        annotation,
        stdlib,
        scala_sdk,
        plugins,
        aidl,
    ]);

    let jdeps_paths = {
        let _span = debug_span!("collect_jdeps").entered();
        jdeps::collect_jdeps_paths(&imported, resolver)
    };
    let jdeps_libraries = {
        let _span = debug_span!("jdeps_reconciliation").entered();
        jdeps::jdeps_libraries_from_paths(&targets, &jdeps_paths, &base_libraries, resolver, caches)
    };
    let pruned_libraries = {
        let _span = debug_span!("transitive_jar_pruning").entered();
        pruning::transitive_jar_libraries(
            &targets,
            &imported,
            &graph,
            &jdeps_paths,
            ctx,
            resolver,
            caches,
        )?
    };
    check(cancel)?;

    // Merge precedence: targets-and-deps < passes < jdeps < pruned.
    // Within each pass the contributing targets apply in sorted label
    // order, so a library label produced by several targets has a stable
    // winner.
    let mut libraries = base_libraries;
    for pass in [&pass_libraries, &jdeps_libraries, &pruned_libraries] {
        let mut entries: Vec<(&Label, &Vec<Library>)> = pass.iter().collect();
        entries.sort_by_key(|(label, _)| **label);
        for (_, contributed) in entries {
            for library in contributed {
                libraries.insert(library.label, library.clone());
            }
        }
    }

    let modules = {
        let _span = debug_span!("assemble_modules").entered();
        let mut modules: Vec<Module> = imported
            .par_iter()
            .map(|info| {
                assemble_module(
                    info,
                    &pass_libraries,
                    &jdeps_libraries,
                    &pruned_libraries,
                    resolver,
                )
            })
            .filter(|module| !module.tags.contains(&Tag::NoIde))
            .collect();
        modules.sort_by_key(|m| m.label);
        modules
    };

    let module_labels: HashSet<Label> = modules.iter().map(|m| m.label).collect();
    let mut non_module_targets: Vec<Label> = targets
        .keys()
        .filter(|label| repo_mapping.is_internal(label))
        .filter(|label| !module_labels.contains(label) && !libraries.contains_key(label))
        .copied()
        .collect();
    non_module_targets.sort();

    Ok(Project {
        workspace_root: resolver.workspace_root.clone(),
        build_tool_release: build_tool_release.to_string(),
        modules,
        libraries,
        go_libraries,
        non_module_targets,
        repo_mapping: repo_mapping.clone(),
        has_error: false,
    })
}

/// Library map seeded from the non-imported targets the imported set
/// actually uses.
fn libraries_from_targets(
    selection: &TargetSelection,
    repo_mapping: &RepoMapping,
    resolver: &PathsResolver,
) -> HashMap<Label, Library> {
    selection
        .targets_as_libraries
        .iter()
        .filter_map(|(label, info)| {
            let mut library = Library::new(*label)
                .with_outputs(info.binary_jar_paths().map(|l| resolver.resolve(l)))
                .with_interface_jars(info.interface_jar_paths().map(|l| resolver.resolve(l)))
                .with_sources(info.source_jar_paths().map(|l| resolver.resolve(l)))
                .with_dependencies(info.dependency_ids())
                .with_inferred_maven_coordinates();
            if repo_mapping.is_internal(label) {
                library = library.from_internal_target();
            }
            let nothing_to_offer = library.outputs.is_empty()
                && library.interface_jars.is_empty()
                && library.dependencies.is_empty();
            if nothing_to_offer || library.is_empty_placeholder() {
                None
            } else {
                Some((*label, library))
            }
        })
        .collect()
}

fn assemble_module(
    info: &TargetInfo,
    pass_libraries: &PassResult,
    jdeps_libraries: &PassResult,
    pruned_libraries: &PassResult,
    resolver: &PathsResolver,
) -> Module {
    let empty = Vec::new();
    let extra: Vec<&Library> = pass_libraries
        .get(&info.id)
        .unwrap_or(&empty)
        .iter()
        .chain(jdeps_libraries.get(&info.id).unwrap_or(&empty))
        .chain(pruned_libraries.get(&info.id).unwrap_or(&empty))
        .collect();

    // Extra libraries first so library overrides win downstream;
    // low-priority libraries last so declared equivalents shadow them
    let mut direct_dependencies: Vec<Label> = Vec::new();
    let mut seen: HashSet<Label> = HashSet::new();
    for library in extra.iter().filter(|l| !l.is_low_priority) {
        if seen.insert(library.label) {
            direct_dependencies.push(library.label);
        }
    }
    for dep in info.dependency_ids() {
        if seen.insert(dep) {
            direct_dependencies.push(dep);
        }
    }
    for library in extra.iter().filter(|l| l.is_low_priority) {
        if seen.insert(library.label) {
            direct_dependencies.push(library.label);
        }
    }

    let languages = info.languages();
    let tags = Tag::from_target(&info.kind, info.executable, &info.tags);

    let mut sources: Vec<SourceItem> = Vec::new();
    for (location, generated) in info
        .sources
        .iter()
        .map(|l| (l, false))
        .chain(info.generated_sources.iter().map(|l| (l, true)))
    {
        let path = resolver.resolve(location);
        if !path.exists() {
            warn!(target_id = %info.id, path = %path.display(), "source path does not exist, excluding");
            continue;
        }
        sources.push(SourceItem {
            path,
            generated,
            jvm_package_prefix: None,
        });
    }

    let mut resources: BTreeSet<PathBuf> = BTreeSet::new();
    for location in &info.resources {
        let path = resolver.resolve(location);
        if !path.exists() {
            warn!(target_id = %info.id, path = %path.display(), "resource path does not exist, excluding");
            continue;
        }
        resources.insert(path);
    }

    // Inherited variables resolve against the host environment; the
    // target's own env wins on conflict
    let mut environment: BTreeMap<String, String> = info
        .env_inherit
        .iter()
        .filter_map(|name| std::env::var(name).ok().map(|value| (name.clone(), value)))
        .collect();
    environment.extend(info.env.clone());

    Module {
        label: info.id,
        direct_dependencies,
        language_data: language_data(info, &languages),
        languages,
        tags,
        base_directory: resolver.package_dir(&info.id),
        sources,
        resources,
        environment,
        kind: info.kind.clone(),
    }
}

fn language_data(info: &TargetInfo, languages: &BTreeSet<LanguageClass>) -> Option<LanguageData> {
    if languages.iter().any(LanguageClass::is_jvm) {
        let jvm = info.jvm_target_info.as_ref();
        return Some(LanguageData::Jvm {
            main_class: jvm.and_then(|j| j.main_class.clone()),
            args: jvm.map(|j| j.args.clone()).unwrap_or_default(),
            jvm_flags: jvm.map(|j| j.jvm_flags.clone()).unwrap_or_default(),
        });
    }
    if languages.contains(&LanguageClass::Python) {
        return Some(LanguageData::Python {
            is_code_generator: info
                .python_target_info
                .as_ref()
                .is_some_and(|py| py.is_code_generator),
        });
    }
    if languages.contains(&LanguageClass::Go) {
        return Some(LanguageData::Go {
            import_path: info
                .go_target_info
                .as_ref()
                .map(|go| go.import_path.clone())
                .unwrap_or_default(),
        });
    }
    None
}
